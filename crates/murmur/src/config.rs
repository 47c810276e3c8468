//! Client configuration.

use std::time::Duration;

use murmur_session::{LocalVoiceState, SessionConfig};
use serde::{Deserialize, Serialize};

/// Everything a client needs to know before it connects.
///
/// `#[serde(default)]` lets a config file set only the fields it cares
/// about:
///
/// ```
/// use murmur::ClientConfig;
///
/// let config: ClientConfig =
///     serde_json::from_str(r#"{ "username": "alice", "self_mute": true }"#).unwrap();
/// assert_eq!(config.username, "alice");
/// assert_eq!(config.server_url, "ws://127.0.0.1:64738");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Address handed to the connector. Default: `ws://127.0.0.1:64738`.
    pub server_url: String,
    pub username: String,
    pub password: String,

    /// Start muted. Announced to the server once the session is up.
    pub self_mute: bool,
    /// Start deafened. Implies `self_mute`.
    pub self_deaf: bool,

    /// How long a connect attempt may take. Default: 10.
    pub connect_timeout_secs: u64,

    /// Capacity of the channel between the reader task and the client
    /// task. Default: 256.
    pub inbound_queue: usize,

    /// Capacity of the command channel behind every
    /// [`ClientHandle`](crate::ClientHandle). Default: 64.
    pub command_queue: usize,

    pub session: SessionConfig,
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// The stored voice preference, with deaf implying mute.
    pub fn voice(&self) -> LocalVoiceState {
        LocalVoiceState::new(self.self_mute, self.self_deaf)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:64738".to_string(),
            username: String::new(),
            password: String::new(),
            self_mute: false,
            self_deaf: false,
            connect_timeout_secs: 10,
            inbound_queue: 256,
            command_queue: 64,
            session: SessionConfig::default(),
        }
    }
}
