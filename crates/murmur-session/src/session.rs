//! Session types: the connection phase and session configuration.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
///
/// `#[serde(default)]` lets a config file set only the fields it cares
/// about; the rest come from [`Default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How many outbound messages may wait while the connection is still
    /// being established. Further sends fail with
    /// [`SessionError::QueueFull`](crate::SessionError::QueueFull).
    ///
    /// Default: 64.
    pub max_pending: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { max_pending: 64 }
    }
}

// ---------------------------------------------------------------------------
// ConnectionPhase
// ---------------------------------------------------------------------------

/// Where the client is in its connection lifecycle.
///
/// ```text
///   Disconnected ──(begin_connect)──→ Connecting ──(ServerSync)──→ Connected
///        ↑                                │                            │
///        └──────────(disconnect)──────────┴────────────────────────────┘
/// ```
///
/// - **Disconnected**: no transport. Nothing can be sent.
/// - **Connecting**: transport is up (or coming up), the server hasn't
///   told us who we are yet. Outbound messages queue.
/// - **Connected**: the server has sent ServerSync; `local_id` is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionPhase {
    /// Returns `true` once the server has confirmed our identity.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` if a transport exists in any state.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}
