//! # Murmur
//!
//! Session layer of a voice-chat client.
//!
//! Murmur keeps an authoritative roster of the players on a voice server,
//! applies the server's join/leave/mute/deaf/kick traffic to it, and turns
//! each completed change into a [`Notification`] for whatever renders the
//! roster. Audio itself is someone else's job: voice frames are passed
//! through to a sink untouched.
//!
//! ## Layers
//!
//! ```text
//! murmur-transport   Connector / Connection (WebSocket, in-memory)
//! murmur-protocol    Message, BinaryCodec / JsonCodec
//! murmur-roster      Registry of Players
//! murmur-session     SessionContext (phase, local id, pending sends)
//! murmur             Dispatcher, client runtime (this crate)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use murmur::prelude::*;
//!
//! # async fn run() -> Result<(), MurmurError> {
//! let (client, mut notifications) = ClientBuilder::new()
//!     .credentials("alice", "")
//!     .spawn(WebSocketConnector, BinaryCodec);
//! client.connect().await?;
//!
//! while let Some(notification) = notifications.recv().await {
//!     if let Notification::PlayerJoined { name, .. } = notification {
//!         println!("{name} joined");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod dispatcher;
mod error;
mod notification;

pub use client::{
    ClientBuilder, ClientHandle, ClientStatus, NotificationReceiver,
};
pub use config::ClientConfig;
pub use dispatcher::{Dispatcher, Processed};
pub use error::{DispatchError, MurmurError, ProtocolError};
pub use notification::{Notification, VoicePacket};

pub use murmur_protocol as protocol;
pub use murmur_roster as roster;
pub use murmur_session as session;
pub use murmur_transport as transport;

/// Everything needed to run a client.
pub mod prelude {
    pub use crate::{
        ClientBuilder, ClientConfig, ClientHandle, ClientStatus,
        DispatchError, Dispatcher, MurmurError, Notification,
        NotificationReceiver, Processed, ProtocolError, VoicePacket,
    };
    pub use murmur_protocol::{
        BinaryCodec, Codec, DecodeError, Message, MessageKind, PlayerId,
    };
    pub use murmur_roster::{
        Player, PlayerFlags, PlayerHandle, Presence, Registry, RegistryError,
    };
    pub use murmur_session::{
        ConnectionPhase, LocalVoiceState, SessionConfig, SessionContext,
        SessionError, VoiceStateChange,
    };
    pub use murmur_transport::{
        Connection, Connector, MemoryConnector, TransportError,
        WebSocketConnector,
    };
}
