//! Client transport abstraction layer for Murmur.
//!
//! Provides the [`Connector`] and [`Connection`] traits that abstract over
//! how the client reaches a voice server. The session layer above only
//! ever sees complete message buffers: framing is this layer's job.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket client via `tokio-tungstenite`
//!
//! The [`memory`] module is always available. It wires a client to an
//! in-process "server" end, which is how the higher layers are tested
//! without opening sockets.

mod error;
pub mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::{MemoryConnection, MemoryConnector, MemoryListener};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketConnector};

use std::fmt;
use std::future::Future;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Opens outgoing connections to a server.
///
/// The returned futures are `Send` so the client runtime can drive them
/// from a spawned Tokio task regardless of the concrete transport.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;

    /// Connects to the server at `addr` (a URL for WebSocket, any label
    /// for the in-memory transport).
    fn connect(
        &self,
        addr: &str,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single connection that can send and receive whole messages.
///
/// Each `send` carries exactly one encoded message and each `recv` yields
/// exactly one. `send` and `recv` may be called concurrently from
/// different tasks.
pub trait Connection: Send + Sync + 'static {
    /// Sends one message buffer to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next message buffer from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
