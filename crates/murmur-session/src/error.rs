//! Error types for the session layer.

use crate::ConnectionPhase;

/// Errors that can occur while managing the session context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The operation needs a connection and there is none.
    #[error("not connected")]
    NotConnected,

    /// The requested phase change isn't allowed from the current phase.
    /// For example, a ServerSync arriving after a disconnect.
    #[error("cannot move from {from} to {to}")]
    InvalidTransition {
        from: ConnectionPhase,
        to: ConnectionPhase,
    },

    /// The pending outbound queue is at capacity.
    #[error("pending send queue is full ({0} messages)")]
    QueueFull(usize),
}
