//! Error types for the dispatcher and the client runtime.

use std::time::Duration;

use murmur_protocol::{DecodeError, EncodeError, PlayerId};
use murmur_roster::RegistryError;
use murmur_session::SessionError;
use murmur_transport::TransportError;

/// The server referred to a player the roster doesn't have.
///
/// Recoverable: the offending message is skipped and nothing is mutated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The acting/announcing player is unknown.
    #[error("message from unknown player {0}")]
    UnknownSubject(PlayerId),

    /// The target of a moderation message is unknown.
    #[error("message targets unknown player {0}")]
    UnknownVictim(PlayerId),
}

/// Why one inbound message could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `murmur` crate you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attributes let `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum MurmurError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An outbound message could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// An inbound buffer could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The session is in the wrong phase for the request.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A request referred to state the roster doesn't have.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The client task has shut down.
    #[error("client is shut down")]
    ClientClosed,

    /// The server didn't accept the connection in time.
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),
}
