//! Error types for the registry.

use murmur_protocol::PlayerId;

/// Errors returned by [`Registry`](crate::Registry) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A player with this id is already present. The existing record is
    /// left untouched; a second join for a live id is a protocol
    /// violation by the server.
    #[error("player {0} is already present")]
    DuplicateId(PlayerId),

    /// No player with this id is present.
    #[error("player {0} not found")]
    NotFound(PlayerId),
}
