//! Player registry for the Murmur voice client.
//!
//! The registry is the authoritative set of players the client currently
//! knows about. It is the only component that creates, mutates, or
//! destroys [`Player`] records.
//!
//! # Key types
//!
//! - [`Registry`]: id-keyed player store with consistency checks
//! - [`Player`]: one participant: immutable id/name, mutable flags
//! - [`PlayerFlags`] / [`Presence`]: voice state and its display form
//! - [`PlayerHandle`]: a non-owning reference that survives id reuse

mod error;
mod player;
mod registry;

pub use error::RegistryError;
pub use player::{Player, PlayerFlags, PlayerHandle, Presence};
pub use registry::{FlagsUpdate, Registry};
