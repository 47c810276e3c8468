//! Session context for the Murmur voice client.
//!
//! This crate holds everything about a connection that isn't about a
//! particular player:
//!
//! 1. **Phase**: disconnected, connecting, or connected
//!    ([`ConnectionPhase`])
//! 2. **Identity**: which player id the server assigned us
//! 3. **Pending sends**: messages waiting for the session to come up
//! 4. **Own voice state**: the user's self-mute/self-deaf choice
//!    ([`LocalVoiceState`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Dispatcher (above)  ← reads local_id, drives establish()/disconnect()
//!     ↕
//! Session Layer (this crate)  ← owns phase, identity, pending queue
//!     ↕
//! Protocol Layer (below)  ← provides PlayerId, Message
//! ```

mod context;
mod error;
mod session;
mod voice;

pub use context::SessionContext;
pub use error::SessionError;
pub use session::{ConnectionPhase, SessionConfig};
pub use voice::{LocalVoiceState, VoiceStateChange};
