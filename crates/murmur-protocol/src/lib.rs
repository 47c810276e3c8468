//! Wire protocol for Murmur.
//!
//! This crate defines the "language" that a voice server and the client
//! speak:
//!
//! - **Types** ([`Message`], [`MessageKind`], [`PlayerId`]): the closed
//!   set of messages that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`BinaryCodec`], [`JsonCodec`]): how
//!   those messages are converted to/from bytes.
//! - **Errors** ([`DecodeError`], [`EncodeError`]): what can go wrong
//!   during encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw buffers) and the
//! dispatcher (roster state). It doesn't know about connections or
//! players beyond their ids: it only converts messages.
//!
//! ```text
//! Transport (bytes) → Protocol (Message) → Dispatcher (roster + session)
//! ```

mod codec;
mod error;
mod types;
mod wire;

pub use codec::{BinaryCodec, Codec};
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::{DecodeError, EncodeError};
pub use types::{Message, MessageKind, PROTOCOL_VERSION, PlayerId};
