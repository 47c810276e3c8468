//! Codec trait and implementations for converting messages to and from
//! bytes.
//!
//! The client runtime doesn't care HOW messages are serialized, only that
//! something implements [`Codec`]. [`BinaryCodec`] is the wire format
//! spoken by servers. [`JsonCodec`] encodes the same messages as JSON,
//! which is handy for logging and for poking at a test server by hand.

use crate::wire::{Reader, Writer};
use crate::{DecodeError, EncodeError, Message, MessageKind};

/// Converts [`Message`]s to bytes and back.
///
/// One call handles exactly one message; framing (where one message ends
/// and the next begins) belongs to the transport. Implementations are
/// pure: no I/O, no shared state.
///
/// ## Trait bounds
///
/// - `Send + Sync` → the codec is shared between the client actor and
///   whatever task encodes outgoing messages.
/// - `'static` → it owns everything it needs, so it can live inside a
///   spawned task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes one message.
    ///
    /// # Errors
    /// Returns [`EncodeError`] if a field can't be represented in this
    /// format.
    fn encode(&self, msg: &Message) -> Result<Vec<u8>, EncodeError>;

    /// Deserializes one message.
    ///
    /// # Errors
    /// - [`DecodeError::UnknownKind`] / [`DecodeError::UnknownTag`]: the
    ///   discriminator names no kind this build knows about
    /// - [`DecodeError::MalformedPayload`]: the kind is known but the
    ///   bytes don't match its layout
    fn decode(&self, data: &[u8]) -> Result<Message, DecodeError>;
}

// ---------------------------------------------------------------------------
// BinaryCodec
// ---------------------------------------------------------------------------

/// The binary wire format.
///
/// ```text
/// ┌──────────┬──────────────────────────────┐
/// │ kind: u8 │ fields in declaration order   │
/// └──────────┴──────────────────────────────┘
/// ```
///
/// Field layout per kind (all integers `u32` little-endian, `str`/`bytes`
/// are `u32` length + data, `bool` is one byte):
///
/// | kind | fields |
/// |---|---|
/// | ServerAuthenticate | version, username: str, password: str |
/// | ServerReject | reason: str |
/// | ServerSync | session |
/// | ServerJoin | session, name: str |
/// | ServerLeave | session |
/// | Speex | session, seq, packet: bytes |
/// | PlayerSelfMuteDeaf | session, mute: bool, deaf: bool |
/// | PlayerMute | session, victim, mute: bool |
/// | PlayerDeaf | session, victim, deaf: bool |
/// | PlayerKick | session, victim, reason: str |
///
/// ## Example
///
/// ```rust
/// use murmur_protocol::{BinaryCodec, Codec, Message, PlayerId};
///
/// let codec = BinaryCodec;
/// let msg = Message::ServerLeave { session: PlayerId(5) };
///
/// let bytes = codec.encode(&msg).unwrap();
/// assert_eq!(bytes, vec![4, 5, 0, 0, 0]);
/// assert_eq!(codec.decode(&bytes).unwrap(), msg);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl Codec for BinaryCodec {
    fn encode(&self, msg: &Message) -> Result<Vec<u8>, EncodeError> {
        let mut w = Writer::new(msg.kind().as_u8());
        match msg {
            Message::ServerAuthenticate {
                version,
                username,
                password,
            } => {
                w.u32(*version)
                    .str("username", username)?
                    .str("password", password)?;
            }
            Message::ServerReject { reason } => {
                w.str("reason", reason)?;
            }
            Message::ServerSync { session } | Message::ServerLeave { session } => {
                w.player(*session);
            }
            Message::ServerJoin { session, name } => {
                w.player(*session).str("name", name)?;
            }
            Message::Speex {
                session,
                seq,
                packet,
            } => {
                w.player(*session).u32(*seq).bytes("packet", packet)?;
            }
            Message::PlayerSelfMuteDeaf {
                session,
                mute,
                deaf,
            } => {
                w.player(*session).bool(*mute).bool(*deaf);
            }
            Message::PlayerMute {
                session,
                victim,
                mute: flag,
            }
            | Message::PlayerDeaf {
                session,
                victim,
                deaf: flag,
            } => {
                w.player(*session).player(*victim).bool(*flag);
            }
            Message::PlayerKick {
                session,
                victim,
                reason,
            } => {
                w.player(*session).player(*victim).str("reason", reason)?;
            }
        }
        Ok(w.finish())
    }

    fn decode(&self, data: &[u8]) -> Result<Message, DecodeError> {
        let mut r = Reader::new(data);
        let byte = r.u8("kind")?;
        let kind =
            MessageKind::from_u8(byte).ok_or(DecodeError::UnknownKind(byte))?;

        let msg = match kind {
            MessageKind::ServerAuthenticate => Message::ServerAuthenticate {
                version: r.u32("version")?,
                username: r.string("username")?,
                password: r.string("password")?,
            },
            MessageKind::ServerReject => Message::ServerReject {
                reason: r.string("reason")?,
            },
            MessageKind::ServerSync => Message::ServerSync {
                session: r.player("session")?,
            },
            MessageKind::ServerJoin => Message::ServerJoin {
                session: r.player("session")?,
                name: r.string("name")?,
            },
            MessageKind::ServerLeave => Message::ServerLeave {
                session: r.player("session")?,
            },
            MessageKind::Speex => Message::Speex {
                session: r.player("session")?,
                seq: r.u32("seq")?,
                packet: r.bytes("packet")?,
            },
            MessageKind::PlayerSelfMuteDeaf => Message::PlayerSelfMuteDeaf {
                session: r.player("session")?,
                mute: r.bool("mute")?,
                deaf: r.bool("deaf")?,
            },
            MessageKind::PlayerMute => Message::PlayerMute {
                session: r.player("session")?,
                victim: r.player("victim")?,
                mute: r.bool("mute")?,
            },
            MessageKind::PlayerDeaf => Message::PlayerDeaf {
                session: r.player("session")?,
                victim: r.player("victim")?,
                deaf: r.bool("deaf")?,
            },
            MessageKind::PlayerKick => Message::PlayerKick {
                session: r.player("session")?,
                victim: r.player("victim")?,
                reason: r.string("reason")?,
            },
        };

        r.finish()?;
        Ok(msg)
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Messages are internally tagged: `{"type": "PlayerMute", "session": 1,
/// "victim": 5, "mute": true}`. Behind the `json` feature (on by default).
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode(&self, msg: &Message) -> Result<Vec<u8>, EncodeError> {
        Ok(serde_json::to_vec(msg)?)
    }

    fn decode(&self, data: &[u8]) -> Result<Message, DecodeError> {
        // Parse to a `Value` first so an unknown tag can be told apart
        // from a malformed body.
        let value: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| DecodeError::MalformedPayload(e.to_string()))?;

        let tag = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                DecodeError::MalformedPayload("missing \"type\" tag".into())
            })?;
        if MessageKind::from_name(tag).is_none() {
            return Err(DecodeError::UnknownTag(tag.to_string()));
        }

        serde_json::from_value(value)
            .map_err(|e| DecodeError::MalformedPayload(e.to_string()))
    }
}
