//! Core protocol types for Murmur's wire format.
//!
//! This module defines every type that travels "on the wire" between a
//! voice server and the client. The [`Message`] enum is the closed set of
//! message kinds; [`MessageKind`] is its discriminator as it appears in
//! the first byte of a binary frame.

use serde::{Deserialize, Serialize};

use std::fmt;

/// Protocol version sent in [`Message::ServerAuthenticate`]. Servers
/// reject clients that speak a different version.
pub const PROTOCOL_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A server-assigned player identifier.
///
/// Unique among the players connected *right now*. The server is free to
/// hand the same number to a new player once the previous owner has left,
/// so an id on its own never proves that two observations refer to the
/// same person.
///
/// `#[serde(transparent)]` serializes `PlayerId(42)` as plain `42`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

/// `tracing::info!(%player_id, "joined")` prints `player_id=P-42`.
impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// MessageKind: the wire discriminator
// ---------------------------------------------------------------------------

/// The leading byte of every binary frame.
///
/// The numeric values are part of the wire format: never renumber an
/// existing kind, only append new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    ServerAuthenticate = 0,
    ServerReject = 1,
    ServerSync = 2,
    ServerJoin = 3,
    ServerLeave = 4,
    Speex = 5,
    PlayerSelfMuteDeaf = 6,
    PlayerMute = 7,
    PlayerDeaf = 8,
    PlayerKick = 9,
}

impl MessageKind {
    /// Every kind, in discriminator order.
    pub const ALL: [MessageKind; 10] = [
        Self::ServerAuthenticate,
        Self::ServerReject,
        Self::ServerSync,
        Self::ServerJoin,
        Self::ServerLeave,
        Self::Speex,
        Self::PlayerSelfMuteDeaf,
        Self::PlayerMute,
        Self::PlayerDeaf,
        Self::PlayerKick,
    ];

    /// Maps a discriminator byte back to a kind.
    ///
    /// Returns `None` for bytes no kind claims: callers turn that into
    /// a recoverable decode error, never a panic.
    pub fn from_u8(byte: u8) -> Option<Self> {
        Self::ALL.get(byte as usize).copied()
    }

    /// The discriminator byte.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// The variant name, which is also the JSON `"type"` tag.
    pub fn name(self) -> &'static str {
        match self {
            Self::ServerAuthenticate => "ServerAuthenticate",
            Self::ServerReject => "ServerReject",
            Self::ServerSync => "ServerSync",
            Self::ServerJoin => "ServerJoin",
            Self::ServerLeave => "ServerLeave",
            Self::Speex => "Speex",
            Self::PlayerSelfMuteDeaf => "PlayerSelfMuteDeaf",
            Self::PlayerMute => "PlayerMute",
            Self::PlayerDeaf => "PlayerDeaf",
            Self::PlayerKick => "PlayerKick",
        }
    }

    /// Looks a kind up by its JSON tag.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One protocol message.
///
/// `session` is always the *subject*: the player performing or announcing
/// the action. Moderation messages also carry a `victim`, the player the
/// action targets. For messages the client sends, `session` holds the
/// local player's id (or `PlayerId(0)` before the server has assigned
/// one); the server overwrites it with the sender's real id on relay.
///
/// `#[serde(tag = "type")]` gives the JSON codec its shape:
/// `{ "type": "ServerJoin", "session": 5, "name": "Alice" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// Client → Server: "Here's who I am."
    ServerAuthenticate {
        version: u32,
        username: String,
        password: String,
    },

    /// Server → Client: "You're not getting in." Sent before the server
    /// closes the connection.
    ServerReject { reason: String },

    /// Server → Client: "You are `session`." Marks the end of the
    /// initial roster burst.
    ServerSync { session: PlayerId },

    /// Server → Client: a player is now present.
    ServerJoin { session: PlayerId, name: String },

    /// Server → Client: a player is gone.
    ServerLeave { session: PlayerId },

    /// Either direction: one encoded voice frame.
    Speex {
        session: PlayerId,
        seq: u32,
        packet: Vec<u8>,
    },

    /// Either direction: a player changed their own mute/deaf state.
    PlayerSelfMuteDeaf {
        session: PlayerId,
        mute: bool,
        deaf: bool,
    },

    /// Either direction: `session` (un)muted `victim`.
    PlayerMute {
        session: PlayerId,
        victim: PlayerId,
        mute: bool,
    },

    /// Either direction: `session` (un)deafened `victim`.
    PlayerDeaf {
        session: PlayerId,
        victim: PlayerId,
        deaf: bool,
    },

    /// Either direction: `session` kicked `victim`.
    PlayerKick {
        session: PlayerId,
        victim: PlayerId,
        reason: String,
    },
}

impl Message {
    /// The discriminator for this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::ServerAuthenticate { .. } => MessageKind::ServerAuthenticate,
            Self::ServerReject { .. } => MessageKind::ServerReject,
            Self::ServerSync { .. } => MessageKind::ServerSync,
            Self::ServerJoin { .. } => MessageKind::ServerJoin,
            Self::ServerLeave { .. } => MessageKind::ServerLeave,
            Self::Speex { .. } => MessageKind::Speex,
            Self::PlayerSelfMuteDeaf { .. } => MessageKind::PlayerSelfMuteDeaf,
            Self::PlayerMute { .. } => MessageKind::PlayerMute,
            Self::PlayerDeaf { .. } => MessageKind::PlayerDeaf,
            Self::PlayerKick { .. } => MessageKind::PlayerKick,
        }
    }

    /// The subject of the message, if the kind has one.
    pub fn subject(&self) -> Option<PlayerId> {
        match self {
            Self::ServerAuthenticate { .. } | Self::ServerReject { .. } => None,
            Self::ServerSync { session }
            | Self::ServerJoin { session, .. }
            | Self::ServerLeave { session }
            | Self::Speex { session, .. }
            | Self::PlayerSelfMuteDeaf { session, .. }
            | Self::PlayerMute { session, .. }
            | Self::PlayerDeaf { session, .. }
            | Self::PlayerKick { session, .. } => Some(*session),
        }
    }

    /// The target of a moderation message.
    pub fn victim(&self) -> Option<PlayerId> {
        match self {
            Self::PlayerMute { victim, .. }
            | Self::PlayerDeaf { victim, .. }
            | Self::PlayerKick { victim, .. } => Some(*victim),
            _ => None,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // =====================================================================
    // PlayerId
    // =====================================================================

    #[test]
    fn test_player_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&PlayerId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_player_id_display() {
        assert_eq!(PlayerId(7).to_string(), "P-7");
    }

    #[test]
    fn test_player_id_orders_numerically() {
        let mut ids = vec![PlayerId(9), PlayerId(1), PlayerId(5)];
        ids.sort();
        assert_eq!(ids, vec![PlayerId(1), PlayerId(5), PlayerId(9)]);
    }

    // =====================================================================
    // MessageKind
    // =====================================================================

    #[test]
    fn test_kind_byte_values_are_stable() {
        // These numbers are on the wire; changing one breaks every peer.
        assert_eq!(MessageKind::ServerAuthenticate.as_u8(), 0);
        assert_eq!(MessageKind::ServerJoin.as_u8(), 3);
        assert_eq!(MessageKind::Speex.as_u8(), 5);
        assert_eq!(MessageKind::PlayerKick.as_u8(), 9);
    }

    #[test]
    fn test_kind_from_u8_inverts_as_u8() {
        for kind in MessageKind::ALL {
            assert_eq!(MessageKind::from_u8(kind.as_u8()), Some(kind));
        }
    }

    #[test]
    fn test_kind_from_u8_unknown_is_none() {
        assert_eq!(MessageKind::from_u8(10), None);
        assert_eq!(MessageKind::from_u8(0xFF), None);
    }

    #[test]
    fn test_kind_from_name() {
        assert_eq!(
            MessageKind::from_name("PlayerMute"),
            Some(MessageKind::PlayerMute)
        );
        assert_eq!(MessageKind::from_name("FlyToMoon"), None);
    }

    // =====================================================================
    // Message
    // =====================================================================

    #[test]
    fn test_message_json_is_internally_tagged() {
        let msg = Message::ServerJoin {
            session: PlayerId(5),
            name: "Alice".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "ServerJoin");
        assert_eq!(json["session"], 5);
        assert_eq!(json["name"], "Alice");
    }

    #[test]
    fn test_message_kind_matches_json_tag() {
        let msg = Message::PlayerKick {
            session: PlayerId(1),
            victim: PlayerId(2),
            reason: "spam".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], msg.kind().name());
    }

    #[test]
    fn test_subject_and_victim() {
        let mute = Message::PlayerMute {
            session: PlayerId(1),
            victim: PlayerId(5),
            mute: true,
        };
        assert_eq!(mute.subject(), Some(PlayerId(1)));
        assert_eq!(mute.victim(), Some(PlayerId(5)));

        let leave = Message::ServerLeave {
            session: PlayerId(3),
        };
        assert_eq!(leave.subject(), Some(PlayerId(3)));
        assert_eq!(leave.victim(), None);

        let reject = Message::ServerReject {
            reason: "full".into(),
        };
        assert_eq!(reject.subject(), None);
    }
}
