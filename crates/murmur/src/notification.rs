//! Events the client emits after a state transition completes.
//!
//! A notification is what the presentation layer sees. Every one of them
//! describes something that already happened to the registry or the
//! session; nothing downstream can veto it.

use murmur_protocol::PlayerId;

use crate::ProtocolError;

/// One voice frame, handed to the audio pipeline untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoicePacket {
    pub session: PlayerId,
    pub seq: u32,
    pub packet: Vec<u8>,
}

/// A completed transition, ready to be rendered.
///
/// Ids are plain [`PlayerId`]s. A consumer that wants the current name or
/// flags of a player looks them up in a status snapshot; the name in
/// `PlayerLeft` is carried along because the record is already gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    PlayerJoined { id: PlayerId, name: String },
    PlayerLeft { id: PlayerId, name: String },

    /// A player changed their own mute/deaf state.
    SelfStateChanged {
        id: PlayerId,
        self_mute: bool,
        self_deaf: bool,
    },

    /// `actor` (un)muted `victim`.
    MuteChanged {
        victim: PlayerId,
        actor: PlayerId,
        mute: bool,
    },

    /// `actor` (un)deafened `victim`.
    DeafChanged {
        victim: PlayerId,
        actor: PlayerId,
        deaf: bool,
    },

    /// `actor` kicked `victim`. Advisory: the roster changes only when the
    /// server follows up with a leave.
    Kicked {
        victim: PlayerId,
        actor: PlayerId,
        reason: String,
    },

    /// The server refused the connection.
    ConnectionRejected { reason: String },

    /// The server told us who we are.
    LocalIdentityEstablished { id: PlayerId },

    /// Voice activity started or stopped.
    TalkingChanged { id: PlayerId, talking: bool },

    /// The server sent something inconsistent with the roster. The message
    /// was skipped and the session carries on.
    ProtocolViolation(ProtocolError),

    /// The session ended. `reason` is `None` for a clean close.
    Disconnected { reason: Option<String> },
}

impl Notification {
    /// The player this notification is mainly about, if any.
    pub fn player(&self) -> Option<PlayerId> {
        match self {
            Self::PlayerJoined { id, .. }
            | Self::PlayerLeft { id, .. }
            | Self::SelfStateChanged { id, .. }
            | Self::LocalIdentityEstablished { id }
            | Self::TalkingChanged { id, .. } => Some(*id),
            Self::MuteChanged { victim, .. }
            | Self::DeafChanged { victim, .. }
            | Self::Kicked { victim, .. } => Some(*victim),
            Self::ConnectionRejected { .. }
            | Self::ProtocolViolation(_)
            | Self::Disconnected { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_of_moderation_is_victim() {
        let n = Notification::MuteChanged {
            victim: PlayerId(5),
            actor: PlayerId(1),
            mute: true,
        };
        assert_eq!(n.player(), Some(PlayerId(5)));
    }

    #[test]
    fn test_session_events_have_no_player() {
        assert_eq!(Notification::Disconnected { reason: None }.player(), None);
        let violation =
            Notification::ProtocolViolation(ProtocolError::UnknownSubject(PlayerId(3)));
        assert_eq!(violation.player(), None);
    }
}
