//! The local user's own mute/deaf preference.
//!
//! Deafening implies muting: a user who can't hear the channel shouldn't
//! be talking into it. The two setters keep that coupling and report
//! what actually changed so the presentation layer can phrase it.

use serde::{Deserialize, Serialize};

/// What a call to [`LocalVoiceState::set_mute`] or
/// [`LocalVoiceState::set_deaf`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceStateChange {
    Muted,
    Unmuted,
    /// Un-muting while deafened also un-deafens.
    UnmutedAndUndeafened,
    Deafened,
    /// Deafening while unmuted also mutes.
    MutedAndDeafened,
    Undeafened,
}

/// The user's self-mute/self-deaf choice, independent of any connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocalVoiceState {
    mute: bool,
    deaf: bool,
}

impl LocalVoiceState {
    /// Builds a state from stored preferences. `deaf` forces `mute`.
    pub fn new(mute: bool, deaf: bool) -> Self {
        Self {
            mute: mute || deaf,
            deaf,
        }
    }

    pub fn mute(&self) -> bool {
        self.mute
    }

    pub fn deaf(&self) -> bool {
        self.deaf
    }

    /// `true` when neither flag is set; nothing needs announcing on
    /// connect.
    pub fn is_default(&self) -> bool {
        !self.mute && !self.deaf
    }

    pub fn set_mute(&mut self, mute: bool) -> VoiceStateChange {
        self.mute = mute;
        if !mute && self.deaf {
            self.deaf = false;
            VoiceStateChange::UnmutedAndUndeafened
        } else if !mute {
            VoiceStateChange::Unmuted
        } else {
            VoiceStateChange::Muted
        }
    }

    pub fn set_deaf(&mut self, deaf: bool) -> VoiceStateChange {
        self.deaf = deaf;
        if deaf && !self.mute {
            self.mute = true;
            VoiceStateChange::MutedAndDeafened
        } else if deaf {
            VoiceStateChange::Deafened
        } else {
            VoiceStateChange::Undeafened
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_deaf_forces_mute() {
        let state = LocalVoiceState::new(false, true);
        assert!(state.mute());
        assert!(state.deaf());
    }

    #[test]
    fn test_mute_then_unmute() {
        let mut state = LocalVoiceState::default();
        assert_eq!(state.set_mute(true), VoiceStateChange::Muted);
        assert_eq!(state.set_mute(false), VoiceStateChange::Unmuted);
        assert!(state.is_default());
    }

    #[test]
    fn test_deafen_while_unmuted_also_mutes() {
        let mut state = LocalVoiceState::default();
        assert_eq!(state.set_deaf(true), VoiceStateChange::MutedAndDeafened);
        assert!(state.mute());
        assert!(state.deaf());
    }

    #[test]
    fn test_deafen_while_muted() {
        let mut state = LocalVoiceState::new(true, false);
        assert_eq!(state.set_deaf(true), VoiceStateChange::Deafened);
    }

    #[test]
    fn test_unmute_while_deaf_also_undeafens() {
        let mut state = LocalVoiceState::new(true, true);
        assert_eq!(
            state.set_mute(false),
            VoiceStateChange::UnmutedAndUndeafened
        );
        assert!(state.is_default());
    }

    #[test]
    fn test_undeafen_keeps_mute() {
        let mut state = LocalVoiceState::new(true, true);
        assert_eq!(state.set_deaf(false), VoiceStateChange::Undeafened);
        assert!(state.mute());
        assert!(!state.deaf());
    }
}
