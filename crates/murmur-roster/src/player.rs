//! Player records and their voice-state flags.

use murmur_protocol::PlayerId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PlayerFlags
// ---------------------------------------------------------------------------

/// Voice-state flags for one player.
///
/// `mute`/`deaf` are imposed by the server (a moderator did it);
/// `self_mute`/`self_deaf` are the player's own choice. `talking` is
/// ephemeral voice activity reported by the audio pipeline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub struct PlayerFlags {
    pub mute: bool,
    pub deaf: bool,
    pub self_mute: bool,
    pub self_deaf: bool,
    pub talking: bool,
}

impl PlayerFlags {
    /// Muted by the server or by themselves.
    pub fn is_muted(&self) -> bool {
        self.mute || self.self_mute
    }

    /// Deafened by the server or by themselves.
    pub fn is_deafened(&self) -> bool {
        self.deaf || self.self_deaf
    }

    /// A deafened player counts as muted for display even when no mute
    /// flag is set. Nothing here enforces it on the audio path.
    pub fn is_effectively_muted(&self) -> bool {
        self.is_muted() || self.is_deafened()
    }

    /// Collapses the four mute/deaf flags into what a roster shows.
    pub fn presence(&self) -> Presence {
        match (self.is_muted(), self.is_deafened()) {
            (true, true) => Presence::MutedAndDeafened,
            (true, false) => Presence::Muted,
            (false, true) => Presence::Deafened,
            (false, false) => Presence::Normal,
        }
    }
}

/// How a player should be rendered in a roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Presence {
    Normal,
    Muted,
    Deafened,
    MutedAndDeafened,
}

// ---------------------------------------------------------------------------
// PlayerHandle
// ---------------------------------------------------------------------------

/// A registry-issued, non-owning reference to one player record.
///
/// Ids are recycled by the server, so an id alone can silently start
/// pointing at someone new. A handle also remembers the registry
/// generation the record was created in; [`Registry::resolve`] returns
/// `None` once that record is gone, even if the id has been reassigned.
///
/// [`Registry::resolve`]: crate::Registry::resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerHandle {
    id: PlayerId,
    generation: u64,
}

impl PlayerHandle {
    /// The player id this handle was issued for.
    pub fn id(&self) -> PlayerId {
        self.id
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A connected participant.
///
/// `id` and `name` are fixed at creation. Flags change only through
/// [`Registry::update_flags`](crate::Registry::update_flags), so there is
/// no public way to mutate a record the registry doesn't know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    id: PlayerId,
    name: String,
    flags: PlayerFlags,
    generation: u64,
}

impl Player {
    pub(crate) fn new(id: PlayerId, name: String, generation: u64) -> Self {
        Self {
            id,
            name,
            flags: PlayerFlags::default(),
            generation,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> PlayerFlags {
        self.flags
    }

    /// A handle that stops resolving once this record is removed.
    pub fn handle(&self) -> PlayerHandle {
        PlayerHandle {
            id: self.id,
            generation: self.generation,
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn flags_mut(&mut self) -> &mut PlayerFlags {
        &mut self.flags
    }
}
