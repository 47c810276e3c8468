//! The player registry: the single owner of every player record.
//!
//! All id → record decisions happen here. Other components read through
//! `&Player` borrows or hold [`PlayerHandle`]s; neither can outlive or
//! dangle past a removal.
//!
//! # Concurrency note
//!
//! `Registry` is a plain `HashMap`, not a concurrent one. It is owned by
//! the client actor task, which applies messages one at a time.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use murmur_protocol::PlayerId;

use crate::{Player, PlayerFlags, PlayerHandle, RegistryError};

/// The outcome of [`Registry::update_flags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagsUpdate {
    pub id: PlayerId,
    pub before: PlayerFlags,
    pub after: PlayerFlags,
}

impl FlagsUpdate {
    /// `false` when the mutation left every flag as it was.
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

/// Every player currently known to the client, keyed by id.
///
/// ## Lifecycle
///
/// ```text
/// insert() ──→ update_flags()* ──→ remove()
///                                     │
///           clear() (session end) ────┘
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    players: HashMap<PlayerId, Player>,

    /// Bumped on every insert so a recycled id gets a fresh generation.
    next_generation: u64,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new player.
    ///
    /// # Errors
    /// Returns [`RegistryError::DuplicateId`] if `id` is already present.
    /// The live record is never overwritten.
    pub fn insert(
        &mut self,
        id: PlayerId,
        name: impl Into<String>,
    ) -> Result<&Player, RegistryError> {
        match self.players.entry(id) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateId(id)),
            Entry::Vacant(slot) => {
                self.next_generation += 1;
                let player =
                    Player::new(id, name.into(), self.next_generation);
                tracing::debug!(
                    player_id = %id,
                    name = player.name(),
                    "player record created"
                );
                Ok(&*slot.insert(player))
            }
        }
    }

    /// Looks up a player by id. `None` is an ordinary answer.
    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Looks up the exact record a handle was issued for.
    ///
    /// Returns `None` if that record was removed, including when the id
    /// now belongs to a different player.
    pub fn resolve(&self, handle: PlayerHandle) -> Option<&Player> {
        self.players
            .get(&handle.id())
            .filter(|p| p.handle() == handle)
    }

    /// Returns `true` if a player with `id` is present.
    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    /// Removes a player and hands back the record.
    pub fn remove(&mut self, id: PlayerId) -> Option<Player> {
        let removed = self.players.remove(&id);
        if let Some(player) = &removed {
            tracing::debug!(
                player_id = %id,
                generation = player.generation(),
                "player record removed"
            );
        }
        removed
    }

    /// Applies `mutate` to a player's flags.
    ///
    /// # Errors
    /// Returns [`RegistryError::NotFound`] if `id` is absent; nothing is
    /// mutated in that case.
    pub fn update_flags<F>(
        &mut self,
        id: PlayerId,
        mutate: F,
    ) -> Result<FlagsUpdate, RegistryError>
    where
        F: FnOnce(&mut PlayerFlags),
    {
        let player = self
            .players
            .get_mut(&id)
            .ok_or(RegistryError::NotFound(id))?;

        let before = player.flags();
        mutate(player.flags_mut());
        Ok(FlagsUpdate {
            id,
            before,
            after: player.flags(),
        })
    }

    /// Removes every player, returning the records in ascending id order.
    pub fn clear(&mut self) -> Vec<Player> {
        let mut removed: Vec<Player> =
            self.players.drain().map(|(_, p)| p).collect();
        removed.sort_by_key(Player::id);
        removed
    }

    /// All present ids, ascending.
    pub fn ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.players.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Iterates over present players in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Returns the number of present players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Returns `true` if no players are present.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
