//! The session context: connection-scoped facts that belong to no single
//! player.
//!
//! It tracks:
//! - WHERE the connection is ([`ConnectionPhase`])
//! - WHO we are (`local_id`, known only after ServerSync)
//! - WHAT is waiting to be sent (the pending outbound queue)
//! - HOW the user wants their own voice ([`LocalVoiceState`])
//!
//! # Concurrency note
//!
//! Like the registry, `SessionContext` is owned by the client actor task
//! and never shared. Everything here is synchronous and in-memory.

use std::collections::VecDeque;

use murmur_protocol::{Message, PlayerId};

use crate::{
    ConnectionPhase, LocalVoiceState, SessionConfig, SessionError,
    VoiceStateChange,
};

/// Connection-scoped state for one client.
///
/// ## Lifecycle
///
/// ```text
/// begin_connect() ──→ establish(id) ──→ disconnect()
///       │                  │                  │
///       ▼                  ▼                  ▼
///  [Connecting]       [Connected]       [Disconnected]
///  queue() ok         local_id set      local_id cleared,
///                     drain_pending()   pending dropped
/// ```
#[derive(Debug)]
pub struct SessionContext {
    phase: ConnectionPhase,
    local_id: Option<PlayerId>,
    pending: VecDeque<Message>,
    voice: LocalVoiceState,
    config: SessionConfig,
}

impl SessionContext {
    /// Creates a disconnected context.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            phase: ConnectionPhase::Disconnected,
            local_id: None,
            pending: VecDeque::new(),
            voice: LocalVoiceState::default(),
            config,
        }
    }

    /// Creates a disconnected context with a stored voice preference.
    pub fn with_voice(config: SessionConfig, voice: LocalVoiceState) -> Self {
        Self {
            voice,
            ..Self::new(config)
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Our own player id. `None` until ServerSync and after disconnect.
    pub fn local_id(&self) -> Option<PlayerId> {
        self.local_id
    }

    /// Returns `true` if `id` is us. Always `false` unless connected.
    pub fn is_local(&self, id: PlayerId) -> bool {
        self.phase.is_connected() && self.local_id == Some(id)
    }

    /// Disconnected → Connecting.
    ///
    /// Returns `false` (and changes nothing) if a connection is already
    /// being made or is up.
    pub fn begin_connect(&mut self) -> bool {
        if self.phase.is_active() {
            tracing::debug!(phase = %self.phase, "connect already in progress");
            return false;
        }
        self.phase = ConnectionPhase::Connecting;
        tracing::info!("connecting");
        true
    }

    /// Connecting → Connected, recording who we are.
    ///
    /// A repeated ServerSync while already connected just updates the id.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidTransition`] when disconnected.
    pub fn establish(&mut self, local_id: PlayerId) -> Result<(), SessionError> {
        if !self.phase.is_active() {
            return Err(SessionError::InvalidTransition {
                from: self.phase,
                to: ConnectionPhase::Connected,
            });
        }
        self.phase = ConnectionPhase::Connected;
        self.local_id = Some(local_id);
        tracing::info!(%local_id, "session established");
        Ok(())
    }

    /// Any phase → Disconnected.
    ///
    /// Clears `local_id` and drops anything still pending; nothing carries
    /// over into the next session. Returns how many pending messages were
    /// dropped.
    pub fn disconnect(&mut self) -> usize {
        let dropped = self.pending.len();
        self.phase = ConnectionPhase::Disconnected;
        self.local_id = None;
        self.pending.clear();
        if dropped > 0 {
            tracing::debug!(dropped, "discarded pending sends on disconnect");
        }
        dropped
    }

    /// Parks an outbound message until the session is established.
    ///
    /// # Errors
    /// - [`SessionError::NotConnected`]: no connection at all
    /// - [`SessionError::QueueFull`]: `max_pending` already waiting
    pub fn queue(&mut self, msg: Message) -> Result<(), SessionError> {
        if !self.phase.is_active() {
            return Err(SessionError::NotConnected);
        }
        if self.pending.len() >= self.config.max_pending {
            return Err(SessionError::QueueFull(self.config.max_pending));
        }
        self.pending.push_back(msg);
        Ok(())
    }

    /// Takes every pending message, oldest first.
    pub fn drain_pending(&mut self) -> Vec<Message> {
        self.pending.drain(..).collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn voice(&self) -> LocalVoiceState {
        self.voice
    }

    pub fn set_self_mute(&mut self, mute: bool) -> VoiceStateChange {
        self.voice.set_mute(mute)
    }

    pub fn set_self_deaf(&mut self, deaf: bool) -> VoiceStateChange {
        self.voice.set_deaf(deaf)
    }

    /// Replaces the whole voice preference, e.g. one prepared on a copy
    /// and committed once the server has been told.
    pub fn set_voice(&mut self, voice: LocalVoiceState) {
        self.voice = voice;
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u32) -> PlayerId {
        PlayerId(n)
    }

    fn leave(n: u32) -> Message {
        Message::ServerLeave { session: pid(n) }
    }

    fn connected(id: u32) -> SessionContext {
        let mut ctx = SessionContext::default();
        ctx.begin_connect();
        ctx.establish(pid(id)).unwrap();
        ctx
    }

    // =====================================================================
    // Phase transitions
    // =====================================================================

    #[test]
    fn test_new_context_is_disconnected_without_id() {
        let ctx = SessionContext::default();
        assert_eq!(ctx.phase(), ConnectionPhase::Disconnected);
        assert_eq!(ctx.local_id(), None);
    }

    #[test]
    fn test_begin_connect_from_disconnected() {
        let mut ctx = SessionContext::default();
        assert!(ctx.begin_connect());
        assert_eq!(ctx.phase(), ConnectionPhase::Connecting);
    }

    #[test]
    fn test_begin_connect_is_noop_when_active() {
        let mut ctx = SessionContext::default();
        ctx.begin_connect();
        assert!(!ctx.begin_connect(), "second connect should be a no-op");
        assert_eq!(ctx.phase(), ConnectionPhase::Connecting);

        let mut ctx = connected(3);
        assert!(!ctx.begin_connect());
        assert_eq!(ctx.phase(), ConnectionPhase::Connected);
        assert_eq!(ctx.local_id(), Some(pid(3)));
    }

    #[test]
    fn test_establish_sets_local_id() {
        let ctx = connected(7);
        assert_eq!(ctx.phase(), ConnectionPhase::Connected);
        assert_eq!(ctx.local_id(), Some(pid(7)));
    }

    #[test]
    fn test_establish_when_disconnected_is_rejected() {
        let mut ctx = SessionContext::default();
        let result = ctx.establish(pid(7));
        assert_eq!(
            result,
            Err(SessionError::InvalidTransition {
                from: ConnectionPhase::Disconnected,
                to: ConnectionPhase::Connected,
            })
        );
        assert_eq!(ctx.local_id(), None);
    }

    #[test]
    fn test_disconnect_clears_identity() {
        let mut ctx = connected(7);
        ctx.disconnect();
        assert_eq!(ctx.phase(), ConnectionPhase::Disconnected);
        assert_eq!(ctx.local_id(), None);
    }

    // =====================================================================
    // is_local()
    // =====================================================================

    #[test]
    fn test_is_local_only_when_connected() {
        let ctx = connected(4);
        assert!(ctx.is_local(pid(4)));
        assert!(!ctx.is_local(pid(5)));

        let mut ctx = ctx;
        ctx.disconnect();
        assert!(!ctx.is_local(pid(4)));
    }

    // =====================================================================
    // Pending queue
    // =====================================================================

    #[test]
    fn test_queue_while_disconnected_fails() {
        let mut ctx = SessionContext::default();
        assert_eq!(ctx.queue(leave(1)), Err(SessionError::NotConnected));
    }

    #[test]
    fn test_queue_and_drain_preserve_order() {
        let mut ctx = SessionContext::default();
        ctx.begin_connect();
        ctx.queue(leave(1)).unwrap();
        ctx.queue(leave(2)).unwrap();

        assert_eq!(ctx.pending_len(), 2);
        assert_eq!(ctx.drain_pending(), vec![leave(1), leave(2)]);
        assert_eq!(ctx.pending_len(), 0);
    }

    #[test]
    fn test_queue_full() {
        let mut ctx = SessionContext::new(SessionConfig { max_pending: 2 });
        ctx.begin_connect();
        ctx.queue(leave(1)).unwrap();
        ctx.queue(leave(2)).unwrap();

        assert_eq!(ctx.queue(leave(3)), Err(SessionError::QueueFull(2)));
    }

    #[test]
    fn test_disconnect_drops_pending() {
        let mut ctx = SessionContext::default();
        ctx.begin_connect();
        ctx.queue(leave(1)).unwrap();

        assert_eq!(ctx.disconnect(), 1);
        assert_eq!(ctx.pending_len(), 0);
    }

    // =====================================================================
    // Voice
    // =====================================================================

    #[test]
    fn test_voice_survives_disconnect() {
        let mut ctx = connected(1);
        ctx.set_self_deaf(true);
        ctx.disconnect();
        assert!(ctx.voice().deaf());
        assert!(ctx.voice().mute());
    }

    #[test]
    fn test_set_voice_replaces_preference() {
        let mut ctx = SessionContext::default();
        let mut voice = ctx.voice();
        voice.set_deaf(true);
        assert!(!ctx.voice().deaf(), "a copy must not write through");

        ctx.set_voice(voice);
        assert_eq!(ctx.voice(), voice);
    }
}
