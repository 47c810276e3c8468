//! Applies decoded messages to the roster and session context.
//!
//! The dispatcher is where server traffic turns into state. For each
//! message it:
//!   1. Resolves the subject (and victim) against the registry
//!   2. Applies the effect, if any
//!   3. Returns the notification describing what changed
//!
//! It performs no I/O and never awaits. The client runtime owns the
//! registry and session and builds a short-lived `Dispatcher` that borrows
//! them for each inbound buffer.

use murmur_protocol::{Codec, DecodeError, Message, PlayerId};
use murmur_roster::{Player, PlayerFlags, Registry, RegistryError};
use murmur_session::SessionContext;

use crate::{DispatchError, Notification, ProtocolError, VoicePacket};

/// What one inbound buffer turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Processed {
    /// A state message went through [`Dispatcher::handle`].
    Handled(Option<Notification>),
    /// A voice frame. It belongs to the audio pipeline and touches no
    /// state here.
    Voice(VoicePacket),
}

/// Borrows the client's state for the duration of one dispatch.
pub struct Dispatcher<'a> {
    registry: &'a mut Registry,
    session: &'a mut SessionContext,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        registry: &'a mut Registry,
        session: &'a mut SessionContext,
    ) -> Self {
        Self { registry, session }
    }

    /// Applies one message.
    ///
    /// Returns `Ok(None)` for messages with no visible effect, and for
    /// flag changes that leave the flags as they were.
    ///
    /// # Errors
    /// - [`ProtocolError`]: the subject or victim isn't in the roster.
    ///   The subject is checked first; nothing is mutated.
    /// - [`RegistryError::DuplicateId`]: a join for an id already present
    /// - [`SessionError`](murmur_session::SessionError): a ServerSync
    ///   arrived with no connection
    pub fn dispatch(
        &mut self,
        msg: Message,
    ) -> Result<Option<Notification>, DispatchError> {
        match msg {
            Message::ServerJoin { session, name } => {
                let player = self.registry.insert(session, name)?;
                tracing::info!(player_id = %session, name = player.name(), "player joined");
                Ok(Some(Notification::PlayerJoined {
                    id: session,
                    name: player.name().to_string(),
                }))
            }

            Message::ServerLeave { session } => {
                let player = self
                    .registry
                    .remove(session)
                    .ok_or(ProtocolError::UnknownSubject(session))?;
                tracing::info!(player_id = %session, name = player.name(), "player left");
                Ok(Some(Notification::PlayerLeft {
                    id: session,
                    name: player.name().to_string(),
                }))
            }

            Message::Speex { .. } | Message::ServerAuthenticate { .. } => {
                Ok(None)
            }

            Message::PlayerSelfMuteDeaf {
                session,
                mute,
                deaf,
            } => {
                self.require_subject(session)?;
                let changed = self.apply_flags(session, |f| {
                    f.self_mute = mute;
                    f.self_deaf = deaf;
                })?;
                Ok(changed.then_some(Notification::SelfStateChanged {
                    id: session,
                    self_mute: mute,
                    self_deaf: deaf,
                }))
            }

            Message::PlayerMute {
                session,
                victim,
                mute,
            } => {
                self.require_subject(session)?;
                self.require_victim(victim)?;
                let changed = self.apply_flags(victim, |f| f.mute = mute)?;
                Ok(changed.then_some(Notification::MuteChanged {
                    victim,
                    actor: session,
                    mute,
                }))
            }

            Message::PlayerDeaf {
                session,
                victim,
                deaf,
            } => {
                self.require_subject(session)?;
                self.require_victim(victim)?;
                let changed = self.apply_flags(victim, |f| f.deaf = deaf)?;
                Ok(changed.then_some(Notification::DeafChanged {
                    victim,
                    actor: session,
                    deaf,
                }))
            }

            Message::PlayerKick {
                session,
                victim,
                reason,
            } => {
                self.require_subject(session)?;
                self.require_victim(victim)?;
                tracing::info!(%victim, actor = %session, %reason, "player kicked");
                Ok(Some(Notification::Kicked {
                    victim,
                    actor: session,
                    reason,
                }))
            }

            Message::ServerReject { reason } => {
                tracing::warn!(%reason, "server rejected connection");
                Ok(Some(Notification::ConnectionRejected { reason }))
            }

            Message::ServerSync { session } => {
                self.require_subject(session)?;
                self.session.establish(session)?;
                Ok(Some(Notification::LocalIdentityEstablished { id: session }))
            }
        }
    }

    /// Dispatches and absorbs the error.
    ///
    /// Roster inconsistencies come back as a
    /// [`Notification::ProtocolViolation`] so the presentation layer can
    /// show a diagnostic. Everything else is logged and dropped.
    pub fn handle(&mut self, msg: Message) -> Option<Notification> {
        let kind = msg.kind();
        match self.dispatch(msg) {
            Ok(notification) => {
                if notification.is_none() {
                    tracing::trace!(%kind, "message had no visible effect");
                }
                notification
            }
            Err(DispatchError::Protocol(e)) => {
                tracing::warn!(%kind, error = %e, "protocol violation, message skipped");
                Some(Notification::ProtocolViolation(e))
            }
            Err(e @ DispatchError::Registry(_)) => {
                tracing::warn!(%kind, error = %e, "message rejected by roster");
                None
            }
            Err(e) => {
                tracing::debug!(%kind, error = %e, "message ignored");
                None
            }
        }
    }

    /// Decodes one buffer and handles the message in it.
    ///
    /// Voice frames are split off before dispatch and returned as
    /// [`Processed::Voice`].
    ///
    /// # Errors
    /// Returns the [`DecodeError`]; the registry and session are untouched
    /// and the next buffer can be processed as usual.
    pub fn process<C: Codec + ?Sized>(
        &mut self,
        codec: &C,
        bytes: &[u8],
    ) -> Result<Processed, DecodeError> {
        let processed = match codec.decode(bytes)? {
            Message::Speex {
                session,
                seq,
                packet,
            } => Processed::Voice(VoicePacket {
                session,
                seq,
                packet,
            }),
            msg => Processed::Handled(self.handle(msg)),
        };
        Ok(processed)
    }

    /// Records voice activity reported by the audio pipeline.
    ///
    /// # Errors
    /// Returns [`RegistryError::NotFound`] if `id` isn't in the roster.
    pub fn set_talking(
        &mut self,
        id: PlayerId,
        talking: bool,
    ) -> Result<Option<Notification>, DispatchError> {
        let changed = self.apply_flags(id, |f| f.talking = talking)?;
        Ok(changed.then_some(Notification::TalkingChanged { id, talking }))
    }

    /// Ends the session.
    ///
    /// Every player is removed and reported with a `PlayerLeft`, in
    /// ascending id order, followed by one `Disconnected`.
    pub fn disconnect(&mut self, reason: Option<String>) -> Vec<Notification> {
        self.session.disconnect();
        let mut notifications: Vec<Notification> = self
            .registry
            .clear()
            .into_iter()
            .map(|p: Player| Notification::PlayerLeft {
                id: p.id(),
                name: p.name().to_string(),
            })
            .collect();
        tracing::info!(
            players = notifications.len(),
            reason = reason.as_deref().unwrap_or("closed"),
            "session cleared"
        );
        notifications.push(Notification::Disconnected { reason });
        notifications
    }

    fn require_subject(&self, id: PlayerId) -> Result<(), ProtocolError> {
        if self.registry.contains(id) {
            Ok(())
        } else {
            Err(ProtocolError::UnknownSubject(id))
        }
    }

    fn require_victim(&self, id: PlayerId) -> Result<(), ProtocolError> {
        if self.registry.contains(id) {
            Ok(())
        } else {
            Err(ProtocolError::UnknownVictim(id))
        }
    }

    /// Returns whether the flags actually changed.
    fn apply_flags<F>(&mut self, id: PlayerId, mutate: F) -> Result<bool, RegistryError>
    where
        F: FnOnce(&mut PlayerFlags),
    {
        let update = self.registry.update_flags(id, mutate)?;
        if !update.changed() {
            tracing::debug!(player_id = %id, "flags unchanged, nothing to report");
        }
        Ok(update.changed())
    }
}

#[cfg(test)]
mod tests {
    use murmur_protocol::BinaryCodec;
    use murmur_session::{ConnectionPhase, SessionError};

    use super::*;

    fn pid(n: u32) -> PlayerId {
        PlayerId(n)
    }

    struct Fixture {
        registry: Registry,
        session: SessionContext,
    }

    impl Fixture {
        /// A connecting session with an empty roster.
        fn new() -> Self {
            let mut session = SessionContext::default();
            session.begin_connect();
            Self {
                registry: Registry::new(),
                session,
            }
        }

        fn dispatcher(&mut self) -> Dispatcher<'_> {
            Dispatcher::new(&mut self.registry, &mut self.session)
        }

        fn dispatch(
            &mut self,
            msg: Message,
        ) -> Result<Option<Notification>, DispatchError> {
            self.dispatcher().dispatch(msg)
        }

        fn join(&mut self, id: u32, name: &str) {
            self.dispatch(Message::ServerJoin {
                session: pid(id),
                name: name.into(),
            })
            .unwrap();
        }
    }

    fn mute(actor: u32, victim: u32, mute: bool) -> Message {
        Message::PlayerMute {
            session: pid(actor),
            victim: pid(victim),
            mute,
        }
    }

    // =====================================================================
    // Join / leave
    // =====================================================================

    #[test]
    fn test_join_mute_leave_scenario() {
        let mut fx = Fixture::new();
        fx.join(1, "Bob");

        let joined = fx
            .dispatch(Message::ServerJoin {
                session: pid(5),
                name: "Alice".into(),
            })
            .unwrap();
        assert_eq!(
            joined,
            Some(Notification::PlayerJoined {
                id: pid(5),
                name: "Alice".into()
            })
        );

        let muted = fx.dispatch(mute(1, 5, true)).unwrap();
        assert_eq!(
            muted,
            Some(Notification::MuteChanged {
                victim: pid(5),
                actor: pid(1),
                mute: true
            })
        );
        assert!(fx.registry.get(pid(5)).unwrap().flags().mute);

        let left = fx
            .dispatch(Message::ServerLeave { session: pid(5) })
            .unwrap();
        assert_eq!(
            left,
            Some(Notification::PlayerLeft {
                id: pid(5),
                name: "Alice".into()
            })
        );
        assert!(fx.registry.get(pid(5)).is_none());
    }

    #[test]
    fn test_duplicate_join_keeps_live_record() {
        let mut fx = Fixture::new();
        fx.join(5, "Alice");

        let result = fx.dispatch(Message::ServerJoin {
            session: pid(5),
            name: "Mallory".into(),
        });
        assert_eq!(
            result,
            Err(DispatchError::Registry(RegistryError::DuplicateId(pid(5))))
        );
        assert_eq!(fx.registry.get(pid(5)).unwrap().name(), "Alice");
        assert_eq!(fx.registry.len(), 1);
    }

    #[test]
    fn test_leave_of_unknown_player() {
        let mut fx = Fixture::new();
        let result = fx.dispatch(Message::ServerLeave { session: pid(3) });
        assert_eq!(
            result,
            Err(DispatchError::Protocol(ProtocolError::UnknownSubject(pid(3))))
        );
    }

    // =====================================================================
    // Flag changes
    // =====================================================================

    #[test]
    fn test_repeated_mute_emits_nothing() {
        let mut fx = Fixture::new();
        fx.join(1, "Bob");
        fx.join(5, "Alice");

        assert!(fx.dispatch(mute(1, 5, true)).unwrap().is_some());
        let before = fx.registry.get(pid(5)).unwrap().flags();

        assert_eq!(fx.dispatch(mute(1, 5, true)).unwrap(), None);
        assert_eq!(fx.registry.get(pid(5)).unwrap().flags(), before);
    }

    #[test]
    fn test_deaf_sets_only_deaf_flag() {
        let mut fx = Fixture::new();
        fx.join(1, "Bob");
        fx.join(5, "Alice");

        let n = fx
            .dispatch(Message::PlayerDeaf {
                session: pid(1),
                victim: pid(5),
                deaf: true,
            })
            .unwrap();
        assert_eq!(
            n,
            Some(Notification::DeafChanged {
                victim: pid(5),
                actor: pid(1),
                deaf: true
            })
        );

        let flags = fx.registry.get(pid(5)).unwrap().flags();
        assert!(flags.deaf);
        assert!(!flags.mute);
        assert!(flags.is_effectively_muted());
    }

    #[test]
    fn test_self_mute_deaf() {
        let mut fx = Fixture::new();
        fx.join(2, "Carol");

        let n = fx
            .dispatch(Message::PlayerSelfMuteDeaf {
                session: pid(2),
                mute: true,
                deaf: true,
            })
            .unwrap();
        assert_eq!(
            n,
            Some(Notification::SelfStateChanged {
                id: pid(2),
                self_mute: true,
                self_deaf: true
            })
        );

        let flags = fx.registry.get(pid(2)).unwrap().flags();
        assert!(flags.self_mute && flags.self_deaf);
        assert!(!flags.mute && !flags.deaf);
    }

    #[test]
    fn test_unknown_subject_checked_before_victim() {
        let mut fx = Fixture::new();
        let result = fx.dispatch(mute(8, 9, true));
        assert_eq!(
            result,
            Err(DispatchError::Protocol(ProtocolError::UnknownSubject(pid(8))))
        );
    }

    #[test]
    fn test_unknown_victim_mutates_nothing() {
        let mut fx = Fixture::new();
        fx.join(1, "Bob");
        let before = fx.registry.get(pid(1)).unwrap().clone();

        let result = fx.dispatch(Message::PlayerDeaf {
            session: pid(1),
            victim: pid(9),
            deaf: true,
        });
        assert_eq!(
            result,
            Err(DispatchError::Protocol(ProtocolError::UnknownVictim(pid(9))))
        );
        assert_eq!(fx.registry.ids(), vec![pid(1)]);
        assert_eq!(fx.registry.get(pid(1)).unwrap(), &before);
    }

    #[test]
    fn test_every_subject_bearing_kind_rejects_unknown_subject() {
        let cases = vec![
            Message::ServerLeave { session: pid(8) },
            Message::ServerSync { session: pid(8) },
            Message::PlayerSelfMuteDeaf {
                session: pid(8),
                mute: true,
                deaf: true,
            },
            mute(8, 1, true),
            Message::PlayerDeaf {
                session: pid(8),
                victim: pid(1),
                deaf: true,
            },
            Message::PlayerKick {
                session: pid(8),
                victim: pid(1),
                reason: "spam".into(),
            },
        ];

        for msg in cases {
            let kind = msg.kind();
            let mut fx = Fixture::new();
            let result = fx.dispatch(msg);
            assert_eq!(
                result,
                Err(DispatchError::Protocol(ProtocolError::UnknownSubject(pid(8)))),
                "kind {kind}"
            );
            assert!(fx.registry.is_empty(), "kind {kind}");
            assert_eq!(fx.session.local_id(), None, "kind {kind}");
        }
    }

    #[test]
    fn test_every_victim_bearing_kind_rejects_unknown_victim() {
        let cases = vec![
            mute(1, 9, true),
            Message::PlayerDeaf {
                session: pid(1),
                victim: pid(9),
                deaf: true,
            },
            Message::PlayerKick {
                session: pid(1),
                victim: pid(9),
                reason: "spam".into(),
            },
        ];

        for msg in cases {
            let kind = msg.kind();
            let mut fx = Fixture::new();
            fx.join(1, "Bob");
            let before = fx.registry.get(pid(1)).unwrap().clone();

            let result = fx.dispatch(msg);
            assert_eq!(
                result,
                Err(DispatchError::Protocol(ProtocolError::UnknownVictim(pid(9)))),
                "kind {kind}"
            );
            assert_eq!(fx.registry.ids(), vec![pid(1)], "kind {kind}");
            assert_eq!(fx.registry.get(pid(1)).unwrap(), &before, "kind {kind}");
        }
    }

    // =====================================================================
    // Kick / reject / authenticate / speex
    // =====================================================================

    #[test]
    fn test_kick_is_advisory() {
        let mut fx = Fixture::new();
        fx.join(1, "Bob");
        fx.join(5, "Alice");

        let n = fx
            .dispatch(Message::PlayerKick {
                session: pid(1),
                victim: pid(5),
                reason: "spam".into(),
            })
            .unwrap();
        assert_eq!(
            n,
            Some(Notification::Kicked {
                victim: pid(5),
                actor: pid(1),
                reason: "spam".into()
            })
        );
        assert!(fx.registry.contains(pid(5)), "kick alone must not remove");
    }

    #[test]
    fn test_reject_notifies() {
        let mut fx = Fixture::new();
        let n = fx
            .dispatch(Message::ServerReject {
                reason: "bad password".into(),
            })
            .unwrap();
        assert_eq!(
            n,
            Some(Notification::ConnectionRejected {
                reason: "bad password".into()
            })
        );
    }

    #[test]
    fn test_messages_without_effect() {
        let mut fx = Fixture::new();
        let auth = Message::ServerAuthenticate {
            version: 1,
            username: "u".into(),
            password: "p".into(),
        };
        let speex = Message::Speex {
            session: pid(42),
            seq: 7,
            packet: vec![1, 2, 3],
        };
        assert_eq!(fx.dispatch(auth).unwrap(), None);
        assert_eq!(fx.dispatch(speex).unwrap(), None);
        assert!(fx.registry.is_empty());
    }

    // =====================================================================
    // ServerSync
    // =====================================================================

    #[test]
    fn test_sync_establishes_local_identity() {
        let mut fx = Fixture::new();
        fx.join(7, "Me");

        let n = fx.dispatch(Message::ServerSync { session: pid(7) }).unwrap();
        assert_eq!(n, Some(Notification::LocalIdentityEstablished { id: pid(7) }));
        assert_eq!(fx.session.local_id(), Some(pid(7)));
        assert_eq!(fx.session.phase(), ConnectionPhase::Connected);
        assert!(fx.session.is_local(pid(7)));
    }

    #[test]
    fn test_sync_for_unknown_player_leaves_identity_unset() {
        let mut fx = Fixture::new();
        let result = fx.dispatch(Message::ServerSync { session: pid(7) });
        assert_eq!(
            result,
            Err(DispatchError::Protocol(ProtocolError::UnknownSubject(pid(7))))
        );
        assert_eq!(fx.session.local_id(), None);
        assert_eq!(fx.session.phase(), ConnectionPhase::Connecting);
    }

    #[test]
    fn test_sync_while_disconnected() {
        let mut fx = Fixture::new();
        fx.join(7, "Me");
        fx.session.disconnect();

        let result = fx.dispatch(Message::ServerSync { session: pid(7) });
        assert!(matches!(
            result,
            Err(DispatchError::Session(SessionError::InvalidTransition { .. }))
        ));
        assert_eq!(fx.session.local_id(), None);
    }

    // =====================================================================
    // handle() / process()
    // =====================================================================

    #[test]
    fn test_handle_turns_protocol_error_into_violation() {
        let mut fx = Fixture::new();
        let n = fx.dispatcher().handle(Message::ServerSync { session: pid(7) });
        assert_eq!(
            n,
            Some(Notification::ProtocolViolation(
                ProtocolError::UnknownSubject(pid(7))
            ))
        );
    }

    #[test]
    fn test_handle_swallows_duplicate_join() {
        let mut fx = Fixture::new();
        fx.join(1, "Bob");
        let n = fx.dispatcher().handle(Message::ServerJoin {
            session: pid(1),
            name: "Bob".into(),
        });
        assert_eq!(n, None);
    }

    #[test]
    fn test_process_unknown_kind_then_next_buffer() {
        let mut fx = Fixture::new();
        let codec = BinaryCodec;

        let err = fx.dispatcher().process(&codec, &[0xff, 1, 2]).unwrap_err();
        assert_eq!(err, DecodeError::UnknownKind(0xff));

        let join = codec
            .encode(&Message::ServerJoin {
                session: pid(3),
                name: "Dave".into(),
            })
            .unwrap();
        let n = fx.dispatcher().process(&codec, &join).unwrap();
        assert_eq!(
            n,
            Processed::Handled(Some(Notification::PlayerJoined {
                id: pid(3),
                name: "Dave".into()
            }))
        );
    }

    #[test]
    fn test_process_splits_off_voice() {
        let mut fx = Fixture::new();
        fx.join(3, "Dave");
        let before = fx.registry.get(pid(3)).unwrap().clone();
        let codec = BinaryCodec;

        let speex = codec
            .encode(&Message::Speex {
                session: pid(3),
                seq: 12,
                packet: vec![1, 2, 3],
            })
            .unwrap();
        let out = fx.dispatcher().process(&codec, &speex).unwrap();
        assert_eq!(
            out,
            Processed::Voice(VoicePacket {
                session: pid(3),
                seq: 12,
                packet: vec![1, 2, 3],
            })
        );
        assert_eq!(fx.registry.get(pid(3)).unwrap(), &before);
    }

    // =====================================================================
    // Talking
    // =====================================================================

    #[test]
    fn test_talking_only_reported_on_change() {
        let mut fx = Fixture::new();
        fx.join(4, "Eve");

        let n = fx.dispatcher().set_talking(pid(4), true).unwrap();
        assert_eq!(n, Some(Notification::TalkingChanged { id: pid(4), talking: true }));
        assert_eq!(fx.dispatcher().set_talking(pid(4), true).unwrap(), None);
    }

    #[test]
    fn test_talking_for_unknown_player() {
        let mut fx = Fixture::new();
        let result = fx.dispatcher().set_talking(pid(4), true);
        assert_eq!(
            result,
            Err(DispatchError::Registry(RegistryError::NotFound(pid(4))))
        );
    }

    // =====================================================================
    // disconnect()
    // =====================================================================

    #[test]
    fn test_disconnect_reports_every_player_in_order() {
        let mut fx = Fixture::new();
        for id in [9, 2, 5, 7] {
            fx.join(id, &format!("p{id}"));
        }
        fx.dispatch(Message::ServerSync { session: pid(2) }).unwrap();

        let out = fx.dispatcher().disconnect(Some("server went away".into()));

        let left: Vec<PlayerId> = out
            .iter()
            .filter_map(|n| match n {
                Notification::PlayerLeft { id, .. } => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(left, vec![pid(2), pid(5), pid(7), pid(9)]);
        assert_eq!(
            out.last(),
            Some(&Notification::Disconnected {
                reason: Some("server went away".into())
            })
        );
        assert_eq!(out.len(), 5);
        assert!(fx.registry.is_empty());
        assert_eq!(fx.session.local_id(), None);
        assert_eq!(fx.session.phase(), ConnectionPhase::Disconnected);
    }

    #[test]
    fn test_disconnect_with_empty_roster() {
        let mut fx = Fixture::new();
        let out = fx.dispatcher().disconnect(None);
        assert_eq!(out, vec![Notification::Disconnected { reason: None }]);
    }
}
