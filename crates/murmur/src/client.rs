//! The async client runtime: builder, handle, and the client actor.
//!
//! Each client runs as one Tokio task that owns the [`Registry`] and the
//! [`SessionContext`]. Nothing else touches them. The outside world talks
//! to it through a [`ClientHandle`] (commands on an mpsc channel, replies
//! on oneshot channels) and listens on a [`NotificationReceiver`].
//!
//! ```text
//!  ClientHandle ──commands──┐
//!                           ▼
//!  reader task ──buffers──→ ClientActor ──notifications──→ presentation
//!       ▲                   │  (Registry, SessionContext)
//!       └─── Connection ◄───┘ writes
//! ```
//!
//! A reader task is spawned per connection. Everything it forwards is
//! tagged with the connection's epoch, so a buffer that arrives after a
//! disconnect or reconnect is dropped instead of being applied to the
//! wrong session.

use std::sync::Arc;

use murmur_protocol::{Codec, Message, PROTOCOL_VERSION, PlayerId};
use murmur_roster::{Player, PlayerFlags, PlayerHandle, Registry};
use murmur_session::{
    ConnectionPhase, LocalVoiceState, SessionConfig, SessionContext,
    SessionError, VoiceStateChange,
};
use murmur_transport::{Connection, Connector};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{
    ClientConfig, DispatchError, Dispatcher, MurmurError, Notification,
    Processed, ProtocolError, VoicePacket,
};

/// Where the presentation layer reads [`Notification`]s from.
pub type NotificationReceiver = mpsc::UnboundedReceiver<Notification>;

/// A point-in-time copy of the client's state.
///
/// Nothing in here is live. The players are copies taken when the status
/// was requested and do not disappear when the server later removes
/// someone; the registry is the only authority on who is present. Keep a
/// [`PlayerHandle`] (from [`Player::handle`]) rather than the copy, and
/// look it up with [`ClientHandle::resolve`] when it is needed again.
#[derive(Debug, Clone)]
pub struct ClientStatus {
    pub phase: ConnectionPhase,
    pub local_id: Option<PlayerId>,
    pub voice: LocalVoiceState,
    /// Outbound messages waiting for the session to come up.
    pub pending: usize,
    /// Every player known at the time of the call, ascending by id.
    pub players: Vec<Player>,
}

impl ClientStatus {
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id() == id)
    }

    /// Returns `true` if `id` is us.
    pub fn is_local(&self, id: PlayerId) -> bool {
        self.phase.is_connected() && self.local_id == Some(id)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring and starting a client.
///
/// # Example
///
/// ```rust,no_run
/// use murmur::prelude::*;
///
/// # async fn run() -> Result<(), MurmurError> {
/// let (client, mut notifications) = ClientBuilder::new()
///     .server_url("ws://voice.example.com:64738")
///     .credentials("alice", "hunter2")
///     .spawn(WebSocketConnector, BinaryCodec);
///
/// client.connect().await?;
/// while let Some(n) = notifications.recv().await {
///     println!("{n:?}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    config: ClientConfig,
    voice_sink: Option<mpsc::Sender<VoicePacket>>,
}

impl ClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            voice_sink: None,
        }
    }

    /// Replaces the whole configuration, e.g. one loaded from a file.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn server_url(mut self, url: &str) -> Self {
        self.config.server_url = url.to_string();
        self
    }

    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.config.username = username.to_string();
        self.config.password = password.to_string();
        self
    }

    pub fn self_mute(mut self, mute: bool) -> Self {
        self.config.self_mute = mute;
        self
    }

    pub fn self_deaf(mut self, deaf: bool) -> Self {
        self.config.self_deaf = deaf;
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs;
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    /// Where voice frames from other players go. Without a sink they are
    /// dropped. Frames are also dropped while the sink is full.
    pub fn voice_sink(mut self, sink: mpsc::Sender<VoicePacket>) -> Self {
        self.voice_sink = Some(sink);
        self
    }

    /// Spawns the client task.
    ///
    /// The client starts disconnected; call
    /// [`ClientHandle::connect`] to reach the server.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn spawn<T, C>(
        self,
        connector: T,
        codec: C,
    ) -> (ClientHandle, NotificationReceiver)
    where
        T: Connector,
        C: Codec,
    {
        let (command_tx, command_rx) =
            mpsc::channel(self.config.command_queue.max(1));
        let (inbound_tx, inbound_rx) =
            mpsc::channel(self.config.inbound_queue.max(1));
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();

        let session = SessionContext::with_voice(
            self.config.session.clone(),
            self.config.voice(),
        );

        let actor = ClientActor {
            config: self.config,
            connector,
            codec,
            registry: Registry::new(),
            session,
            connection: None,
            reader: None,
            epoch: 0,
            commands: command_rx,
            inbound_tx,
            inbound_rx,
            notifications: notify_tx,
            voice_sink: self.voice_sink,
        };

        tokio::spawn(actor.run());

        (ClientHandle { sender: command_tx }, notify_rx)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Commands sent to the client actor.
///
/// The `oneshot::Sender` in most variants is the reply channel.
enum Command {
    Connect {
        reply: oneshot::Sender<Result<(), MurmurError>>,
    },
    Disconnect {
        reason: Option<String>,
        reply: oneshot::Sender<()>,
    },
    Send {
        msg: Message,
        reply: oneshot::Sender<Result<(), MurmurError>>,
    },
    Request {
        request: Request,
        reply: oneshot::Sender<Result<(), MurmurError>>,
    },
    SetSelfMute {
        mute: bool,
        reply: oneshot::Sender<Result<VoiceStateChange, MurmurError>>,
    },
    SetSelfDeaf {
        deaf: bool,
        reply: oneshot::Sender<Result<VoiceStateChange, MurmurError>>,
    },
    ReportTalking {
        id: PlayerId,
        talking: bool,
    },
    Status {
        reply: oneshot::Sender<ClientStatus>,
    },
    Resolve {
        handle: PlayerHandle,
        reply: oneshot::Sender<Option<Player>>,
    },
    Shutdown,
}

/// A moderation action against another player.
enum Request {
    Mute { victim: PlayerId, mute: bool },
    Deaf { victim: PlayerId, deaf: bool },
    ToggleMute(PlayerId),
    ToggleDeaf(PlayerId),
    Kick { victim: PlayerId, reason: String },
}

/// Handle to a running client. Used to send commands to it.
///
/// This is cheap to clone; it's just an `mpsc::Sender` wrapper. Once
/// every handle is dropped the client disconnects and stops.
#[derive(Clone)]
pub struct ClientHandle {
    sender: mpsc::Sender<Command>,
}

impl ClientHandle {
    /// Creates a new builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    async fn call<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R, MurmurError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| MurmurError::ClientClosed)?;
        reply_rx.await.map_err(|_| MurmurError::ClientClosed)
    }

    async fn request(&self, request: Request) -> Result<(), MurmurError> {
        self.call(|reply| Command::Request { request, reply }).await?
    }

    /// Connects and authenticates.
    ///
    /// Returns once the credentials are sent. The session is up when a
    /// [`Notification::LocalIdentityEstablished`] arrives. A no-op if a
    /// connection already exists.
    ///
    /// # Errors
    /// [`MurmurError::Timeout`], [`MurmurError::Transport`], or
    /// [`MurmurError::Session`] when the stored voice state can't be
    /// queued. In every case the client is back to disconnected and a
    /// [`Notification::Disconnected`] was emitted.
    pub async fn connect(&self) -> Result<(), MurmurError> {
        self.call(|reply| Command::Connect { reply }).await?
    }

    /// Closes the connection and clears the roster.
    pub async fn disconnect(
        &self,
        reason: Option<String>,
    ) -> Result<(), MurmurError> {
        self.call(|reply| Command::Disconnect { reason, reply }).await
    }

    /// Sends a message as-is.
    ///
    /// Written immediately when connected, queued while connecting.
    ///
    /// # Errors
    /// [`SessionError::NotConnected`] when disconnected,
    /// [`SessionError::QueueFull`] if too much is already queued, or
    /// [`MurmurError::Transport`] if the write failed.
    pub async fn send(&self, msg: Message) -> Result<(), MurmurError> {
        self.call(|reply| Command::Send { msg, reply }).await?
    }

    /// Asks the server to (un)mute `victim`.
    pub async fn request_mute(
        &self,
        victim: PlayerId,
        mute: bool,
    ) -> Result<(), MurmurError> {
        self.request(Request::Mute { victim, mute }).await
    }

    /// Asks the server to (un)deafen `victim`.
    pub async fn request_deaf(
        &self,
        victim: PlayerId,
        deaf: bool,
    ) -> Result<(), MurmurError> {
        self.request(Request::Deaf { victim, deaf }).await
    }

    /// Asks for the opposite of `victim`'s current server mute.
    ///
    /// # Errors
    /// [`ProtocolError::UnknownVictim`] (wrapped) if `victim` isn't known.
    pub async fn toggle_mute(&self, victim: PlayerId) -> Result<(), MurmurError> {
        self.request(Request::ToggleMute(victim)).await
    }

    /// Asks for the opposite of `victim`'s current server deafen.
    pub async fn toggle_deaf(&self, victim: PlayerId) -> Result<(), MurmurError> {
        self.request(Request::ToggleDeaf(victim)).await
    }

    /// Asks the server to kick `victim`.
    pub async fn request_kick(
        &self,
        victim: PlayerId,
        reason: &str,
    ) -> Result<(), MurmurError> {
        self.request(Request::Kick {
            victim,
            reason: reason.to_string(),
        })
        .await
    }

    /// Changes our own mute. Un-muting while deafened also un-deafens.
    ///
    /// The preference is kept while disconnected and announced on the
    /// next connect.
    pub async fn set_self_mute(
        &self,
        mute: bool,
    ) -> Result<VoiceStateChange, MurmurError> {
        self.call(|reply| Command::SetSelfMute { mute, reply }).await?
    }

    /// Changes our own deafen. Deafening also mutes.
    pub async fn set_self_deaf(
        &self,
        deaf: bool,
    ) -> Result<VoiceStateChange, MurmurError> {
        self.call(|reply| Command::SetSelfDeaf { deaf, reply }).await?
    }

    /// Reports voice activity for a player (fire-and-forget).
    pub async fn report_talking(
        &self,
        id: PlayerId,
        talking: bool,
    ) -> Result<(), MurmurError> {
        self.sender
            .send(Command::ReportTalking { id, talking })
            .await
            .map_err(|_| MurmurError::ClientClosed)
    }

    pub async fn status(&self) -> Result<ClientStatus, MurmurError> {
        self.call(|reply| Command::Status { reply }).await
    }

    /// Looks a handle up in the live registry.
    ///
    /// Returns `None` once that player has left, or when the handle came
    /// from an earlier session, even if the same id has joined again.
    pub async fn resolve(
        &self,
        handle: PlayerHandle,
    ) -> Result<Option<Player>, MurmurError> {
        self.call(|reply| Command::Resolve { handle, reply }).await
    }

    /// Disconnects and stops the client task.
    pub async fn shutdown(&self) -> Result<(), MurmurError> {
        self.sender
            .send(Command::Shutdown)
            .await
            .map_err(|_| MurmurError::ClientClosed)
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// What a reader task forwards to the actor.
struct Inbound {
    epoch: u64,
    event: InboundEvent,
}

enum InboundEvent {
    Buffer(Vec<u8>),
    /// The connection ended. `None` for a clean close.
    Closed(Option<String>),
}

/// The internal client state. Runs inside a Tokio task.
struct ClientActor<T: Connector, C: Codec> {
    config: ClientConfig,
    connector: T,
    codec: C,
    registry: Registry,
    session: SessionContext,
    connection: Option<Arc<T::Connection>>,
    reader: Option<JoinHandle<()>>,
    /// Bumped on every connect and teardown.
    epoch: u64,
    commands: mpsc::Receiver<Command>,
    inbound_tx: mpsc::Sender<Inbound>,
    inbound_rx: mpsc::Receiver<Inbound>,
    notifications: mpsc::UnboundedSender<Notification>,
    voice_sink: Option<mpsc::Sender<VoicePacket>>,
}

impl<T: Connector, C: Codec> ClientActor<T, C> {
    /// Runs the actor loop until shutdown or until every handle is gone.
    async fn run(mut self) {
        tracing::info!("client task started");

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => self.on_command(cmd).await,
                },
                Some(inbound) = self.inbound_rx.recv() => {
                    self.on_inbound(inbound).await;
                }
            }
        }

        self.teardown(None).await;
        tracing::info!("client task stopped");
    }

    async fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect { reply } => {
                let result = self.connect().await;
                let _ = reply.send(result);
            }
            Command::Disconnect { reason, reply } => {
                self.teardown(reason).await;
                let _ = reply.send(());
            }
            Command::Send { msg, reply } => {
                let result = self.send(msg).await;
                let _ = reply.send(result);
            }
            Command::Request { request, reply } => {
                let result = match self.moderation_message(request) {
                    Ok(msg) => self.send(msg).await,
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            Command::SetSelfMute { mute, reply } => {
                let mut voice = self.session.voice();
                let change = voice.set_mute(mute);
                let result = self.commit_voice(voice).await.map(|()| change);
                let _ = reply.send(result);
            }
            Command::SetSelfDeaf { deaf, reply } => {
                let mut voice = self.session.voice();
                let change = voice.set_deaf(deaf);
                let result = self.commit_voice(voice).await.map(|()| change);
                let _ = reply.send(result);
            }
            Command::ReportTalking { id, talking } => {
                let result = Dispatcher::new(&mut self.registry, &mut self.session)
                    .set_talking(id, talking);
                match result {
                    Ok(Some(n)) => self.emit(n),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::debug!(player_id = %id, error = %e, "talking report ignored");
                    }
                }
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
            Command::Resolve { handle, reply } => {
                let _ = reply.send(self.registry.resolve(handle).cloned());
            }
            Command::Shutdown => {}
        }
    }

    async fn on_inbound(&mut self, inbound: Inbound) {
        if inbound.epoch != self.epoch {
            tracing::trace!(
                epoch = inbound.epoch,
                current = self.epoch,
                "dropping event from superseded connection"
            );
            return;
        }

        match inbound.event {
            InboundEvent::Buffer(bytes) => self.on_buffer(&bytes).await,
            InboundEvent::Closed(reason) => {
                tracing::info!(
                    reason = reason.as_deref().unwrap_or("closed by peer"),
                    "connection lost"
                );
                self.teardown(reason).await;
            }
        }
    }

    async fn on_buffer(&mut self, bytes: &[u8]) {
        let processed = Dispatcher::new(&mut self.registry, &mut self.session)
            .process(&self.codec, bytes);

        match processed {
            Ok(Processed::Voice(packet)) => self.forward_voice(packet),
            Ok(Processed::Handled(Some(n))) => {
                let established =
                    matches!(n, Notification::LocalIdentityEstablished { .. });
                self.emit(n);
                if established {
                    self.flush_pending().await;
                }
            }
            Ok(Processed::Handled(None)) => {}
            Err(e) => {
                tracing::debug!(error = %e, len = bytes.len(), "failed to decode buffer");
            }
        }
    }

    /// Disconnected → Connecting, then authenticate.
    async fn connect(&mut self) -> Result<(), MurmurError> {
        if !self.session.begin_connect() {
            return Ok(());
        }

        let timeout = self.config.connect_timeout();
        let url = self.config.server_url.clone();
        let conn = match tokio::time::timeout(timeout, self.connector.connect(&url)).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                tracing::warn!(%url, error = %e, "connect failed");
                self.teardown(Some(e.to_string())).await;
                return Err(e.into());
            }
            Err(_) => {
                tracing::warn!(%url, ?timeout, "connect timed out");
                self.teardown(Some("connect timed out".to_string())).await;
                return Err(MurmurError::Timeout(timeout));
            }
        };

        let conn = Arc::new(conn);
        self.epoch += 1;
        self.reader = Some(tokio::spawn(read_loop(
            Arc::clone(&conn),
            self.epoch,
            self.inbound_tx.clone(),
        )));
        tracing::info!(%url, conn_id = %conn.id(), "transport connected");
        self.connection = Some(conn);

        let auth = Message::ServerAuthenticate {
            version: PROTOCOL_VERSION,
            username: self.config.username.clone(),
            password: self.config.password.clone(),
        };
        if let Err(e) = self.write(&auth).await {
            self.teardown(Some(e.to_string())).await;
            return Err(e);
        }

        let voice = self.session.voice();
        if !voice.is_default() {
            if let Err(e) = self.announce_voice(voice).await {
                self.teardown(Some(e.to_string())).await;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Drops the connection and clears the session. A no-op when already
    /// disconnected.
    async fn teardown(&mut self, reason: Option<String>) {
        if !self.session.phase().is_active() && self.connection.is_none() {
            return;
        }

        self.epoch += 1;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(conn) = self.connection.take() {
            if let Err(e) = conn.close().await {
                tracing::debug!(error = %e, "close failed");
            }
        }

        let notifications = Dispatcher::new(&mut self.registry, &mut self.session)
            .disconnect(reason);
        for n in notifications {
            self.emit(n);
        }
    }

    /// Writes now when connected, queues while connecting.
    async fn send(&mut self, msg: Message) -> Result<(), MurmurError> {
        match self.session.phase() {
            ConnectionPhase::Connected => self.write(&msg).await,
            ConnectionPhase::Connecting => Ok(self.session.queue(msg)?),
            ConnectionPhase::Disconnected => Err(SessionError::NotConnected.into()),
        }
    }

    async fn write(&self, msg: &Message) -> Result<(), MurmurError> {
        let conn = self
            .connection
            .as_ref()
            .map(Arc::clone)
            .ok_or(SessionError::NotConnected)?;
        let bytes = self.codec.encode(msg)?;
        conn.send(&bytes).await?;
        Ok(())
    }

    async fn flush_pending(&mut self) {
        for msg in self.session.drain_pending() {
            if let Err(e) = self.write(&msg).await {
                tracing::warn!(kind = %msg.kind(), error = %e, "failed to flush pending message");
                break;
            }
        }
    }

    /// Tells the server about `voice`. Nothing is sent while
    /// disconnected.
    async fn announce_voice(&mut self, voice: LocalVoiceState) -> Result<(), MurmurError> {
        if !self.session.phase().is_active() {
            return Ok(());
        }
        let msg = Message::PlayerSelfMuteDeaf {
            session: self.session.local_id().unwrap_or_default(),
            mute: voice.mute(),
            deaf: voice.deaf(),
        };
        self.send(msg).await
    }

    /// Announces `voice` and only then adopts it. A failed announce leaves
    /// the stored preference as it was.
    async fn commit_voice(&mut self, voice: LocalVoiceState) -> Result<(), MurmurError> {
        self.announce_voice(voice).await?;
        self.session.set_voice(voice);
        Ok(())
    }

    fn moderation_message(&self, request: Request) -> Result<Message, MurmurError> {
        let session = self.session.local_id().unwrap_or_default();
        let msg = match request {
            Request::Mute { victim, mute } => Message::PlayerMute {
                session,
                victim,
                mute,
            },
            Request::Deaf { victim, deaf } => Message::PlayerDeaf {
                session,
                victim,
                deaf,
            },
            Request::ToggleMute(victim) => Message::PlayerMute {
                session,
                victim,
                mute: !self.victim_flags(victim)?.mute,
            },
            Request::ToggleDeaf(victim) => Message::PlayerDeaf {
                session,
                victim,
                deaf: !self.victim_flags(victim)?.deaf,
            },
            Request::Kick { victim, reason } => Message::PlayerKick {
                session,
                victim,
                reason,
            },
        };
        Ok(msg)
    }

    fn victim_flags(&self, victim: PlayerId) -> Result<PlayerFlags, MurmurError> {
        self.registry
            .get(victim)
            .map(Player::flags)
            .ok_or_else(|| DispatchError::from(ProtocolError::UnknownVictim(victim)).into())
    }

    fn forward_voice(&self, packet: VoicePacket) {
        let Some(sink) = &self.voice_sink else {
            return;
        };
        if self.session.voice().deaf() {
            return;
        }
        if !self.registry.contains(packet.session) {
            tracing::debug!(player_id = %packet.session, "voice from unknown player dropped");
            return;
        }
        match sink.try_send(packet) {
            Ok(()) => {}
            Err(TrySendError::Full(p)) => {
                tracing::trace!(player_id = %p.session, seq = p.seq, "voice sink full, frame dropped");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::trace!("voice sink closed");
            }
        }
    }

    fn status(&self) -> ClientStatus {
        let mut players: Vec<Player> = self.registry.iter().cloned().collect();
        players.sort_by_key(Player::id);
        ClientStatus {
            phase: self.session.phase(),
            local_id: self.session.local_id(),
            voice: self.session.voice(),
            pending: self.session.pending_len(),
            players,
        }
    }

    fn emit(&self, notification: Notification) {
        if self.notifications.send(notification).is_err() {
            tracing::trace!("notification receiver dropped");
        }
    }
}

/// Forwards every buffer from one connection until it ends.
async fn read_loop<N: Connection>(
    conn: Arc<N>,
    epoch: u64,
    tx: mpsc::Sender<Inbound>,
) {
    loop {
        let event = match conn.recv().await {
            Ok(Some(bytes)) => InboundEvent::Buffer(bytes),
            Ok(None) => InboundEvent::Closed(None),
            Err(e) => InboundEvent::Closed(Some(e.to_string())),
        };
        let closed = matches!(event, InboundEvent::Closed(_));
        if tx.send(Inbound { epoch, event }).await.is_err() || closed {
            break;
        }
    }
    tracing::debug!(epoch, conn_id = %conn.id(), "reader stopped");
}
