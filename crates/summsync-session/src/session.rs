//! The participant session: one Tokio task per joined room.
//!
//! The task owns the [`RoomState`], the [`LocalTicker`], and the
//! [`SyncChannel`], and multiplexes four event sources with
//! `tokio::select!`:
//!
//! ```text
//!             ┌──────────── RoomSession task ────────────┐
//!  ticker ───→│ tick → fire → publish (once Joined)      │
//!  channel ──→│ snapshot → merge · request → answer      │───→ channel
//!  handle ───→│ dispatch → broadcast · leave → teardown  │
//!  deadline ─→│ nobody answered → Joined as authority    │
//!             └──────────────────────────────────────────┘
//! ```
//!
//! Nothing else touches the room state, so no locking is needed. The
//! outside world gets a [`SessionHandle`]: commands go in over an mpsc
//! channel, snapshots come out over a `watch` channel.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use summsync_protocol::{Envelope, ParticipantId, RoomId, SyncMessage};
use summsync_room::{Action, LocalTicker, Role, RoomError, RoomState, Snapshot};
use summsync_tick::{TickConfig, TickInfo};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::{ChannelError, ChannelState, SessionBootstrap, SessionError, SyncChannel};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Settings for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Who this participant is. Defaults to a fresh random id.
    pub participant: ParticipantId,
    /// Ticker settings. One-second interval by default.
    pub tick: TickConfig,
    /// How long to wait for the room's state after joining before
    /// assuming nobody else is there. Default: 1.5 s.
    pub join_timeout: Duration,
    /// Capacity of the handle → session command queue. Default: 32.
    pub command_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            participant: generate_participant_id(),
            tick: TickConfig::default(),
            join_timeout: Duration::from_millis(1500),
            command_buffer: 32,
        }
    }
}

/// A random 32-character hex participant id.
pub fn generate_participant_id() -> ParticipantId {
    let bytes: [u8; 16] = rand::rng().random();
    ParticipantId::new(bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

enum SessionCommand {
    Dispatch {
        role: Role,
        action: Action,
        reply: oneshot::Sender<Result<Snapshot, RoomError>>,
    },
    Leave {
        reply: oneshot::Sender<()>,
    },
}

/// The UI-facing side of a running session. Cheap to clone.
///
/// The session shuts down (and leaves the room) when [`leave`](Self::leave)
/// is called or when the last handle is dropped.
#[derive(Clone)]
pub struct SessionHandle {
    room_id: RoomId,
    participant: ParticipantId,
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<Snapshot>,
    status: watch::Receiver<ChannelState>,
}

impl SessionHandle {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }

    /// Applies a user action and returns the resulting snapshot. The
    /// session broadcasts it to the room.
    ///
    /// # Errors
    /// [`SessionError::Room`] if the action is rejected (nothing is
    /// broadcast), [`SessionError::Ended`] if the session is gone.
    pub async fn dispatch(&self, role: Role, action: Action) -> Result<Snapshot, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Dispatch {
                role,
                action,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SessionError::Ended)?;
        Ok(reply_rx.await.map_err(|_| SessionError::Ended)??)
    }

    /// The latest snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver that sees every snapshot change: local actions, ticks,
    /// and merges.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    pub fn status(&self) -> ChannelState {
        *self.status.borrow()
    }

    /// Waits until the join handshake has completed.
    pub async fn joined(&self) -> Result<(), SessionError> {
        let mut status = self.status.clone();
        status
            .wait_for(|s| *s == ChannelState::Joined)
            .await
            .map(|_| ())
            .map_err(|_| SessionError::Ended)
    }

    /// `true` while the session task is running.
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Leaves the room and waits for the session to finish tearing down.
    pub async fn leave(&self) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Leave { reply: reply_tx })
            .await
            .map_err(|_| SessionError::Ended)?;
        reply_rx.await.map_err(|_| SessionError::Ended)
    }
}

// ---------------------------------------------------------------------------
// RoomSession
// ---------------------------------------------------------------------------

/// The session actor. Only reachable through [`RoomSession::join`] and
/// the [`SessionHandle`] it returns.
pub struct RoomSession<C> {
    room: RoomState,
    channel: C,
    ticker: LocalTicker,
    bootstrap: SessionBootstrap,
    commands: mpsc::Receiver<SessionCommand>,
    snapshots: Arc<watch::Sender<Snapshot>>,
    status: watch::Sender<ChannelState>,
    join_timeout: Duration,
    join_deadline: Option<Instant>,
}

impl<C: SyncChannel> RoomSession<C> {
    /// Joins `room_id` over `channel`, requests the room's state, and
    /// spawns the session task.
    ///
    /// # Errors
    /// [`SessionError::Channel`] if the channel can't join. No task is
    /// spawned in that case.
    pub async fn join(
        mut channel: C,
        room_id: RoomId,
        config: SessionConfig,
    ) -> Result<SessionHandle, SessionError> {
        let participant = config.participant;
        channel.join(&room_id, &participant).await?;

        let room = RoomState::new(room_id.clone(), participant.clone());
        let (snapshot_tx, snapshot_rx) = watch::channel(room.snapshot());
        let snapshots = Arc::new(snapshot_tx);
        let (status_tx, status_rx) = watch::channel(ChannelState::Disconnected);
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));

        let mut ticker = LocalTicker::new(config.tick);
        let on_tick = Arc::clone(&snapshots);
        ticker.subscribe(move |snapshot| {
            on_tick.send_replace(snapshot.clone());
        });

        let mut session = Self {
            room,
            channel,
            ticker,
            bootstrap: SessionBootstrap::new(),
            commands: command_rx,
            snapshots,
            status: status_tx,
            join_timeout: config.join_timeout,
            join_deadline: None,
        };
        session.begin_join().await;
        tokio::spawn(session.run());

        Ok(SessionHandle {
            room_id,
            participant,
            commands: command_tx,
            snapshots: snapshot_rx,
            status: status_rx,
        })
    }

    async fn begin_join(&mut self) {
        self.bootstrap.begin_join();
        self.status.send_replace(ChannelState::Joining);
        self.join_deadline = Some(Instant::now() + self.join_timeout);
        info!(
            room_id = %self.room.room_id(),
            participant = %self.room.participant(),
            "joining room"
        );

        let request = SyncMessage::RequestState {
            room_id: self.room.room_id().clone(),
        };
        if let Err(e) = self.channel.publish(request).await {
            // The join deadline still completes the handshake.
            warn!(room_id = %self.room.room_id(), error = %e, "state request not sent");
        }
    }

    async fn run(mut self) {
        let leave_reply = self.event_loop().await;
        self.teardown().await;
        if let Some(reply) = leave_reply {
            let _ = reply.send(());
        }
    }

    /// Runs until asked to leave, every handle is gone, or the channel
    /// fails. Returns the reply for an explicit leave.
    async fn event_loop(&mut self) -> Option<oneshot::Sender<()>> {
        loop {
            let result = tokio::select! {
                info = self.ticker.wait() => self.on_tick(info).await,

                inbound = self.channel.recv() => match inbound {
                    Ok(Some(envelope)) => self.on_envelope(envelope).await,
                    Ok(None) => Err(ChannelError::Closed),
                    Err(e) => Err(e),
                },

                command = self.commands.recv() => match command {
                    Some(SessionCommand::Dispatch { role, action, reply }) => {
                        self.on_dispatch(role, action, reply).await
                    }
                    Some(SessionCommand::Leave { reply }) => return Some(reply),
                    None => {
                        debug!(room_id = %self.room.room_id(), "all session handles dropped");
                        return None;
                    }
                },

                () = until(self.join_deadline) => {
                    self.on_join_deadline();
                    Ok(())
                }
            };

            match result {
                Ok(()) => {}
                Err(e) if e.is_recoverable() => {
                    warn!(room_id = %self.room.room_id(), error = %e, "channel error, continuing");
                }
                Err(e) => {
                    warn!(room_id = %self.room.room_id(), error = %e, "channel lost, leaving room");
                    return None;
                }
            }
        }
    }

    async fn teardown(&mut self) {
        if let Err(e) = self.channel.leave().await {
            warn!(room_id = %self.room.room_id(), error = %e, "leave failed");
        }
        self.bootstrap.reset();
        self.join_deadline = None;
        self.status.send_replace(ChannelState::Disconnected);
        info!(
            room_id = %self.room.room_id(),
            participant = %self.room.participant(),
            ticks = self.ticker.tick_count(),
            "left room"
        );
    }

    // -- handlers -----------------------------------------------------------

    async fn on_tick(&mut self, info: TickInfo) -> Result<(), ChannelError> {
        let snapshot = self.ticker.fire(&mut self.room, &info);
        if !self.bootstrap.broadcasts_ticks() {
            return Ok(());
        }
        self.broadcast(snapshot).await
    }

    async fn on_dispatch(
        &mut self,
        role: Role,
        action: Action,
        reply: oneshot::Sender<Result<Snapshot, RoomError>>,
    ) -> Result<(), ChannelError> {
        match self.room.dispatch(role, action) {
            Ok(snapshot) => {
                self.snapshots.send_replace(snapshot.clone());
                let _ = reply.send(Ok(snapshot.clone()));
                self.broadcast(snapshot).await
            }
            Err(e) => {
                warn!(room_id = %self.room.room_id(), %role, error = %e, "action rejected");
                let _ = reply.send(Err(e));
                Ok(())
            }
        }
    }

    async fn on_envelope(&mut self, envelope: Envelope) -> Result<(), ChannelError> {
        let Envelope {
            origin,
            seq,
            payload,
            ..
        } = envelope;
        debug!(
            room_id = %self.room.room_id(),
            %origin,
            seq,
            kind = payload.kind(),
            "inbound message"
        );

        match payload {
            SyncMessage::StateSnapshot {
                room_id,
                counter,
                entities,
            } => {
                match self.room.merge_wire(&origin, &room_id, counter, &entities) {
                    Ok(report) if report.changed() => {
                        self.snapshots.send_replace(self.room.snapshot());
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(room_id = %self.room.room_id(), %origin, error = %e, "snapshot ignored");
                        return Ok(());
                    }
                }
                if self.bootstrap.on_snapshot() {
                    self.mark_joined("room state received");
                }
                Ok(())
            }
            SyncMessage::RequestState { room_id } if &room_id == self.room.room_id() => {
                let current = self.room.snapshot();
                if !self.bootstrap.should_answer(&origin, &current) {
                    return Ok(());
                }
                debug!(room_id = %room_id, requester = %origin, "answering state request");
                let snapshot = self.room.broadcast_snapshot();
                self.broadcast(snapshot).await
            }
            SyncMessage::RequestState { room_id } => {
                debug!(room_id = %room_id, "state request for another room");
                Ok(())
            }
            SyncMessage::JoinRoom { room_id } => {
                info!(room_id = %room_id, peer = %origin, "peer joined");
                Ok(())
            }
            SyncMessage::LeaveRoom { room_id } => {
                info!(room_id = %room_id, peer = %origin, "peer left");
                Ok(())
            }
            SyncMessage::Error { code, message } => {
                warn!(room_id = %self.room.room_id(), code, %message, "relay reported an error");
                Ok(())
            }
        }
    }

    fn on_join_deadline(&mut self) {
        self.join_deadline = None;
        if self.bootstrap.on_deadline() {
            self.mark_joined("no peer answered, local state is authoritative");
        }
    }

    fn mark_joined(&mut self, reason: &'static str) {
        self.join_deadline = None;
        self.status.send_replace(ChannelState::Joined);
        info!(
            room_id = %self.room.room_id(),
            participant = %self.room.participant(),
            reason,
            "joined room"
        );
    }

    async fn broadcast(&mut self, snapshot: Snapshot) -> Result<(), ChannelError> {
        self.bootstrap.record_broadcast(&snapshot);
        self.channel.publish(snapshot.to_message()).await
    }
}

/// Sleeps until `deadline`, or forever when there is none.
async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
