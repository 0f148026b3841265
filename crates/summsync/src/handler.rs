//! Per-connection handler: room membership and forwarding.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The loop waits on three things at once:
//!   1. frames from the socket → decode, track joins, forward to the room
//!   2. frames other members forwarded to us → write to the socket
//!   3. the idle deadline → drop a connection that went quiet
//!
//! Frames are forwarded as the original bytes. The relay decodes them
//! only to learn the room and the message kind.

use std::sync::Arc;

use summsync_protocol::{
    decode_envelope, Codec, Envelope, ParticipantId, RoomId, SyncMessage,
};
use summsync_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use crate::registry::Frame;
use crate::server::RelayState;
use crate::SummsyncError;

/// Origin stamped on envelopes the relay writes itself.
const RELAY_ORIGIN: &str = "relay";

struct Membership {
    room_id: RoomId,
    participant: ParticipantId,
}

/// Tracks the connection's room and removes it from the registry when
/// the handler exits, however it exits.
///
/// `Drop` is synchronous, so the final leave runs on a spawned task.
struct MembershipGuard {
    conn_id: ConnectionId,
    state: Arc<RelayState>,
    current: Option<Membership>,
}

impl MembershipGuard {
    fn new(conn_id: ConnectionId, state: Arc<RelayState>) -> Self {
        Self {
            conn_id,
            state,
            current: None,
        }
    }

    fn current(&self) -> Option<&Membership> {
        self.current.as_ref()
    }

    /// Moves the connection into `room_id`, leaving any other room first.
    async fn join(
        &mut self,
        room_id: &RoomId,
        participant: &ParticipantId,
        outbound: mpsc::Sender<Frame>,
    ) {
        if self
            .current
            .as_ref()
            .is_some_and(|m| m.room_id == *room_id && m.participant == *participant)
        {
            return;
        }
        let mut registry = self.state.registry.lock().await;
        if let Some(old) = self.current.take() {
            registry.leave(&old.room_id, self.conn_id);
        }
        registry.join(room_id, self.conn_id, participant.clone(), outbound);
        self.current = Some(Membership {
            room_id: room_id.clone(),
            participant: participant.clone(),
        });
    }

    async fn leave(&mut self) {
        if let Some(old) = self.current.take() {
            self.state
                .registry
                .lock()
                .await
                .leave(&old.room_id, self.conn_id);
        }
    }
}

impl Drop for MembershipGuard {
    fn drop(&mut self) {
        let Some(old) = self.current.take() else {
            return;
        };
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.registry.lock().await.leave(&old.room_id, conn_id);
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<RelayState>,
) -> Result<(), SummsyncError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Frame>(state.outbound_buffer);
    let mut guard = MembershipGuard::new(conn_id, Arc::clone(&state));
    let mut seq: u64 = 0;

    let idle = time::sleep(state.idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            inbound = conn.recv() => {
                let data = match inbound {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%conn_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                };
                idle.as_mut().reset(Instant::now() + state.idle_timeout);
                handle_frame(&conn, &state, &mut guard, &outbound_tx, data, &mut seq).await?;
            }
            Some(frame) = outbound_rx.recv() => {
                conn.send(&frame).await?;
            }
            () = &mut idle => {
                tracing::info!(%conn_id, "connection timed out");
                break;
            }
        }
    }

    // Leave now rather than on a spawned task so the room is gone by the
    // time this returns. The guard covers the error paths.
    guard.leave().await;
    Ok(())
}

/// Decodes one inbound frame and acts on it.
async fn handle_frame(
    conn: &WebSocketConnection,
    state: &RelayState,
    guard: &mut MembershipGuard,
    outbound: &mpsc::Sender<Frame>,
    data: Vec<u8>,
    seq: &mut u64,
) -> Result<(), SummsyncError> {
    let conn_id = conn.id();
    let envelope = match decode_envelope(&state.codec, &data) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!(%conn_id, error = %e, "rejecting undecodable frame");
            return send_error(conn, state, 400, &format!("invalid envelope: {e}"), seq).await;
        }
    };
    let frame: Frame = Arc::from(data);
    let origin = &envelope.origin;

    match &envelope.payload {
        SyncMessage::JoinRoom { room_id } => {
            guard.join(room_id, origin, outbound.clone()).await;
            forward(state, room_id, conn_id, &envelope, &frame).await;
        }

        SyncMessage::LeaveRoom { room_id } => match guard.current() {
            Some(m) if m.room_id == *room_id && m.participant != *origin => {
                return send_error(conn, state, 409, &origin_mismatch(origin, m), seq).await;
            }
            Some(m) if m.room_id == *room_id => {
                forward(state, room_id, conn_id, &envelope, &frame).await;
                guard.leave().await;
            }
            _ => {
                tracing::debug!(%conn_id, room_id = %room_id, "leave for a room not joined");
            }
        },

        SyncMessage::StateSnapshot { room_id, .. } | SyncMessage::RequestState { room_id } => {
            match guard.current() {
                None => {
                    return send_error(conn, state, 400, "join a room first", seq).await;
                }
                Some(m) if m.room_id != *room_id => {
                    tracing::debug!(
                        %conn_id,
                        joined = %m.room_id,
                        addressed = %room_id,
                        "dropping message for another room"
                    );
                }
                Some(m) if m.participant != *origin => {
                    return send_error(conn, state, 409, &origin_mismatch(origin, m), seq).await;
                }
                Some(_) => forward(state, room_id, conn_id, &envelope, &frame).await,
            }
        }

        SyncMessage::Error { code, message } => {
            tracing::debug!(%conn_id, code, %message, "ignoring error sent to the relay");
        }
    }

    Ok(())
}

async fn forward(
    state: &RelayState,
    room_id: &RoomId,
    from: ConnectionId,
    envelope: &Envelope,
    frame: &Frame,
) {
    let delivered = state.registry.lock().await.fan_out(room_id, from, frame);
    tracing::debug!(
        room_id = %room_id,
        origin = %envelope.origin,
        seq = envelope.seq,
        kind = envelope.payload.kind(),
        delivered,
        "forwarded"
    );
}

fn origin_mismatch(origin: &ParticipantId, joined: &Membership) -> String {
    format!("origin {origin} does not match joined participant {}", joined.participant)
}

/// Sends a `SyncMessage::Error` envelope back to the client.
async fn send_error(
    conn: &WebSocketConnection,
    state: &RelayState,
    code: u16,
    message: &str,
    seq: &mut u64,
) -> Result<(), SummsyncError> {
    *seq += 1;
    let envelope = Envelope::new(
        ParticipantId::new(RELAY_ORIGIN),
        *seq,
        SyncMessage::Error {
            code,
            message: message.to_string(),
        },
    );
    let bytes = state.codec.encode(&envelope)?;
    conn.send(&bytes).await?;
    Ok(())
}
