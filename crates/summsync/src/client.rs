//! A [`SyncChannel`] that talks to a relay over WebSocket.
//!
//! Writes go through a queue drained by a writer task, so a publish
//! never waits on the socket. A slow relay fills the queue and further
//! publishes fail as [`ChannelError::DeliveryFailure`] until it drains.

use std::sync::Arc;

use summsync_protocol::{
    decode_envelope, Codec, Envelope, JsonCodec, ParticipantId, RoomId, SyncMessage,
};
use summsync_session::{ChannelError, SyncChannel};
use summsync_transport::{connect, ClientConnection, Connection, TransportError};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Frames queued for the writer task.
const OUTBOUND_BUFFER: usize = 64;

struct Membership {
    room_id: RoomId,
    participant: ParticipantId,
    seq: u64,
}

/// One participant's connection to a [`RelayServer`](crate::RelayServer).
///
/// ```rust,no_run
/// use summsync::prelude::*;
///
/// # async fn run() -> Result<(), SummsyncError> {
/// let channel = WebSocketChannel::connect("ws://127.0.0.1:8080").await?;
/// let session = RoomSession::join(channel, RoomId::new("482913"), SessionConfig::default()).await?;
/// session.dispatch(Role::Mid, Action::Arm).await?;
/// # Ok(())
/// # }
/// ```
pub struct WebSocketChannel {
    conn: Arc<ClientConnection>,
    outbound: mpsc::Sender<Vec<u8>>,
    codec: JsonCodec,
    membership: Option<Membership>,
}

impl WebSocketChannel {
    /// Dials a relay such as `ws://127.0.0.1:8080`. The channel joins no
    /// room until [`SyncChannel::join`] is called.
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let conn = Arc::new(connect(url).await?);
        let (outbound, frames) = mpsc::channel(OUTBOUND_BUFFER);
        tokio::spawn(write_frames(Arc::clone(&conn), frames));
        Ok(Self {
            conn,
            outbound,
            codec: JsonCodec,
            membership: None,
        })
    }

    fn send(&mut self, message: SyncMessage) -> Result<(), ChannelError> {
        let Some(m) = self.membership.as_mut() else {
            return Err(ChannelError::NotJoined);
        };
        m.seq += 1;
        let envelope = Envelope::new(m.participant.clone(), m.seq, message);
        let bytes = self.codec.encode(&envelope)?;
        self.outbound.try_send(bytes).map_err(|e| match e {
            TrySendError::Full(_) => ChannelError::DeliveryFailure("outbound queue full".into()),
            TrySendError::Closed(_) => ChannelError::Closed,
        })
    }
}

/// Writes queued frames until the channel is dropped or the socket fails.
/// Frames already queued when the channel is dropped, such as a final
/// `leave-room`, are still written.
async fn write_frames(conn: Arc<ClientConnection>, mut frames: mpsc::Receiver<Vec<u8>>) {
    while let Some(frame) = frames.recv().await {
        if let Err(e) = conn.send(&frame).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "relay write failed");
            break;
        }
    }
}

impl SyncChannel for WebSocketChannel {
    async fn join(
        &mut self,
        room_id: &RoomId,
        participant: &ParticipantId,
    ) -> Result<(), ChannelError> {
        self.leave().await?;
        self.membership = Some(Membership {
            room_id: room_id.clone(),
            participant: participant.clone(),
            seq: 0,
        });
        tracing::debug!(room_id = %room_id, %participant, conn_id = %self.conn.id(), "joining via relay");
        self.send(SyncMessage::JoinRoom {
            room_id: room_id.clone(),
        })
    }

    async fn publish(&mut self, message: SyncMessage) -> Result<(), ChannelError> {
        self.send(message)
    }

    async fn recv(&mut self) -> Result<Option<Envelope>, ChannelError> {
        let Some(me) = self.membership.as_ref().map(|m| m.participant.clone()) else {
            return Err(ChannelError::NotJoined);
        };
        loop {
            let data = match self.conn.recv().await {
                Ok(Some(data)) => data,
                Ok(None) => return Ok(None),
                Err(e) => {
                    tracing::debug!(error = %e, "relay connection lost");
                    return Err(ChannelError::Closed);
                }
            };
            let envelope = decode_envelope(&self.codec, &data)?;
            if envelope.origin != me {
                return Ok(Some(envelope));
            }
        }
    }

    async fn leave(&mut self) -> Result<(), ChannelError> {
        let Some(room_id) = self.membership.as_ref().map(|m| m.room_id.clone()) else {
            return Ok(());
        };
        if let Err(e) = self.send(SyncMessage::LeaveRoom { room_id: room_id.clone() }) {
            tracing::debug!(room_id = %room_id, error = %e, "leave announcement not sent");
        }
        self.membership = None;
        Ok(())
    }
}
