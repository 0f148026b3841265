//! An in-process [`SyncChannel`] backed by Tokio broadcast channels.
//!
//! Every room in a [`MemoryHub`] is one `broadcast::Sender<Envelope>`;
//! each joined [`MemoryChannel`] holds a receiver. Useful for tests and
//! for running several participants inside one process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use summsync_protocol::{Envelope, ParticipantId, RoomId, SyncMessage};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, Mutex};

use crate::{ChannelError, SyncChannel};

/// Per-room buffer. A receiver that falls further behind than this
/// misses messages and gets a [`ChannelError::DeliveryFailure`].
const DEFAULT_CAPACITY: usize = 256;

struct HubInner {
    rooms: Mutex<HashMap<RoomId, broadcast::Sender<Envelope>>>,
    capacity: usize,
    /// Messages still to be swallowed by [`MemoryHub::drop_next`].
    drop_budget: AtomicUsize,
}

/// A set of in-memory rooms. Cheap to clone; clones share the rooms.
#[derive(Clone)]
pub struct MemoryHub {
    inner: Arc<HubInner>,
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// A hub whose rooms buffer up to `capacity` messages per receiver.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                rooms: Mutex::new(HashMap::new()),
                capacity: capacity.max(1),
                drop_budget: AtomicUsize::new(0),
            }),
        }
    }

    /// A new, not yet joined channel on this hub.
    pub fn channel(&self) -> MemoryChannel {
        MemoryChannel {
            hub: self.clone(),
            membership: None,
        }
    }

    /// Silently discards the next `n` published messages, whoever sends
    /// them. Publishers still see success.
    pub fn drop_next(&self, n: usize) {
        self.inner.drop_budget.fetch_add(n, Ordering::SeqCst);
    }

    /// Number of rooms with at least one member.
    pub async fn room_count(&self) -> usize {
        self.inner.rooms.lock().await.len()
    }

    /// Closes a room for everyone in it. Their `recv` returns `Ok(None)`
    /// once buffered messages are drained.
    pub async fn close_room(&self, room_id: &RoomId) {
        if self.inner.rooms.lock().await.remove(room_id).is_some() {
            tracing::info!(room_id = %room_id, "memory room closed");
        }
    }

    fn take_drop(&self) -> bool {
        self.inner
            .drop_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

struct Membership {
    room_id: RoomId,
    participant: ParticipantId,
    seq: u64,
    receiver: broadcast::Receiver<Envelope>,
}

/// One participant's connection to a [`MemoryHub`].
pub struct MemoryChannel {
    hub: MemoryHub,
    membership: Option<Membership>,
}

impl MemoryChannel {
    async fn send(&mut self, message: SyncMessage) -> Result<(), ChannelError> {
        let Some(m) = self.membership.as_mut() else {
            return Err(ChannelError::NotJoined);
        };
        m.seq += 1;
        if self.hub.take_drop() {
            tracing::debug!(
                room_id = %m.room_id,
                seq = m.seq,
                kind = message.kind(),
                "dropping message in transit"
            );
            return Ok(());
        }

        let rooms = self.hub.inner.rooms.lock().await;
        let Some(sender) = rooms.get(&m.room_id) else {
            return Err(ChannelError::Closed);
        };
        // Fails only when nobody is subscribed, and we are.
        let _ = sender.send(Envelope::new(m.participant.clone(), m.seq, message));
        Ok(())
    }
}

impl SyncChannel for MemoryChannel {
    async fn join(
        &mut self,
        room_id: &RoomId,
        participant: &ParticipantId,
    ) -> Result<(), ChannelError> {
        self.leave().await?;

        let receiver = {
            let mut rooms = self.hub.inner.rooms.lock().await;
            rooms
                .entry(room_id.clone())
                .or_insert_with(|| {
                    tracing::info!(room_id = %room_id, "memory room created");
                    broadcast::channel(self.hub.inner.capacity).0
                })
                .subscribe()
        };
        self.membership = Some(Membership {
            room_id: room_id.clone(),
            participant: participant.clone(),
            seq: 0,
            receiver,
        });

        self.send(SyncMessage::JoinRoom {
            room_id: room_id.clone(),
        })
        .await
    }

    async fn publish(&mut self, message: SyncMessage) -> Result<(), ChannelError> {
        self.send(message).await
    }

    async fn recv(&mut self) -> Result<Option<Envelope>, ChannelError> {
        let Some(m) = self.membership.as_mut() else {
            return Err(ChannelError::NotJoined);
        };
        loop {
            match m.receiver.recv().await {
                Ok(envelope) if envelope.origin == m.participant => continue,
                Ok(envelope) => return Ok(Some(envelope)),
                Err(RecvError::Lagged(missed)) => {
                    return Err(ChannelError::DeliveryFailure(format!(
                        "missed {missed} messages"
                    )));
                }
                Err(RecvError::Closed) => return Ok(None),
            }
        }
    }

    async fn leave(&mut self) -> Result<(), ChannelError> {
        let Some(room_id) = self.membership.as_ref().map(|m| m.room_id.clone()) else {
            return Ok(());
        };
        if let Err(e) = self
            .send(SyncMessage::LeaveRoom {
                room_id: room_id.clone(),
            })
            .await
        {
            tracing::debug!(room_id = %room_id, error = %e, "leave announcement not sent");
        }
        // Drops our receiver before counting who's left.
        self.membership = None;
        remove_if_empty(&mut *self.hub.inner.rooms.lock().await, &room_id);
        Ok(())
    }
}

/// A channel dropped without `leave` still gives up its room. No
/// `leave-room` is announced, as with a dropped socket.
///
/// `Drop` is synchronous, so a contended hub is cleaned up on a spawned
/// task.
impl Drop for MemoryChannel {
    fn drop(&mut self) {
        let Some(Membership { room_id, receiver, .. }) = self.membership.take() else {
            return;
        };
        drop(receiver);
        if let Ok(mut rooms) = self.hub.inner.rooms.try_lock() {
            remove_if_empty(&mut rooms, &room_id);
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(room_id = %room_id, "no runtime to release memory room");
            return;
        };
        let hub = self.hub.clone();
        runtime.spawn(async move {
            remove_if_empty(&mut *hub.inner.rooms.lock().await, &room_id);
        });
    }
}

fn remove_if_empty(rooms: &mut HashMap<RoomId, broadcast::Sender<Envelope>>, room_id: &RoomId) {
    let empty = rooms
        .get(room_id)
        .is_some_and(|sender| sender.receiver_count() == 0);
    if empty {
        rooms.remove(room_id);
        tracing::info!(room_id = %room_id, "memory room destroyed");
    }
}
