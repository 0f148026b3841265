//! Which connections are in which room.
//!
//! A room exists while it has members: the first `join-room` for a room
//! id creates it and the last member leaving removes it. The relay never
//! looks inside snapshots, so a room is nothing but its member list.

use std::collections::HashMap;
use std::sync::Arc;

use summsync_protocol::{ParticipantId, RoomId};
use summsync_transport::ConnectionId;
use tokio::sync::mpsc::{self, error::TrySendError};

/// An encoded frame shared by every recipient of a fan-out.
pub(crate) type Frame = Arc<[u8]>;

struct Member {
    participant: ParticipantId,
    outbound: mpsc::Sender<Frame>,
}

#[derive(Default)]
pub(crate) struct Registry {
    rooms: HashMap<RoomId, HashMap<ConnectionId, Member>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a connection to a room, creating the room if needed.
    pub(crate) fn join(
        &mut self,
        room_id: &RoomId,
        conn_id: ConnectionId,
        participant: ParticipantId,
        outbound: mpsc::Sender<Frame>,
    ) {
        let members = self.rooms.entry(room_id.clone()).or_insert_with(|| {
            tracing::info!(room_id = %room_id, "room created");
            HashMap::new()
        });
        tracing::info!(room_id = %room_id, %participant, %conn_id, "participant joined");
        members.insert(
            conn_id,
            Member {
                participant,
                outbound,
            },
        );
    }

    /// Removes a connection from a room, destroying the room when it
    /// empties. Returns `false` if the connection wasn't in it.
    pub(crate) fn leave(&mut self, room_id: &RoomId, conn_id: ConnectionId) -> bool {
        let Some(members) = self.rooms.get_mut(room_id) else {
            return false;
        };
        let Some(member) = members.remove(&conn_id) else {
            return false;
        };
        tracing::info!(
            room_id = %room_id,
            participant = %member.participant,
            %conn_id,
            "participant left"
        );
        if members.is_empty() {
            self.rooms.remove(room_id);
            tracing::info!(room_id = %room_id, "room destroyed");
        }
        true
    }

    /// Queues `frame` for every member of `room_id` except `from`.
    ///
    /// Never waits: a member whose queue is full misses this frame and
    /// catches up from a later snapshot. Returns how many members the
    /// frame was queued for.
    pub(crate) fn fan_out(&self, room_id: &RoomId, from: ConnectionId, frame: &Frame) -> usize {
        let Some(members) = self.rooms.get(room_id) else {
            return 0;
        };
        let mut delivered = 0;
        for (conn_id, member) in members.iter().filter(|(id, _)| **id != from) {
            match member.outbound.try_send(Arc::clone(frame)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        room_id = %room_id,
                        participant = %member.participant,
                        %conn_id,
                        "outbound queue full, dropping frame"
                    );
                }
                // The member's handler is shutting down and will leave.
                Err(TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    pub(crate) fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub(crate) fn member_count(&self, room_id: &RoomId) -> usize {
        self.rooms.get(room_id).map_or(0, HashMap::len)
    }
}
