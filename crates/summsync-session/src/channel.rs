//! The room-scoped pub/sub abstraction sessions talk through.
//!
//! A [`SyncChannel`] hides how messages travel (an in-process hub, a
//! WebSocket relay, or nowhere at all) behind four operations: join a
//! room, publish to everyone else in it, receive from them, and leave.
//!
//! Delivery is fire-and-forget with no ordering guarantee. The room
//! merge rule makes reordering and duplication harmless, and the next
//! tick broadcast repairs anything that was lost.

use std::future::Future;

use summsync_protocol::{Envelope, ParticipantId, RoomId, SyncMessage};

use crate::ChannelError;

// ---------------------------------------------------------------------------
// ChannelState
// ---------------------------------------------------------------------------

/// Where a participant is in the join handshake.
///
/// ```text
/// Disconnected ──(join)──→ Joining ──(first snapshot or timeout)──→ Joined
///       ↑                                                            │
///       └──────────────────────────(leave)───────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Disconnected,
    /// Subscribed, waiting for the room's current state.
    Joining,
    /// Up to date with the room and broadcasting ticks.
    Joined,
}

impl ChannelState {
    /// The state the normal flow moves to next.
    pub fn next(self) -> Self {
        match self {
            Self::Disconnected => Self::Joining,
            Self::Joining => Self::Joined,
            Self::Joined => Self::Disconnected,
        }
    }

    /// Returns `true` if moving to `target` is allowed. Leaving is
    /// allowed from any state.
    pub fn can_transition_to(self, target: Self) -> bool {
        target == Self::Disconnected || self.next() == target
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Joining => write!(f, "Joining"),
            Self::Joined => write!(f, "Joined"),
        }
    }
}

// ---------------------------------------------------------------------------
// SyncChannel
// ---------------------------------------------------------------------------

/// A connection to one room at a time.
///
/// Implementations stamp outgoing messages with the participant id given
/// to [`join`](Self::join) and a local sequence number, and never hand a
/// participant its own messages back.
///
/// The futures are `Send` so a session owning a channel can be spawned
/// onto the multi-threaded runtime.
pub trait SyncChannel: Send + 'static {
    /// Subscribes to `room_id` and announces the participant with a
    /// `join-room` message. Leaves any previously joined room first.
    fn join(
        &mut self,
        room_id: &RoomId,
        participant: &ParticipantId,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Sends `message` to every other participant in the room.
    ///
    /// # Errors
    /// [`ChannelError::NotJoined`] before `join`. A
    /// [`DeliveryFailure`](ChannelError::DeliveryFailure) may be logged
    /// and ignored.
    fn publish(
        &mut self,
        message: SyncMessage,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Waits for the next message from another participant.
    ///
    /// Returns `Ok(None)` once the channel is closed for good. Must be
    /// cancel-safe: it sits in a `tokio::select!` next to the ticker.
    fn recv(&mut self) -> impl Future<Output = Result<Option<Envelope>, ChannelError>> + Send;

    /// Announces `leave-room` and drops the subscription. Idempotent.
    fn leave(&mut self) -> impl Future<Output = Result<(), ChannelError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_state_next_follows_handshake() {
        assert_eq!(ChannelState::Disconnected.next(), ChannelState::Joining);
        assert_eq!(ChannelState::Joining.next(), ChannelState::Joined);
        assert_eq!(ChannelState::Joined.next(), ChannelState::Disconnected);
    }

    #[test]
    fn test_channel_state_can_transition_to() {
        assert!(ChannelState::Disconnected.can_transition_to(ChannelState::Joining));
        assert!(!ChannelState::Disconnected.can_transition_to(ChannelState::Joined));
        assert!(ChannelState::Joining.can_transition_to(ChannelState::Disconnected));
        assert!(!ChannelState::Joined.can_transition_to(ChannelState::Joining));
    }

    #[test]
    fn test_channel_state_display() {
        assert_eq!(ChannelState::Joining.to_string(), "Joining");
        assert_eq!(ChannelState::default(), ChannelState::Disconnected);
    }
}
