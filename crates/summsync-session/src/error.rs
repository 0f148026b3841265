//! Error types for the session layer.

use summsync_protocol::ProtocolError;
use summsync_room::RoomError;

/// Errors a [`SyncChannel`](crate::SyncChannel) can return.
///
/// Delivery is best effort: a lost or unreadable message is healed by
/// the next tick broadcast, so only [`Closed`](Self::Closed) and
/// [`NotJoined`](Self::NotJoined) end a session.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// A message couldn't be delivered, or inbound messages were missed.
    #[error("delivery failed: {0}")]
    DeliveryFailure(String),

    /// The underlying connection or hub is gone.
    #[error("channel closed")]
    Closed,

    /// Publish or receive before `join`.
    #[error("channel has not joined a room")]
    NotJoined,

    /// An inbound frame that didn't decode or validate.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl ChannelError {
    /// `true` if the session should log the error and keep going.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::DeliveryFailure(_) | Self::Protocol(_))
    }
}

/// Errors returned to the owner of a [`SessionHandle`](crate::SessionHandle).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The action was rejected by the room, e.g. arming a running timer.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Joining the channel failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The session task has already shut down.
    #[error("session has ended")]
    Ended,
}
