//! Error types for the room layer.

use summsync_protocol::RoomId;

use crate::Role;

/// Errors that can occur while mutating or merging room state.
///
/// None of these is fatal. `InvalidTransition` leaves the state
/// untouched and is meant to be shown to the user. The other two are
/// logged and the offending input dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The requested action isn't legal from the entity's current state,
    /// e.g. arming a timer that is already running.
    #[error("invalid transition for {role}: {reason}")]
    InvalidTransition { role: Role, reason: &'static str },

    /// A key outside the fixed role set.
    #[error("unknown entity key {0:?}")]
    UnknownEntityKey(String),

    /// A snapshot addressed to a different room.
    #[error("snapshot for {got} merged into {expected}")]
    RoomMismatch { expected: RoomId, got: RoomId },
}
