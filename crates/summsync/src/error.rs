//! Unified error type for summsync.

use summsync_protocol::ProtocolError;
use summsync_room::RoomError;
use summsync_session::{ChannelError, SessionError};
use summsync_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls,
/// so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum SummsyncError {
    /// Connecting, accepting, sending or receiving failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame didn't encode, decode or validate.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The room rejected an action.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A session failed to join or has ended.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A sync channel failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// A configuration value couldn't be parsed.
    #[error("invalid config: {0}")]
    Config(String),
}
