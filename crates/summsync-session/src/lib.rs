//! Participant sessions for summsync.
//!
//! This crate connects a [`RoomState`](summsync_room::RoomState) to the
//! other participants of its room:
//!
//! 1. **Channels**: how messages travel ([`SyncChannel`] trait,
//!    [`MemoryHub`] in-process, [`SoloChannel`] offline)
//! 2. **Bootstrap**: catching a newcomer up with the room
//!    ([`SessionBootstrap`])
//! 3. **Sessions**: the per-room task that ticks, merges, and
//!    broadcasts ([`RoomSession`], driven through a [`SessionHandle`])
//!
//! # How it fits in the stack
//!
//! ```text
//! UI / relay client (above)  ← dispatches actions, watches snapshots
//!     ↕
//! Session Layer (this crate)  ← owns the room state and the channel
//!     ↕
//! Room Layer (below)  ← timers, merge, ticker
//! ```

mod bootstrap;
mod channel;
mod error;
mod memory;
mod session;
mod solo;

pub use bootstrap::SessionBootstrap;
pub use channel::{ChannelState, SyncChannel};
pub use error::{ChannelError, SessionError};
pub use memory::{MemoryChannel, MemoryHub};
pub use session::{generate_participant_id, RoomSession, SessionConfig, SessionHandle};
pub use solo::SoloChannel;
