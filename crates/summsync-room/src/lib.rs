//! Cooldown timers and room state for summsync.
//!
//! This crate is transport-free: it turns user actions and ticks into
//! snapshots, and merges snapshots from peers back in. Sessions in
//! `summsync-session` decide when to send and receive them.
//!
//! # Key types
//!
//! - [`Role`]: the five tracked entities
//! - [`policy`]: cooldown table and `M:SS` formatting
//! - [`EntityTimerState`]: one timer and its transitions
//! - [`RoomState`]: all five timers, dispatch, tick, and merge
//! - [`Snapshot`]: the immutable unit that goes on the wire
//! - [`LocalTicker`]: the one-second driver

mod error;
pub mod policy;
mod role;
mod state;
mod ticker;
mod timer;

pub use error::RoomError;
pub use role::Role;
pub use state::{Action, MergeReport, RoomState, Snapshot};
pub use ticker::{LocalTicker, TickSubscriber};
pub use timer::{EntityTimerState, Modifier, TimerState, Version};
