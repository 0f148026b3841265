//! # summsync
//!
//! Shared summoner-spell cooldown tracking for a team.
//!
//! Every participant of a room runs its own copy of the five timers and
//! counts them down locally. Edits and periodic snapshots are exchanged
//! through a relay, and a deterministic merge makes all copies agree no
//! matter how messages are ordered, duplicated or lost.
//!
//! This crate ties the layers together:
//!
//! - [`RelayServer`]: the WebSocket meeting point that fans messages out
//!   to the other members of a room.
//! - [`WebSocketChannel`]: a participant's connection to that relay.
//! - [`SummsyncError`]: one error type over every layer.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use summsync::prelude::*;
//!
//! # async fn run() -> Result<(), SummsyncError> {
//! let channel = WebSocketChannel::connect("ws://127.0.0.1:8080").await?;
//! let session = RoomSession::join(channel, RoomId::new("482913"), SessionConfig::default()).await?;
//! session.joined().await?;
//! session.dispatch(Role::Jungle, Action::Arm).await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod handler;
mod registry;
mod server;

pub use client::WebSocketChannel;
pub use config::{RelayConfig, ENV_BIND, ENV_IDLE_TIMEOUT};
pub use error::SummsyncError;
pub use server::{RelayHandle, RelayServer, RelayServerBuilder};

/// Everything a participant or relay binary usually needs.
pub mod prelude {
    pub use crate::{RelayConfig, RelayHandle, RelayServer, SummsyncError, WebSocketChannel};
    pub use summsync_protocol::{ParticipantId, RoomId};
    pub use summsync_room::policy::callout;
    pub use summsync_room::{Action, Modifier, Role, Snapshot, TimerState};
    pub use summsync_session::{
        ChannelState, MemoryHub, RoomSession, SessionConfig, SessionHandle, SoloChannel,
        SyncChannel,
    };
    pub use summsync_tick::TickConfig;
}
