//! Wire protocol for summsync.
//!
//! This crate defines what participants of a room say to each other:
//!
//! - **Types** ([`Envelope`], [`SyncMessage`], [`WireEntity`], identity
//!   newtypes): the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the room
//! session (timer state). It knows nothing about timers or merging:
//! entity keys are plain strings here, and validating them against the
//! fixed role set is the room layer's job.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Session (RoomState merge)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{decode_envelope, Codec};
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Envelope, ParticipantId, RoomId, SyncMessage, WireEntity, PROTOCOL_VERSION,
};
