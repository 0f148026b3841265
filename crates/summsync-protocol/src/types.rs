//! Core protocol types for the summsync wire format.
//!
//! Every type in this module is serialized to bytes, relayed to the
//! other participants of a room, and deserialized on the other side.
//! The JSON shapes are part of the contract with the web client, so the
//! serde attributes here are load-bearing.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// The schema version carried in every [`Envelope`].
///
/// Bump this whenever a message shape changes incompatibly. Receivers
/// reject envelopes with any other value.
pub const PROTOCOL_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifies one participant (one running client) in a room.
///
/// A newtype around `String` so a participant id can't be passed where
/// a room id is expected. Ordering is plain lexicographic string order;
/// the room layer relies on it to break ties between concurrent edits.
///
/// `#[serde(transparent)]` serializes this as the bare string.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Wraps a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An opaque room identifier, e.g. the six-digit lobby code users share.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wraps a raw room code.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the room code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// WireEntity: one tracked timer as it appears on the wire
// ---------------------------------------------------------------------------

/// One entity (role) inside a `state-snapshot`.
///
/// `remainingSeconds: null` encodes an idle timer. `counter` and `origin`
/// are the version of the last edit to this entity; peers that omit them
/// get the snapshot-level counter and the envelope origin instead.
///
/// ```json
/// { "remainingSeconds": 268, "modifierA": true, "modifierB": false,
///   "counter": 12, "origin": "a1f3..." }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEntity {
    pub remaining_seconds: Option<u32>,
    pub modifier_a: bool,
    pub modifier_b: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<ParticipantId>,
}

// ---------------------------------------------------------------------------
// SyncMessage: the closed message schema
// ---------------------------------------------------------------------------

/// Every message a participant or the relay can send.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON, and the
/// rename rules give the kebab-case tags and camelCase fields the web
/// client uses:
///
/// ```json
/// { "type": "request-state", "roomId": "482913" }
/// ```
///
/// Entity keys in `StateSnapshot` are strings on purpose: a peer may
/// send a key outside the fixed role set, and that must surface as a
/// droppable entry rather than a decode failure of the whole snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum SyncMessage {
    /// Participant → room: "I'm here."
    JoinRoom { room_id: RoomId },

    /// Participant → room: "I'm leaving." Disconnecting has the same effect.
    LeaveRoom { room_id: RoomId },

    /// Both directions: a full copy of the sender's timers.
    StateSnapshot {
        room_id: RoomId,
        counter: u64,
        entities: BTreeMap<String, WireEntity>,
    },

    /// Newcomer → room: "Send me what you have."
    RequestState { room_id: RoomId },

    /// Relay → participant: something about the previous message was wrong.
    /// `code` follows HTTP conventions (400 bad request, 409 conflict).
    Error { code: u16, message: String },
}

impl SyncMessage {
    /// The room this message is addressed to, if any.
    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            Self::JoinRoom { room_id }
            | Self::LeaveRoom { room_id }
            | Self::StateSnapshot { room_id, .. }
            | Self::RequestState { room_id } => Some(room_id),
            Self::Error { .. } => None,
        }
    }

    /// Short name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join-room",
            Self::LeaveRoom { .. } => "leave-room",
            Self::StateSnapshot { .. } => "state-snapshot",
            Self::RequestState { .. } => "request-state",
            Self::Error { .. } => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope: the top-level wire format
// ---------------------------------------------------------------------------

/// The top-level message wrapper. Every frame on the wire is an Envelope.
///
/// ```text
/// ┌──────────────────────────────────┐
/// │ v: 1                             │  ← schema version
/// │ origin: "a1f3…"                  │  ← who sent it
/// │ seq: 42                          │  ← sender-local sequence number
/// │ ┌──────────────────────────────┐ │
/// │ │ payload: state-snapshot {…}  │ │  ← the actual content
/// │ └──────────────────────────────┘ │
/// └──────────────────────────────────┘
/// ```
///
/// `seq` is diagnostic only. Ordering and duplicate handling come from
/// the per-entity versions inside snapshots, not from the envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub v: u32,
    pub origin: ParticipantId,
    pub seq: u64,
    pub payload: SyncMessage,
}

impl Envelope {
    /// Builds an envelope stamped with the current [`PROTOCOL_VERSION`].
    pub fn new(origin: ParticipantId, seq: u64, payload: SyncMessage) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            origin,
            seq,
            payload,
        }
    }

    /// Checks the schema rules that serde alone can't express.
    ///
    /// # Errors
    /// - [`ProtocolError::UnsupportedVersion`] if `v` isn't ours.
    /// - [`ProtocolError::InvalidMessage`] for an empty origin or room id.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.v != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion {
                got: self.v,
                expected: PROTOCOL_VERSION,
            });
        }
        if self.origin.as_str().is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "empty origin".into(),
            ));
        }
        if let Some(room_id) = self.payload.room_id() {
            if room_id.as_str().is_empty() {
                return Err(ProtocolError::InvalidMessage(
                    "empty room id".into(),
                ));
            }
        }
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================
