//! Codec trait and implementations for serializing/deserializing messages.
//!
//! The protocol layer doesn't care HOW messages are serialized: it just
//! needs something that implements [`Codec`]. [`JsonCodec`] is the only
//! implementation today; JSON keeps the wire readable from browser
//! devtools and compatible with the web client.

use serde::{de::DeserializeOwned, Serialize};

use crate::{Envelope, ProtocolError};

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because codecs live inside long-running tasks
/// (relay handlers, participant sessions) that Tokio may move between
/// threads.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

/// Decodes an [`Envelope`] and checks it against the schema rules.
///
/// Everything received from the network should go through this instead
/// of a bare `codec.decode`, so that payloads from another schema
/// version are rejected before anyone looks inside them.
pub fn decode_envelope<C: Codec>(
    codec: &C,
    data: &[u8],
) -> Result<Envelope, ProtocolError> {
    let envelope: Envelope = codec.decode(data)?;
    envelope.validate()?;
    Ok(envelope)
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// This is behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use summsync_protocol::{
///     Codec, Envelope, JsonCodec, ParticipantId, RoomId, SyncMessage,
/// };
///
/// let codec = JsonCodec;
///
/// let envelope = Envelope::new(
///     ParticipantId::new("alice"),
///     1,
///     SyncMessage::RequestState { room_id: RoomId::new("123456") },
/// );
///
/// let bytes = codec.encode(&envelope).unwrap();
/// let decoded: Envelope = codec.decode(&bytes).unwrap();
/// assert_eq!(envelope, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ParticipantId, RoomId, SyncMessage};

    #[test]
    fn test_decode_envelope_accepts_current_version() {
        let env = Envelope::new(
            ParticipantId::new("p1"),
            3,
            SyncMessage::JoinRoom {
                room_id: RoomId::new("42"),
            },
        );
        let bytes = JsonCodec.encode(&env).unwrap();
        let decoded = decode_envelope(&JsonCodec, &bytes).unwrap();
        assert_eq!(decoded, env);
    }

    #[test]
    fn test_decode_envelope_rejects_other_version() {
        let json = br#"{
            "v": 7,
            "origin": "p1",
            "seq": 1,
            "payload": { "type": "request-state", "roomId": "42" }
        }"#;
        let err = decode_envelope(&JsonCodec, json).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::UnsupportedVersion { got: 7, expected: 1 }
        ));
    }

    #[test]
    fn test_decode_envelope_rejects_garbage() {
        let err = decode_envelope(&JsonCodec, b"not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }
}
