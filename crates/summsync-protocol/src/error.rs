//! Error types for the protocol layer.
//!
//! Each crate in summsync defines its own error enum. When you see a
//! `ProtocolError`, the problem is in serialization or message shape,
//! not in networking or timer state.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields,
    /// an unknown message `type`, or truncated frames.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The envelope was produced by a peer speaking another schema version.
    #[error("unsupported protocol version {got} (expected {expected})")]
    UnsupportedVersion { got: u32, expected: u32 },

    /// The message decoded but violates protocol rules, e.g. an empty
    /// room id or participant id.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
