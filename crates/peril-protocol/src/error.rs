//! Error types for the protocol layer.
//!
//! Each crate in Peril defines its own error enum. A `ProtocolError`
//! always means the payload could not be turned into bytes or back,
//! never that the broker misbehaved.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    ///
    /// Raised before anything touches the network, so a failed encode
    /// never produces a partial publish.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust value).
    ///
    /// Common causes: malformed JSON, missing required fields, or a
    /// message published with a different payload type on the same
    /// routing key.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The value decoded fine but violates a payload rule.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}
