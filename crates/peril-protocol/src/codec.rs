//! Codec trait and implementations for payload encoding.
//!
//! Every message that crosses the broker is a self-describing byte
//! string. The messaging core does not care how payloads are encoded;
//! it only needs something that implements [`Codec`]. Publishers and
//! subscribers are generic over it, so the encoding is a configuration
//! choice rather than a structural one.
//!
//! [`JsonCodec`] is the only implementation today: human-readable, so a
//! message sitting in the dead-letter queue can be inspected straight
//! from the broker's management UI.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust values to bytes and decode bytes back.
///
/// ## Trait bounds
///
/// - `Send + Sync` → a codec is shared by the publishing path and every
///   subscription task, which Tokio may run on any worker thread.
/// - `Clone` → each subscription task owns its own copy.
/// - `'static` → the codec doesn't borrow temporary data.
///
/// ## Contract
///
/// For every value `v` the application relies on,
/// `decode(encode(v)) == v`.
pub trait Codec: Send + Sync + Clone + 'static {
    /// The MIME type stamped on published messages
    /// (e.g. `"application/json"`).
    fn content_type(&self) -> &'static str;

    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value can't be represented
    /// in this format (e.g. a map with non-string keys in JSON).
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
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
/// use peril_protocol::{Codec, JsonCodec, PlayingState};
///
/// let codec = JsonCodec;
///
/// let bytes = codec.encode(&PlayingState { is_paused: true }).unwrap();
/// assert_eq!(bytes, br#"{"isPaused":true}"#);
///
/// let decoded: PlayingState = codec.decode(&bytes).unwrap();
/// assert!(decoded.is_paused);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::PlayingState;

    #[test]
    fn test_json_codec_content_type() {
        assert_eq!(JsonCodec.content_type(), "application/json");
    }

    #[test]
    fn test_decode_rejects_malformed_bytes() {
        let result: Result<PlayingState, _> = JsonCodec.decode(b"{not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        // A well-formed JSON document that isn't a PlayingState.
        let result: Result<PlayingState, _> = JsonCodec.decode(br#"{"paused":1}"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_encode_rejects_non_string_map_keys() {
        let mut map = HashMap::new();
        map.insert((1, 2), "tuple keys are not valid JSON object keys");
        let result = JsonCodec.encode(&map);
        assert!(matches!(result, Err(ProtocolError::Encode(_))));
    }
}
