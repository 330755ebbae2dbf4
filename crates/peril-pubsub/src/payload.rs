//! The capability every published or consumed value needs.

use peril_protocol::{Codec, ProtocolError};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A value that can travel through the broker.
///
/// Implemented for every serde type, so publishers and subscribers are
/// generic over `T: Payload` instead of a fixed message type.
pub trait Payload: Sized + Send + 'static {
    fn encode<C: Codec>(&self, codec: &C) -> Result<Vec<u8>, ProtocolError>;

    fn decode<C: Codec>(codec: &C, bytes: &[u8]) -> Result<Self, ProtocolError>;
}

impl<T> Payload for T
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    fn encode<C: Codec>(&self, codec: &C) -> Result<Vec<u8>, ProtocolError> {
        codec.encode(self)
    }

    fn decode<C: Codec>(codec: &C, bytes: &[u8]) -> Result<Self, ProtocolError> {
        codec.decode(bytes)
    }
}
