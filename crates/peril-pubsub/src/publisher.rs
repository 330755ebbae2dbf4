//! Typed publishing.
//!
//! A publish succeeds once the broker connection has accepted the message.
//! Whether any queue received it is not checked: an exchange with no
//! matching binding drops the message, and that is not an error here.

use std::sync::Arc;

use peril_broker::{Broker, BrokerChannel};
use peril_protocol::Codec;

use crate::{Operation, PubSubError, Payload};

fn encode<C: Codec, T: Payload>(
    codec: &C,
    target: &str,
    value: &T,
) -> Result<Vec<u8>, PubSubError> {
    value
        .encode(codec)
        .map_err(|source| PubSubError::Serialization {
            operation: Operation::Encode,
            target: target.to_string(),
            source,
        })
}

async fn send<Ch: BrokerChannel>(
    channel: &Ch,
    content_type: &str,
    exchange: &str,
    routing_key: &str,
    target: &str,
    body: &[u8],
) -> Result<(), PubSubError> {
    channel
        .publish(exchange, routing_key, body, content_type)
        .await
        .map_err(|e| PubSubError::from_broker(Operation::Publish, target, e))?;
    tracing::debug!(exchange, routing_key, bytes = body.len(), "published");
    Ok(())
}

/// Encodes `value` with `codec` and publishes it on `channel`.
///
/// Encoding happens first; if it fails nothing is sent.
pub async fn publish<Ch, C, T>(
    channel: &Ch,
    codec: &C,
    exchange: &str,
    routing_key: &str,
    value: &T,
) -> Result<(), PubSubError>
where
    Ch: BrokerChannel,
    C: Codec,
    T: Payload,
{
    let target = format!("{exchange}/{routing_key}");
    let body = encode(codec, &target, value)?;
    send(channel, codec.content_type(), exchange, routing_key, &target, &body).await
}

/// Publishes each value on a channel of its own.
///
/// Channels must not be shared between concurrent operations, and the
/// interactive paths publish from wherever a command happens to run, so
/// every publish opens a fresh channel and closes it afterwards.
pub struct Publisher<B: Broker, C: Codec> {
    broker: Arc<B>,
    codec: C,
}

impl<B: Broker, C: Codec> Clone for Publisher<B, C> {
    fn clone(&self) -> Self {
        Self {
            broker: Arc::clone(&self.broker),
            codec: self.codec.clone(),
        }
    }
}

impl<B: Broker, C: Codec> Publisher<B, C> {
    pub fn new(broker: Arc<B>, codec: C) -> Self {
        Self { broker, codec }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub async fn publish<T: Payload>(
        &self,
        exchange: &str,
        routing_key: &str,
        value: &T,
    ) -> Result<(), PubSubError> {
        let target = format!("{exchange}/{routing_key}");
        let body = encode(&self.codec, &target, value)?;

        let channel = self
            .broker
            .open_channel()
            .await
            .map_err(|e| PubSubError::from_broker(Operation::OpenChannel, &target, e))?;
        let result = send(
            &channel,
            self.codec.content_type(),
            exchange,
            routing_key,
            &target,
            &body,
        )
        .await;
        if let Err(e) = channel.close().await {
            tracing::debug!(exchange, routing_key, error = %e, "publish channel close failed");
        }
        result
    }
}
