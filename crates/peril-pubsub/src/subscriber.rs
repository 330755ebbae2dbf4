//! Typed subscriptions.
//!
//! [`subscribe`] declares and binds the queue, starts a consumer on a
//! dedicated channel, and spawns one task that drives it. The task takes
//! one delivery at a time: decode, call the handler, settle, and only then
//! receive the next. Separate subscriptions run independently.

use peril_broker::{Broker, BrokerChannel, Delivery, DeliveryStream};
use peril_protocol::Codec;
use tokio::task::JoinHandle;

use crate::{
    AckType, DeliveryOutcome, Durability, Operation, Payload, PubSubError,
    TopologyManager,
};

/// Counters for one subscription, returned when its loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionReport {
    /// Deliveries taken from the stream.
    pub delivered: u64,
    pub acknowledged: u64,
    pub requeued: u64,
    /// Includes undecodable deliveries.
    pub discarded: u64,
    pub decode_failures: u64,
    /// Decisions the broker did not accept, typically because the channel
    /// closed while the handler ran.
    pub settle_failures: u64,
}

impl SubscriptionReport {
    fn record(&mut self, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Acknowledged => self.acknowledged += 1,
            DeliveryOutcome::Requeued => self.requeued += 1,
            DeliveryOutcome::Discarded => self.discarded += 1,
        }
    }

    /// Deliveries that reached a terminal state.
    pub fn settled(&self) -> u64 {
        self.acknowledged + self.requeued + self.discarded
    }
}

/// A running subscription.
///
/// Dropping the handle does not stop the loop; it keeps consuming until
/// [`close`](Self::close) is called or the connection goes away.
pub struct Subscription<Ch: BrokerChannel> {
    queue: String,
    channel: Ch,
    task: JoinHandle<SubscriptionReport>,
}

impl<Ch: BrokerChannel> Subscription<Ch> {
    pub fn queue_name(&self) -> &str {
        &self.queue
    }

    /// Returns `true` once the delivery loop has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Closes the subscription's channel. Unsettled deliveries return to
    /// the queue and the loop ends after the current handler call.
    pub async fn close(&self) -> Result<(), PubSubError> {
        self.channel
            .close()
            .await
            .map_err(|e| PubSubError::from_broker(Operation::CloseChannel, &self.queue, e))
    }

    /// Waits for the loop to end and returns its counters.
    pub async fn join(self) -> SubscriptionReport {
        match self.task.await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(queue = %self.queue, error = %e, "subscription task failed");
                SubscriptionReport::default()
            }
        }
    }
}

/// Subscribes `handler` to `queue`, bound to `exchange` under
/// `routing_key`.
///
/// Every delivery gets exactly one decision. The handler's decision is
/// applied as returned; a payload that does not decode as `T` never
/// reaches the handler and is discarded to the dead-letter exchange.
///
/// # Errors
/// Any topology error from
/// [`TopologyManager::declare_and_bind_queue`], or a failure to start the
/// consumer.
pub async fn subscribe<B, C, T, F>(
    topology: &TopologyManager<B>,
    codec: C,
    exchange: &str,
    queue: &str,
    routing_key: &str,
    durability: Durability,
    handler: F,
) -> Result<Subscription<B::Channel>, PubSubError>
where
    B: Broker,
    C: Codec,
    T: Payload,
    F: FnMut(T) -> AckType + Send + 'static,
{
    let handle = topology
        .declare_and_bind_queue(exchange, queue, routing_key, durability)
        .await?;
    let (_, channel) = handle.into_parts();

    let consumer_tag = format!("peril-{queue}");
    let stream = match channel.consume(queue, &consumer_tag).await {
        Ok(stream) => stream,
        Err(e) => {
            if let Err(close_err) = channel.close().await {
                tracing::debug!(queue, error = %close_err, "channel close failed");
            }
            return Err(PubSubError::from_broker(Operation::Consume, queue, e));
        }
    };

    tracing::info!(queue, exchange, routing_key, "subscribed");
    let task = tokio::spawn(run(stream, codec, handler, queue.to_string()));
    Ok(Subscription {
        queue: queue.to_string(),
        channel,
        task,
    })
}

async fn run<S, C, T, F>(mut stream: S, codec: C, mut handler: F, queue: String) -> SubscriptionReport
where
    S: DeliveryStream,
    C: Codec,
    T: Payload,
    F: FnMut(T) -> AckType + Send + 'static,
{
    let mut report = SubscriptionReport::default();

    loop {
        let delivery = match stream.recv().await {
            Ok(Some(delivery)) => delivery,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(queue = %queue, error = %e, "delivery stream failed");
                break;
            }
        };
        report.delivered += 1;
        let tag = delivery.delivery_tag();

        let decision = match T::decode(&codec, delivery.payload()) {
            Ok(value) => handler(value),
            Err(e) => {
                report.decode_failures += 1;
                tracing::warn!(
                    queue = %queue,
                    %tag,
                    routing_key = delivery.routing_key(),
                    error = %e,
                    "undecodable delivery discarded"
                );
                AckType::NackDiscard
            }
        };

        match decision.apply(delivery).await {
            Ok(outcome) => {
                tracing::debug!(queue = %queue, %tag, ?outcome, "delivery settled");
                report.record(outcome);
            }
            Err(e) => {
                report.settle_failures += 1;
                tracing::warn!(queue = %queue, %tag, ?decision, error = %e, "could not settle delivery");
            }
        }
    }

    tracing::info!(
        queue = %queue,
        delivered = report.delivered,
        settled = report.settled(),
        "subscription ended"
    );
    report
}
