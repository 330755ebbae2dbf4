//! Acknowledgment decisions and their effect on a delivery.

use peril_broker::{BrokerError, Delivery};

/// What a handler decides for one delivery.
///
/// Discarding and requeueing are distinct outcomes: a discarded message
/// goes to the dead-letter exchange, a requeued one is delivered again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckType {
    /// Processed; remove the message from the queue.
    Ack,
    /// Not processed now; make it available for redelivery.
    NackRequeue,
    /// Never processable; dead-letter it (or drop it if the queue has no
    /// dead-letter exchange).
    NackDiscard,
}

/// The terminal state a delivery reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryOutcome {
    Acknowledged,
    Requeued,
    Discarded,
}

impl AckType {
    pub fn outcome(self) -> DeliveryOutcome {
        match self {
            Self::Ack => DeliveryOutcome::Acknowledged,
            Self::NackRequeue => DeliveryOutcome::Requeued,
            Self::NackDiscard => DeliveryOutcome::Discarded,
        }
    }

    /// Settles `delivery` according to this decision.
    pub async fn apply<D: Delivery>(self, delivery: D) -> Result<DeliveryOutcome, BrokerError> {
        match self {
            Self::Ack => delivery.ack().await?,
            Self::NackRequeue => delivery.nack(true).await?,
            Self::NackDiscard => delivery.nack(false).await?,
        }
        Ok(self.outcome())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_decision_has_its_own_outcome() {
        assert_eq!(AckType::Ack.outcome(), DeliveryOutcome::Acknowledged);
        assert_eq!(AckType::NackRequeue.outcome(), DeliveryOutcome::Requeued);
        assert_eq!(AckType::NackDiscard.outcome(), DeliveryOutcome::Discarded);
    }
}
