//! Dead-letter flow: exhaustion, payload shape, and downstream consumption.

#[cfg(test)]
use std::sync::Arc;
#[cfg(test)]
use std::time::Duration;

#[cfg(test)]
use serde_json::json;

#[cfg(test)]
use pulse_bus::{EventHandler, FnHandler, HandlerConfig, DLQ_EVENT_TYPE};
#[cfg(test)]
use pulse_types::{EventDraft, EventMetadata, HandlerError};

#[cfg(test)]
use crate::support::{test_bus, wait_until, CollectingHandler};

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exhausted_handler_produces_consumable_dead_letter() {
        let bus = test_bus().await;

        // A handler that always fails, and an operator-style consumer of the
        // resulting dead letters.
        bus.register_handler(
            "payment_settled",
            Arc::new(FnHandler::new("ledger-writer", |_| async {
                Err(HandlerError::msg("ledger unavailable"))
            })),
            HandlerConfig {
                retries: 2,
                timeout: Duration::from_millis(100),
                dlq_enabled: true,
            },
        );
        let dlq_consumer = CollectingHandler::new("dlq-investigator");
        bus.register_handler(
            DLQ_EVENT_TYPE,
            Arc::clone(&dlq_consumer) as Arc<dyn EventHandler>,
            HandlerConfig::default(),
        );

        let handle = bus.start_dispatcher();
        let original = bus
            .publish(
                EventDraft::new("payment_settled", json!({"orderId": "o1"}))
                    .with_metadata(EventMetadata::for_user("u1")),
            )
            .await
            .unwrap();

        wait_until(Duration::from_secs(3), || dlq_consumer.count() == 1).await;
        bus.shutdown(handle).await;

        let dead_letter = &dlq_consumer.received()[0];
        assert_eq!(dead_letter.event_type, DLQ_EVENT_TYPE);
        assert_eq!(dead_letter.data["originalEvent"]["id"], original.id);
        assert_eq!(dead_letter.data["handler"], "ledger-writer");
        assert_eq!(dead_letter.data["error"], "ledger unavailable");

        // Metadata rode along, and the chain depth advanced.
        let metadata = dead_letter.metadata.as_ref().unwrap();
        assert_eq!(metadata.user_id.as_deref(), Some("u1"));
        assert_eq!(metadata.chain_depth, Some(1));
    }

    #[tokio::test]
    async fn test_per_handler_dlq_granularity() {
        let bus = test_bus().await;

        // One failing handler dead-letters; its failing sibling does not.
        bus.register_handler(
            "user_registered",
            Arc::new(FnHandler::new("critical", |_| async {
                Err(HandlerError::msg("boom"))
            })),
            HandlerConfig {
                retries: 0,
                timeout: Duration::from_millis(100),
                dlq_enabled: true,
            },
        );
        bus.register_handler(
            "user_registered",
            Arc::new(FnHandler::new("best-effort", |_| async {
                Err(HandlerError::msg("boom"))
            })),
            HandlerConfig {
                retries: 0,
                timeout: Duration::from_millis(100),
                dlq_enabled: false,
            },
        );
        let dlq_consumer = CollectingHandler::new("dlq-investigator");
        bus.register_handler(
            DLQ_EVENT_TYPE,
            Arc::clone(&dlq_consumer) as Arc<dyn EventHandler>,
            HandlerConfig::default(),
        );

        let handle = bus.start_dispatcher();
        bus.publish(EventDraft::new("user_registered", json!({})))
            .await
            .unwrap();

        wait_until(Duration::from_secs(3), || dlq_consumer.count() >= 1).await;
        // Give the second dead letter a chance to (wrongly) appear.
        tokio::time::sleep(Duration::from_millis(100)).await;
        bus.shutdown(handle).await;

        assert_eq!(dlq_consumer.count(), 1);
        assert_eq!(dlq_consumer.received()[0].data["handler"], "critical");
    }

    #[tokio::test]
    async fn test_retry_success_avoids_dead_letter() {
        let bus = test_bus().await;

        let flaky = CollectingHandler::failing("flaky", 2);
        bus.register_handler(
            "user_registered",
            Arc::clone(&flaky) as Arc<dyn EventHandler>,
            HandlerConfig {
                retries: 3,
                timeout: Duration::from_millis(100),
                dlq_enabled: true,
            },
        );
        let dlq_consumer = CollectingHandler::new("dlq-investigator");
        bus.register_handler(
            DLQ_EVENT_TYPE,
            Arc::clone(&dlq_consumer) as Arc<dyn EventHandler>,
            HandlerConfig::default(),
        );

        let handle = bus.start_dispatcher();
        bus.publish(EventDraft::new("user_registered", json!({})))
            .await
            .unwrap();

        wait_until(Duration::from_secs(3), || flaky.count() == 1).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        bus.shutdown(handle).await;

        assert_eq!(dlq_consumer.count(), 0);
    }
}
