//! Routing determinism, id generation volume, and the schema gate.

#[cfg(test)]
use std::collections::HashSet;
#[cfg(test)]
use std::path::PathBuf;
#[cfg(test)]
use std::sync::Arc;

#[cfg(test)]
use serde_json::json;

#[cfg(test)]
use pulse_bus::{
    BusConfig, EventBus, InMemoryTopicLog, RecencyCache, TopicRouter,
};
#[cfg(test)]
use pulse_types::{EventDraft, PublishError};

#[cfg(test)]
use crate::support::test_bus;

/// The schema definitions the runtime ships.
#[cfg(test)]
fn shipped_schema_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../crates/pulse-runtime/schemas")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_is_deterministic() {
        let router = TopicRouter::new();
        assert_eq!(router.route_for("user_registered"), "user-topic");
        assert_eq!(router.route_for("payment_settled"), "payment-topic");
        assert_eq!(router.route_for("foo_bar"), "system-topic");
    }

    #[tokio::test]
    async fn test_ten_thousand_publishes_never_collide() {
        let bus = test_bus().await;

        let mut ids = HashSet::new();
        for _ in 0..10_000 {
            let event = bus
                .publish(EventDraft::new("analytics_tick", json!({})))
                .await
                .unwrap();
            assert!(ids.insert(event.id), "generated id collided");
        }
    }

    #[tokio::test]
    async fn test_shipped_schemas_gate_publishes() {
        let config = BusConfig {
            schema_dir: Some(shipped_schema_dir()),
            ..BusConfig::default()
        };
        let bus = EventBus::new(
            config,
            Arc::new(InMemoryTopicLog::new()),
            Arc::new(RecencyCache::new()),
        )
        .await
        .unwrap();

        // Conforming payload passes.
        bus.publish(EventDraft::new(
            "user_registered",
            json!({"id": "u1", "email": "a@b.com"}),
        ))
        .await
        .unwrap();

        // Missing required field is rejected before any side effect.
        let rejected = bus
            .publish(EventDraft::new("user_registered", json!({"id": "u1"})))
            .await;
        assert!(matches!(
            rejected,
            Err(PublishError::SchemaValidation { .. })
        ));
        assert!(bus.recent_event_ids("user_registered").len() == 1);

        // Types nobody documented pass through unvalidated.
        bus.publish(EventDraft::new("totally_undocumented", json!(42)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_payment_schema_checks_amount_type() {
        let config = BusConfig {
            schema_dir: Some(shipped_schema_dir()),
            ..BusConfig::default()
        };
        let bus = EventBus::new(
            config,
            Arc::new(InMemoryTopicLog::new()),
            Arc::new(RecencyCache::new()),
        )
        .await
        .unwrap();

        let rejected = bus
            .publish(EventDraft::new(
                "payment_settled",
                json!({"orderId": "o1", "creatorId": "c1", "creatorAmount": "ten"}),
            ))
            .await;

        match rejected {
            Err(PublishError::SchemaValidation { errors, .. }) => {
                assert!(errors.iter().any(|e| e.contains("creatorAmount")));
            }
            other => panic!("expected schema rejection, got {other:?}"),
        }
    }
}
