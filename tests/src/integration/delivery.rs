//! At-least-once delivery, consumer groups, and the two delivery paths.

#[cfg(test)]
use std::sync::atomic::AtomicU64;
#[cfg(test)]
use std::sync::Arc;
#[cfg(test)]
use std::time::Duration;

#[cfg(test)]
use serde_json::json;

#[cfg(test)]
use pulse_bus::{
    Dispatcher, DispatcherConfig, HandlerConfig, HandlerRegistry, InMemoryTopicLog, LocalEmitter,
    Publisher, PublisherConfig, RecencyCache, SchemaRegistry, TopicLog, TopicRouter,
    WILDCARD_CHANNEL,
};
#[cfg(test)]
use pulse_types::EventDraft;

#[cfg(test)]
use crate::support::{test_bus_with, wait_until, CollectingHandler, FlakyCommitLog};

/// Publisher + dispatcher wired by hand over an arbitrary log, so tests can
/// drive polls deterministically.
#[cfg(test)]
struct ManualConsumer {
    publisher: Arc<Publisher>,
    dispatcher: Dispatcher,
    registry: Arc<HandlerRegistry>,
}

#[cfg(test)]
impl ManualConsumer {
    fn over(log: Arc<dyn TopicLog>, group: &str) -> Self {
        let registry = Arc::new(HandlerRegistry::new());
        let emitter = Arc::new(LocalEmitter::new());
        let publisher = Arc::new(Publisher::new(
            PublisherConfig {
                max_attempts: 2,
                base_backoff: Duration::from_millis(1),
                ..PublisherConfig::default()
            },
            Arc::new(SchemaRegistry::empty()),
            TopicRouter::new(),
            Arc::clone(&log),
            Arc::new(RecencyCache::new()),
            Arc::clone(&emitter),
        ));
        let dispatcher = Dispatcher::new(
            DispatcherConfig {
                group: group.to_string(),
                ..DispatcherConfig::default()
            },
            log,
            Arc::clone(&registry),
            emitter,
            Arc::clone(&publisher),
            Arc::new(AtomicU64::new(0)),
        );
        Self {
            publisher,
            dispatcher,
            registry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_crash_before_commit_redelivers() {
        let log = Arc::new(FlakyCommitLog::failing(1));
        let consumer = ManualConsumer::over(Arc::clone(&log) as Arc<dyn TopicLog>, "core");

        let handler = CollectingHandler::new("idempotent");
        consumer
            .registry
            .register("user_registered", Arc::clone(&handler) as _, HandlerConfig::default());

        consumer
            .publisher
            .publish(EventDraft::new("user_registered", json!({"id": "u1"})))
            .await
            .unwrap();

        // First poll: handlers run, then the commit "crashes".
        assert!(consumer.dispatcher.poll_topic_once("user-topic").await.is_err());
        assert_eq!(handler.count(), 1);

        // Redelivery: the same message is dispatched again, then committed.
        assert_eq!(
            consumer.dispatcher.poll_topic_once("user-topic").await.unwrap(),
            1
        );
        assert_eq!(handler.count(), 2);

        // Settled: nothing further is redelivered.
        assert_eq!(
            consumer.dispatcher.poll_topic_once("user-topic").await.unwrap(),
            0
        );
        assert_eq!(handler.count(), 2);
    }

    #[tokio::test]
    async fn test_each_group_receives_every_event() {
        let log: Arc<dyn TopicLog> = Arc::new(InMemoryTopicLog::new());
        let billing = ManualConsumer::over(Arc::clone(&log), "billing");
        let search = ManualConsumer::over(Arc::clone(&log), "search");

        let billing_handler = CollectingHandler::new("billing");
        let search_handler = CollectingHandler::new("search");
        billing.registry.register(
            "payment_settled",
            Arc::clone(&billing_handler) as _,
            HandlerConfig::default(),
        );
        search.registry.register(
            "payment_settled",
            Arc::clone(&search_handler) as _,
            HandlerConfig::default(),
        );

        billing
            .publisher
            .publish(EventDraft::new("payment_settled", json!({"orderId": "o1"})))
            .await
            .unwrap();

        billing
            .dispatcher
            .poll_topic_once("payment-topic")
            .await
            .unwrap();
        search
            .dispatcher
            .poll_topic_once("payment-topic")
            .await
            .unwrap();

        // Both groups saw the event; cursors are independent.
        assert_eq!(billing_handler.count(), 1);
        assert_eq!(search_handler.count(), 1);
    }

    #[tokio::test]
    async fn test_local_only_listener_misses_other_process_events() {
        let log: Arc<dyn TopicLog> = Arc::new(InMemoryTopicLog::new());
        let cache = Arc::new(RecencyCache::new());

        // Two bus instances model two processes sharing transport and cache.
        let producer = test_bus_with(Arc::clone(&log), Arc::clone(&cache), "producer").await;
        let consumer = test_bus_with(Arc::clone(&log), Arc::clone(&cache), "consumer").await;

        let mut producer_local = producer.subscribe_local(WILDCARD_CHANNEL);
        let mut consumer_local = consumer.subscribe_local(WILDCARD_CHANNEL);

        let event = producer
            .publish(EventDraft::new("user_registered", json!({})))
            .await
            .unwrap();

        // The producing process sees the local emission immediately.
        assert_eq!(producer_local.try_recv().unwrap().unwrap().id, event.id);
        // The other process sees nothing on its local path alone.
        assert!(matches!(consumer_local.try_recv(), Ok(None)));

        // Only once its dispatcher consumes the durable topic does the local
        // path light up over there.
        let handle = consumer.start_dispatcher();
        let received = tokio::time::timeout(Duration::from_secs(2), consumer_local.recv())
            .await
            .expect("durable delivery never reached the local path")
            .unwrap();
        assert_eq!(received.id, event.id);
        consumer.shutdown(handle).await;
    }

    #[tokio::test]
    async fn test_handler_invoked_through_running_dispatcher() {
        let bus = crate::support::test_bus().await;
        let handler = CollectingHandler::new("listener");
        bus.register_handler(
            "content_uploaded",
            Arc::clone(&handler) as _,
            HandlerConfig::default(),
        );

        let handle = bus.start_dispatcher();
        bus.publish(EventDraft::new(
            "content_uploaded",
            json!({"contentId": "c1"}),
        ))
        .await
        .unwrap();

        wait_until(Duration::from_secs(2), || handler.count() == 1).await;
        bus.shutdown(handle).await;

        assert_eq!(handler.received()[0].data["contentId"], "c1");
    }
}
