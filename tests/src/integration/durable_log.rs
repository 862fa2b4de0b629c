//! End-to-end flows over the production RocksDB topic log.

#[cfg(test)]
use std::sync::Arc;
#[cfg(test)]
use std::time::Duration;

#[cfg(test)]
use serde_json::json;

#[cfg(test)]
use pulse_bus::{EventHandler, HandlerConfig, TopicLog};
#[cfg(test)]
use pulse_runtime::{RocksDbLogConfig, RocksDbTopicLog};
#[cfg(test)]
use pulse_types::EventDraft;

#[cfg(test)]
use crate::support::{test_bus_with, wait_until, CollectingHandler};

#[cfg(test)]
fn open_log(dir: &tempfile::TempDir) -> Arc<RocksDbTopicLog> {
    Arc::new(
        RocksDbTopicLog::open(RocksDbLogConfig::for_testing(
            dir.path().to_string_lossy().to_string(),
        ))
        .expect("rocksdb open"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_dispatch_over_rocksdb() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = open_log(&dir);
        let cache = Arc::new(pulse_bus::RecencyCache::new());
        let bus = test_bus_with(log as Arc<dyn TopicLog>, cache, "core").await;

        let handler = CollectingHandler::new("listener");
        bus.register_handler(
            "payment_settled",
            Arc::clone(&handler) as Arc<dyn EventHandler>,
            HandlerConfig::default(),
        );

        let handle = bus.start_dispatcher();
        let event = bus
            .publish(EventDraft::new("payment_settled", json!({"orderId": "o1"})))
            .await
            .unwrap();

        wait_until(Duration::from_secs(3), || handler.count() == 1).await;
        bus.shutdown(handle).await;

        assert_eq!(handler.received()[0].id, event.id);
    }

    #[tokio::test]
    async fn test_restart_does_not_redeliver_committed_work() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = Arc::new(pulse_bus::RecencyCache::new());

        // First "process": consume and commit one event.
        {
            let log = open_log(&dir);
            let bus =
                test_bus_with(log as Arc<dyn TopicLog>, Arc::clone(&cache), "core").await;
            let handler = CollectingHandler::new("first-run");
            bus.register_handler(
                "user_registered",
                Arc::clone(&handler) as Arc<dyn EventHandler>,
                HandlerConfig::default(),
            );

            let handle = bus.start_dispatcher();
            bus.publish(EventDraft::new("user_registered", json!({})))
                .await
                .unwrap();
            wait_until(Duration::from_secs(3), || handler.count() == 1).await;
            bus.shutdown(handle).await;
        }

        // Second "process" over the same data dir and group: the cursor
        // survived, so nothing is redelivered.
        let log = open_log(&dir);
        let bus = test_bus_with(
            Arc::clone(&log) as Arc<dyn TopicLog>,
            Arc::clone(&cache),
            "core",
        )
        .await;
        let handler = CollectingHandler::new("second-run");
        bus.register_handler(
            "user_registered",
            Arc::clone(&handler) as Arc<dyn EventHandler>,
            HandlerConfig::default(),
        );

        let handle = bus.start_dispatcher();
        tokio::time::sleep(Duration::from_millis(200)).await;
        bus.shutdown(handle).await;
        assert_eq!(handler.count(), 0);

        // A fresh group, though, replays the topic from the start.
        let bus = test_bus_with(log as Arc<dyn TopicLog>, cache, "fresh-group").await;
        let replayer = CollectingHandler::new("replayer");
        bus.register_handler(
            "user_registered",
            Arc::clone(&replayer) as Arc<dyn EventHandler>,
            HandlerConfig::default(),
        );
        let handle = bus.start_dispatcher();
        wait_until(Duration::from_secs(3), || replayer.count() == 1).await;
        bus.shutdown(handle).await;
    }
}
