//! Recency cache behavior observed through the publish pipeline.

#[cfg(test)]
use std::sync::Arc;
#[cfg(test)]
use std::time::Duration;

#[cfg(test)]
use serde_json::json;

#[cfg(test)]
use pulse_bus::{InMemoryTopicLog, RecencyCache};
#[cfg(test)]
use pulse_types::EventDraft;

#[cfg(test)]
use crate::support::test_bus_with;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_published_event_is_immediately_cached() {
        let bus = crate::support::test_bus().await;

        let event = bus
            .publish(EventDraft::new("user_registered", json!({"id": "u1"})))
            .await
            .unwrap();

        assert_eq!(
            bus.cached_event("user_registered", &event.id),
            Some(event.clone())
        );
        assert_eq!(bus.recent_event_ids("user_registered"), vec![event.id]);
    }

    #[tokio::test]
    async fn test_expired_event_reads_absent_not_error() {
        let cache = Arc::new(RecencyCache::with_config(
            Duration::from_millis(20),
            100,
            Duration::from_secs(60),
        ));
        let bus = test_bus_with(Arc::new(InMemoryTopicLog::new()), cache, "core").await;

        let event = bus
            .publish(EventDraft::new("user_registered", json!({})))
            .await
            .unwrap();
        assert!(bus.cached_event("user_registered", &event.id).is_some());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(bus.cached_event("user_registered", &event.id), None);
    }

    #[tokio::test]
    async fn test_recent_list_bounded_under_volume() {
        let cache = Arc::new(RecencyCache::with_config(
            RecencyCache::DEFAULT_TTL,
            100,
            Duration::from_secs(60),
        ));
        let bus = test_bus_with(Arc::new(InMemoryTopicLog::new()), cache, "core").await;

        let mut last_id = String::new();
        for i in 0..500 {
            let event = bus
                .publish(EventDraft::new("analytics_page_view", json!({"n": i})))
                .await
                .unwrap();
            last_id = event.id;
        }

        let recent = bus.recent_event_ids("analytics_page_view");
        assert_eq!(recent.len(), 100);
        assert_eq!(recent[0], last_id);
    }

    #[tokio::test]
    async fn test_cache_shared_between_instances() {
        let log: Arc<dyn pulse_bus::TopicLog> = Arc::new(InMemoryTopicLog::new());
        let cache = Arc::new(RecencyCache::new());

        let writer = test_bus_with(Arc::clone(&log), Arc::clone(&cache), "writer").await;
        let reader = test_bus_with(Arc::clone(&log), Arc::clone(&cache), "reader").await;

        let event = writer
            .publish(EventDraft::new("content_uploaded", json!({})))
            .await
            .unwrap();

        // The other instance reads it without touching the durable log.
        assert_eq!(
            reader.cached_event("content_uploaded", &event.id),
            Some(event)
        );
    }
}
