//! Shared fixtures for the integration suites.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use pulse_bus::{
    BusConfig, DispatcherConfig, EventBus, EventHandler, InMemoryTopicLog, LogRecord,
    PublisherConfig, RecencyCache, TopicLog,
};
use pulse_types::{Event, HandlerError, TopicLogError};

/// Bus over a fresh in-memory log and cache, with test-friendly timings.
pub async fn test_bus() -> EventBus {
    test_bus_with(Arc::new(InMemoryTopicLog::new()), Arc::new(RecencyCache::new()), "pulse-core")
        .await
}

/// Bus over shared infrastructure, in the named consumer group.
pub async fn test_bus_with(
    log: Arc<dyn TopicLog>,
    cache: Arc<RecencyCache>,
    group: &str,
) -> EventBus {
    let config = BusConfig {
        publisher: PublisherConfig {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(8),
            ..PublisherConfig::default()
        },
        dispatcher: DispatcherConfig {
            group: group.to_string(),
            poll_interval: Duration::from_millis(5),
            ..DispatcherConfig::default()
        },
        shutdown_grace: Duration::from_secs(2),
        ..BusConfig::default()
    };
    EventBus::new(config, log, cache).await.expect("bus init")
}

/// Handler that records every event it receives, optionally failing its
/// first `failures` invocations.
pub struct CollectingHandler {
    name: String,
    received: Mutex<Vec<Event>>,
    failures: AtomicU32,
}

impl CollectingHandler {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Self::failing(name, 0)
    }

    pub fn failing(name: impl Into<String>, failures: u32) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            received: Mutex::new(Vec::new()),
            failures: AtomicU32::new(failures),
        })
    }

    pub fn received(&self) -> Vec<Event> {
        self.received.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.received.lock().len()
    }
}

#[async_trait]
impl EventHandler for CollectingHandler {
    async fn handle(&self, event: Event) -> Result<(), HandlerError> {
        if self.failures.load(Ordering::SeqCst) > 0 {
            self.failures.fetch_sub(1, Ordering::SeqCst);
            return Err(HandlerError::msg("injected failure"));
        }
        self.received.lock().push(event);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Topic log whose first `failures` cursor commits fail.
///
/// A commit failure after handlers ran models a consumer crash before
/// commit: the next poll redelivers the batch.
pub struct FlakyCommitLog {
    inner: InMemoryTopicLog,
    failures: AtomicU32,
}

impl FlakyCommitLog {
    pub fn failing(failures: u32) -> Self {
        Self {
            inner: InMemoryTopicLog::new(),
            failures: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl TopicLog for FlakyCommitLog {
    async fn append(&self, topic: &str, key: &str, payload: &[u8]) -> Result<u64, TopicLogError> {
        self.inner.append(topic, key, payload).await
    }

    async fn read_from(
        &self,
        topic: &str,
        offset: u64,
        max: usize,
    ) -> Result<Vec<LogRecord>, TopicLogError> {
        self.inner.read_from(topic, offset, max).await
    }

    async fn committed_offset(&self, topic: &str, group: &str) -> Result<u64, TopicLogError> {
        self.inner.committed_offset(topic, group).await
    }

    async fn commit_offset(
        &self,
        topic: &str,
        group: &str,
        offset: u64,
    ) -> Result<(), TopicLogError> {
        if self.failures.load(Ordering::SeqCst) > 0 {
            self.failures.fetch_sub(1, Ordering::SeqCst);
            return Err(TopicLogError::Unavailable {
                cause: "simulated crash before commit".to_string(),
            });
        }
        self.inner.commit_offset(topic, group, offset).await
    }

    async fn ping(&self) -> Result<(), TopicLogError> {
        Ok(())
    }
}

/// Poll until `condition` holds or the deadline passes.
pub async fn wait_until<F>(deadline: Duration, mut condition: F)
where
    F: FnMut() -> bool,
{
    let result = tokio::time::timeout(deadline, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "condition not met within {deadline:?}");
}
