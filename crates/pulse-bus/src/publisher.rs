//! # Publisher
//!
//! The publish pipeline: stamp, validate, route, durably append, cache,
//! locally emit.
//!
//! ## Ordering of Effects
//!
//! Validation failures reject the publish before any side effect. The
//! durable append is the only step whose failure surfaces to the caller;
//! it is retried with exponential backoff and jitter up to a bounded attempt
//! count and never silently dropped. The cache write and local emit run only
//! after a successful append, so a failed publish leaves no partial state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use pulse_telemetry::{
    HistogramTimer, EVENTS_PUBLISHED, PUBLISH_DURATION, PUBLISH_FAILURES, TRANSPORT_RETRIES,
};
use pulse_types::{Event, EventDraft, PublishError};

use crate::cache::RecencyCache;
use crate::emitter::LocalEmitter;
use crate::ports::TopicLog;
use crate::router::TopicRouter;
use crate::schema::SchemaRegistry;

/// Ceiling on derived-event chains (see the chain-depth metadata).
pub const MAX_CHAIN_DEPTH: u32 = 16;

/// Publisher behavior knobs.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Source stamped onto events whose draft does not name one.
    pub source: String,
    /// Whether schema validation gates publishes in this deployment.
    pub validate: bool,
    /// Durable append attempts before surfacing a transport error.
    pub max_attempts: u32,
    /// First retry delay; doubles per attempt.
    pub base_backoff: Duration,
    /// Retry delay ceiling.
    pub max_backoff: Duration,
    /// Derived-event chain ceiling.
    pub max_chain_depth: u32,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            source: "event-bus".to_string(),
            validate: true,
            max_attempts: 5,
            base_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
            max_chain_depth: MAX_CHAIN_DEPTH,
        }
    }
}

/// Validates, stamps, routes, durably appends, caches, and locally fans out
/// events.
pub struct Publisher {
    config: PublisherConfig,
    schemas: Arc<SchemaRegistry>,
    router: TopicRouter,
    log: Arc<dyn TopicLog>,
    cache: Arc<RecencyCache>,
    emitter: Arc<LocalEmitter>,
    published: AtomicU64,
}

impl Publisher {
    /// Wire a publisher over its collaborators.
    pub fn new(
        config: PublisherConfig,
        schemas: Arc<SchemaRegistry>,
        router: TopicRouter,
        log: Arc<dyn TopicLog>,
        cache: Arc<RecencyCache>,
        emitter: Arc<LocalEmitter>,
    ) -> Self {
        Self {
            config,
            schemas,
            router,
            log,
            cache,
            emitter,
            published: AtomicU64::new(0),
        }
    }

    /// Publish one event.
    ///
    /// Returns the stamped, immutable event on success. On error, nothing
    /// was emitted on any path: the caller may correct and retry.
    pub async fn publish(&self, draft: EventDraft) -> Result<Event, PublishError> {
        let _timer = HistogramTimer::new(&PUBLISH_DURATION);

        let depth = draft.chain_depth();
        if depth > self.config.max_chain_depth {
            PUBLISH_FAILURES.with_label_values(&["chain_depth"]).inc();
            return Err(PublishError::ChainDepthExceeded {
                event_type: draft.event_type,
                depth,
            });
        }

        let event = draft.into_event(&self.config.source);

        if self.config.validate {
            if let Err(errors) =
                self.schemas
                    .validate(&event.event_type, &event.version, &event.data)
            {
                PUBLISH_FAILURES.with_label_values(&["schema"]).inc();
                warn!(
                    event_type = %event.event_type,
                    version = %event.version,
                    ?errors,
                    "Publish rejected by schema validation"
                );
                return Err(PublishError::SchemaValidation {
                    event_type: event.event_type,
                    errors,
                });
            }
        }

        let topic = self.router.route_for(&event.event_type);
        let payload = event.to_json_bytes().map_err(|e| {
            PUBLISH_FAILURES.with_label_values(&["serialization"]).inc();
            PublishError::Serialization(e.to_string())
        })?;

        let offset = self
            .append_with_retry(topic, event.partition_key(), &payload)
            .await?;

        self.published.fetch_add(1, Ordering::Relaxed);
        EVENTS_PUBLISHED
            .with_label_values(&[event.event_type.as_str(), topic])
            .inc();
        debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            topic,
            offset,
            "Event published"
        );

        // Durable write succeeded; the remaining steps are best-effort.
        self.cache.put(&event);
        self.emitter.emit(&event);

        Ok(event)
    }

    async fn append_with_retry(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
    ) -> Result<u64, PublishError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.log.append(topic, key, payload).await {
                Ok(offset) => return Ok(offset),
                Err(e) if attempt < self.config.max_attempts => {
                    TRANSPORT_RETRIES.inc();
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        topic,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Durable append failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    PUBLISH_FAILURES.with_label_values(&["transport"]).inc();
                    return Err(PublishError::Transport {
                        topic: topic.to_string(),
                        attempts: attempt,
                        cause: e.to_string(),
                    });
                }
            }
        }
    }

    /// Exponential backoff with half-jitter: `delay/2 + rand(0..delay/2)`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let capped = self
            .config
            .base_backoff
            .saturating_mul(1 << exponent)
            .min(self.config.max_backoff);
        let half = capped / 2;
        half + rand::thread_rng().gen_range(Duration::ZERO..=half)
    }

    /// Total events durably published by this instance.
    #[must_use]
    pub fn events_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}
