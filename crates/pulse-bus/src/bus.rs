//! # Event Bus Facade
//!
//! One `EventBus` instance owns its schema registry, topic router, handler
//! registry, and local emitter; the recency cache and topic log are shared
//! handles injected at construction. Nothing here is a process-wide
//! singleton, so isolated buses coexist in tests and multiple instances can
//! share one cache and transport.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use pulse_telemetry::LOCAL_SUBSCRIBERS;
use pulse_types::{BusError, Event, EventDraft, PublishError};

use crate::cache::RecencyCache;
use crate::dispatcher::{Dispatcher, DispatcherConfig};
use crate::emitter::{LocalEmitter, LocalSubscription, DEFAULT_CHANNEL_CAPACITY};
use crate::health::{HealthMetrics, HealthReport, ServiceHealth};
use crate::ports::TopicLog;
use crate::publisher::{Publisher, PublisherConfig};
use crate::registry::{EventHandler, HandlerConfig, HandlerRegistry};
use crate::router::TopicRouter;
use crate::schema::SchemaRegistry;

/// Everything configurable about one bus instance.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Publish pipeline knobs.
    pub publisher: PublisherConfig,
    /// Dispatch loop knobs.
    pub dispatcher: DispatcherConfig,
    /// Platform brand names recognized by the topic router.
    pub platform_keywords: Vec<String>,
    /// Directory of schema definition files; `None` runs with an empty
    /// registry (everything passes through).
    pub schema_dir: Option<PathBuf>,
    /// Per-subscriber buffer for the local emitter.
    pub local_channel_capacity: usize,
    /// How long shutdown waits for in-flight dispatch loops to drain.
    pub shutdown_grace: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            publisher: PublisherConfig::default(),
            dispatcher: DispatcherConfig::default(),
            platform_keywords: crate::router::DEFAULT_PLATFORM_KEYWORDS
                .iter()
                .map(|k| (*k).to_string())
                .collect(),
            schema_dir: None,
            local_channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// Handle over the spawned dispatch loops.
pub struct DispatcherHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl DispatcherHandle {
    /// Await loop termination up to `grace`, aborting stragglers.
    async fn drain(self, grace: Duration) {
        for mut task in self.tasks {
            if tokio::time::timeout(grace, &mut task).await.is_err() {
                warn!("Dispatch loop exceeded shutdown grace, aborting");
                task.abort();
            }
        }
    }
}

/// The event coordination bus.
pub struct EventBus {
    schemas: Arc<SchemaRegistry>,
    registry: Arc<HandlerRegistry>,
    cache: Arc<RecencyCache>,
    emitter: Arc<LocalEmitter>,
    log: Arc<dyn TopicLog>,
    publisher: Arc<Publisher>,
    processed: Arc<AtomicU64>,
    dispatcher_config: DispatcherConfig,
    shutdown_grace: Duration,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl EventBus {
    /// Construct a bus over a durable transport and a shared cache.
    ///
    /// Fatal when the transport does not answer the startup ping or the
    /// schema directory is malformed: the process must not start half-wired.
    pub async fn new(
        config: BusConfig,
        log: Arc<dyn TopicLog>,
        cache: Arc<RecencyCache>,
    ) -> Result<Self, BusError> {
        log.ping().await?;

        let schemas = Arc::new(match &config.schema_dir {
            Some(dir) => SchemaRegistry::load_dir(dir)?,
            None => SchemaRegistry::empty(),
        });
        let router = TopicRouter::with_platform_keywords(config.platform_keywords.clone());
        let emitter = Arc::new(LocalEmitter::with_capacity(config.local_channel_capacity));
        let publisher = Arc::new(Publisher::new(
            config.publisher.clone(),
            Arc::clone(&schemas),
            router,
            Arc::clone(&log),
            Arc::clone(&cache),
            Arc::clone(&emitter),
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            source = %config.publisher.source,
            group = %config.dispatcher.group,
            schemas = schemas.len(),
            "Event bus created"
        );

        Ok(Self {
            schemas,
            registry: Arc::new(HandlerRegistry::new()),
            cache,
            emitter,
            log,
            publisher,
            processed: Arc::new(AtomicU64::new(0)),
            dispatcher_config: config.dispatcher,
            shutdown_grace: config.shutdown_grace,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Publish one event through the full pipeline.
    pub async fn publish(&self, draft: EventDraft) -> Result<Event, PublishError> {
        self.publisher.publish(draft).await
    }

    /// Attach a handler to an event type.
    pub fn register_handler(
        &self,
        event_type: &str,
        handler: Arc<dyn EventHandler>,
        config: HandlerConfig,
    ) {
        self.registry.register(event_type, handler, config);
    }

    /// Detach every handler for an event type.
    pub fn unregister_handlers(&self, event_type: &str) -> usize {
        self.registry.unregister(event_type)
    }

    /// Subscribe to the in-process path: an exact event type, or `"event"`
    /// for everything. Independent of the durable path.
    #[must_use]
    pub fn subscribe_local(&self, channel: &str) -> LocalSubscription {
        let subscription = self.emitter.subscribe(channel);
        LOCAL_SUBSCRIBERS.set(self.emitter.subscriber_count() as f64);
        subscription
    }

    /// Cached event lookup (`None` past TTL or never cached).
    #[must_use]
    pub fn cached_event(&self, event_type: &str, id: &str) -> Option<Event> {
        self.cache.get(event_type, id)
    }

    /// Recent event ids for a type, newest first, bounded.
    #[must_use]
    pub fn recent_event_ids(&self, event_type: &str) -> Vec<String> {
        self.cache.recent_ids(event_type)
    }

    /// Spawn the dispatch loops for the configured topics and group.
    #[must_use]
    pub fn start_dispatcher(&self) -> DispatcherHandle {
        let dispatcher = Arc::new(Dispatcher::new(
            self.dispatcher_config.clone(),
            Arc::clone(&self.log),
            Arc::clone(&self.registry),
            Arc::clone(&self.emitter),
            Arc::clone(&self.publisher),
            Arc::clone(&self.processed),
        ));
        DispatcherHandle {
            tasks: dispatcher.spawn(self.shutdown_rx.clone()),
        }
    }

    /// The single synchronous health query.
    pub async fn health(&self) -> HealthReport {
        let broker = self.log.ping().await.is_ok();
        LOCAL_SUBSCRIBERS.set(self.emitter.subscriber_count() as f64);

        HealthReport::evaluate(
            ServiceHealth {
                broker,
                // In-process store, reachable by construction.
                cache: true,
            },
            HealthMetrics {
                events_processed: self.processed.load(Ordering::Relaxed),
                handlers_registered: self.registry.handler_count(),
                schemas_loaded: self.schemas.len(),
            },
        )
    }

    /// Two-phase drain: stop taking new messages, wait for in-flight
    /// settlement up to the grace period, then drop the loops.
    pub async fn shutdown(&self, handle: DispatcherHandle) {
        info!("Event bus shutting down");
        if self.shutdown_tx.send(true).is_err() {
            warn!("No dispatch loops were listening for shutdown");
        }
        handle.drain(self.shutdown_grace).await;
        info!("Event bus shutdown complete");
    }

    /// Total events durably published by this instance.
    #[must_use]
    pub fn events_published(&self) -> u64 {
        self.publisher.events_published()
    }
}
