//! # Dispatcher
//!
//! Consumes durable topic records and fans each event out to its registered
//! handlers.
//!
//! ## Delivery Contract
//!
//! - All handlers matching an event run concurrently; nothing orders
//!   handlers of the same event.
//! - Each invocation is bounded by its registration's timeout and retried
//!   per its retry budget; a handler that never resolves counts as failed.
//! - Terminal failure with dead-lettering enabled publishes a
//!   `system_dlq_event` through the normal pipeline. A dead-letter event is
//!   never dead-lettered again, and a failed dead-letter publish is logged
//!   and dropped.
//! - The group cursor is committed only after every handler for the message
//!   has settled. A crash (or commit failure) before the commit causes
//!   redelivery, so handlers must be idempotent.
//! - After commit the event is emitted locally, so in-process listeners also
//!   observe bus-delivered events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, trace, warn};

use pulse_telemetry::{
    HistogramTimer, DISPATCH_DURATION, DLQ_EVENTS, EVENTS_DISPATCHED, HANDLER_INVOCATIONS,
};
use pulse_types::{DispatchError, Event, EventDraft, HandlerError};

use crate::emitter::LocalEmitter;
use crate::ports::TopicLog;
use crate::publisher::Publisher;
use crate::registry::{HandlerRegistration, HandlerRegistry};
use crate::router::ALL_TOPICS;

/// Type of the derived event carrying a permanently failed original.
pub const DLQ_EVENT_TYPE: &str = "system_dlq_event";

/// Dispatch loop knobs.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Consumer group this process belongs to.
    pub group: String,
    /// Topics to subscribe.
    pub topics: Vec<String>,
    /// Idle wait between polls of a drained topic.
    pub poll_interval: Duration,
    /// Records read per poll.
    pub batch_size: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            group: "pulse-core".to_string(),
            topics: ALL_TOPICS.iter().map(|t| (*t).to_string()).collect(),
            poll_interval: Duration::from_millis(50),
            batch_size: 64,
        }
    }
}

/// Per-topic consumer driving handler fan-out.
pub struct Dispatcher {
    config: DispatcherConfig,
    log: Arc<dyn TopicLog>,
    registry: Arc<HandlerRegistry>,
    emitter: Arc<LocalEmitter>,
    /// Publisher used for dead-letter re-injection.
    dlq: Arc<Publisher>,
    processed: Arc<AtomicU64>,
}

impl Dispatcher {
    /// Wire a dispatcher over its collaborators.
    ///
    /// `processed` is the shared events-processed counter surfaced by the
    /// bus health query.
    pub fn new(
        config: DispatcherConfig,
        log: Arc<dyn TopicLog>,
        registry: Arc<HandlerRegistry>,
        emitter: Arc<LocalEmitter>,
        dlq: Arc<Publisher>,
        processed: Arc<AtomicU64>,
    ) -> Self {
        Self {
            config,
            log,
            registry,
            emitter,
            dlq,
            processed,
        }
    }

    /// Drain one batch from a topic. Returns how many messages completed.
    ///
    /// Exposed so tests can drive delivery deterministically; [`Self::spawn`]
    /// calls this in a loop.
    pub async fn poll_topic_once(&self, topic: &str) -> Result<usize, DispatchError> {
        let committed = self.log.committed_offset(topic, &self.config.group).await?;
        let records = self
            .log
            .read_from(topic, committed, self.config.batch_size)
            .await?;

        let mut handled = 0;
        for record in records {
            let event = match Event::from_json_bytes(&record.payload) {
                Ok(event) => event,
                Err(e) => {
                    // Poison record: committing past it beats livelocking the
                    // whole topic behind one bad payload.
                    error!(
                        topic,
                        offset = record.offset,
                        error = %e,
                        "Undecodable record, skipping"
                    );
                    self.log
                        .commit_offset(topic, &self.config.group, record.offset + 1)
                        .await?;
                    continue;
                }
            };

            self.dispatch_event(&event).await;

            self.log
                .commit_offset(topic, &self.config.group, record.offset + 1)
                .await?;
            self.processed.fetch_add(1, Ordering::Relaxed);
            EVENTS_DISPATCHED
                .with_label_values(&[topic, self.config.group.as_str()])
                .inc();

            self.emitter.emit(&event);
            handled += 1;
        }
        Ok(handled)
    }

    /// Run all matching handlers concurrently and wait for every one to
    /// settle (success or terminal failure).
    async fn dispatch_event(&self, event: &Event) {
        let _timer = HistogramTimer::new(&DISPATCH_DURATION);
        let registrations = self.registry.lookup(&event.event_type);
        if registrations.is_empty() {
            trace!(event_type = %event.event_type, "No handlers registered");
            return;
        }

        debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            handlers = registrations.len(),
            "Dispatching event"
        );

        let mut settled = JoinSet::new();
        for registration in registrations {
            let event = event.clone();
            let dlq = Arc::clone(&self.dlq);
            settled.spawn(Self::settle_handler(registration, event, dlq));
        }
        while settled.join_next().await.is_some() {}
    }

    /// Drive one handler to a settled state: retries, timeout, dead-letter.
    async fn settle_handler(registration: HandlerRegistration, event: Event, dlq: Arc<Publisher>) {
        let HandlerRegistration { handler, config } = registration;
        let attempts = config.retries + 1;
        let mut last_error: Option<HandlerError> = None;

        for attempt in 1..=attempts {
            match tokio::time::timeout(config.timeout, handler.handle(event.clone())).await {
                Ok(Ok(())) => {
                    HANDLER_INVOCATIONS.with_label_values(&["success"]).inc();
                    return;
                }
                Ok(Err(e)) => {
                    HANDLER_INVOCATIONS.with_label_values(&["failure"]).inc();
                    warn!(
                        handler = handler.name(),
                        event_id = %event.id,
                        attempt,
                        attempts,
                        error = %e,
                        "Handler attempt failed"
                    );
                    last_error = Some(e);
                }
                Err(_) => {
                    HANDLER_INVOCATIONS.with_label_values(&["timeout"]).inc();
                    warn!(
                        handler = handler.name(),
                        event_id = %event.id,
                        attempt,
                        attempts,
                        timeout_ms = config.timeout.as_millis() as u64,
                        "Handler attempt timed out"
                    );
                    last_error = Some(HandlerError::msg(format!(
                        "timed out after {}ms",
                        config.timeout.as_millis()
                    )));
                }
            }
        }

        let error = last_error.unwrap_or_else(|| HandlerError::msg("no attempts ran"));

        if !config.dlq_enabled {
            warn!(
                handler = handler.name(),
                event_id = %event.id,
                error = %error,
                "Handler exhausted retries; dead-lettering disabled, failure dropped"
            );
            return;
        }

        if event.event_type == DLQ_EVENT_TYPE {
            // Never re-queue a dead letter; that way lies an infinite loop.
            error!(
                handler = handler.name(),
                event_id = %event.id,
                error = %error,
                "Dead-letter handler failed terminally"
            );
            return;
        }

        let data = json!({
            "originalEvent": event,
            "handler": handler.name(),
            "error": error.to_string(),
        });
        match dlq.publish(EventDraft::derived_from(&event, DLQ_EVENT_TYPE, data)).await {
            Ok(dead_letter) => {
                DLQ_EVENTS.inc();
                info!(
                    handler = handler.name(),
                    event_id = %event.id,
                    dlq_id = %dead_letter.id,
                    "Event dead-lettered"
                );
            }
            Err(e) => {
                // Terminal for this attempt; a DLQ failure never recurses.
                error!(
                    handler = handler.name(),
                    event_id = %event.id,
                    error = %e,
                    "Dead-letter publish failed, dropping"
                );
            }
        }
    }

    /// Spawn one poll loop per subscribed topic.
    ///
    /// Each loop drains its current batch before honoring the shutdown
    /// signal, which gives the two-phase drain its first phase.
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(self.config.topics.len());

        for topic in self.config.topics.clone() {
            let dispatcher = Arc::clone(&self);
            let mut shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                info!(%topic, group = %dispatcher.config.group, "Dispatch loop started");
                loop {
                    if *shutdown.borrow() {
                        break;
                    }
                    match dispatcher.poll_topic_once(&topic).await {
                        // Kept pace with the log; drain the next batch now.
                        Ok(n) if n > 0 => {}
                        Ok(_) => {
                            tokio::select! {
                                () = tokio::time::sleep(dispatcher.config.poll_interval) => {}
                                _ = shutdown.changed() => {}
                            }
                        }
                        Err(e) => {
                            error!(%topic, error = %e, "Poll failed, backing off");
                            tokio::select! {
                                () = tokio::time::sleep(dispatcher.config.poll_interval) => {}
                                _ = shutdown.changed() => {}
                            }
                        }
                    }
                }
                info!(%topic, "Dispatch loop stopped");
            }));
        }
        handles
    }

    /// Messages fully dispatched by this process.
    #[must_use]
    pub fn events_processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }
}
