//! Prometheus metrics for the Pulse event bus.
//!
//! All metrics follow the naming convention: `pulse_bus_<metric>_<unit>`.
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., events_published_total)
//! - **Gauge**: Value that can go up or down (e.g., local_subscribers)
//! - **Histogram**: Distribution of values (e.g., publish_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // PUBLISHER METRICS
    // =========================================================================

    /// Events durably published, by type and topic
    pub static ref EVENTS_PUBLISHED: CounterVec = CounterVec::new(
        Opts::new("pulse_bus_events_published_total", "Events durably appended"),
        &["event_type", "topic"]
    ).expect("metric creation failed");

    /// Publish rejections by reason
    pub static ref PUBLISH_FAILURES: CounterVec = CounterVec::new(
        Opts::new("pulse_bus_publish_failures_total", "Publish attempts rejected"),
        &["reason"]  // reason: schema/transport/chain_depth
    ).expect("metric creation failed");

    /// Transport append retries
    pub static ref TRANSPORT_RETRIES: Counter = Counter::new(
        "pulse_bus_transport_retries_total",
        "Durable append attempts that were retried"
    ).expect("metric creation failed");

    /// Publish duration histogram (stamp through durable append)
    pub static ref PUBLISH_DURATION: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "pulse_bus_publish_duration_seconds",
            "Time spent publishing an event"
        ).buckets(exponential_buckets(0.0001, 2.0, 14).unwrap())
    ).expect("metric creation failed");

    // =========================================================================
    // DISPATCHER METRICS
    // =========================================================================

    /// Messages fully dispatched (all handlers settled, offset committed)
    pub static ref EVENTS_DISPATCHED: CounterVec = CounterVec::new(
        Opts::new("pulse_bus_events_dispatched_total", "Messages dispatched to completion"),
        &["topic", "group"]
    ).expect("metric creation failed");

    /// Handler invocation attempts by outcome
    pub static ref HANDLER_INVOCATIONS: CounterVec = CounterVec::new(
        Opts::new("pulse_bus_handler_invocations_total", "Handler invocation attempts"),
        &["outcome"]  // outcome: success/failure/timeout
    ).expect("metric creation failed");

    /// Dead-letter events published
    pub static ref DLQ_EVENTS: Counter = Counter::new(
        "pulse_bus_dlq_events_total",
        "Dead-letter events published after handler exhaustion"
    ).expect("metric creation failed");

    /// Dispatch duration per message (deserialize through commit)
    pub static ref DISPATCH_DURATION: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "pulse_bus_dispatch_duration_seconds",
            "Time spent dispatching one message"
        ).buckets(exponential_buckets(0.0001, 2.0, 14).unwrap())
    ).expect("metric creation failed");

    // =========================================================================
    // LOCAL PATH METRICS
    // =========================================================================

    /// Active in-process subscribers
    pub static ref LOCAL_SUBSCRIBERS: Gauge = Gauge::new(
        "pulse_bus_local_subscribers",
        "Active in-process subscribers across all channels"
    ).expect("metric creation failed");
}

/// Handle for the registered metrics
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Publisher
        Box::new(EVENTS_PUBLISHED.clone()),
        Box::new(PUBLISH_FAILURES.clone()),
        Box::new(TRANSPORT_RETRIES.clone()),
        Box::new(PUBLISH_DURATION.clone()),
        // Dispatcher
        Box::new(EVENTS_DISPATCHED.clone()),
        Box::new(HANDLER_INVOCATIONS.clone()),
        Box::new(DLQ_EVENTS.clone()),
        Box::new(DISPATCH_DURATION.clone()),
        // Local path
        Box::new(LOCAL_SUBSCRIBERS.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}
