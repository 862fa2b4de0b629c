//! # Pulse Telemetry
//!
//! Observability for the Pulse event bus.
//!
//! ## Components
//!
//! - **Metrics**: Prometheus counters/histograms under the `pulse_bus_*`
//!   namespace, with a text encoder for scraping
//! - **Tracing**: `tracing-subscriber` initialization (JSON or pretty output,
//!   `RUST_LOG`-aware filtering)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pulse_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! let _metrics = init_telemetry(&config).expect("telemetry init failed");
//! ```

pub mod metrics;
mod tracing_setup;

pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, MetricsHandle, DISPATCH_DURATION,
    DLQ_EVENTS, EVENTS_DISPATCHED, EVENTS_PUBLISHED, HANDLER_INVOCATIONS, LOCAL_SUBSCRIBERS,
    PUBLISH_DURATION, PUBLISH_FAILURES, TRANSPORT_RETRIES,
};
pub use tracing_setup::init_tracing;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Telemetry configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name stamped into the startup log line.
    pub service_name: String,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Emit JSON log lines instead of pretty output.
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "pulse-bus".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Build from `PULSE_LOG_LEVEL` / `PULSE_JSON_LOGS` environment
    /// variables, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(level) = std::env::var("PULSE_LOG_LEVEL") {
            config.log_level = level;
        }
        if let Ok(json) = std::env::var("PULSE_JSON_LOGS") {
            config.json_logs = json == "1" || json.eq_ignore_ascii_case("true");
        }
        config
    }
}

/// Initialize metrics and tracing together.
///
/// Returns the metrics handle; keep it for the life of the process.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<MetricsHandle, TelemetryError> {
    let handle = register_metrics()?;
    init_tracing(config)?;
    Ok(handle)
}
