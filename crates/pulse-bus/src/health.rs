//! # Health Surface
//!
//! The single aggregate signal the bus exposes to the outside. Dashboards
//! and alerting built on top of it are out of scope; this is just the
//! structure they read.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Aggregate bus state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Every required backing service answered.
    Healthy,
    /// At least one required backing service is unreachable.
    Unhealthy,
}

/// Reachability of the required backing services.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    /// Durable transport answered its ping.
    pub broker: bool,
    /// Recency cache answered its probe.
    pub cache: bool,
}

/// Counters exposed for external dashboards.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthMetrics {
    /// Messages fully dispatched by this process.
    pub events_processed: u64,
    /// Handler registrations currently attached.
    pub handlers_registered: usize,
    /// Schemas loaded at startup.
    pub schemas_loaded: usize,
}

/// The health query result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Aggregate state.
    pub status: HealthState,
    /// Per-service reachability.
    pub services: ServiceHealth,
    /// Exposed counters.
    pub metrics: HealthMetrics,
    /// When the report was taken.
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    /// Build a report; status aggregates the service checks.
    #[must_use]
    pub fn evaluate(services: ServiceHealth, metrics: HealthMetrics) -> Self {
        let status = if services.broker && services.cache {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        };
        Self {
            status,
            services,
            metrics,
            timestamp: Utc::now(),
        }
    }
}
