//! # Pulse Bus Process
//!
//! Entry point for the event coordination bus. See the crate docs for the
//! startup sequence.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use pulse_bus::EventBus;
use pulse_runtime::adapters::{RocksDbLogConfig, RocksDbTopicLog};
use pulse_runtime::config::BusNodeConfig;
use pulse_telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry_config = TelemetryConfig::from_env();
    let _metrics = init_telemetry(&telemetry_config)
        .map_err(|e| anyhow::anyhow!("Telemetry initialization failed: {e}"))?;

    let config = load_config();
    config.validate().context("Invalid configuration")?;

    info!("===========================================");
    info!("  Pulse Event Bus v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");
    info!("Source:     {}", config.publish.source);
    info!("Group:      {}", config.dispatch.group);
    info!("Data Dir:   {:?}", config.broker.data_dir);
    info!("Schema Dir: {:?}", config.schema_dir);

    // Transport failure at initialization is fatal.
    let log = Arc::new(
        RocksDbTopicLog::open(RocksDbLogConfig {
            path: config.broker.data_dir.display().to_string(),
            sync_writes: config.broker.sync_writes,
            ..RocksDbLogConfig::default()
        })
        .context("Failed to open the durable topic log")?,
    );
    let cache = Arc::new(config.build_cache());

    let bus = EventBus::new(config.to_bus_config(), log, cache)
        .await
        .context("Failed to construct the event bus")?;
    let dispatcher = bus.start_dispatcher();

    let report = bus.health().await;
    match serde_json::to_string(&report) {
        Ok(rendered) => info!(health = %rendered, "Bus started"),
        Err(e) => error!(error = %e, "Health report failed to serialize"),
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    bus.shutdown(dispatcher).await;
    Ok(())
}

/// Load configuration from defaults and `PULSE_*` environment variables.
fn load_config() -> BusNodeConfig {
    let mut config = BusNodeConfig::default();

    if let Ok(dir) = std::env::var("PULSE_DATA_DIR") {
        config.broker.data_dir = PathBuf::from(dir);
    }
    if let Ok(sync) = std::env::var("PULSE_SYNC_WRITES") {
        config.broker.sync_writes = sync != "0" && !sync.eq_ignore_ascii_case("false");
    }
    if let Ok(source) = std::env::var("PULSE_SOURCE") {
        config.publish.source = source;
    }
    if let Ok(validate) = std::env::var("PULSE_VALIDATE") {
        config.publish.validate = validate != "0" && !validate.eq_ignore_ascii_case("false");
    }
    if let Ok(group) = std::env::var("PULSE_GROUP") {
        config.dispatch.group = group;
    }
    if let Ok(dir) = std::env::var("PULSE_SCHEMA_DIR") {
        config.schema_dir = Some(PathBuf::from(dir));
    }
    if let Ok(keywords) = std::env::var("PULSE_PLATFORM_KEYWORDS") {
        config.platform_keywords = keywords
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Ok(ttl) = std::env::var("PULSE_CACHE_TTL_SECS") {
        if let Ok(parsed) = ttl.parse() {
            config.cache.ttl_secs = parsed;
        }
    }
    if let Ok(cap) = std::env::var("PULSE_CACHE_RECENT_CAP") {
        if let Ok(parsed) = cap.parse() {
            config.cache.recent_cap = parsed;
        }
    }

    config
}
