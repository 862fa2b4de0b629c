//! # Bus Process Configuration
//!
//! Unified configuration for the bus process, with sane defaults and
//! environment overrides (see `load_config` in `main.rs`).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use pulse_bus::{
    BusConfig, DispatcherConfig, PublisherConfig, RecencyCache, DEFAULT_PLATFORM_KEYWORDS,
};

/// Complete bus process configuration.
#[derive(Debug, Clone, Default)]
pub struct BusNodeConfig {
    /// Durable transport configuration.
    pub broker: BrokerConfig,
    /// Recency cache configuration.
    pub cache: CacheConfig,
    /// Publish pipeline configuration.
    pub publish: PublishConfig,
    /// Dispatch loop configuration.
    pub dispatch: DispatchConfig,
    /// Directory of schema definition files.
    pub schema_dir: Option<PathBuf>,
    /// Platform brand names recognized by the topic router.
    pub platform_keywords: Vec<String>,
}

impl BusNodeConfig {
    /// Validate configuration before start.
    ///
    /// # Returns
    ///
    /// Returns `Err` if the producing-service name or consumer group is
    /// blank, or a configured schema directory does not exist.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.publish.source.trim().is_empty() {
            return Err(ConfigError::BlankSource);
        }
        if self.dispatch.group.trim().is_empty() {
            return Err(ConfigError::BlankGroup);
        }
        if let Some(dir) = &self.schema_dir {
            if !dir.is_dir() {
                return Err(ConfigError::MissingSchemaDir {
                    path: dir.display().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Assemble the bus-core configuration.
    #[must_use]
    pub fn to_bus_config(&self) -> BusConfig {
        let platform_keywords = if self.platform_keywords.is_empty() {
            DEFAULT_PLATFORM_KEYWORDS
                .iter()
                .map(|k| (*k).to_string())
                .collect()
        } else {
            self.platform_keywords.clone()
        };

        BusConfig {
            publisher: PublisherConfig {
                source: self.publish.source.clone(),
                validate: self.publish.validate,
                max_attempts: self.publish.max_attempts,
                base_backoff: Duration::from_millis(self.publish.base_backoff_ms),
                max_backoff: Duration::from_millis(self.publish.max_backoff_ms),
                ..PublisherConfig::default()
            },
            dispatcher: DispatcherConfig {
                group: self.dispatch.group.clone(),
                poll_interval: Duration::from_millis(self.dispatch.poll_interval_ms),
                batch_size: self.dispatch.batch_size,
                ..DispatcherConfig::default()
            },
            platform_keywords,
            schema_dir: self.schema_dir.clone(),
            shutdown_grace: Duration::from_secs(self.dispatch.shutdown_grace_secs),
            ..BusConfig::default()
        }
    }

    /// Build the shared recency cache from the cache settings.
    #[must_use]
    pub fn build_cache(&self) -> RecencyCache {
        RecencyCache::with_config(
            Duration::from_secs(self.cache.ttl_secs),
            self.cache.recent_cap,
            Duration::from_secs(self.cache.gc_interval_secs),
        )
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The producing-service name is blank.
    #[error("PULSE_SOURCE must not be blank")]
    BlankSource,

    /// The consumer group is blank.
    #[error("PULSE_GROUP must not be blank")]
    BlankGroup,

    /// A schema directory was configured but does not exist.
    #[error("Schema directory {path} does not exist")]
    MissingSchemaDir { path: String },
}

/// Durable transport configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Data directory for the topic log.
    pub data_dir: PathBuf,
    /// fsync after each write.
    pub sync_writes: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/pulse-log"),
            sync_writes: true,
        }
    }
}

/// Recency cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entry lifetime in seconds.
    pub ttl_secs: u64,
    /// Recent-id list cap per event type.
    pub recent_cap: usize,
    /// Sweep interval in seconds.
    pub gc_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            recent_cap: 100,
            gc_interval_secs: 60,
        }
    }
}

/// Publish pipeline configuration.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    /// Source stamped onto events that do not name one.
    pub source: String,
    /// Whether schema validation gates publishes.
    pub validate: bool,
    /// Durable append attempts before surfacing a transport error.
    pub max_attempts: u32,
    /// First retry delay in milliseconds.
    pub base_backoff_ms: u64,
    /// Retry delay ceiling in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            source: "event-bus".to_string(),
            validate: true,
            max_attempts: 5,
            base_backoff_ms: 50,
            max_backoff_ms: 2000,
        }
    }
}

/// Dispatch loop configuration.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Consumer group this process belongs to.
    pub group: String,
    /// Idle wait between polls in milliseconds.
    pub poll_interval_ms: u64,
    /// Records read per poll.
    pub batch_size: usize,
    /// Shutdown drain grace period in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            group: "pulse-core".to_string(),
            poll_interval_ms: 50,
            batch_size: 64,
            shutdown_grace_secs: 10,
        }
    }
}
