//! # Pulse Runtime
//!
//! The bus process: configuration, the RocksDB-backed topic log adapter, and
//! the wiring that turns the bus core into a running service.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (metrics + tracing)
//! 2. Load configuration from defaults and `PULSE_*` environment variables
//! 3. Validate configuration
//! 4. Open the durable topic log (fatal on failure)
//! 5. Construct the bus (fatal when the transport or schema registry is bad)
//! 6. Start the dispatch loops and wait for ctrl-c
//! 7. Two-phase drain on shutdown

pub mod adapters;
pub mod config;

pub use adapters::{RocksDbLogConfig, RocksDbTopicLog};
pub use config::{BusNodeConfig, ConfigError};
