//! # Pulse Test Suite
//!
//! Unified test crate for the event bus workspace.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── support.rs        # Shared fixtures: buses, handlers, fault injection
//! └── integration/      # Cross-component suites
//!     ├── routing.rs        # Topic routing, id volume, schema gate
//!     ├── delivery.rs       # At-least-once, groups, dual delivery paths
//!     ├── dead_letter.rs    # DLQ flow and per-handler granularity
//!     ├── cache_behavior.rs # TTL and bounded recent lists
//!     ├── flows.rs          # Creator-economy event chains
//!     └── durable_log.rs    # End-to-end over the RocksDB adapter
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p pulse-tests
//!
//! # By suite
//! cargo test -p pulse-tests integration::delivery::
//! ```

#![allow(dead_code)]

pub mod support;
