//! # Pulse Bus - Event Coordination Core
//!
//! Accepts typed events from producers across the ecosystem, validates them,
//! durably routes them through topic partitions, fans them out to registered
//! handlers with isolated failure handling and dead-lettering, and maintains
//! a bounded recency cache for query-time lookups.
//!
//! ## Data Flow
//!
//! ```text
//! Producer ──publish()──→ ┌───────────────────────────────┐
//!                         │ Publisher                     │
//!                         │  stamp → validate → route     │
//!                         │  → durable append → cache     │
//!                         │  → local emit                 │
//!                         └──────────────┬────────────────┘
//!                                        ▼
//!                                 durable topic log
//!                                        │
//!                         ┌──────────────▼────────────────┐
//!                         │ Dispatcher (per topic, group) │
//!                         │  handlers run concurrently    │
//!                         │  retry → timeout → DLQ        │
//!                         │  commit after settle          │
//!                         └───────────────────────────────┘
//! ```
//!
//! ## Delivery Guarantees
//!
//! At-least-once on the durable path: the group cursor commits only after
//! every handler settles, so a crash before commit redelivers. Handlers must
//! be idempotent. The local emitter is a second, best-effort channel with no
//! durability; in-process listeners relying on it alone miss events
//! delivered to other processes.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bus;
pub mod cache;
pub mod dispatcher;
pub mod emitter;
pub mod health;
pub mod ports;
pub mod publisher;
pub mod registry;
pub mod router;
pub mod schema;

// Re-export main types
pub use bus::{BusConfig, DispatcherHandle, EventBus};
pub use cache::RecencyCache;
pub use dispatcher::{Dispatcher, DispatcherConfig, DLQ_EVENT_TYPE};
pub use emitter::{LocalEmitter, LocalSubscription, WILDCARD_CHANNEL};
pub use health::{HealthMetrics, HealthReport, HealthState, ServiceHealth};
pub use ports::{InMemoryTopicLog, LogRecord, TopicLog};
pub use publisher::{Publisher, PublisherConfig, MAX_CHAIN_DEPTH};
pub use registry::{EventHandler, FnHandler, HandlerConfig, HandlerRegistration, HandlerRegistry};
pub use router::{TopicRouter, ALL_TOPICS, DEFAULT_PLATFORM_KEYWORDS, SYSTEM_TOPIC};
pub use schema::{CompiledSchema, SchemaRegistry};

// Re-export the shared model so consumers need one import.
pub use pulse_types::{Event, EventDraft, EventMetadata, HandlerError, PublishError};
