//! # Handler Registry
//!
//! Maps an event type to the ordered list of registered handlers and their
//! per-handler dispatch policy.
//!
//! Registration order is preserved for inspection only; execution order is
//! undefined because the dispatcher invokes all matching handlers
//! concurrently. Duplicate registrations are kept: registering the same
//! handler twice invokes it twice per event.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use pulse_types::{Event, HandlerError};

/// An event consumer attached to the bus.
///
/// Handlers must be idempotent: delivery is at-least-once and a redelivered
/// message re-invokes every handler.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Process one event. An `Err` counts as a failed attempt and is retried
    /// per the registration's [`HandlerConfig`].
    async fn handle(&self, event: Event) -> Result<(), HandlerError>;

    /// Name used in logs and dead-letter payloads.
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// Per-registration dispatch policy.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Retry attempts after the first failure.
    pub retries: u32,
    /// Budget for one invocation; a handler that never resolves counts as
    /// failed once this elapses.
    pub timeout: Duration,
    /// Whether terminal failure publishes a dead-letter event. When false
    /// the failure is logged and dropped (intentional loss for non-critical
    /// handlers).
    pub dlq_enabled: bool,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            timeout: Duration::from_secs(30),
            dlq_enabled: true,
        }
    }
}

impl HandlerConfig {
    /// Policy for handlers whose failures may be dropped.
    #[must_use]
    pub fn best_effort() -> Self {
        Self {
            dlq_enabled: false,
            ..Self::default()
        }
    }
}

/// One handler attached to one event type.
#[derive(Clone)]
pub struct HandlerRegistration {
    /// The handler itself.
    pub handler: Arc<dyn EventHandler>,
    /// Its dispatch policy.
    pub config: HandlerConfig,
}

/// Type-to-handlers map, owned by one bus instance.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Vec<HandlerRegistration>>>,
}

impl HandlerRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a registration for an event type.
    pub fn register(
        &self,
        event_type: &str,
        handler: Arc<dyn EventHandler>,
        config: HandlerConfig,
    ) {
        debug!(
            event_type,
            handler = handler.name(),
            retries = config.retries,
            dlq = config.dlq_enabled,
            "Handler registered"
        );
        self.handlers
            .write()
            .entry(event_type.to_string())
            .or_default()
            .push(HandlerRegistration { handler, config });
    }

    /// All registrations for an event type, in registration order.
    #[must_use]
    pub fn lookup(&self, event_type: &str) -> Vec<HandlerRegistration> {
        self.handlers
            .read()
            .get(event_type)
            .cloned()
            .unwrap_or_default()
    }

    /// Remove every registration for an event type, returning how many were
    /// dropped. Supported for clean shutdown and test isolation.
    pub fn unregister(&self, event_type: &str) -> usize {
        self.handlers
            .write()
            .remove(event_type)
            .map_or(0, |registrations| registrations.len())
    }

    /// Total registrations across all event types (health surface).
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.read().values().map(Vec::len).sum()
    }
}

type BoxedHandlerFn = dyn Fn(Event) -> Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send>>
    + Send
    + Sync;

/// Adapter turning an async closure into an [`EventHandler`].
pub struct FnHandler {
    name: String,
    func: Box<BoxedHandlerFn>,
}

impl FnHandler {
    /// Wrap a closure returning a handler future.
    pub fn new<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(move |event| Box::pin(func(event))),
        }
    }
}

#[async_trait]
impl EventHandler for FnHandler {
    async fn handle(&self, event: Event) -> Result<(), HandlerError> {
        (self.func)(event).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
