//! # Event Model
//!
//! Defines the immutable event record that flows through the bus, plus the
//! mutable draft producers hand to the publisher.
//!
//! ## Wire Format
//!
//! Events serialize to JSON with camelCase keys:
//!
//! ```json
//! {
//!   "id": "1754500000123-9f2c44aa01b3de70",
//!   "type": "user_registered",
//!   "source": "auth-service",
//!   "timestamp": "2026-08-06T12:00:00.123Z",
//!   "version": "1.0",
//!   "data": { "id": "u1", "email": "a@b.com" },
//!   "metadata": { "correlationId": "...", "userId": "u1" }
//! }
//! ```
//!
//! An `Event` is never mutated after creation; derived events (dead letters,
//! handler chains) get a fresh id and carry the original metadata forward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Schema version stamped onto events that do not declare one.
pub const DEFAULT_EVENT_VERSION: &str = "1.0";

/// Traceability metadata carried through to any derived events.
///
/// All fields are optional; absent fields are omitted from the wire format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    /// Correlates every event in one logical flow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// The platform user the event concerns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// The tenant (platform brand) the event belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    /// Distributed-trace id, when the producer runs under tracing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    /// Hops from the original externally published event.
    ///
    /// Incremented on every derived event; the publisher rejects events past
    /// the chain-depth ceiling so handler republish cycles cannot run away.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_depth: Option<u32>,
}

impl EventMetadata {
    /// Metadata with a freshly generated correlation id.
    #[must_use]
    pub fn correlated() -> Self {
        Self {
            correlation_id: Some(Uuid::new_v4().to_string()),
            ..Self::default()
        }
    }

    /// Metadata tied to a user.
    #[must_use]
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }
}

/// An immutable event record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Globally unique id, time-prefixed for debugging-friendly ordering.
    pub id: String,

    /// Dot/underscore-namespaced event type, e.g. `user_registered`.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Identifier of the producing service.
    pub source: String,

    /// Event creation time.
    pub timestamp: DateTime<Utc>,

    /// Schema version of `data`.
    pub version: String,

    /// Opaque producer-defined payload.
    pub data: Value,

    /// Traceability metadata, carried to derived events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EventMetadata>,
}

impl Event {
    /// Generate a bus-assigned event id.
    ///
    /// Decimal unix-millisecond prefix plus a random 64-bit hex suffix. The
    /// prefix keeps ids near time-ordered for inspection; uniqueness comes
    /// from the suffix and is only required within the cache window.
    #[must_use]
    pub fn generate_id() -> String {
        let millis = Utc::now().timestamp_millis();
        format!("{}-{:016x}", millis, rand::random::<u64>())
    }

    /// Hops from the original externally published event (0 when unset).
    #[must_use]
    pub fn chain_depth(&self) -> u32 {
        self.metadata
            .as_ref()
            .and_then(|m| m.chain_depth)
            .unwrap_or(0)
    }

    /// Key the transport partitions by: tenant, then user, then event id.
    ///
    /// Events sharing a key are delivered in append order; everything else
    /// carries no ordering guarantee.
    #[must_use]
    pub fn partition_key(&self) -> &str {
        if let Some(meta) = &self.metadata {
            if let Some(tenant) = &meta.tenant_id {
                return tenant;
            }
            if let Some(user) = &meta.user_id {
                return user;
            }
        }
        &self.id
    }

    /// Serialize to the JSON wire format.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from the JSON wire format.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// A not-yet-published event.
///
/// Producers fill in what they know; the publisher stamps id, timestamp,
/// version, and source defaults before anything is emitted.
#[derive(Debug, Clone)]
pub struct EventDraft {
    /// Event type, required.
    pub event_type: String,
    /// Payload, required.
    pub data: Value,
    /// Producer-assigned id; generated when absent.
    pub id: Option<String>,
    /// Producing service; defaulted from bus configuration when absent.
    pub source: Option<String>,
    /// Creation time; defaulted to now when absent.
    pub timestamp: Option<DateTime<Utc>>,
    /// Schema version; defaulted to `"1.0"` when absent.
    pub version: Option<String>,
    /// Traceability metadata.
    pub metadata: Option<EventMetadata>,
}

impl EventDraft {
    /// Start a draft from the two required fields.
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            id: None,
            source: None,
            timestamp: None,
            version: None,
            metadata: None,
        }
    }

    /// Derive a draft from an existing event.
    ///
    /// Metadata is carried forward with the chain depth incremented; a
    /// missing correlation id is backfilled with the original event's id so
    /// the flow stays traceable.
    #[must_use]
    pub fn derived_from(original: &Event, event_type: impl Into<String>, data: Value) -> Self {
        let mut metadata = original.metadata.clone().unwrap_or_default();
        if metadata.correlation_id.is_none() {
            metadata.correlation_id = Some(original.id.clone());
        }
        metadata.chain_depth = Some(original.chain_depth() + 1);

        Self {
            metadata: Some(metadata),
            ..Self::new(event_type, data)
        }
    }

    /// Set a producer-assigned id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the producing service.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set an explicit creation time.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the schema version of `data`.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Attach traceability metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Resolved chain depth of this draft (0 when unset).
    #[must_use]
    pub fn chain_depth(&self) -> u32 {
        self.metadata
            .as_ref()
            .and_then(|m| m.chain_depth)
            .unwrap_or(0)
    }

    /// Stamp all defaults and freeze into an immutable [`Event`].
    #[must_use]
    pub fn into_event(self, default_source: &str) -> Event {
        Event {
            id: self.id.unwrap_or_else(Event::generate_id),
            event_type: self.event_type,
            source: self.source.unwrap_or_else(|| default_source.to_string()),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            version: self
                .version
                .unwrap_or_else(|| DEFAULT_EVENT_VERSION.to_string()),
            data: self.data,
            metadata: self.metadata,
        }
    }
}
