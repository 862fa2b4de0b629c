//! # Error Types
//!
//! Defines error types used across the bus crates.

use thiserror::Error;

/// Errors surfaced to a publishing caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    /// Payload rejected by the schema registry; nothing was emitted.
    #[error("Schema validation failed for {event_type}: {}", .errors.join("; "))]
    SchemaValidation {
        event_type: String,
        errors: Vec<String>,
    },

    /// Durable append failed after the bounded retry budget.
    #[error("Transport append to {topic} failed after {attempts} attempts: {cause}")]
    Transport {
        topic: String,
        attempts: u32,
        cause: String,
    },

    /// Derived-event chain exceeded the republish ceiling.
    #[error("Chain depth {depth} exceeds ceiling for {event_type}")]
    ChainDepthExceeded { event_type: String, depth: u32 },

    /// Event could not be serialized to the wire format.
    #[error("Event serialization failed: {0}")]
    Serialization(String),
}

/// Failure reported by one handler invocation.
///
/// Isolated to that handler: it never aborts sibling handlers or the
/// dispatch loop.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    /// Build from anything printable.
    #[must_use]
    pub fn msg(message: impl std::fmt::Display) -> Self {
        Self(message.to_string())
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// Errors from the durable topic log port.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TopicLogError {
    /// The backing store rejected or failed the operation.
    #[error("Topic log I/O error: {message}")]
    Io { message: String },

    /// The backing store is unreachable.
    #[error("Topic log unavailable: {cause}")]
    Unavailable { cause: String },
}

/// Errors raised while loading schema definitions at startup.
///
/// All variants are fatal: the bus must not start with a malformed registry.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Definition file could not be read.
    #[error("Failed to read schema {path}: {cause}")]
    Io { path: String, cause: String },

    /// Definition file is not valid JSON.
    #[error("Failed to parse schema {path}: {cause}")]
    Parse { path: String, cause: String },

    /// Definition is well-formed JSON but not a valid schema.
    #[error("Invalid schema definition {path}: {reason}")]
    InvalidDefinition { path: String, reason: String },
}

/// Errors from the dispatch loop.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// Reading or committing against the topic log failed.
    #[error(transparent)]
    Log(#[from] TopicLogError),

    /// A stored record did not decode into an event.
    #[error("Undecodable record at {topic}@{offset}: {cause}")]
    Decode {
        topic: String,
        offset: u64,
        cause: String,
    },
}

/// Errors raised while constructing a bus instance.
///
/// Initialization failures are fatal: the process must not start half-wired.
#[derive(Debug, Error)]
pub enum BusError {
    /// The durable transport did not answer the startup ping.
    #[error("Transport unreachable at startup: {0}")]
    TransportUnreachable(#[from] TopicLogError),

    /// The schema registry could not be loaded.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}
