//! # Pulse Types - Shared Event Model
//!
//! The event record, draft builder, and error taxonomy shared by every crate
//! in the workspace. Kept free of transport and runtime concerns so both the
//! bus core and external producers can depend on it cheaply.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod errors;
pub mod event;

pub use errors::{
    BusError, DispatchError, HandlerError, PublishError, SchemaError, TopicLogError,
};
pub use event::{Event, EventDraft, EventMetadata, DEFAULT_EVENT_VERSION};
