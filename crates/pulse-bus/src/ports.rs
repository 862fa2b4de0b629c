//! # Durable Transport Port
//!
//! The outbound port for the durable topic log, plus the in-memory adapter
//! used by tests and single-process deployments.
//!
//! ## Semantics
//!
//! - A topic is an append-only record log with dense offsets starting at 0.
//! - Appends within one topic are totally ordered; nothing is ordered across
//!   topics.
//! - Consumer groups are named committed-offset cursors: `commit_offset(t, g,
//!   n)` records that every offset below `n` has been processed by group `g`.
//!   Each group sees every record; members of one group share the cursor.
//!
//! The production adapter lives in the runtime crate (RocksDB); this crate
//! only depends on the port.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use pulse_types::TopicLogError;

/// One durable record in a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Position within the topic.
    pub offset: u64,
    /// Partition key the record was appended under.
    pub key: String,
    /// Serialized event.
    pub payload: Vec<u8>,
}

/// Append-only, offset-addressed topic storage.
#[async_trait]
pub trait TopicLog: Send + Sync {
    /// Durably append a record, returning its offset.
    async fn append(&self, topic: &str, key: &str, payload: &[u8]) -> Result<u64, TopicLogError>;

    /// Read up to `max` records starting at `offset`.
    async fn read_from(
        &self,
        topic: &str,
        offset: u64,
        max: usize,
    ) -> Result<Vec<LogRecord>, TopicLogError>;

    /// The group's cursor: the first offset not yet processed (0 initially).
    async fn committed_offset(&self, topic: &str, group: &str) -> Result<u64, TopicLogError>;

    /// Advance the group's cursor to `offset`.
    async fn commit_offset(
        &self,
        topic: &str,
        group: &str,
        offset: u64,
    ) -> Result<(), TopicLogError>;

    /// Reachability probe for the health surface and startup checks.
    async fn ping(&self) -> Result<(), TopicLogError>;
}

#[derive(Default)]
struct InMemoryInner {
    topics: HashMap<String, Vec<LogRecord>>,
    cursors: HashMap<(String, String), u64>,
}

/// Heap-backed topic log for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryTopicLog {
    inner: RwLock<InMemoryInner>,
}

impl InMemoryTopicLog {
    /// Empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records appended to a topic.
    #[must_use]
    pub fn topic_len(&self, topic: &str) -> usize {
        self.inner.read().topics.get(topic).map_or(0, Vec::len)
    }
}

#[async_trait]
impl TopicLog for InMemoryTopicLog {
    async fn append(&self, topic: &str, key: &str, payload: &[u8]) -> Result<u64, TopicLogError> {
        let mut inner = self.inner.write();
        let records = inner.topics.entry(topic.to_string()).or_default();
        let offset = records.len() as u64;
        records.push(LogRecord {
            offset,
            key: key.to_string(),
            payload: payload.to_vec(),
        });
        Ok(offset)
    }

    async fn read_from(
        &self,
        topic: &str,
        offset: u64,
        max: usize,
    ) -> Result<Vec<LogRecord>, TopicLogError> {
        let inner = self.inner.read();
        let Some(records) = inner.topics.get(topic) else {
            return Ok(Vec::new());
        };
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(records.len());
        let end = start.saturating_add(max).min(records.len());
        Ok(records[start..end].to_vec())
    }

    async fn committed_offset(&self, topic: &str, group: &str) -> Result<u64, TopicLogError> {
        let inner = self.inner.read();
        Ok(inner
            .cursors
            .get(&(topic.to_string(), group.to_string()))
            .copied()
            .unwrap_or(0))
    }

    async fn commit_offset(
        &self,
        topic: &str,
        group: &str,
        offset: u64,
    ) -> Result<(), TopicLogError> {
        let mut inner = self.inner.write();
        inner
            .cursors
            .insert((topic.to_string(), group.to_string()), offset);
        Ok(())
    }

    async fn ping(&self) -> Result<(), TopicLogError> {
        Ok(())
    }
}
