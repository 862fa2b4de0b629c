//! # RocksDB Topic Log Adapter
//!
//! Production implementation of the `TopicLog` port.
//!
//! ## Keyspace
//!
//! One default column family with prefixed keys:
//!
//! - `log:{topic}:{offset:020}` - record frames, offsets zero-padded so
//!   lexicographic iteration equals numeric order
//! - `meta:{topic}:next` - next offset to assign (big-endian u64)
//! - `grp:{topic}:{group}` - committed group cursors (big-endian u64)
//!
//! ## Durability
//!
//! Appends write the record and the bumped offset counter in one
//! `WriteBatch`; `sync_writes` controls fsync-per-write. A record frame is
//! `[key_len: u32 BE][partition key][payload]`.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use tracing::info;

use pulse_bus::{LogRecord, TopicLog};
use pulse_types::TopicLogError;

/// RocksDB tuning for the topic log.
#[derive(Debug, Clone)]
pub struct RocksDbLogConfig {
    /// Path to the database directory.
    pub path: String,
    /// Write buffer size in bytes (default: 64MB).
    pub write_buffer_size: usize,
    /// Maximum number of write buffers (default: 3).
    pub max_write_buffer_number: i32,
    /// Enable fsync after each write (default: true for durability).
    pub sync_writes: bool,
}

impl Default for RocksDbLogConfig {
    fn default() -> Self {
        Self {
            path: "./data/pulse-log".to_string(),
            write_buffer_size: 64 * 1024 * 1024, // 64MB
            max_write_buffer_number: 3,
            sync_writes: true,
        }
    }
}

impl RocksDbLogConfig {
    /// Config for testing (small buffers, no sync).
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            write_buffer_size: 4 * 1024 * 1024, // 4MB
            max_write_buffer_number: 2,
            sync_writes: false,
        }
    }
}

/// RocksDB-backed durable topic log.
pub struct RocksDbTopicLog {
    db: Arc<RwLock<DB>>,
    config: RocksDbLogConfig,
}

impl RocksDbTopicLog {
    /// Open or create the database.
    pub fn open(config: RocksDbLogConfig) -> Result<Self, TopicLogError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let db = DB::open(&opts, &config.path).map_err(|e| TopicLogError::Unavailable {
            cause: format!("Failed to open RocksDB at {}: {e}", config.path),
        })?;

        info!(path = %config.path, sync_writes = config.sync_writes, "Topic log opened");
        Ok(Self {
            db: Arc::new(RwLock::new(db)),
            config,
        })
    }

    fn record_key(topic: &str, offset: u64) -> Vec<u8> {
        format!("log:{topic}:{offset:020}").into_bytes()
    }

    fn record_prefix(topic: &str) -> Vec<u8> {
        format!("log:{topic}:").into_bytes()
    }

    fn next_offset_key(topic: &str) -> Vec<u8> {
        format!("meta:{topic}:next").into_bytes()
    }

    fn cursor_key(topic: &str, group: &str) -> Vec<u8> {
        format!("grp:{topic}:{group}").into_bytes()
    }

    fn encode_frame(key: &str, payload: &[u8]) -> Vec<u8> {
        let key_bytes = key.as_bytes();
        let mut frame = Vec::with_capacity(4 + key_bytes.len() + payload.len());
        frame.extend_from_slice(&u32::try_from(key_bytes.len()).unwrap_or(0).to_be_bytes());
        frame.extend_from_slice(key_bytes);
        frame.extend_from_slice(payload);
        frame
    }

    fn decode_frame(frame: &[u8]) -> Result<(String, Vec<u8>), TopicLogError> {
        if frame.len() < 4 {
            return Err(TopicLogError::Io {
                message: "Record frame shorter than its header".to_string(),
            });
        }
        let key_len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        if frame.len() < 4 + key_len {
            return Err(TopicLogError::Io {
                message: "Record frame shorter than its declared key".to_string(),
            });
        }
        let key = String::from_utf8(frame[4..4 + key_len].to_vec()).map_err(|e| {
            TopicLogError::Io {
                message: format!("Record key is not UTF-8: {e}"),
            }
        })?;
        Ok((key, frame[4 + key_len..].to_vec()))
    }

    fn decode_offset(value: &[u8]) -> u64 {
        let mut bytes = [0u8; 8];
        if value.len() == 8 {
            bytes.copy_from_slice(value);
        }
        u64::from_be_bytes(bytes)
    }

    fn write_opts(&self) -> rocksdb::WriteOptions {
        let mut write_opts = rocksdb::WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        write_opts
    }
}

#[async_trait]
impl TopicLog for RocksDbTopicLog {
    async fn append(&self, topic: &str, key: &str, payload: &[u8]) -> Result<u64, TopicLogError> {
        let db = self.db.write();

        let next_key = Self::next_offset_key(topic);
        let offset = db
            .get(&next_key)
            .map_err(|e| TopicLogError::Io {
                message: format!("Offset counter read failed: {e}"),
            })?
            .map_or(0, |v| Self::decode_offset(&v));

        let mut batch = WriteBatch::default();
        batch.put(
            Self::record_key(topic, offset),
            Self::encode_frame(key, payload),
        );
        batch.put(&next_key, (offset + 1).to_be_bytes());

        db.write_opt(batch, &self.write_opts())
            .map_err(|e| TopicLogError::Io {
                message: format!("Append to {topic} failed: {e}"),
            })?;

        Ok(offset)
    }

    async fn read_from(
        &self,
        topic: &str,
        offset: u64,
        max: usize,
    ) -> Result<Vec<LogRecord>, TopicLogError> {
        let db = self.db.read();
        let prefix = Self::record_prefix(topic);
        let start = Self::record_key(topic, offset);
        let mut records = Vec::new();

        let iter = db.iterator(IteratorMode::From(&start, Direction::Forward));
        for item in iter {
            let (record_key, frame) = item.map_err(|e| TopicLogError::Io {
                message: format!("Scan of {topic} failed: {e}"),
            })?;
            if !record_key.starts_with(&prefix) || records.len() >= max {
                break;
            }

            // Offset is the zero-padded decimal tail of the key.
            let tail = &record_key[record_key.len().saturating_sub(20)..];
            let record_offset = std::str::from_utf8(tail)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or_else(|| TopicLogError::Io {
                    message: "Unparseable record key".to_string(),
                })?;

            let (partition_key, payload) = Self::decode_frame(&frame)?;
            records.push(LogRecord {
                offset: record_offset,
                key: partition_key,
                payload,
            });
        }
        Ok(records)
    }

    async fn committed_offset(&self, topic: &str, group: &str) -> Result<u64, TopicLogError> {
        let db = self.db.read();
        let value = db
            .get(Self::cursor_key(topic, group))
            .map_err(|e| TopicLogError::Io {
                message: format!("Cursor read failed: {e}"),
            })?;
        Ok(value.map_or(0, |v| Self::decode_offset(&v)))
    }

    async fn commit_offset(
        &self,
        topic: &str,
        group: &str,
        offset: u64,
    ) -> Result<(), TopicLogError> {
        let db = self.db.write();
        db.put_opt(
            Self::cursor_key(topic, group),
            offset.to_be_bytes(),
            &self.write_opts(),
        )
        .map_err(|e| TopicLogError::Io {
            message: format!("Cursor commit failed: {e}"),
        })
    }

    async fn ping(&self) -> Result<(), TopicLogError> {
        let db = self.db.read();
        db.get(b"meta:ping").map(|_| ()).map_err(|e| {
            TopicLogError::Unavailable {
                cause: e.to_string(),
            }
        })
    }
}
