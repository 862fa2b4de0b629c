//! Port implementations backing the bus process.

mod rocksdb_log;

pub use rocksdb_log::{RocksDbLogConfig, RocksDbTopicLog};
