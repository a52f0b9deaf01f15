//! Store Module
//!
//! The primitive capability set of the remote cache backend.
//!
//! ## Responsibilities
//! - Point operations: exists, get, set, delete
//! - Bulk reads: multi-get aligned by input index
//! - Ordered write pipelines with per-op results
//! - Cursor-based, unordered, paginated key scans
//!
//! Everything above this layer (batches, ordered iteration, snapshots) is
//! built only from these primitives. Two implementations ship:
//! [`RedisStore`] talks RESP over pooled TCP connections, [`MemoryStore`] is
//! an in-process fake with the same contract.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

mod memory;
mod redis;

pub use memory::{FailPoint, MemoryStore};
pub use redis::RedisStore;

/// Shared handle to a store, as held by every component
pub type SharedStore = Arc<dyn RemoteStore>;

/// Kind of a write operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Put,
    Delete,
}

/// One write inside a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOp {
    pub kind: OpKind,
    pub key: Vec<u8>,

    /// Empty for deletes
    pub value: Vec<u8>,
}

impl WriteOp {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: OpKind::Put,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: OpKind::Delete,
            key: key.into(),
            value: Vec::new(),
        }
    }
}

/// Per-op outcome of a pipeline; `Err` carries the backend's message
pub type OpResult = std::result::Result<(), String>;

/// Backend primitives
///
/// Implementations must be safe to share between threads. A call either
/// completes or fails with the transport/backend error; nothing is retried.
pub trait RemoteStore: Send + Sync {
    /// Count how many of `keys` exist
    fn exists(&self, keys: &[&[u8]]) -> Result<u64>;

    /// Read one value; `Ok(None)` when the key is absent
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Read many values, aligned by input index; absent keys are `None`
    fn multi_get(&self, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>>;

    /// Store a value; `None` or a zero expiry keeps it forever
    fn set(&self, key: &[u8], value: &[u8], expiry: Option<Duration>) -> Result<()>;

    /// Delete keys, returning how many existed
    fn delete(&self, keys: &[&[u8]]) -> Result<u64>;

    /// Apply writes in order as one round trip
    ///
    /// `Err` means the pipeline as a whole failed (transport); otherwise the
    /// result holds one entry per op.
    fn pipeline(&self, ops: &[WriteOp]) -> Result<Vec<OpResult>>;

    /// One scan page: keys matching the glob `pattern`, plus the next cursor
    ///
    /// A returned cursor of 0 ends the scan. Pages are unordered and may
    /// repeat keys; `count` is only a hint.
    fn scan(&self, cursor: u64, pattern: &[u8], count: usize) -> Result<(u64, Vec<Vec<u8>>)>;

    /// Read configuration parameters matching `parameter`
    fn config_get(&self, parameter: &str) -> Result<HashMap<String, String>>;

    /// Health check
    fn ping(&self) -> Result<()>;

    /// Release connections; later calls fail with `BridgeError::Closed`
    fn close(&self) -> Result<()>;
}
