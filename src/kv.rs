//! Storage traits
//!
//! The generic read/write contract shared by the database handle, batches
//! and snapshots, so code can be written against "something readable" or
//! "something writable".

use crate::error::Result;

/// Point reads
pub trait KeyValueReader {
    /// Whether `key` is present
    fn has(&self, key: &[u8]) -> Result<bool>;

    /// Value for `key`; `Ok(None)` when absent
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
}

/// Point writes
pub trait KeyValueWriter {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    fn delete(&mut self, key: &[u8]) -> Result<()>;
}
