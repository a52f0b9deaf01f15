//! Database Module
//!
//! The storage handle handed to the embedding application.
//!
//! ## Responsibilities
//! - Point operations, passed straight through to the store
//! - Constructing batches, prefix iterators and snapshots on demand
//! - Diagnostics (`stat`) and lifecycle (`close`)

use std::sync::Arc;
use std::time::Duration;

use crate::batch::Batch;
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::Result;
use crate::iterator::PrefixIterator;
use crate::kv::{KeyValueReader, KeyValueWriter};
use crate::scan::ReadOptions;
use crate::snapshot::Snapshot;
use crate::store::{RedisStore, RemoteStore, SharedStore};

/// Key-value database on top of a remote cache
///
/// ## Concurrency Model
/// - The handle is `Send + Sync`; the store underneath pools connections,
///   so concurrent callers each get their own round trip
/// - Batches are owned by one writer at a time (`&mut self` to append)
/// - Iterators and snapshots own private copies of what they captured
pub struct Database {
    store: SharedStore,
    options: ReadOptions,
}

impl Database {
    /// Connect to the configured endpoint
    ///
    /// Authenticates, selects the database and pings; fails if any of
    /// those fail.
    pub fn open(config: Config) -> Result<Self> {
        let options = ReadOptions::from(&config);
        let store = RedisStore::connect(config)?;
        Ok(Self::with_store(Arc::new(store), options))
    }

    /// Wrap an existing store
    pub fn with_store(store: SharedStore, options: ReadOptions) -> Self {
        Self { store, options }
    }

    /// Shared handle to the underlying store
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn read_options(&self) -> &ReadOptions {
        &self.options
    }

    // =========================================================================
    // Point Operations
    // =========================================================================

    /// Whether `key` is present
    pub fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.store.exists(&[key])? > 0)
    }

    /// Value for `key`; `Ok(None)` when absent
    ///
    /// An absent key and a stored empty value are distinct: the latter is
    /// `Ok(Some(vec![]))`.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.store.get(key)
    }

    /// Store `value` under `key`, without expiry
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.store.set(key, value, None)
    }

    /// Store `value` under `key`, expiring after `ttl`
    pub fn put_with_expiry(&self, key: &[u8], value: &[u8], ttl: Duration) -> Result<()> {
        self.store.set(key, value, Some(ttl))
    }

    /// Remove `key`; removing an absent key is not an error
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.store.delete(&[key])?;
        Ok(())
    }

    // =========================================================================
    // Batches
    // =========================================================================

    pub fn new_batch(&self) -> Batch {
        Batch::new(Arc::clone(&self.store))
    }

    /// Batch with room for `size` ops before reallocating
    pub fn new_batch_with_size(&self, size: usize) -> Batch {
        Batch::with_capacity(Arc::clone(&self.store), size)
    }

    // =========================================================================
    // Iterators
    // =========================================================================

    /// Iterate keys starting with `prefix` and `>= start`, in ascending order
    pub fn new_iterator(&self, prefix: &[u8], start: &[u8]) -> Result<PrefixIterator> {
        self.new_iterator_with(prefix, start, CancelToken::new())
    }

    pub fn new_iterator_with(
        &self,
        prefix: &[u8],
        start: &[u8],
        cancel: CancelToken,
    ) -> Result<PrefixIterator> {
        PrefixIterator::new(
            Arc::clone(&self.store),
            prefix,
            start,
            self.options.clone(),
            cancel,
        )
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Capture the whole keyspace
    pub fn new_snapshot(&self) -> Result<Snapshot> {
        self.new_snapshot_with_prefix(&[])
    }

    /// Capture the keys under `prefix`
    pub fn new_snapshot_with_prefix(&self, prefix: &[u8]) -> Result<Snapshot> {
        self.new_snapshot_with(prefix, &CancelToken::new())
    }

    pub fn new_snapshot_with(&self, prefix: &[u8], cancel: &CancelToken) -> Result<Snapshot> {
        Snapshot::capture(self.store.as_ref(), prefix, &self.options, cancel)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Backend configuration matching `property`, as sorted `name: value` lines
    pub fn stat(&self, property: &str) -> Result<String> {
        let mut settings: Vec<(String, String)> =
            self.store.config_get(property)?.into_iter().collect();
        settings.sort();

        Ok(settings
            .iter()
            .map(|(name, value)| format!("{}: {}", name, value))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// No-op: the backend manages its own storage
    pub fn compact(&self, _start: &[u8], _limit: &[u8]) -> Result<()> {
        Ok(())
    }

    /// Release the store's connections
    pub fn close(&self) -> Result<()> {
        tracing::debug!("Closing database");
        self.store.close()
    }
}

impl KeyValueReader for Database {
    fn has(&self, key: &[u8]) -> Result<bool> {
        Database::has(self, key)
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Database::get(self, key)
    }
}

impl KeyValueWriter for Database {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        Database::put(self, key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        Database::delete(self, key)
    }
}
