//! Snapshot Module
//!
//! A read-only copy of (part of) the keyspace, captured eagerly.
//!
//! ## Consistency
//! The backend has no transactions or MVCC, so a snapshot is built in two
//! separate phases: enumerate the keys, then fetch their values in MGET
//! windows. A key written by someone else between the two phases may be
//! captured with its newer value, and a key deleted in between is left out.
//! What a snapshot does promise: once built, it never changes and never
//! talks to the backend again.

use std::collections::HashMap;

use crate::cancel::CancelToken;
use crate::error::{BridgeError, Result};
use crate::kv::KeyValueReader;
use crate::scan::{collect_keys, fetch_values, ReadOptions};
use crate::store::RemoteStore;

/// Immutable in-memory view of the keys under a prefix
#[derive(Debug)]
pub struct Snapshot {
    prefix: Vec<u8>,

    /// `None` once released
    data: Option<HashMap<Vec<u8>, Vec<u8>>>,
}

impl Snapshot {
    /// Capture every key under `prefix` (empty = whole keyspace)
    ///
    /// Blocks for the full enumeration and fetch. On any failure or
    /// cancellation nothing is returned.
    pub fn capture(
        store: &dyn RemoteStore,
        prefix: &[u8],
        options: &ReadOptions,
        cancel: &CancelToken,
    ) -> Result<Self> {
        let keys = collect_keys(store, prefix, options, cancel)?;
        let values = fetch_values(store, &keys, options, cancel)?;

        let mut data = HashMap::with_capacity(keys.len());
        let mut vanished = 0usize;
        for (key, value) in keys.into_iter().zip(values) {
            match value {
                Some(value) => {
                    data.insert(key, value);
                }
                None => vanished += 1,
            }
        }

        tracing::debug!(
            prefix = %String::from_utf8_lossy(prefix),
            keys = data.len(),
            vanished,
            "Snapshot captured"
        );
        Ok(Self {
            prefix: prefix.to_vec(),
            data: Some(data),
        })
    }

    fn data(&self) -> Result<&HashMap<Vec<u8>, Vec<u8>>> {
        self.data.as_ref().ok_or(BridgeError::SnapshotReleased)
    }

    /// Captured value for `key`
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data()?.get(key).cloned())
    }

    /// Whether `key` was captured
    pub fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.data()?.contains_key(key))
    }

    /// Number of captured keys (0 once released)
    pub fn len(&self) -> usize {
        self.data.as_ref().map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Captured pairs in ascending key order
    pub fn entries(&self) -> Result<Vec<(&[u8], &[u8])>> {
        let mut entries: Vec<(&[u8], &[u8])> = self
            .data()?
            .iter()
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        Ok(entries)
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Discard the captured data; later reads fail with `SnapshotReleased`
    pub fn release(&mut self) {
        self.data = None;
    }

    pub fn is_released(&self) -> bool {
        self.data.is_none()
    }
}

impl KeyValueReader for Snapshot {
    fn has(&self, key: &[u8]) -> Result<bool> {
        Snapshot::has(self, key)
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Snapshot::get(self, key)
    }
}
