//! Prefix Iterator
//!
//! Ordered iteration over keys sharing a prefix, starting at a lower bound.
//!
//! ## How it works
//! 1. Enumerate every key with the prefix through SCAN, deduplicated and
//!    sorted (see [`crate::scan`])
//! 2. Drop keys below `start`
//! 3. Serve entries in order, fetching values in MGET windows as the
//!    consumer advances
//!
//! The key list is fixed when the iterator is built: keys written later are
//! not seen. A key deleted before its window is fetched is still yielded,
//! with `value == None`.

use std::collections::VecDeque;

use crate::cancel::CancelToken;
use crate::error::{BridgeError, Result};
use crate::scan::{collect_keys, ReadOptions};
use crate::store::SharedStore;

/// One iterated pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Vec<u8>,

    /// `None` if the key vanished between enumeration and fetch
    pub value: Option<Vec<u8>>,
}

/// Iterator over `prefix`-matching keys `>= start`, in ascending byte order
pub struct PrefixIterator {
    store: SharedStore,
    options: ReadOptions,
    cancel: CancelToken,

    prefix: Vec<u8>,
    start: Vec<u8>,

    /// Matching keys, sorted, fixed at construction
    keys: Vec<Vec<u8>>,

    /// Fetched values for keys[pos..fetched]
    window: VecDeque<Option<Vec<u8>>>,
    fetched: usize,
    pos: usize,

    current: Option<Entry>,
    err: Option<BridgeError>,

    /// Set on the first fetch error; iteration never resumes
    failed: bool,
    released: bool,
}

impl PrefixIterator {
    /// Enumerate matching keys and fetch the first value window
    ///
    /// Blocks for the whole enumeration. Fails without returning an
    /// iterator if any scan page or the first fetch fails, or if `cancel`
    /// fires.
    pub fn new(
        store: SharedStore,
        prefix: &[u8],
        start: &[u8],
        options: ReadOptions,
        cancel: CancelToken,
    ) -> Result<Self> {
        let mut keys = collect_keys(store.as_ref(), prefix, &options, &cancel)?;

        let below_start = keys.partition_point(|k| k.as_slice() < start);
        keys.drain(..below_start);

        let mut iter = Self {
            store,
            options,
            cancel,
            prefix: prefix.to_vec(),
            start: start.to_vec(),
            keys,
            window: VecDeque::new(),
            fetched: 0,
            pos: 0,
            current: None,
            err: None,
            failed: false,
            released: false,
        };
        iter.fill()?;

        tracing::debug!(
            prefix = %String::from_utf8_lossy(prefix),
            start = %String::from_utf8_lossy(start),
            keys = iter.keys.len(),
            "Iterator created"
        );
        Ok(iter)
    }

    /// Fetch the next value window
    fn fill(&mut self) -> Result<()> {
        if self.fetched >= self.keys.len() {
            return Ok(());
        }
        self.cancel.check()?;

        let end = (self.fetched + self.options.fetch_batch_size.max(1)).min(self.keys.len());
        let values = self.store.multi_get(&self.keys[self.fetched..end])?;
        if values.len() != end - self.fetched {
            return Err(BridgeError::Protocol(format!(
                "multi-get returned {} values for {} keys",
                values.len(),
                end - self.fetched
            )));
        }

        tracing::trace!(from = self.fetched, to = end, "fetched value window");
        self.window.extend(values);
        self.fetched = end;
        Ok(())
    }

    /// Produce the next entry, recording the first fetch error
    fn next_entry(&mut self) -> Option<Entry> {
        if self.released || self.failed || self.pos >= self.keys.len() {
            return None;
        }

        if self.window.is_empty() {
            if let Err(e) = self.fill() {
                tracing::debug!(error = %e, "Iterator value fetch failed");
                self.err = Some(e);
                self.failed = true;
                return None;
            }
        }

        let value = self.window.pop_front()?;
        let key = self.keys[self.pos].clone();
        self.pos += 1;
        Some(Entry { key, value })
    }

    /// Advance to the next entry; false at the end or after an error
    ///
    /// Cursor-style alternative to `Iterator::next`, read with `key`/`value`.
    pub fn advance(&mut self) -> bool {
        self.current = self.next_entry();
        self.current.is_some()
    }

    /// Key at the cursor (after a successful `advance`)
    pub fn key(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|e| e.key.as_slice())
    }

    /// Value at the cursor; `None` also when the key vanished before fetch
    pub fn value(&self) -> Option<&[u8]> {
        self.current.as_ref().and_then(|e| e.value.as_deref())
    }

    /// First error hit while fetching values, if any
    ///
    /// Iteration stops at the first error, so check this once `next`
    /// returns `None`.
    pub fn error(&self) -> Option<&BridgeError> {
        self.err.as_ref()
    }

    /// Take the recorded error, leaving none behind
    pub fn take_error(&mut self) -> Option<BridgeError> {
        self.err.take()
    }

    /// Free the key list and fetched values
    ///
    /// Safe to call any number of times; a released iterator yields nothing.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.keys = Vec::new();
        self.window = VecDeque::new();
        self.current = None;
        self.released = true;
    }

    /// Number of keys captured at construction (0 once released)
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    pub fn start(&self) -> &[u8] {
        &self.start
    }
}

impl Iterator for PrefixIterator {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        self.next_entry()
    }
}
