//! In-memory store
//!
//! An in-process implementation of the backend contract, including its
//! awkward parts: scans come back in hash order rather than key order,
//! pages can repeat keys, and failures can be injected at chosen points.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use super::{OpKind, OpResult, RemoteStore, WriteOp};
use crate::error::{BridgeError, Result};
use crate::protocol::glob_match;

/// A failure to inject into a [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailPoint {
    /// Scan pages fail once the store has served `after_pages` pages in total
    Scan { after_pages: usize },

    /// The next multi-get fails
    MultiGet,

    /// The next pipeline fails as a whole, applying nothing
    Pipeline,

    /// Pipeline ops touching this key fail; the others still apply
    PipelineKey(Vec<u8>),
}

type Hook = Box<dyn FnOnce(&MemoryStore) + Send>;

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-memory fake of the remote cache
pub struct MemoryStore {
    data: RwLock<HashMap<Vec<u8>, Entry>>,
    fail_points: Mutex<Vec<FailPoint>>,
    before_multi_get: Mutex<Option<Hook>>,

    /// Re-send the last key of the previous page at the start of each page
    repeat_keys: bool,

    closed: AtomicBool,
    scan_calls: AtomicUsize,
    multi_get_calls: AtomicUsize,
    pipeline_calls: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            fail_points: Mutex::new(Vec::new()),
            before_multi_get: Mutex::new(None),
            repeat_keys: false,
            closed: AtomicBool::new(false),
            scan_calls: AtomicUsize::new(0),
            multi_get_calls: AtomicUsize::new(0),
            pipeline_calls: AtomicUsize::new(0),
        }
    }

    /// Make every scan page also return a key from the previous page
    pub fn with_repeated_keys(mut self) -> Self {
        self.repeat_keys = true;
        self
    }

    /// Create a store holding the given pairs
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        let store = Self::new();
        {
            let mut data = store.data.write();
            for (key, value) in entries {
                data.insert(
                    key.into(),
                    Entry {
                        value: value.into(),
                        expires_at: None,
                    },
                );
            }
        }
        store
    }

    /// Arm a failure
    pub fn fail(&self, point: FailPoint) {
        self.fail_points.lock().push(point);
    }

    /// Disarm all failures
    pub fn clear_failures(&self) {
        self.fail_points.lock().clear();
    }

    /// Run `hook` once, at the start of the next multi-get
    ///
    /// Lets tests mutate the store between key enumeration and value fetch.
    pub fn before_next_multi_get(&self, hook: impl FnOnce(&MemoryStore) + Send + 'static) {
        *self.before_multi_get.lock() = Some(Box::new(hook));
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.data.read().values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scan pages served so far
    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::Relaxed)
    }

    /// Multi-gets served so far
    pub fn multi_get_calls(&self) -> usize {
        self.multi_get_calls.load(Ordering::Relaxed)
    }

    /// Pipelines served so far
    pub fn pipeline_calls(&self) -> usize {
        self.pipeline_calls.load(Ordering::Relaxed)
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BridgeError::Closed);
        }
        Ok(())
    }

    /// Remove and return true if `matches` finds an armed fail point
    fn take_fail_point(&self, matches: impl Fn(&FailPoint) -> bool) -> bool {
        let mut points = self.fail_points.lock();
        match points.iter().position(matches) {
            Some(i) => {
                points.remove(i);
                true
            }
            None => false,
        }
    }

    fn injected(what: &str) -> BridgeError {
        BridgeError::Connection(format!("injected {} failure", what))
    }

    fn read_live(&self, key: &[u8], now: Instant) -> Option<Vec<u8>> {
        self.data
            .read()
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone())
    }

    /// Scan position of a key, never 0 so that 0 can mean "start" and "done"
    fn scan_hash(key: &[u8]) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() >> 1) + 1
    }

    /// Live keys in (hash, key) order, the order scans walk the keyspace in
    fn scan_order(&self) -> Vec<(u64, Vec<u8>)> {
        let now = Instant::now();
        let mut keys: Vec<(u64, Vec<u8>)> = self
            .data
            .read()
            .iter()
            .filter(|(_, e)| e.is_live(now))
            .map(|(k, _)| (Self::scan_hash(k), k.clone()))
            .collect();
        keys.sort_unstable();
        keys
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteStore for MemoryStore {
    fn exists(&self, keys: &[&[u8]]) -> Result<u64> {
        self.check_open()?;
        let now = Instant::now();
        let data = self.data.read();
        Ok(keys
            .iter()
            .filter(|k| data.get(**k).is_some_and(|e| e.is_live(now)))
            .count() as u64)
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check_open()?;
        Ok(self.read_live(key, Instant::now()))
    }

    fn multi_get(&self, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>> {
        self.check_open()?;
        self.multi_get_calls.fetch_add(1, Ordering::Relaxed);

        let hook = self.before_multi_get.lock().take();
        if let Some(hook) = hook {
            hook(self);
        }
        if self.take_fail_point(|p| *p == FailPoint::MultiGet) {
            return Err(Self::injected("multi-get"));
        }

        let now = Instant::now();
        Ok(keys.iter().map(|k| self.read_live(k, now)).collect())
    }

    fn set(&self, key: &[u8], value: &[u8], expiry: Option<Duration>) -> Result<()> {
        self.check_open()?;
        // A TTL past the end of the clock never expires
        let expires_at = expiry
            .filter(|ttl| !ttl.is_zero())
            .and_then(|ttl| Instant::now().checked_add(ttl));
        self.data.write().insert(
            key.to_vec(),
            Entry {
                value: value.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }

    fn delete(&self, keys: &[&[u8]]) -> Result<u64> {
        self.check_open()?;
        let now = Instant::now();
        let mut data = self.data.write();
        let removed = keys
            .iter()
            .filter_map(|k| data.remove(*k))
            .filter(|e| e.is_live(now))
            .count();
        Ok(removed as u64)
    }

    fn pipeline(&self, ops: &[WriteOp]) -> Result<Vec<OpResult>> {
        self.check_open()?;
        self.pipeline_calls.fetch_add(1, Ordering::Relaxed);

        if self.take_fail_point(|p| *p == FailPoint::Pipeline) {
            return Err(Self::injected("pipeline"));
        }

        let failing: Vec<Vec<u8>> = self
            .fail_points
            .lock()
            .iter()
            .filter_map(|p| match p {
                FailPoint::PipelineKey(key) => Some(key.clone()),
                _ => None,
            })
            .collect();

        let mut data = self.data.write();
        let results = ops
            .iter()
            .map(|op| {
                if failing.contains(&op.key) {
                    return Err("ERR injected failure".to_string());
                }
                match op.kind {
                    OpKind::Put => {
                        data.insert(
                            op.key.clone(),
                            Entry {
                                value: op.value.clone(),
                                expires_at: None,
                            },
                        );
                    }
                    OpKind::Delete => {
                        data.remove(&op.key);
                    }
                }
                Ok(())
            })
            .collect();
        Ok(results)
    }

    fn scan(&self, cursor: u64, pattern: &[u8], count: usize) -> Result<(u64, Vec<Vec<u8>>)> {
        self.check_open()?;
        let served = self.scan_calls.fetch_add(1, Ordering::Relaxed);

        let failing = self.fail_points.lock().iter().any(|p| match p {
            FailPoint::Scan { after_pages } => served >= *after_pages,
            _ => false,
        });
        if failing {
            return Err(Self::injected("scan"));
        }

        // The cursor is the hash of the next key to return, so keys that
        // stay in the store are never skipped when others come and go
        let order = self.scan_order();
        let start = if cursor == 0 {
            0
        } else {
            order.partition_point(|(hash, _)| *hash < cursor)
        };
        let end = (start + count.max(1)).min(order.len());

        let mut page: Vec<Vec<u8>> = Vec::with_capacity(end - start + 1);
        if self.repeat_keys && start > 0 {
            page.push(order[start - 1].1.clone());
        }
        page.extend(order[start..end].iter().map(|(_, k)| k.clone()));
        page.retain(|k| glob_match(pattern, k));

        let next = order.get(end).map_or(0, |(hash, _)| *hash);
        Ok((next, page))
    }

    fn config_get(&self, parameter: &str) -> Result<HashMap<String, String>> {
        self.check_open()?;
        let settings = [("databases", "16"), ("maxmemory", "0"), ("appendonly", "no")];
        Ok(settings
            .iter()
            .filter(|(name, _)| glob_match(parameter.as_bytes(), name.as_bytes()))
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect())
    }

    fn ping(&self) -> Result<()> {
        self.check_open()
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
