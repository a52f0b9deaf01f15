//! Key enumeration
//!
//! The backend has no ordered range query: SCAN walks the keyspace in an
//! unspecified order, one page per round trip, and may repeat keys. Ordered
//! access is built here by materializing the whole matching key set first,
//! then sorting it. The price is that iterators and snapshots see the keys
//! present while the scan ran, not a live view.

use std::collections::BTreeSet;

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::{BridgeError, Result};
use crate::protocol::prefix_pattern;
use crate::store::RemoteStore;

/// Tuning for key enumeration and value fetches
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// COUNT hint per SCAN page
    pub scan_page_size: usize,

    /// Keys per MGET window
    pub fetch_batch_size: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ReadOptions {
    fn from(config: &Config) -> Self {
        Self {
            scan_page_size: config.scan_page_size.max(1),
            fetch_batch_size: config.fetch_batch_size.max(1),
        }
    }
}

/// Enumerate every key starting with `prefix`, deduplicated and sorted
///
/// Pages until the backend returns cursor 0. Any failure part way through
/// discards what was collected and returns `ScanIncomplete`; cancellation
/// returns `Cancelled`.
pub fn collect_keys(
    store: &dyn RemoteStore,
    prefix: &[u8],
    options: &ReadOptions,
    cancel: &CancelToken,
) -> Result<Vec<Vec<u8>>> {
    let pattern = prefix_pattern(prefix);
    let mut keys = BTreeSet::new();
    let mut cursor = 0u64;
    let mut pages = 0usize;

    loop {
        cancel.check()?;

        let (next, page) = store
            .scan(cursor, &pattern, options.scan_page_size)
            .map_err(|source| BridgeError::ScanIncomplete {
                pages,
                source: Box::new(source),
            })?;
        pages += 1;

        tracing::trace!(cursor, next, returned = page.len(), "scan page");
        // The pattern already filters, but a key is only trusted on a byte match
        keys.extend(page.into_iter().filter(|k| k.starts_with(prefix)));

        if next == 0 {
            break;
        }
        cursor = next;
    }

    tracing::debug!(
        prefix = %String::from_utf8_lossy(prefix),
        pages,
        keys = keys.len(),
        "Key enumeration complete"
    );
    Ok(keys.into_iter().collect())
}

/// Fetch values for `keys` in windows of `fetch_batch_size`, aligned by index
pub fn fetch_values(
    store: &dyn RemoteStore,
    keys: &[Vec<u8>],
    options: &ReadOptions,
    cancel: &CancelToken,
) -> Result<Vec<Option<Vec<u8>>>> {
    let mut values = Vec::with_capacity(keys.len());
    for window in keys.chunks(options.fetch_batch_size.max(1)) {
        cancel.check()?;
        values.extend(store.multi_get(window)?);
    }
    Ok(values)
}
