//! Tests for PrefixIterator
//!
//! These tests verify:
//! - Ascending order out of unordered, paginated, repeating scans
//! - Prefix and start-bound filtering
//! - Lazy value windows and concurrently deleted keys
//! - Failure handling during construction and iteration
//! - Release semantics

use std::sync::Arc;

use bridgekv::store::{FailPoint, MemoryStore};
use bridgekv::{BridgeError, CancelToken, Database, Entry, ReadOptions, RemoteStore};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_with(store: MemoryStore, page: usize, fetch: usize) -> (Arc<MemoryStore>, Database) {
    let store = Arc::new(store);
    let options = ReadOptions {
        scan_page_size: page,
        fetch_batch_size: fetch,
    };
    let db = Database::with_store(store.clone(), options);
    (store, db)
}

fn abc_store() -> MemoryStore {
    MemoryStore::with_entries(vec![("a", "1"), ("ab", "2"), ("b", "3")])
}

fn collect(db: &Database, prefix: &[u8], start: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut iter = db.new_iterator(prefix, start).unwrap();
    let pairs = iter
        .by_ref()
        .map(|e| (e.key, e.value.expect("value present")))
        .collect();
    assert!(iter.error().is_none());
    pairs
}

fn pair(k: &str, v: &str) -> (Vec<u8>, Vec<u8>) {
    (k.as_bytes().to_vec(), v.as_bytes().to_vec())
}

fn numbered_store(n: usize) -> MemoryStore {
    MemoryStore::with_entries((0..n).map(|i| (format!("key{:04}", i), format!("value{}", i))))
}

// =============================================================================
// Ordering and Filtering Tests
// =============================================================================

#[test]
fn test_iterator_prefix_scenario() {
    let (_store, db) = setup_with(abc_store(), 10, 10);

    assert_eq!(collect(&db, b"a", b""), vec![pair("a", "1"), pair("ab", "2")]);
}

#[test]
fn test_iterator_prefix_with_start_scenario() {
    let (_store, db) = setup_with(abc_store(), 10, 10);

    assert_eq!(collect(&db, b"a", b"ab"), vec![pair("ab", "2")]);
}

#[test]
fn test_iterator_empty_prefix_enumerates_everything() {
    let (_store, db) = setup_with(abc_store(), 1, 1);

    assert_eq!(
        collect(&db, b"", b""),
        vec![pair("a", "1"), pair("ab", "2"), pair("b", "3")]
    );
}

#[test]
fn test_iterator_sorted_regardless_of_page_size() {
    for page in [1, 2, 3, 7, 64, 1000] {
        let (_store, db) = setup_with(numbered_store(100), page, 16);

        let keys: Vec<Vec<u8>> = db.new_iterator(b"", b"").unwrap().map(|e| e.key).collect();

        assert_eq!(keys.len(), 100, "page size {}", page);
        assert!(keys.windows(2).all(|w| w[0] < w[1]), "page size {}", page);
        assert_eq!(keys[0], b"key0000");
        assert_eq!(keys[99], b"key0099");
    }
}

#[test]
fn test_iterator_deduplicates_repeated_scan_keys() {
    let (store, db) = setup_with(numbered_store(30).with_repeated_keys(), 4, 8);

    let keys: Vec<Vec<u8>> = db.new_iterator(b"", b"").unwrap().map(|e| e.key).collect();

    assert_eq!(keys.len(), 30);
    assert!(keys.windows(2).all(|w| w[0] < w[1]));
    assert!(store.scan_calls() > 1);
}

#[test]
fn test_iterator_start_is_inclusive_and_bytewise() {
    let (_store, db) = setup_with(numbered_store(20), 5, 5);

    let keys: Vec<Vec<u8>> = db
        .new_iterator(b"key", b"key0015")
        .unwrap()
        .map(|e| e.key)
        .collect();

    assert_eq!(
        keys,
        vec![
            b"key0015".to_vec(),
            b"key0016".to_vec(),
            b"key0017".to_vec(),
            b"key0018".to_vec(),
            b"key0019".to_vec()
        ]
    );
}

#[test]
fn test_iterator_start_between_keys() {
    let (_store, db) = setup_with(abc_store(), 10, 10);

    // "aa" sorts between "a" and "ab"
    assert_eq!(collect(&db, b"", b"aa"), vec![pair("ab", "2"), pair("b", "3")]);
}

#[test]
fn test_iterator_start_beyond_all_keys() {
    let (_store, db) = setup_with(abc_store(), 10, 10);

    let mut iter = db.new_iterator(b"a", b"zzz").unwrap();
    assert_eq!(iter.key_count(), 0);
    assert!(iter.next().is_none());
    assert!(iter.error().is_none());
}

#[test]
fn test_iterator_no_matching_prefix() {
    let (store, db) = setup_with(abc_store(), 10, 10);

    let mut iter = db.new_iterator(b"zz", b"").unwrap();
    assert!(iter.next().is_none());
    assert!(iter.error().is_none());
    assert_eq!(store.multi_get_calls(), 0);
}

#[test]
fn test_iterator_empty_store() {
    let (_store, db) = setup_with(MemoryStore::new(), 10, 10);

    assert!(collect(&db, b"", b"").is_empty());
}

#[test]
fn test_iterator_prefix_with_glob_metacharacters() {
    let store = MemoryStore::with_entries(vec![
        ("a*1", "star"),
        ("a?2", "question"),
        ("ab", "plain"),
        ("a[x]", "bracket"),
    ]);
    let (_store, db) = setup_with(store, 2, 2);

    assert_eq!(collect(&db, b"a*", b""), vec![pair("a*1", "star")]);
    assert_eq!(collect(&db, b"a?", b""), vec![pair("a?2", "question")]);
    assert_eq!(collect(&db, b"a[", b""), vec![pair("a[x]", "bracket")]);
}

#[test]
fn test_iterator_binary_keys() {
    let store = MemoryStore::new();
    store.set(&[0x00, 0xff], b"1", None).unwrap();
    store.set(&[0x00, 0x01], b"2", None).unwrap();
    store.set(&[0x01], b"3", None).unwrap();
    let (_store, db) = setup_with(store, 1, 1);

    let keys: Vec<Vec<u8>> = db.new_iterator(&[0x00], &[]).unwrap().map(|e| e.key).collect();
    assert_eq!(keys, vec![vec![0x00, 0x01], vec![0x00, 0xff]]);
}

// =============================================================================
// Key List Snapshot Tests
// =============================================================================

#[test]
fn test_iterator_key_list_fixed_at_construction() {
    let (_store, db) = setup_with(abc_store(), 10, 10);

    let iter = db.new_iterator(b"", b"").unwrap();
    db.put(b"aa", b"new").unwrap();

    let keys: Vec<Vec<u8>> = iter.map(|e| e.key).collect();
    assert_eq!(keys, vec![b"a".to_vec(), b"ab".to_vec(), b"b".to_vec()]);
}

#[test]
fn test_iterator_first_window_read_at_construction() {
    let (_store, db) = setup_with(abc_store(), 10, 10);

    let iter = db.new_iterator(b"a", b"").unwrap();
    db.put(b"a", b"changed").unwrap();

    let values: Vec<Option<Vec<u8>>> = iter.map(|e| e.value).collect();
    assert_eq!(values, vec![Some(b"1".to_vec()), Some(b"2".to_vec())]);
}

#[test]
fn test_iterator_fetches_values_in_windows() {
    let (store, db) = setup_with(numbered_store(10), 100, 3);

    let mut iter = db.new_iterator(b"", b"").unwrap();
    assert_eq!(store.multi_get_calls(), 1);

    // Windows of 3: [0..3) fetched at construction
    for _ in 0..3 {
        iter.next().unwrap();
    }
    assert_eq!(store.multi_get_calls(), 1);

    iter.next().unwrap();
    assert_eq!(store.multi_get_calls(), 2);

    assert_eq!(iter.by_ref().count(), 6);
    assert_eq!(store.multi_get_calls(), 4);
}

#[test]
fn test_iterator_vanished_key_yields_not_found_marker() {
    let (_store, db) = setup_with(numbered_store(4), 100, 2);

    let iter = db.new_iterator(b"", b"").unwrap();
    // key0003 sits in the second window, fetched lazily
    db.delete(b"key0003").unwrap();

    let entries: Vec<Entry> = iter.collect();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[2].value, Some(b"value2".to_vec()));
    assert_eq!(entries[3].key, b"key0003");
    assert_eq!(entries[3].value, None);
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_iterator_scan_failure_aborts_construction() {
    let (store, db) = setup_with(numbered_store(50), 10, 10);
    store.fail(FailPoint::Scan { after_pages: 2 });

    match db.new_iterator(b"", b"") {
        Err(BridgeError::ScanIncomplete { pages, source }) => {
            assert_eq!(pages, 2);
            assert!(source.is_connection_error());
        }
        Err(other) => panic!("Expected ScanIncomplete, got {:?}", other),
        Ok(_) => panic!("Expected ScanIncomplete, got an iterator"),
    }
}

#[test]
fn test_iterator_first_window_failure_aborts_construction() {
    let (store, db) = setup_with(abc_store(), 10, 10);
    store.fail(FailPoint::MultiGet);

    assert!(db.new_iterator(b"", b"").is_err());
}

#[test]
fn test_iterator_later_window_failure_recorded() {
    let (store, db) = setup_with(numbered_store(6), 100, 2);

    let mut iter = db.new_iterator(b"", b"").unwrap();
    store.fail(FailPoint::MultiGet);

    assert!(iter.next().is_some());
    assert!(iter.next().is_some());
    assert!(iter.next().is_none());
    assert!(iter.error().unwrap().is_connection_error());

    // Stays stopped even once the backend recovers
    assert!(iter.next().is_none());
    assert!(iter.take_error().is_some());
    assert!(iter.error().is_none());
}

#[test]
fn test_iterator_cancelled_during_construction() {
    let (store, db) = setup_with(numbered_store(10), 2, 2);

    let cancel = CancelToken::new();
    cancel.cancel();

    assert!(matches!(
        db.new_iterator_with(b"", b"", cancel),
        Err(BridgeError::Cancelled)
    ));
    assert_eq!(store.scan_calls(), 0);
}

#[test]
fn test_iterator_cancelled_between_windows() {
    let (_store, db) = setup_with(numbered_store(6), 100, 2);

    let cancel = CancelToken::new();
    let mut iter = db.new_iterator_with(b"", b"", cancel.clone()).unwrap();
    cancel.cancel();

    assert_eq!(iter.by_ref().count(), 2);
    assert!(matches!(iter.error(), Some(BridgeError::Cancelled)));
}

// =============================================================================
// Cursor and Release Tests
// =============================================================================

#[test]
fn test_iterator_cursor_style_access() {
    let (_store, db) = setup_with(abc_store(), 10, 10);
    let mut iter = db.new_iterator(b"a", b"").unwrap();

    assert_eq!(iter.key(), None);

    assert!(iter.advance());
    assert_eq!(iter.key(), Some(&b"a"[..]));
    assert_eq!(iter.value(), Some(&b"1"[..]));

    assert!(iter.advance());
    assert_eq!(iter.key(), Some(&b"ab"[..]));

    assert!(!iter.advance());
    assert_eq!(iter.key(), None);
    assert!(iter.error().is_none());
}

#[test]
fn test_iterator_release_is_idempotent() {
    let (_store, db) = setup_with(abc_store(), 10, 10);
    let mut iter = db.new_iterator(b"", b"").unwrap();

    assert!(iter.advance());
    iter.release();
    iter.release();

    assert_eq!(iter.key(), None);
    assert_eq!(iter.key_count(), 0);
    assert!(!iter.advance());
    assert!(iter.next().is_none());
}

#[test]
fn test_iterator_release_after_exhaustion() {
    let (_store, db) = setup_with(abc_store(), 10, 10);
    let mut iter = db.new_iterator(b"", b"").unwrap();

    assert_eq!(iter.by_ref().count(), 3);
    iter.release();
    assert!(iter.error().is_none());
}

#[test]
fn test_iterator_reports_bounds() {
    let (_store, db) = setup_with(abc_store(), 10, 10);
    let iter = db.new_iterator(b"a", b"ab").unwrap();

    assert_eq!(iter.prefix(), b"a");
    assert_eq!(iter.start(), b"ab");
    assert_eq!(iter.key_count(), 1);
}
