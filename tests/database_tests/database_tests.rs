//! Tests for Database
//!
//! These tests verify:
//! - Point operations and their absent-key contract
//! - Expiring writes
//! - Diagnostics, compaction and close
//! - Concurrent use of one handle

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bridgekv::store::MemoryStore;
use bridgekv::{BridgeError, Config, Database, KeyValueReader, ReadOptions};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup() -> (Arc<MemoryStore>, Database) {
    let store = Arc::new(MemoryStore::new());
    let db = Database::with_store(store.clone(), ReadOptions::default());
    (store, db)
}

// =============================================================================
// Point Operation Tests
// =============================================================================

#[test]
fn test_database_put_get() {
    let (_store, db) = setup();

    db.put(b"hello", b"world").unwrap();

    assert_eq!(db.get(b"hello").unwrap(), Some(b"world".to_vec()));
}

#[test]
fn test_database_get_nonexistent_key() {
    let (_store, db) = setup();

    assert_eq!(db.get(b"nonexistent").unwrap(), None);
    assert!(!db.has(b"nonexistent").unwrap());
}

#[test]
fn test_database_empty_value_is_not_absent() {
    let (_store, db) = setup();

    db.put(b"empty", b"").unwrap();

    assert_eq!(db.get(b"empty").unwrap(), Some(Vec::new()));
    assert!(db.has(b"empty").unwrap());
}

#[test]
fn test_database_put_overwrite() {
    let (_store, db) = setup();

    db.put(b"key", b"value1").unwrap();
    db.put(b"key", b"value2").unwrap();

    assert_eq!(db.get(b"key").unwrap(), Some(b"value2".to_vec()));
}

#[test]
fn test_database_delete() {
    let (_store, db) = setup();

    db.put(b"key", b"value").unwrap();
    assert!(db.has(b"key").unwrap());

    db.delete(b"key").unwrap();
    assert!(!db.has(b"key").unwrap());
    assert_eq!(db.get(b"key").unwrap(), None);
}

#[test]
fn test_database_delete_nonexistent_key() {
    let (_store, db) = setup();

    // Should not error
    db.delete(b"nonexistent").unwrap();
}

#[test]
fn test_database_binary_keys_and_values() {
    let (_store, db) = setup();
    let key = [0u8, 159, 146, 150, 255];
    let value = [0u8, 0, 1, 2, 3, 254];

    db.put(&key, &value).unwrap();

    assert_eq!(db.get(&key).unwrap(), Some(value.to_vec()));
}

#[test]
fn test_database_put_with_expiry() {
    let (_store, db) = setup();

    db.put_with_expiry(b"short", b"lived", Duration::from_millis(20)).unwrap();
    db.put_with_expiry(b"zero", b"forever", Duration::ZERO).unwrap();
    assert!(db.has(b"short").unwrap());

    thread::sleep(Duration::from_millis(60));

    assert!(!db.has(b"short").unwrap());
    assert_eq!(db.get(b"short").unwrap(), None);
    assert_eq!(db.get(b"zero").unwrap(), Some(b"forever".to_vec()));
}

#[test]
fn test_database_as_key_value_reader() {
    let (_store, db) = setup();
    db.put(b"k", b"v").unwrap();

    let reader: &dyn KeyValueReader = &db;
    assert!(reader.has(b"k").unwrap());
    assert_eq!(reader.get(b"k").unwrap(), Some(b"v".to_vec()));
}

// =============================================================================
// Maintenance Tests
// =============================================================================

#[test]
fn test_database_stat_single_property() {
    let (_store, db) = setup();

    assert_eq!(db.stat("maxmemory").unwrap(), "maxmemory: 0");
}

#[test]
fn test_database_stat_glob_sorted() {
    let (_store, db) = setup();

    assert_eq!(
        db.stat("*").unwrap(),
        "appendonly: no\ndatabases: 16\nmaxmemory: 0"
    );
}

#[test]
fn test_database_stat_unknown_property() {
    let (_store, db) = setup();

    assert_eq!(db.stat("no-such-setting").unwrap(), "");
}

#[test]
fn test_database_compact_is_noop() {
    let (store, db) = setup();
    db.put(b"a", b"1").unwrap();

    db.compact(b"", b"").unwrap();
    db.compact(b"a", b"z").unwrap();

    assert_eq!(store.len(), 1);
    assert_eq!(db.get(b"a").unwrap(), Some(b"1".to_vec()));
}

#[test]
fn test_database_close() {
    let (_store, db) = setup();
    db.put(b"key", b"value").unwrap();

    db.close().unwrap();

    assert!(matches!(db.get(b"key"), Err(BridgeError::Closed)));
    assert!(matches!(db.put(b"key", b"v"), Err(BridgeError::Closed)));
    assert!(matches!(db.new_iterator(b"", b""), Err(BridgeError::ScanIncomplete { .. })));
}

#[test]
fn test_database_open_rejects_invalid_config() {
    let config = Config::builder().endpoint("").build();
    assert!(matches!(Database::open(config), Err(BridgeError::Config(_))));

    let config = Config::builder().scan_page_size(0).build();
    assert!(matches!(Database::open(config), Err(BridgeError::Config(_))));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_database_concurrent_writers_and_readers() {
    let (_store, db) = setup();
    let db = Arc::new(db);

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                for i in 0..50 {
                    let key = format!("t{}:{:03}", t, i);
                    db.put(key.as_bytes(), b"x").unwrap();
                }
            })
        })
        .collect();
    for w in writers {
        w.join().unwrap();
    }

    let readers: Vec<_> = (0..4)
        .map(|t| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                let prefix = format!("t{}:", t);
                db.new_iterator(prefix.as_bytes(), b"").unwrap().count()
            })
        })
        .collect();
    for r in readers {
        assert_eq!(r.join().unwrap(), 50);
    }
}
