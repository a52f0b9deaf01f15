//! Tests for Batch
//!
//! These tests verify:
//! - Local accumulation (size accounting, reset)
//! - Flush ordering and last-writer-wins
//! - Partial failure reporting
//! - Replay into other writers
//! - Cancellation before the round trip

use std::sync::Arc;

use bridgekv::store::{FailPoint, MemoryStore, OpKind};
use bridgekv::{BridgeError, CancelToken, Database, KeyValueWriter, ReadOptions};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup() -> (Arc<MemoryStore>, Database) {
    let store = Arc::new(MemoryStore::new());
    let db = Database::with_store(store.clone(), ReadOptions::default());
    (store, db)
}

// =============================================================================
// Accumulation Tests
// =============================================================================

#[test]
fn test_batch_starts_empty() {
    let (_store, db) = setup();
    let batch = db.new_batch();

    assert!(batch.is_empty());
    assert_eq!(batch.len(), 0);
    assert_eq!(batch.value_size(), 0);
}

#[test]
fn test_batch_value_size_counts_keys_and_values() {
    let (_store, db) = setup();
    let mut batch = db.new_batch();

    batch.put(b"key1", b"value1"); // 4 + 6
    batch.put(b"k", b""); // 1 + 0
    batch.delete(b"gone"); // 4

    assert_eq!(batch.value_size(), 15);
    assert_eq!(batch.len(), 3);
}

#[test]
fn test_batch_ops_keep_insertion_order() {
    let (_store, db) = setup();
    let mut batch = db.new_batch();

    batch.put(b"b", b"1");
    batch.delete(b"a");
    batch.put(b"c", b"2");

    let ops = batch.ops();
    assert_eq!(ops[0].kind, OpKind::Put);
    assert_eq!(ops[0].key, b"b");
    assert_eq!(ops[1].kind, OpKind::Delete);
    assert_eq!(ops[1].key, b"a");
    assert!(ops[1].value.is_empty());
    assert_eq!(ops[2].key, b"c");
}

#[test]
fn test_batch_does_not_touch_store_until_write() {
    let (store, db) = setup();
    let mut batch = db.new_batch();

    batch.put(b"key", b"value");

    assert_eq!(db.get(b"key").unwrap(), None);
    assert_eq!(store.pipeline_calls(), 0);
}

#[test]
fn test_batch_reset_clears_everything() {
    let (store, db) = setup();
    let mut batch = db.new_batch();

    batch.put(b"key", b"value");
    batch.delete(b"other");
    batch.reset();

    assert!(batch.is_empty());
    assert_eq!(batch.value_size(), 0);

    batch.write().unwrap();
    assert_eq!(store.pipeline_calls(), 0);
    assert_eq!(db.get(b"key").unwrap(), None);
}

#[test]
fn test_batch_with_size_hint() {
    let (_store, db) = setup();
    let mut batch = db.new_batch_with_size(128);

    batch.put(b"key", b"value");
    batch.write().unwrap();

    assert_eq!(db.get(b"key").unwrap(), Some(b"value".to_vec()));
}

// =============================================================================
// Flush Tests
// =============================================================================

#[test]
fn test_batch_write_applies_all_ops() {
    let (store, db) = setup();
    db.put(b"old", b"x").unwrap();

    let mut batch = db.new_batch();
    batch.put(b"a", b"1");
    batch.put(b"b", b"2");
    batch.delete(b"old");
    batch.write().unwrap();

    assert_eq!(db.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(db.get(b"b").unwrap(), Some(b"2".to_vec()));
    assert!(!db.has(b"old").unwrap());
    assert_eq!(store.pipeline_calls(), 1);
}

#[test]
fn test_batch_last_writer_wins() {
    let (_store, db) = setup();

    let mut batch = db.new_batch();
    batch.put(b"x", b"1");
    batch.delete(b"x");
    batch.put(b"x", b"2");
    batch.write().unwrap();

    assert_eq!(db.get(b"x").unwrap(), Some(b"2".to_vec()));
}

#[test]
fn test_batch_last_writer_wins_with_trailing_delete() {
    let (_store, db) = setup();

    let mut batch = db.new_batch();
    batch.put(b"x", b"1");
    batch.put(b"x", b"2");
    batch.delete(b"x");
    batch.write().unwrap();

    assert!(!db.has(b"x").unwrap());
}

#[test]
fn test_batch_final_state_matches_sequential_application() {
    let (_store, db) = setup();

    // Deterministic mix of puts and deletes over a small key set
    let mut expected = std::collections::HashMap::new();
    let mut batch = db.new_batch();
    for i in 0..200u32 {
        let key = format!("k{}", (i * 7) % 13).into_bytes();
        if i % 5 == 0 {
            batch.delete(&key);
            expected.remove(&key);
        } else {
            let value = format!("v{}", i).into_bytes();
            batch.put(&key, &value);
            expected.insert(key, value);
        }
    }
    batch.write().unwrap();

    for n in 0..13u32 {
        let key = format!("k{}", n).into_bytes();
        assert_eq!(db.get(&key).unwrap(), expected.get(&key).cloned());
    }
}

#[test]
fn test_batch_can_be_reused_after_reset() {
    let (_store, db) = setup();
    let mut batch = db.new_batch();

    batch.put(b"first", b"1");
    batch.write().unwrap();
    batch.reset();

    batch.put(b"second", b"2");
    batch.write().unwrap();

    assert_eq!(db.get(b"first").unwrap(), Some(b"1".to_vec()));
    assert_eq!(db.get(b"second").unwrap(), Some(b"2".to_vec()));
}

#[test]
fn test_batch_partial_failure_lists_failed_indices() {
    let (store, db) = setup();
    store.fail(FailPoint::PipelineKey(b"bad".to_vec()));

    let mut batch = db.new_batch();
    batch.put(b"good1", b"1");
    batch.put(b"bad", b"2");
    batch.put(b"good2", b"3");
    batch.delete(b"bad");

    match batch.write() {
        Err(BridgeError::PartialBatchFailure { failures }) => {
            let indices: Vec<usize> = failures.iter().map(|f| f.index).collect();
            assert_eq!(indices, vec![1, 3]);
            assert!(failures[0].message.contains("injected"));
        }
        other => panic!("Expected PartialBatchFailure, got {:?}", other),
    }

    // Best-effort: the other ops were applied
    assert_eq!(db.get(b"good1").unwrap(), Some(b"1".to_vec()));
    assert_eq!(db.get(b"good2").unwrap(), Some(b"3".to_vec()));
    assert_eq!(db.get(b"bad").unwrap(), None);
}

#[test]
fn test_batch_transport_failure_propagates() {
    let (store, db) = setup();
    store.fail(FailPoint::Pipeline);

    let mut batch = db.new_batch();
    batch.put(b"key", b"value");

    let err = batch.write().unwrap_err();
    assert!(err.is_connection_error());
    assert_eq!(db.get(b"key").unwrap(), None);

    // Nothing is retried; a second write goes through
    batch.write().unwrap();
    assert_eq!(db.get(b"key").unwrap(), Some(b"value".to_vec()));
}

#[test]
fn test_batch_cancelled_before_flush() {
    let (store, db) = setup();
    let mut batch = db.new_batch();
    batch.put(b"key", b"value");

    let cancel = CancelToken::new();
    cancel.cancel();

    assert!(matches!(batch.write_with(&cancel), Err(BridgeError::Cancelled)));
    assert_eq!(store.pipeline_calls(), 0);
    assert_eq!(db.get(b"key").unwrap(), None);
}

// =============================================================================
// Replay Tests
// =============================================================================

#[test]
fn test_batch_replay_into_another_batch() {
    let (_store, db) = setup();

    let mut source = db.new_batch();
    source.put(b"a", b"1");
    source.delete(b"b");
    source.put(b"c", b"3");

    let mut target = db.new_batch();
    source.replay(&mut target).unwrap();

    assert_eq!(target.ops(), source.ops());
    assert_eq!(target.value_size(), source.value_size());
}

#[test]
fn test_batch_replay_into_database() {
    let (_store, mut db) = setup();
    db.put(b"b", b"old").unwrap();

    let mut batch = db.new_batch();
    batch.put(b"a", b"1");
    batch.delete(b"b");

    batch.replay(&mut db).unwrap();

    assert_eq!(db.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert!(!db.has(b"b").unwrap());
}

#[test]
fn test_batch_as_key_value_writer() {
    let (_store, db) = setup();
    let mut batch = db.new_batch();

    {
        let writer: &mut dyn KeyValueWriter = &mut batch;
        writer.put(b"k", b"v").unwrap();
        writer.delete(b"z").unwrap();
    }

    assert_eq!(batch.len(), 2);
    batch.write().unwrap();
    assert_eq!(db.get(b"k").unwrap(), Some(b"v".to_vec()));
}
