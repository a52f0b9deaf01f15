//! Batch Module
//!
//! Accumulates writes locally and flushes them as one pipelined request.
//!
//! ## Guarantees
//! - Ops are sent in insertion order, so when a key is written several times
//!   the last op wins
//! - Only `write` touches the backend; `put`, `delete` and `reset` are local
//!
//! ## Non-guarantees
//! A flush is best-effort, not a transaction. Unless the store wraps the
//! pipeline in MULTI/EXEC, a failed op does not undo the ops around it, and
//! the error lists exactly which ops failed.

use crate::cancel::CancelToken;
use crate::error::{BridgeError, OpFailure, Result};
use crate::kv::KeyValueWriter;
use crate::store::{OpKind, SharedStore, WriteOp};

/// A buffer of pending writes, owned by one writer
pub struct Batch {
    store: SharedStore,

    /// Pending ops; an op's index is its sequence number
    ops: Vec<WriteOp>,

    /// Sum of key and value lengths of all pending ops
    size: usize,
}

impl Batch {
    /// Create an empty batch
    pub fn new(store: SharedStore) -> Self {
        Self::with_capacity(store, 0)
    }

    /// Create an empty batch with room for `ops` operations
    pub fn with_capacity(store: SharedStore, ops: usize) -> Self {
        Self {
            store,
            ops: Vec::with_capacity(ops),
            size: 0,
        }
    }

    /// Queue a put
    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.size += key.len() + value.len();
        self.ops.push(WriteOp::put(key, value));
    }

    /// Queue a delete
    pub fn delete(&mut self, key: &[u8]) {
        self.size += key.len();
        self.ops.push(WriteOp::delete(key));
    }

    /// Accumulated byte size, for callers deciding when to flush
    pub fn value_size(&self) -> usize {
        self.size
    }

    /// Number of pending ops
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Pending ops in insertion order
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Flush every pending op in one pipelined round trip
    ///
    /// The ops stay buffered afterwards; call `reset` to reuse the batch.
    pub fn write(&self) -> Result<()> {
        self.write_with(&CancelToken::new())
    }

    /// Flush, unless `cancel` fires before the round trip starts
    pub fn write_with(&self, cancel: &CancelToken) -> Result<()> {
        if self.ops.is_empty() {
            return Ok(());
        }
        cancel.check()?;

        let results = self.store.pipeline(&self.ops)?;
        if results.len() != self.ops.len() {
            return Err(BridgeError::Protocol(format!(
                "pipeline returned {} results for {} ops",
                results.len(),
                self.ops.len()
            )));
        }

        let failures: Vec<OpFailure> = results
            .into_iter()
            .enumerate()
            .filter_map(|(index, result)| result.err().map(|message| OpFailure { index, message }))
            .collect();

        if !failures.is_empty() {
            tracing::warn!(
                ops = self.ops.len(),
                failed = failures.len(),
                "Batch flush partially failed"
            );
            return Err(BridgeError::PartialBatchFailure { failures });
        }

        tracing::debug!(ops = self.ops.len(), bytes = self.size, "Batch flushed");
        Ok(())
    }

    /// Drop every pending op without flushing
    pub fn reset(&mut self) {
        self.ops.clear();
        self.size = 0;
    }

    /// Re-apply the pending ops, in order, to another writer
    pub fn replay(&self, writer: &mut dyn KeyValueWriter) -> Result<()> {
        for op in &self.ops {
            match op.kind {
                OpKind::Put => writer.put(&op.key, &op.value)?,
                OpKind::Delete => writer.delete(&op.key)?,
            }
        }
        Ok(())
    }
}

impl KeyValueWriter for Batch {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        Batch::put(self, key, value);
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        Batch::delete(self, key);
        Ok(())
    }
}
