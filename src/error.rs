//! Error types for bridgekv
//!
//! Provides a unified error type for all operations. Backend errors are
//! propagated verbatim; a missing key is never an error (see `get`).

use std::fmt;

use thiserror::Error;

/// Result type alias using BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Unified error type for bridgekv operations
#[derive(Debug, Error)]
pub enum BridgeError {
    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Store is closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Error reply sent by the backend (e.g. `-ERR ...`)
    #[error("Backend error: {0}")]
    Backend(String),

    // -------------------------------------------------------------------------
    // Adapter Errors
    // -------------------------------------------------------------------------
    /// Key enumeration failed part way through; nothing was materialized
    #[error("Scan aborted after {pages} page(s): {source}")]
    ScanIncomplete {
        pages: usize,
        #[source]
        source: Box<BridgeError>,
    },

    /// Some operations of a flushed batch failed; others may have applied
    #[error("Batch partially failed: {}", FailureList(.failures))]
    PartialBatchFailure { failures: Vec<OpFailure> },

    #[error("Snapshot has been released")]
    SnapshotReleased,

    #[error("Operation cancelled")]
    Cancelled,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Whether the error came from the transport rather than the backend itself
    pub fn is_connection_error(&self) -> bool {
        matches!(self, BridgeError::Io(_) | BridgeError::Connection(_) | BridgeError::Closed)
    }
}

/// A single failed operation inside a batch flush
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpFailure {
    /// Position of the operation in insertion order
    pub index: usize,

    /// Error message reported by the backend
    pub message: String,
}

struct FailureList<'a>(&'a [OpFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} op(s) failed", self.0.len())?;
        for failure in self.0.iter().take(3) {
            write!(f, "; #{}: {}", failure.index, failure.message)?;
        }
        if self.0.len() > 3 {
            write!(f, "; ...")?;
        }
        Ok(())
    }
}
