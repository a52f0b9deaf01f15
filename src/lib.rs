//! # bridgekv
//!
//! An ordered key-value storage contract on top of a remote, flat-namespace
//! cache (Redis or compatible):
//! - Point reads and writes passed straight through
//! - Write batches flushed as one pipelined request
//! - Prefix iteration in ascending key order, built from unordered SCAN pages
//! - Read-only snapshots materialized in memory
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Database                              │
//! │           (has / get / put / delete / stat / close)          │
//! └──────┬──────────────────┬───────────────────┬───────────────┘
//!        │                  │                   │
//!        ▼                  ▼                   ▼
//!  ┌───────────┐   ┌────────────────┐   ┌─────────────┐
//!  │   Batch   │   │ PrefixIterator │   │  Snapshot   │
//!  │ (buffer)  │   │ (scan + sort)  │   │ (scan+MGET) │
//!  └─────┬─────┘   └───────┬────────┘   └──────┬──────┘
//!        │                 │                   │
//!        └─────────────────┼───────────────────┘
//!                          ▼
//!               ┌─────────────────────┐
//!               │     RemoteStore     │
//!               │ RedisStore | Memory │
//!               └──────────┬──────────┘
//!                          ▼
//!               ┌─────────────────────┐
//!               │  Connection pool    │
//!               │   (RESP over TCP)   │
//!               └─────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod cancel;

pub mod protocol;
pub mod network;
pub mod store;

pub mod kv;
pub mod scan;
pub mod batch;
pub mod iterator;
pub mod snapshot;
pub mod database;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BridgeError, OpFailure, Result};
pub use config::Config;
pub use cancel::CancelToken;
pub use kv::{KeyValueReader, KeyValueWriter};
pub use scan::ReadOptions;
pub use batch::Batch;
pub use iterator::{Entry, PrefixIterator};
pub use snapshot::Snapshot;
pub use database::Database;
pub use store::{MemoryStore, RedisStore, RemoteStore, SharedStore};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of bridgekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
