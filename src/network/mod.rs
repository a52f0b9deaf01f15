//! Network Module
//!
//! TCP connections to the backend.
//!
//! ## Architecture
//! - One blocking TCP connection per in-flight call
//! - Idle connections kept in a bounded pool and shared by all callers
//! - Read/write timeouts bound every round trip

mod connection;
mod pool;

pub use connection::Connection;
pub use pool::{ConnectionPool, PooledConnection};
