//! Connection Pool
//!
//! Shares a bounded set of idle connections between concurrent callers.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::queue::ArrayQueue;

use super::Connection;
use crate::config::Config;
use crate::error::{BridgeError, Result};

/// Pool of backend connections
///
/// Callers check out a connection, use it, and drop the guard. Healthy
/// connections go back to the idle queue; broken ones are discarded. When
/// every idle connection is in use a new one is opened, so the pool never
/// blocks, it only bounds how many connections stay open while idle.
pub struct ConnectionPool {
    config: Config,
    idle: ArrayQueue<Connection>,
    closed: AtomicBool,
}

impl ConnectionPool {
    /// Create an empty pool; connections are opened on demand
    pub fn new(config: Config) -> Self {
        let idle = ArrayQueue::new(config.pool_size.max(1));
        Self {
            config,
            idle,
            closed: AtomicBool::new(false),
        }
    }

    /// Check out a connection, opening a new one if none is idle
    pub fn get(&self) -> Result<PooledConnection<'_>> {
        if self.is_closed() {
            return Err(BridgeError::Closed);
        }

        let conn = match self.idle.pop() {
            Some(conn) => conn,
            None => Connection::connect(&self.config)?,
        };

        Ok(PooledConnection {
            pool: self,
            conn: Some(conn),
        })
    }

    /// Close the pool and every idle connection
    ///
    /// Connections still checked out are dropped when their guard is.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut dropped = 0;
        while self.idle.pop().is_some() {
            dropped += 1;
        }
        tracing::debug!(endpoint = %self.config.endpoint, dropped, "Connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of idle connections
    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn give_back(&self, conn: Connection) {
        if conn.is_broken() || self.is_closed() {
            return;
        }
        // A full queue drops the surplus connection
        if self.idle.push(conn).is_ok() && self.is_closed() {
            // close() ran between the check and the push
            while self.idle.pop().is_some() {}
        }
    }
}

/// A checked-out connection, returned to the pool on drop
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.give_back(conn);
        }
    }
}
