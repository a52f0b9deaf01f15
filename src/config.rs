//! Configuration for bridgekv
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::error::{BridgeError, Result};

/// Main configuration for a bridgekv database handle
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Endpoint Configuration
    // -------------------------------------------------------------------------
    /// Backend address (host:port)
    pub endpoint: String,

    /// Password sent with AUTH during the handshake (None = no AUTH)
    pub password: Option<String>,

    /// Logical database selected after connecting
    pub database: u32,

    // -------------------------------------------------------------------------
    // Connection Configuration
    // -------------------------------------------------------------------------
    /// Max idle connections kept in the pool
    pub pool_size: usize,

    /// TCP connect timeout (milliseconds)
    pub connect_timeout_ms: u64,

    /// Socket read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Socket write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Adapter Configuration
    // -------------------------------------------------------------------------
    /// COUNT hint passed to every SCAN page
    pub scan_page_size: usize,

    /// Number of keys fetched per MGET window (iterators and snapshots)
    pub fetch_batch_size: usize,

    /// Wrap batch flushes in MULTI/EXEC
    pub atomic_pipeline: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:6379".to_string(),
            password: None,
            database: 0,
            pool_size: 16,
            connect_timeout_ms: 3000,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
            scan_page_size: 1000,
            fetch_batch_size: 256,
            atomic_pipeline: false,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check that the configuration can be used to open a database
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(BridgeError::Config("endpoint must not be empty".to_string()));
        }
        if self.pool_size == 0 {
            return Err(BridgeError::Config("pool_size must be at least 1".to_string()));
        }
        if self.scan_page_size == 0 {
            return Err(BridgeError::Config("scan_page_size must be at least 1".to_string()));
        }
        if self.fetch_batch_size == 0 {
            return Err(BridgeError::Config("fetch_batch_size must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Read timeout, `None` when disabled
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_ms > 0).then(|| Duration::from_millis(self.read_timeout_ms))
    }

    /// Write timeout, `None` when disabled
    pub fn write_timeout(&self) -> Option<Duration> {
        (self.write_timeout_ms > 0).then(|| Duration::from_millis(self.write_timeout_ms))
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the backend address
    pub fn endpoint(mut self, addr: impl Into<String>) -> Self {
        self.config.endpoint = addr.into();
        self
    }

    /// Set the AUTH password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    /// Set the logical database index
    pub fn database(mut self, index: u32) -> Self {
        self.config.database = index;
        self
    }

    /// Set the maximum number of pooled idle connections
    pub fn pool_size(mut self, size: usize) -> Self {
        self.config.pool_size = size;
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the SCAN COUNT hint
    pub fn scan_page_size(mut self, size: usize) -> Self {
        self.config.scan_page_size = size;
        self
    }

    /// Set the MGET window size
    pub fn fetch_batch_size(mut self, size: usize) -> Self {
        self.config.fetch_batch_size = size;
        self
    }

    /// Wrap batch flushes in MULTI/EXEC
    pub fn atomic_pipeline(mut self, enabled: bool) -> Self {
        self.config.atomic_pipeline = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
