//! Backend Connection
//!
//! A single TCP connection to the backend.

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};

use crate::config::Config;
use crate::error::{BridgeError, Result};
use crate::protocol::{read_reply, write_command, write_pipeline, Command, Reply};

/// One connection to the backend
///
/// Any transport or protocol failure marks the connection broken; a broken
/// connection is never handed out again by the pool.
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Endpoint address for logging
    endpoint: String,

    broken: bool,
}

impl Connection {
    /// Connect to the configured endpoint and run the handshake
    ///
    /// Sets up buffered I/O, configures timeouts, then sends
    /// AUTH (if a password is set), SELECT (if database != 0) and PING.
    pub fn connect(config: &Config) -> Result<Self> {
        let addrs = config
            .endpoint
            .to_socket_addrs()
            .map_err(|e| BridgeError::Connection(format!("resolve {}: {}", config.endpoint, e)))?;

        let mut last_err = None;
        let mut stream = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, config.connect_timeout()) {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }
        let stream = match (stream, last_err) {
            (Some(stream), _) => stream,
            (None, Some(e)) => {
                return Err(BridgeError::Connection(format!(
                    "connect {}: {}",
                    config.endpoint, e
                )))
            }
            (None, None) => {
                return Err(BridgeError::Connection(format!(
                    "{} resolved to no addresses",
                    config.endpoint
                )))
            }
        };

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;
        stream.set_read_timeout(config.read_timeout())?;
        stream.set_write_timeout(config.write_timeout())?;

        // Clone stream for separate read/write handles
        let read_stream = stream.try_clone()?;

        let mut conn = Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            endpoint: config.endpoint.clone(),
            broken: false,
        };
        conn.handshake(config)?;

        tracing::debug!(endpoint = %conn.endpoint, "Connection established");
        Ok(conn)
    }

    fn handshake(&mut self, config: &Config) -> Result<()> {
        if let Some(password) = &config.password {
            self.call(&Command::Auth {
                password: password.clone(),
            })?
            .into_status()?;
        }
        if config.database != 0 {
            self.call(&Command::Select {
                index: config.database,
            })?
            .into_status()?;
        }
        self.call(&Command::Ping)?.into_status().map_err(|e| {
            tracing::warn!(endpoint = %self.endpoint, error = %e, "Handshake ping failed");
            e
        })?;
        Ok(())
    }

    /// Send one command and wait for its reply
    ///
    /// Error replies are returned as `Ok(Reply::Error)`; callers decide
    /// how to surface them.
    pub fn call(&mut self, command: &Command) -> Result<Reply> {
        tracing::trace!(endpoint = %self.endpoint, command = command.command_type().name(), "call");

        let result = write_command(&mut self.writer, command).and_then(|_| read_reply(&mut self.reader));
        if result.is_err() {
            self.broken = true;
        }
        result
    }

    /// Send all commands in one write, then read one reply per command
    pub fn pipeline(&mut self, commands: &[Command]) -> Result<Vec<Reply>> {
        tracing::trace!(endpoint = %self.endpoint, commands = commands.len(), "pipeline");

        let result = write_pipeline(&mut self.writer, commands).and_then(|_| {
            let mut replies = Vec::with_capacity(commands.len());
            for _ in commands {
                replies.push(read_reply(&mut self.reader)?);
            }
            Ok(replies)
        });
        if result.is_err() {
            self.broken = true;
        }
        result
    }

    /// Whether a previous call failed at the transport level
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Get the endpoint string
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
