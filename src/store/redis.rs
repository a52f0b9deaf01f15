//! Redis-backed store
//!
//! Maps every primitive onto one RESP command over a pooled connection.

use std::collections::HashMap;
use std::time::Duration;

use super::{OpKind, OpResult, RemoteStore, WriteOp};
use crate::config::Config;
use crate::error::{BridgeError, Result};
use crate::network::ConnectionPool;
use crate::protocol::{Command, Reply};

/// Store backed by a Redis-compatible server
pub struct RedisStore {
    pool: ConnectionPool,
    atomic_pipeline: bool,
}

impl RedisStore {
    /// Validate the config, open a first connection and run the handshake
    ///
    /// Fails if the endpoint is unreachable or does not answer PING.
    pub fn connect(config: Config) -> Result<Self> {
        config.validate()?;

        let atomic_pipeline = config.atomic_pipeline;
        let pool = ConnectionPool::new(config);
        // Handshake now so a bad endpoint fails fast; the connection stays pooled
        drop(pool.get()?);

        tracing::info!(endpoint = %pool.config().endpoint, "Connected to backend");
        Ok(Self {
            pool,
            atomic_pipeline,
        })
    }

    fn call(&self, command: Command) -> Result<Reply> {
        let mut conn = self.pool.get()?;
        conn.call(&command)
    }

    fn write_commands(ops: &[WriteOp]) -> Vec<Command> {
        ops.iter()
            .map(|op| match op.kind {
                OpKind::Put => Command::Set {
                    key: op.key.clone(),
                    value: op.value.clone(),
                    expiry: None,
                },
                OpKind::Delete => Command::Del {
                    keys: vec![op.key.clone()],
                },
            })
            .collect()
    }

    /// Per-op outcome of a plain pipeline reply
    fn op_result(reply: Reply) -> OpResult {
        match reply {
            Reply::Error(message) => Err(message),
            _ => Ok(()),
        }
    }

    /// MULTI, ops..., EXEC in one round trip
    fn transaction(&self, ops: &[WriteOp]) -> Result<Vec<OpResult>> {
        let mut commands = Vec::with_capacity(ops.len() + 2);
        commands.push(Command::Multi);
        commands.extend(Self::write_commands(ops));
        commands.push(Command::Exec);

        let mut replies = {
            let mut conn = self.pool.get()?;
            conn.pipeline(&commands)?
        };

        let exec = replies.pop().ok_or_else(|| {
            BridgeError::Protocol("empty transaction reply".to_string())
        })?;
        let mut replies = replies.into_iter();
        replies
            .next()
            .ok_or_else(|| BridgeError::Protocol("missing MULTI reply".to_string()))?
            .into_status()?;

        // An op rejected while queueing aborts the whole block
        let queued: Vec<Reply> = replies.collect();
        if queued.iter().any(Reply::is_error) {
            return Ok(queued
                .into_iter()
                .map(|reply| match reply {
                    Reply::Error(message) => Err(message),
                    _ => Err("transaction aborted".to_string()),
                })
                .collect());
        }

        match exec {
            Reply::Array(Some(results)) if results.len() == ops.len() => {
                Ok(results.into_iter().map(Self::op_result).collect())
            }
            Reply::Error(message) => Err(BridgeError::Backend(message)),
            _ => Err(BridgeError::Protocol(format!(
                "EXEC reply does not match {} queued op(s)",
                ops.len()
            ))),
        }
    }
}

impl RemoteStore for RedisStore {
    fn exists(&self, keys: &[&[u8]]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let keys = keys.iter().map(|k| k.to_vec()).collect();
        let n = self.call(Command::Exists { keys })?.into_integer()?;
        Ok(n.max(0) as u64)
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.call(Command::Get { key: key.to_vec() })?.into_bulk()
    }

    fn multi_get(&self, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let values = self
            .call(Command::MGet { keys: keys.to_vec() })?
            .into_values()?;
        if values.len() != keys.len() {
            return Err(BridgeError::Protocol(format!(
                "MGET returned {} values for {} keys",
                values.len(),
                keys.len()
            )));
        }
        Ok(values)
    }

    fn set(&self, key: &[u8], value: &[u8], expiry: Option<Duration>) -> Result<()> {
        self.call(Command::Set {
            key: key.to_vec(),
            value: value.to_vec(),
            expiry,
        })?
        .into_status()?;
        Ok(())
    }

    fn delete(&self, keys: &[&[u8]]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let keys = keys.iter().map(|k| k.to_vec()).collect();
        let n = self.call(Command::Del { keys })?.into_integer()?;
        Ok(n.max(0) as u64)
    }

    fn pipeline(&self, ops: &[WriteOp]) -> Result<Vec<OpResult>> {
        if ops.is_empty() {
            return Ok(Vec::new());
        }
        if self.atomic_pipeline {
            return self.transaction(ops);
        }

        let commands = Self::write_commands(ops);
        let replies = {
            let mut conn = self.pool.get()?;
            conn.pipeline(&commands)?
        };
        Ok(replies.into_iter().map(Self::op_result).collect())
    }

    fn scan(&self, cursor: u64, pattern: &[u8], count: usize) -> Result<(u64, Vec<Vec<u8>>)> {
        self.call(Command::Scan {
            cursor,
            pattern: pattern.to_vec(),
            count,
        })?
        .into_scan_page()
    }

    fn config_get(&self, parameter: &str) -> Result<HashMap<String, String>> {
        self.call(Command::ConfigGet {
            parameter: parameter.to_string(),
        })?
        .into_string_map()
    }

    fn ping(&self) -> Result<()> {
        self.call(Command::Ping)?.into_status()?;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.pool.close();
        Ok(())
    }
}
