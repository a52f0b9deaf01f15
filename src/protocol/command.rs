//! Command definitions
//!
//! Typed backend commands and their RESP argument vectors.

use std::borrow::Cow;
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    Ping,
    Auth,
    Select,
    Exists,
    Get,
    MGet,
    Set,
    Del,
    Scan,
    ConfigGet,
    Multi,
    Exec,
}

impl CommandType {
    /// Command name as sent on the wire
    pub fn name(&self) -> &'static str {
        match self {
            CommandType::Ping => "PING",
            CommandType::Auth => "AUTH",
            CommandType::Select => "SELECT",
            CommandType::Exists => "EXISTS",
            CommandType::Get => "GET",
            CommandType::MGet => "MGET",
            CommandType::Set => "SET",
            CommandType::Del => "DEL",
            CommandType::Scan => "SCAN",
            CommandType::ConfigGet => "CONFIG",
            CommandType::Multi => "MULTI",
            CommandType::Exec => "EXEC",
        }
    }
}

/// A backend command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Health check
    Ping,

    /// Authenticate the connection
    Auth { password: String },

    /// Select the logical database
    Select { index: u32 },

    /// Count how many of the keys exist
    Exists { keys: Vec<Vec<u8>> },

    /// Get a value by key
    Get { key: Vec<u8> },

    /// Get many values, aligned by input index
    MGet { keys: Vec<Vec<u8>> },

    /// Set a value, optionally expiring
    Set {
        key: Vec<u8>,
        value: Vec<u8>,
        expiry: Option<Duration>,
    },

    /// Delete keys
    Del { keys: Vec<Vec<u8>> },

    /// One page of a cursor scan
    Scan {
        cursor: u64,
        pattern: Vec<u8>,
        count: usize,
    },

    /// Read configuration parameters
    ConfigGet { parameter: String },

    /// Open a transaction block
    Multi,

    /// Execute the queued transaction block
    Exec,
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Ping => CommandType::Ping,
            Command::Auth { .. } => CommandType::Auth,
            Command::Select { .. } => CommandType::Select,
            Command::Exists { .. } => CommandType::Exists,
            Command::Get { .. } => CommandType::Get,
            Command::MGet { .. } => CommandType::MGet,
            Command::Set { .. } => CommandType::Set,
            Command::Del { .. } => CommandType::Del,
            Command::Scan { .. } => CommandType::Scan,
            Command::ConfigGet { .. } => CommandType::ConfigGet,
            Command::Multi => CommandType::Multi,
            Command::Exec => CommandType::Exec,
        }
    }

    /// Arguments of the command, name first
    pub fn args(&self) -> Vec<Cow<'_, [u8]>> {
        let name = Cow::Borrowed(self.command_type().name().as_bytes());
        let mut args = vec![name];

        match self {
            Command::Ping | Command::Multi | Command::Exec => {}
            Command::Auth { password } => args.push(Cow::Borrowed(password.as_bytes())),
            Command::Select { index } => args.push(number(*index as u64)),
            Command::Exists { keys } | Command::MGet { keys } | Command::Del { keys } => {
                args.extend(keys.iter().map(|k| Cow::Borrowed(k.as_slice())));
            }
            Command::Get { key } => args.push(Cow::Borrowed(key.as_slice())),
            Command::Set { key, value, expiry } => {
                args.push(Cow::Borrowed(key.as_slice()));
                args.push(Cow::Borrowed(value.as_slice()));
                // Zero expiry means "keep forever", so no PX argument at all
                if let Some(ttl) = expiry.filter(|ttl| !ttl.is_zero()) {
                    // Sub-millisecond rounds up, beyond u64 millis saturates
                    let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
                    args.push(Cow::Borrowed(&b"PX"[..]));
                    args.push(number(millis));
                }
            }
            Command::Scan { cursor, pattern, count } => {
                args.push(number(*cursor));
                args.push(Cow::Borrowed(&b"MATCH"[..]));
                args.push(Cow::Borrowed(pattern.as_slice()));
                args.push(Cow::Borrowed(&b"COUNT"[..]));
                args.push(number(*count as u64));
            }
            Command::ConfigGet { parameter } => {
                args.push(Cow::Borrowed(&b"GET"[..]));
                args.push(Cow::Borrowed(parameter.as_bytes()));
            }
        }

        args
    }

    /// Parse a command from its argument vector (the inverse of `args`)
    pub fn from_args(mut args: Vec<Vec<u8>>) -> Result<Self> {
        if args.is_empty() {
            return Err(BridgeError::Protocol("empty command".to_string()));
        }
        let name = String::from_utf8_lossy(&args.remove(0)).to_ascii_uppercase();
        let mut rest = args.into_iter();

        let command = match name.as_str() {
            "PING" => Command::Ping,
            "MULTI" => Command::Multi,
            "EXEC" => Command::Exec,
            "AUTH" => Command::Auth {
                password: text(required(&mut rest, "AUTH")?)?,
            },
            "SELECT" => Command::Select {
                index: parse_number(&required(&mut rest, "SELECT")?)? as u32,
            },
            "EXISTS" => Command::Exists { keys: rest.by_ref().collect() },
            "MGET" => Command::MGet { keys: rest.by_ref().collect() },
            "DEL" => Command::Del { keys: rest.by_ref().collect() },
            "GET" => Command::Get {
                key: required(&mut rest, "GET")?,
            },
            "SET" => {
                let key = required(&mut rest, "SET")?;
                let value = required(&mut rest, "SET")?;
                let expiry = match rest.next() {
                    None => None,
                    Some(opt) if opt.eq_ignore_ascii_case(b"PX") => Some(Duration::from_millis(
                        parse_number(&required(&mut rest, "SET")?)?,
                    )),
                    Some(opt) if opt.eq_ignore_ascii_case(b"EX") => Some(Duration::from_secs(
                        parse_number(&required(&mut rest, "SET")?)?,
                    )),
                    Some(opt) => {
                        return Err(BridgeError::Protocol(format!(
                            "SET: unsupported option {}",
                            String::from_utf8_lossy(&opt)
                        )))
                    }
                };
                Command::Set { key, value, expiry }
            }
            "SCAN" => {
                let cursor = parse_number(&required(&mut rest, "SCAN")?)?;
                let mut pattern = b"*".to_vec();
                let mut count = 10;
                while let Some(opt) = rest.next() {
                    if opt.eq_ignore_ascii_case(b"MATCH") {
                        pattern = required(&mut rest, "SCAN")?;
                    } else if opt.eq_ignore_ascii_case(b"COUNT") {
                        count = parse_number(&required(&mut rest, "SCAN")?)? as usize;
                    } else {
                        return Err(BridgeError::Protocol(format!(
                            "SCAN: unsupported option {}",
                            String::from_utf8_lossy(&opt)
                        )));
                    }
                }
                Command::Scan { cursor, pattern, count }
            }
            "CONFIG" => {
                let sub = required(&mut rest, "CONFIG")?;
                if !sub.eq_ignore_ascii_case(b"GET") {
                    return Err(BridgeError::Protocol("CONFIG: only GET is supported".to_string()));
                }
                Command::ConfigGet {
                    parameter: text(required(&mut rest, "CONFIG GET")?)?,
                }
            }
            other => {
                return Err(BridgeError::Protocol(format!("unknown command '{}'", other)));
            }
        };

        if rest.next().is_some() {
            return Err(BridgeError::Protocol(format!("{}: too many arguments", name)));
        }
        Ok(command)
    }
}

fn number(n: u64) -> Cow<'static, [u8]> {
    Cow::Owned(n.to_string().into_bytes())
}

fn required(args: &mut impl Iterator<Item = Vec<u8>>, command: &str) -> Result<Vec<u8>> {
    args.next()
        .ok_or_else(|| BridgeError::Protocol(format!("{}: missing argument", command)))
}

fn text(arg: Vec<u8>) -> Result<String> {
    String::from_utf8(arg).map_err(|_| BridgeError::Protocol("argument is not UTF-8".to_string()))
}

fn parse_number(arg: &[u8]) -> Result<u64> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            BridgeError::Protocol(format!("not a number: {}", String::from_utf8_lossy(arg)))
        })
}
