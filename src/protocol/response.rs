//! Reply definitions
//!
//! Represents RESP2 replies from the backend, with typed accessors that turn
//! error replies into `BridgeError::Backend`.

use std::collections::HashMap;

use crate::error::{BridgeError, Result};

/// A RESP2 reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK`
    Simple(String),

    /// `-ERR message`
    Error(String),

    /// `:42`
    Integer(i64),

    /// `$5\r\nhello` (None for the null bulk string `$-1`)
    Bulk(Option<Vec<u8>>),

    /// `*2\r\n...` (None for the null array `*-1`)
    Array(Option<Vec<Reply>>),
}

impl Reply {
    /// `+OK`
    pub fn ok() -> Self {
        Reply::Simple("OK".to_string())
    }

    /// Error reply with the conventional `ERR` prefix
    pub fn error(message: &str) -> Self {
        Reply::Error(format!("ERR {}", message))
    }

    pub fn bulk(bytes: impl Into<Vec<u8>>) -> Self {
        Reply::Bulk(Some(bytes.into()))
    }

    /// Null bulk string
    pub fn nil() -> Self {
        Reply::Bulk(None)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Convert an error reply into `Err`, passing everything else through
    pub fn into_result(self) -> Result<Reply> {
        match self {
            Reply::Error(message) => Err(BridgeError::Backend(message)),
            other => Ok(other),
        }
    }

    /// Expect a status reply (`+OK`, `+PONG`, `+QUEUED`)
    pub fn into_status(self) -> Result<String> {
        match self.into_result()? {
            Reply::Simple(status) => Ok(status),
            other => Err(unexpected("status", &other)),
        }
    }

    pub fn into_integer(self) -> Result<i64> {
        match self.into_result()? {
            Reply::Integer(n) => Ok(n),
            other => Err(unexpected("integer", &other)),
        }
    }

    /// Expect a bulk string; `None` means the key was absent
    pub fn into_bulk(self) -> Result<Option<Vec<u8>>> {
        match self.into_result()? {
            Reply::Bulk(value) => Ok(value),
            other => Err(unexpected("bulk string", &other)),
        }
    }

    /// Expect a non-null array
    pub fn into_array(self) -> Result<Vec<Reply>> {
        match self.into_result()? {
            Reply::Array(Some(items)) => Ok(items),
            other => Err(unexpected("array", &other)),
        }
    }

    /// Decode an MGET reply: one optional value per requested key
    pub fn into_values(self) -> Result<Vec<Option<Vec<u8>>>> {
        self.into_array()?
            .into_iter()
            .map(Reply::into_bulk)
            .collect()
    }

    /// Decode a SCAN reply: `[next_cursor, [key, ...]]`
    pub fn into_scan_page(self) -> Result<(u64, Vec<Vec<u8>>)> {
        let mut parts = self.into_array()?.into_iter();
        let (cursor, keys) = match (parts.next(), parts.next(), parts.next()) {
            (Some(cursor), Some(keys), None) => (cursor, keys),
            _ => return Err(BridgeError::Protocol("SCAN reply must have 2 elements".to_string())),
        };

        let cursor = cursor
            .into_bulk()?
            .and_then(|raw| String::from_utf8(raw).ok())
            .and_then(|raw| raw.parse::<u64>().ok())
            .ok_or_else(|| BridgeError::Protocol("SCAN cursor is not a number".to_string()))?;

        let keys = keys
            .into_array()?
            .into_iter()
            .map(|key| {
                key.into_bulk()?
                    .ok_or_else(|| BridgeError::Protocol("SCAN returned a null key".to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((cursor, keys))
    }

    /// Decode a CONFIG GET reply: flat `[name, value, name, value, ...]`
    pub fn into_string_map(self) -> Result<HashMap<String, String>> {
        let items = self.into_array()?;
        if items.len() % 2 != 0 {
            return Err(BridgeError::Protocol(
                "map reply has an odd number of elements".to_string(),
            ));
        }

        let mut map = HashMap::with_capacity(items.len() / 2);
        let mut items = items.into_iter();
        while let (Some(name), Some(value)) = (items.next(), items.next()) {
            map.insert(lossy(name.into_bulk()?), lossy(value.into_bulk()?));
        }
        Ok(map)
    }
}

fn lossy(bytes: Option<Vec<u8>>) -> String {
    bytes
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .unwrap_or_default()
}

fn unexpected(expected: &str, got: &Reply) -> BridgeError {
    let kind = match got {
        Reply::Simple(_) => "status",
        Reply::Error(_) => "error",
        Reply::Integer(_) => "integer",
        Reply::Bulk(_) => "bulk string",
        Reply::Array(_) => "array",
    };
    BridgeError::Protocol(format!("expected {} reply, got {}", expected, kind))
}
