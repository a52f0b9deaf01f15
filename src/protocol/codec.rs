//! Protocol codec
//!
//! Encoding and decoding functions for the RESP2 wire protocol.
//!
//! ## Wire Format
//!
//! ### Request (Command) Format
//! Every command is an array of bulk strings, name first:
//! ```text
//! *3\r\n $3\r\nSET\r\n $1\r\nk\r\n $1\r\nv\r\n
//! ```
//!
//! ### Reply Format
//! ```text
//! +OK\r\n            simple string
//! -ERR msg\r\n       error
//! :42\r\n            integer
//! $5\r\nhello\r\n    bulk string ($-1 = null)
//! *2\r\n...          array (*-1 = null)
//! ```

use std::io::{BufRead, Cursor, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use super::{Command, Reply};
use crate::error::{BridgeError, Result};

/// Maximum bulk string size (512 MB, the backend's own limit)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum number of elements accepted in one array
pub const MAX_ARRAY_LEN: usize = 16 * 1024 * 1024;

/// Maximum nesting of arrays inside arrays
const MAX_DEPTH: usize = 8;

const CRLF: &[u8] = b"\r\n";

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
pub fn encode_command(command: &Command) -> Bytes {
    let mut buf = BytesMut::new();
    put_command(&mut buf, command);
    buf.freeze()
}

/// Encode several commands back to back, for a single pipelined write
pub fn encode_pipeline(commands: &[Command]) -> Bytes {
    let mut buf = BytesMut::new();
    for command in commands {
        put_command(&mut buf, command);
    }
    buf.freeze()
}

fn put_command(buf: &mut BytesMut, command: &Command) {
    let args = command.args();
    let size: usize = args.iter().map(|a| a.len() + 16).sum();
    buf.reserve(size + 16);

    put_header(buf, b'*', args.len() as i64);
    for arg in &args {
        put_header(buf, b'$', arg.len() as i64);
        buf.put_slice(arg);
        buf.put_slice(CRLF);
    }
}

/// Decode a command from bytes
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let mut cursor = Cursor::new(bytes);
    read_command(&mut cursor).map_err(incomplete_as_protocol)
}

// =============================================================================
// Reply Encoding/Decoding
// =============================================================================

/// Encode a reply to bytes
pub fn encode_reply(reply: &Reply) -> Bytes {
    let mut buf = BytesMut::new();
    put_reply(&mut buf, reply);
    buf.freeze()
}

fn put_reply(buf: &mut BytesMut, reply: &Reply) {
    match reply {
        Reply::Simple(status) => put_line(buf, b'+', status),
        Reply::Error(message) => put_line(buf, b'-', message),
        Reply::Integer(n) => put_header(buf, b':', *n),
        Reply::Bulk(None) => put_header(buf, b'$', -1),
        Reply::Bulk(Some(bytes)) => {
            put_header(buf, b'$', bytes.len() as i64);
            buf.put_slice(bytes);
            buf.put_slice(CRLF);
        }
        Reply::Array(None) => put_header(buf, b'*', -1),
        Reply::Array(Some(items)) => {
            put_header(buf, b'*', items.len() as i64);
            for item in items {
                put_reply(buf, item);
            }
        }
    }
}

/// Single-line reply; CR and LF would end the frame early, so they become spaces
fn put_line(buf: &mut BytesMut, marker: u8, text: &str) {
    buf.put_u8(marker);
    buf.extend(
        text.bytes()
            .map(|b| if b == b'\r' || b == b'\n' { b' ' } else { b }),
    );
    buf.put_slice(CRLF);
}

fn put_header(buf: &mut BytesMut, marker: u8, n: i64) {
    buf.put_u8(marker);
    buf.put_slice(n.to_string().as_bytes());
    buf.put_slice(CRLF);
}

/// Decode a single reply from bytes
pub fn decode_reply(bytes: &[u8]) -> Result<Reply> {
    let mut cursor = Cursor::new(bytes);
    read_reply(&mut cursor).map_err(incomplete_as_protocol)
}

fn incomplete_as_protocol(err: BridgeError) -> BridgeError {
    match err {
        BridgeError::Io(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            BridgeError::Protocol("incomplete message".to_string())
        }
        other => other,
    }
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete reply from a stream
///
/// Blocks until a complete reply is received or an error occurs
pub fn read_reply<R: BufRead>(reader: &mut R) -> Result<Reply> {
    read_reply_at_depth(reader, 0)
}

fn read_reply_at_depth<R: BufRead>(reader: &mut R, depth: usize) -> Result<Reply> {
    let line = read_line(reader)?;
    let (marker, body) = match line.split_first() {
        Some((marker, body)) => (*marker, body),
        None => return Err(BridgeError::Protocol("empty reply line".to_string())),
    };

    match marker {
        b'+' => Ok(Reply::Simple(String::from_utf8_lossy(body).into_owned())),
        b'-' => Ok(Reply::Error(String::from_utf8_lossy(body).into_owned())),
        b':' => Ok(Reply::Integer(parse_int(body)?)),
        b'$' => {
            let len = parse_int(body)?;
            if len < 0 {
                return Ok(Reply::Bulk(None));
            }
            Ok(Reply::Bulk(Some(read_bulk_body(reader, len as usize)?)))
        }
        b'*' => {
            let len = parse_int(body)?;
            if len < 0 {
                return Ok(Reply::Array(None));
            }
            let len = len as usize;
            if len > MAX_ARRAY_LEN {
                return Err(BridgeError::Protocol(format!(
                    "Array too large: {} elements (max {})",
                    len, MAX_ARRAY_LEN
                )));
            }
            if depth >= MAX_DEPTH {
                return Err(BridgeError::Protocol("Arrays nested too deeply".to_string()));
            }

            let mut items = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                items.push(read_reply_at_depth(reader, depth + 1)?);
            }
            Ok(Reply::Array(Some(items)))
        }
        _ => Err(BridgeError::Protocol(format!(
            "Unknown reply type: 0x{:02x}",
            marker
        ))),
    }
}

/// Read a complete command (array of bulk strings) from a stream
pub fn read_command<R: BufRead>(reader: &mut R) -> Result<Command> {
    let line = read_line(reader)?;
    if line.first() != Some(&b'*') {
        return Err(BridgeError::Protocol("command must be an array".to_string()));
    }

    let argc = parse_int(&line[1..])?;
    if argc <= 0 || argc as usize > MAX_ARRAY_LEN {
        return Err(BridgeError::Protocol(format!("invalid argument count {}", argc)));
    }

    let mut args = Vec::with_capacity((argc as usize).min(1024));
    for _ in 0..argc {
        let header = read_line(reader)?;
        if header.first() != Some(&b'$') {
            return Err(BridgeError::Protocol("command argument must be a bulk string".to_string()));
        }
        let len = parse_int(&header[1..])?;
        if len < 0 {
            return Err(BridgeError::Protocol("null command argument".to_string()));
        }
        args.push(read_bulk_body(reader, len as usize)?);
    }

    Command::from_args(args)
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    writer.write_all(&encode_command(command))?;
    writer.flush()?;
    Ok(())
}

/// Write several commands with a single flush
pub fn write_pipeline<W: Write>(writer: &mut W, commands: &[Command]) -> Result<()> {
    writer.write_all(&encode_pipeline(commands))?;
    writer.flush()?;
    Ok(())
}

/// Write a reply to a stream
pub fn write_reply<W: Write>(writer: &mut W, reply: &Reply) -> Result<()> {
    writer.write_all(&encode_reply(reply))?;
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Helpers
// =============================================================================

/// Read one CRLF-terminated line, without the terminator
fn read_line<R: BufRead>(reader: &mut R) -> Result<Vec<u8>> {
    let mut line = Vec::new();
    let n = reader.read_until(b'\n', &mut line)?;
    if n == 0 {
        return Err(BridgeError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed",
        )));
    }
    if !line.ends_with(CRLF) {
        if line.ends_with(b"\n") {
            return Err(BridgeError::Protocol("line not terminated by CRLF".to_string()));
        }
        return Err(BridgeError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "truncated line",
        )));
    }
    line.truncate(line.len() - 2);
    Ok(line)
}

fn read_bulk_body<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    if len > MAX_BULK_SIZE {
        return Err(BridgeError::Protocol(format!(
            "Bulk string too large: {} bytes (max {})",
            len, MAX_BULK_SIZE
        )));
    }

    let mut body = vec![0u8; len + 2];
    reader.read_exact(&mut body)?;
    if !body.ends_with(CRLF) {
        return Err(BridgeError::Protocol("bulk string not terminated by CRLF".to_string()));
    }
    body.truncate(len);
    Ok(body)
}

fn parse_int(raw: &[u8]) -> Result<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            BridgeError::Protocol(format!("invalid integer: {}", String::from_utf8_lossy(raw)))
        })
}
