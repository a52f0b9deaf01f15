//! Protocol Module
//!
//! Defines the RESP2 wire protocol spoken by the backend.
//!
//! ## Request Format
//! ```text
//! ┌──────────┬──────────────────┬──────────────────┬─────┐
//! │ *<argc>  │ $<len> <name>    │ $<len> <arg 1>   │ ... │
//! └──────────┴──────────────────┴──────────────────┴─────┘
//! ```
//!
//! ### Commands used by the adapter
//! - PING, AUTH, SELECT            (handshake)
//! - EXISTS, GET, SET, DEL         (point operations)
//! - MGET                          (value windows for iterators and snapshots)
//! - SCAN cursor MATCH p COUNT n   (key enumeration)
//! - MULTI / EXEC                  (optional atomic batch flush)
//! - CONFIG GET                    (diagnostics)
//!
//! ## Reply Types
//! - `+` status, `-` error, `:` integer, `$` bulk string, `*` array

mod command;
mod response;
mod codec;
mod pattern;

pub use command::{Command, CommandType};
pub use response::Reply;
pub use codec::{
    decode_command, decode_reply, encode_command, encode_pipeline, encode_reply, read_command,
    read_reply, write_command, write_pipeline, write_reply, MAX_ARRAY_LEN, MAX_BULK_SIZE,
};
pub use pattern::{glob_match, prefix_pattern};
