//! Relay Protocol - Wire format for the line relay
//!
//! This crate provides the framing codec and the formatting of every line
//! the daemon writes to its clients. The wire is plain text: one message
//! per `\n`-terminated line, no length prefix, no envelope.

pub mod codec;
pub mod message;

pub use codec::{decode_line, line_codec, normalize_line, DEFAULT_MAX_LINE_LENGTH};
pub use message::{MessageParseError, RelayMessage, DEPARTURE_SUFFIX, HEARTBEAT_TEXT, SERVER_MARKER};

/// Default TCP port the daemon listens on.
pub const DEFAULT_PORT: u16 = 29999;
