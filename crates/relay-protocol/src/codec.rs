//! Line framing.
//!
//! Inbound bytes are split at `\n` into raw frames. Frames are bytes, not
//! text: a line that is not valid UTF-8 is still a line, and is decoded
//! lossily by [`decode_line`] rather than rejected. The maximum line length
//! is always explicit: an unbounded codec would buffer forever for a client
//! that never sends a newline.

use std::borrow::Cow;

use tokio_util::codec::AnyDelimiterCodec;

/// Maximum inbound line length in bytes (1 MB).
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1_048_576;

/// Creates the inbound line codec with the given maximum length.
///
/// A zero limit is treated as the default rather than "no limit".
pub fn line_codec(max_line_length: usize) -> AnyDelimiterCodec {
    let max = if max_line_length == 0 {
        DEFAULT_MAX_LINE_LENGTH
    } else {
        max_line_length
    };
    AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), b"\n".to_vec(), max)
}

/// Turns a raw frame into text.
///
/// Drops a trailing `\r` and replaces invalid UTF-8 sequences with U+FFFD.
pub fn decode_line(frame: &[u8]) -> Cow<'_, str> {
    let frame = frame.strip_suffix(b"\r").unwrap_or(frame);
    String::from_utf8_lossy(frame)
}

/// Normalizes a decoded line into the payload that gets relayed.
///
/// Trailing whitespace is not part of the message.
pub fn normalize_line(line: &str) -> &str {
    line.trim_end()
}
