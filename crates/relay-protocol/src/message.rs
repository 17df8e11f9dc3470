//! Broadcast line formats.
//!
//! Every line the daemon emits is one of three shapes:
//!
//! ```text
//! V1StGXR8_Z: hello everyone                      relayed chat line
//! === server: V1StGXR8_Z disconnected ===         departure notice
//! === server: take it easy, everyone! ===         active heartbeat
//! ```

use std::fmt;

use relay_core::{ClientId, IdentityError};
use thiserror::Error;

/// Prefix marking a line that originates from the server itself.
pub const SERVER_MARKER: &str = "=== server:";

/// Text of the active-mode heartbeat broadcast.
pub const HEARTBEAT_TEXT: &str = "take it easy, everyone!";

/// Suffix of a departure notice after the departed client id.
pub const DEPARTURE_SUFFIX: &str = "disconnected";

const NOTICE_END: &str = " ===";

/// A line broadcast by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    /// A client line, tagged with its sender.
    Chat {
        /// Sender identity
        from: ClientId,
        /// The line with trailing whitespace removed
        body: String,
    },

    /// A client left; sent to the remaining clients only.
    Departure {
        /// Identity of the departed client
        client_id: ClientId,
    },

    /// Periodic keepalive broadcast while clients are connected.
    Heartbeat,
}

impl RelayMessage {
    /// Creates a chat line.
    pub fn chat(from: ClientId, body: impl Into<String>) -> Self {
        Self::Chat {
            from,
            body: body.into(),
        }
    }

    /// Creates a departure notice.
    pub fn departure(client_id: ClientId) -> Self {
        Self::Departure { client_id }
    }

    /// Creates the heartbeat broadcast.
    pub fn heartbeat() -> Self {
        Self::Heartbeat
    }

    /// Renders the message as a newline-terminated wire line.
    pub fn to_wire(&self) -> String {
        format!("{self}\n")
    }

    /// Parses a received line (without its terminator) back into a message.
    ///
    /// Used by clients and tests to classify what the relay sent.
    pub fn parse(line: &str) -> Result<Self, MessageParseError> {
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(rest) = line.strip_prefix(SERVER_MARKER) {
            let inner = rest
                .strip_prefix(' ')
                .and_then(|r| r.strip_suffix(NOTICE_END))
                .ok_or_else(|| MessageParseError::MalformedNotice(line.to_string()))?;

            if inner == HEARTBEAT_TEXT {
                return Ok(Self::Heartbeat);
            }

            let id = inner
                .strip_suffix(DEPARTURE_SUFFIX)
                .and_then(|r| r.strip_suffix(' '))
                .ok_or_else(|| MessageParseError::MalformedNotice(line.to_string()))?;
            return Ok(Self::Departure {
                client_id: ClientId::parse(id)?,
            });
        }

        let (from, body) = line
            .split_once(": ")
            .or_else(|| line.strip_suffix(':').map(|from| (from, "")))
            .ok_or_else(|| MessageParseError::MissingSender(line.to_string()))?;

        Ok(Self::Chat {
            from: ClientId::parse(from)?,
            body: body.to_string(),
        })
    }
}

impl fmt::Display for RelayMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat { from, body } => write!(f, "{from}: {body}"),
            Self::Departure { client_id } => {
                write!(f, "{SERVER_MARKER} {client_id} {DEPARTURE_SUFFIX}{NOTICE_END}")
            }
            Self::Heartbeat => write!(f, "{SERVER_MARKER} {HEARTBEAT_TEXT}{NOTICE_END}"),
        }
    }
}

/// Errors from classifying a received line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageParseError {
    #[error("line has no sender prefix: {0:?}")]
    MissingSender(String),

    #[error("malformed server notice: {0:?}")]
    MalformedNotice(String),

    #[error("invalid sender id: {0}")]
    InvalidSender(#[from] IdentityError),
}
