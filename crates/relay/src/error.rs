//! Error types for the relay client.
//!
//! Connection refused and connection reset get their own variants so the
//! command line can explain them; every other I/O failure is passed through.
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()` outside tests.

use std::io;
use thiserror::Error;

// ============================================================================
// Client Error Type
// ============================================================================

/// Relay client errors.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Nothing is listening at the target address.
    #[error("Connection refused by {addr}. Is the relay server running?")]
    Refused {
        /// Address the client tried to reach.
        addr: String,
    },

    /// The server dropped the connection abruptly.
    #[error("Connection reset by the server")]
    Reset,

    /// I/O error passthrough.
    #[error("IO error: {0}")]
    Io(io::Error),
}

impl ClientError {
    /// Classifies an I/O error that happened while talking to `addr`.
    pub fn from_io(error: io::Error, addr: &str) -> Self {
        match error.kind() {
            io::ErrorKind::ConnectionRefused => Self::Refused {
                addr: addr.to_string(),
            },
            io::ErrorKind::ConnectionReset => Self::Reset,
            _ => Self::Io(error),
        }
    }
}

/// Convenience Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refused_classification() {
        let err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let client_err = ClientError::from_io(err, "localhost:29999");

        assert!(matches!(client_err, ClientError::Refused { .. }));
        let display = format!("{client_err}");
        assert!(display.contains("localhost:29999"));
        assert!(display.contains("Is the relay server running?"));
    }

    #[test]
    fn test_reset_classification() {
        let err = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        assert!(matches!(
            ClientError::from_io(err, "localhost:29999"),
            ClientError::Reset
        ));
    }

    #[test]
    fn test_other_errors_pass_through() {
        let err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe");
        let client_err = ClientError::from_io(err, "localhost:29999");

        assert!(matches!(client_err, ClientError::Io(_)));
        assert!(format!("{client_err}").contains("IO error"));
    }
}
