//! Interactive relay client.
//!
//! This module provides the `RelayClient` which handles:
//! - Connecting to the relay daemon over TCP
//! - Forwarding non-empty, trimmed input lines to the server
//! - Printing every received line prefixed with an RFC 3339 UTC timestamp
//!
//! The session ends when the server closes the connection. End of input
//! alone does not end it; broadcasts keep printing until the server goes
//! away or the session is cancelled.
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()` outside tests.

use chrono::{DateTime, SecondsFormat, Utc};
use relay_protocol::DEFAULT_PORT;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{ClientError, Result};

/// Default server host.
pub const DEFAULT_HOST: &str = "localhost";

// ============================================================================
// Configuration
// ============================================================================

/// Where the client connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ClientConfig {
    /// `host:port` string for connecting.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The server closed the connection.
    ServerClosed,
}

// ============================================================================
// Relay Client
// ============================================================================

/// A connected relay session.
pub struct RelayClient {
    stream: TcpStream,
    addr: String,
}

impl RelayClient {
    /// Connects to the configured server.
    ///
    /// # Errors
    ///
    /// - `ClientError::Refused` if nothing listens at the address
    /// - `ClientError::Io` for any other connect failure
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let addr = config.address();
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| ClientError::from_io(e, &addr))?;

        debug!(addr = %addr, "Connected to relay server");
        Ok(Self { stream, addr })
    }

    /// Address this client is connected to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Runs the session until the server closes the connection.
    ///
    /// Reads lines from `input` and forwards them; writes every received
    /// line to `output` as `<timestamp>: <line>`.
    pub async fn run<I, O>(self, input: I, mut output: O) -> Result<SessionEnd>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let addr = self.addr;
        let (reader, mut writer) = self.stream.into_split();
        let mut server_lines = BufReader::new(reader).lines();
        let mut input_lines = input.lines();
        let mut input_open = true;

        loop {
            tokio::select! {
                received = server_lines.next_line() => {
                    match received.map_err(|e| ClientError::from_io(e, &addr))? {
                        Some(line) => {
                            let printed = format_received(Utc::now(), &line);
                            output
                                .write_all(printed.as_bytes())
                                .await
                                .map_err(ClientError::Io)?;
                            output.flush().await.map_err(ClientError::Io)?;
                        }
                        None => {
                            debug!(addr = %addr, "Server closed the connection");
                            return Ok(SessionEnd::ServerClosed);
                        }
                    }
                }

                typed = input_lines.next_line(), if input_open => {
                    match typed.map_err(ClientError::Io)? {
                        Some(line) => {
                            if let Some(outgoing) = outgoing_line(&line) {
                                writer
                                    .write_all(outgoing.as_bytes())
                                    .await
                                    .map_err(|e| ClientError::from_io(e, &addr))?;
                            }
                        }
                        None => {
                            debug!("Input closed, still listening");
                            input_open = false;
                        }
                    }
                }
            }
        }
    }
}

/// Formats a received line for display.
pub fn format_received(at: DateTime<Utc>, line: &str) -> String {
    format!("{}: {line}\n", at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Trims a typed line; blank lines are not sent.
pub fn outgoing_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("{trimmed}\n"))
    }
}
