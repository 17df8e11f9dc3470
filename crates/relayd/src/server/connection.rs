//! Connection handler for individual client connections.
//!
//! Each client connection gets its own `ConnectionHandler` that:
//! - Registers the connection under a fresh identity
//! - Reads `\n`-framed lines and relays each one to every registered peer,
//!   the sender included; bytes that are not UTF-8 are replaced, not fatal
//! - On EOF, read error, oversize line or shutdown: removes itself from the
//!   registry, announces the departure to the remaining peers and releases
//!   the socket
//!
//! Outbound bytes for a connection are written by one dedicated writer task
//! that drains the peer's queue, so writes to a socket never interleave.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Connection errors are logged and result in graceful disconnect

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use relay_core::{ClientId, ConnectionState};
use relay_protocol::{decode_line, line_codec, normalize_line, RelayMessage};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::registry::{fan_out, Line, Peer, RegistryError, RegistryHandle};

/// How many fresh identities to try before giving up on a connection.
const MAX_ID_ATTEMPTS: usize = 3;

/// Per-connection limits, taken from the daemon configuration.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    /// Maximum inbound line length in bytes
    pub max_line_length: usize,

    /// Per-peer outbound queue length
    pub outbound_queue: usize,

    /// Bound on a single socket write
    pub write_timeout: Duration,

    /// Source of fresh client identities
    pub id_source: fn() -> ClientId,
}

impl From<&RelayConfig> for ConnectionSettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            max_line_length: config.max_line_length,
            outbound_queue: config.outbound_queue,
            write_timeout: config.write_timeout,
            id_source: ClientId::generate,
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from(&RelayConfig::default())
    }
}

/// Connection handler for a single client.
///
/// Manages the lifecycle of a client connection including:
/// - Identity assignment and registration
/// - Line relay loop
/// - Departure notice and transport release
pub struct ConnectionHandler {
    /// Line-framed reader for incoming messages
    frames: FramedRead<OwnedReadHalf, AnyDelimiterCodec>,

    /// Write half, handed to the writer task once registered
    write_half: Option<OwnedWriteHalf>,

    /// Handle to the connection registry
    registry: RegistryHandle,

    /// Cancelled on server shutdown or when the writer fails
    cancel_token: CancellationToken,

    /// Limits for this connection
    settings: ConnectionSettings,

    /// Remote address, for logs
    peer_addr: Option<SocketAddr>,

    /// Accept counter value, for logs before an id is assigned
    connection_number: u64,

    /// Current lifecycle state
    state: ConnectionState,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The accepted TCP stream
    /// * `registry` - Handle to the connection registry
    /// * `settings` - Line length, queue and timeout limits
    /// * `cancel_token` - Token cancelled on shutdown
    /// * `connection_number` - Sequence number of this accept
    pub fn new(
        stream: TcpStream,
        registry: RegistryHandle,
        settings: ConnectionSettings,
        cancel_token: CancellationToken,
        connection_number: u64,
    ) -> Self {
        let peer_addr = stream.peer_addr().ok();
        let (reader, writer) = stream.into_split();

        Self {
            frames: FramedRead::new(reader, line_codec(settings.max_line_length)),
            write_half: Some(writer),
            registry,
            cancel_token,
            settings,
            peer_addr,
            connection_number,
            state: ConnectionState::Open,
        }
    }

    /// Runs the connection handler.
    ///
    /// Registers, relays lines until the connection ends, then performs the
    /// departure cleanup. Returns the identity the connection was known by,
    /// or `None` if it never got registered.
    pub async fn run(mut self) -> Option<ClientId> {
        debug!(
            connection = self.connection_number,
            peer_addr = ?self.peer_addr,
            "New client connected"
        );

        let (client_id, outbound) = match self.register().await {
            Ok(registered) => registered,
            Err(e) => {
                warn!(
                    connection = self.connection_number,
                    error = %e,
                    "Registration failed, closing connection"
                );
                self.state = ConnectionState::Closed;
                return None;
            }
        };

        info!(
            client_id = %client_id,
            peer_addr = ?self.peer_addr,
            "Client joined"
        );

        let writer = match self.write_half.take() {
            Some(write_half) => spawn_writer(
                client_id.clone(),
                write_half,
                outbound,
                self.settings.write_timeout,
                self.cancel_token.clone(),
            ),
            None => {
                error!(client_id = %client_id, "Write half missing, closing connection");
                self.registry.remove(&client_id).await;
                self.state = ConnectionState::Closed;
                return None;
            }
        };

        match self.process_lines(&client_id).await {
            Ok(()) => debug!(client_id = %client_id, "Client sent EOF"),
            Err(e) => debug!(client_id = %client_id, error = %e, "Connection closed"),
        }

        self.teardown(&client_id, writer).await;

        info!(client_id = %client_id, state = %self.state, "Client disconnected");
        Some(client_id)
    }

    /// Registers a fresh identity, retrying on a collision.
    async fn register(&self) -> Result<(ClientId, mpsc::Receiver<Line>), ConnectionError> {
        for attempt in 1..=MAX_ID_ATTEMPTS {
            let client_id = (self.settings.id_source)();
            let (tx, rx) = mpsc::channel(self.settings.outbound_queue);

            match self.registry.add(Peer::new(client_id.clone(), tx)).await {
                Ok(count) => {
                    debug!(client_id = %client_id, total_clients = count, "Client registered");
                    return Ok((client_id, rx));
                }
                Err(RegistryError::AlreadyRegistered(id)) => {
                    warn!(client_id = %id, attempt, "Identity collision, generating another");
                }
                Err(e) => return Err(ConnectionError::Registry(e)),
            }
        }

        Err(ConnectionError::IdentityExhausted {
            attempts: MAX_ID_ATTEMPTS,
        })
    }

    /// Main relay loop.
    ///
    /// Returns `Ok(())` on clean EOF; every other way out is an error that
    /// still ends in the normal teardown.
    async fn process_lines(&mut self, client_id: &ClientId) -> Result<(), ConnectionError> {
        loop {
            let frame = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    return Err(ConnectionError::Cancelled);
                }
                frame = self.frames.next() => frame,
            };

            match frame {
                Some(Ok(frame)) => self.relay_line(client_id, &decode_line(&frame)).await,
                Some(Err(AnyDelimiterCodecError::MaxChunkLengthExceeded)) => {
                    warn!(
                        client_id = %client_id,
                        max = self.settings.max_line_length,
                        "Line too long, closing connection"
                    );
                    return Err(ConnectionError::MessageTooLarge {
                        max: self.settings.max_line_length,
                    });
                }
                Some(Err(AnyDelimiterCodecError::Io(e))) => {
                    return Err(ConnectionError::Io(e.to_string()));
                }
                None => return Ok(()),
            }
        }
    }

    /// Tags a line with the sender and fans it out to the current snapshot.
    async fn relay_line(&self, client_id: &ClientId, line: &str) {
        if !self.state.is_open() {
            return;
        }

        let message = RelayMessage::chat(client_id.clone(), normalize_line(line));
        let wire: Line = Arc::from(message.to_wire());

        let peers = self.registry.snapshot().await;
        let report = fan_out(&peers, &wire);

        debug!(
            client_id = %client_id,
            peers = peers.len(),
            delivered = report.delivered,
            dropped = report.dropped,
            "Relayed line"
        );
    }

    /// Departure cleanup: deregister, notify the others, release the socket.
    async fn teardown(&mut self, client_id: &ClientId, mut writer: JoinHandle<()>) {
        let removed = self.registry.remove(client_id).await;
        self.state = self.state.advance();

        // Only the call that actually removed the peer announces it
        if removed {
            let notice: Line = Arc::from(RelayMessage::departure(client_id.clone()).to_wire());
            let peers = self.registry.snapshot().await;
            let report = fan_out(&peers, &notice);
            debug!(
                client_id = %client_id,
                notified = report.delivered,
                "Departure announced"
            );
        }

        // The writer drains whatever is queued, then drops the write half
        if timeout(self.settings.write_timeout, &mut writer).await.is_err() {
            warn!(client_id = %client_id, "Writer did not finish in time, aborting");
            writer.abort();
        }

        self.state = self.state.advance();
    }
}

/// Spawns the single writer task for a connection.
///
/// Lines are written in queue order. The task ends when every sender for
/// the queue is gone (the peer left the registry) or a write fails; a
/// failed write cancels the connection so its read loop tears down too.
fn spawn_writer(
    client_id: ClientId,
    write_half: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<Line>,
    write_timeout: Duration,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut writer = BufWriter::new(write_half);

        while let Some(line) = outbound.recv().await {
            if let Err(e) = write_line(&mut writer, &line, write_timeout).await {
                debug!(client_id = %client_id, error = %e, "Write failed, closing connection");
                cancel_token.cancel();
                return;
            }
        }

        if let Ok(Err(e)) = timeout(write_timeout, writer.shutdown()).await {
            debug!(client_id = %client_id, error = %e, "Socket shutdown failed");
        }
    })
}

/// Writes one line with a timeout.
async fn write_line(
    writer: &mut BufWriter<OwnedWriteHalf>,
    line: &str,
    write_timeout: Duration,
) -> Result<(), ConnectionError> {
    match timeout(write_timeout, async {
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok::<(), std::io::Error>(())
    })
    .await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ConnectionError::Io(e.to_string())),
        Err(_) => Err(ConnectionError::WriteTimeout),
    }
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Line too large (max: {max} bytes)")]
    MessageTooLarge { max: usize },

    #[error("Connection cancelled")]
    Cancelled,

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("No unique identity after {attempts} attempts")]
    IdentityExhausted { attempts: usize },
}
