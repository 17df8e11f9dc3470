//! TCP server for the relay daemon.
//!
//! The server:
//! - Listens on a TCP address for client connections
//! - Spawns a ConnectionHandler for each client
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   RelayServer   │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  RegistryHandle │
//! │   (per client)  │     │                 │
//! └─────────────────┘     └─────────────────┘
//!         │                       │
//!         │ fan_out()             │ snapshot()
//!         ▼                       ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ per-peer queue  │────▶│  writer task    │──▶ socket
//! └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Accept errors are logged and allow continued operation

mod connection;

pub use connection::{ConnectionError, ConnectionHandler, ConnectionSettings};

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::registry::RegistryHandle;

/// Pause after a failed accept (e.g. out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// TCP server for the relay daemon.
///
/// Accepts connections and hands each one to its own handler task.
pub struct RelayServer {
    /// Bound listener
    listener: TcpListener,

    /// Address actually bound (resolves port 0)
    local_addr: SocketAddr,

    /// Handle to the connection registry
    registry: RegistryHandle,

    /// Limits handed to every connection
    settings: ConnectionSettings,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Accept counter, for logs
    connection_counter: u64,
}

impl RelayServer {
    /// Binds a listener on `addr`.
    ///
    /// # Arguments
    ///
    /// * `addr` - `host:port` to bind; port 0 picks a free port
    /// * `registry` - Handle to the connection registry
    /// * `settings` - Per-connection limits
    /// * `cancel_token` - Token for graceful shutdown
    pub async fn bind(
        addr: &str,
        registry: RegistryHandle,
        settings: ConnectionSettings,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_string(),
                error: e.to_string(),
            })?;

        let local_addr = listener.local_addr().map_err(|e| ServerError::Bind {
            addr: addr.to_string(),
            error: e.to_string(),
        })?;

        Ok(Self {
            listener,
            local_addr,
            registry,
            settings,
            cancel_token,
            connection_counter: 0,
        })
    }

    /// Binds using the address and limits from a resolved configuration.
    pub async fn from_config(
        config: &RelayConfig,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        Self::bind(
            &config.bind_address(),
            registry,
            ConnectionSettings::from(config),
            cancel_token,
        )
        .await
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Runs the server.
    ///
    /// Accepts connections until the cancellation token is triggered, then
    /// stops accepting, drains the registry and waits for every connection
    /// task to finish.
    pub async fn run(mut self) {
        info!(addr = %self.local_addr, "Relay server listening");

        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            self.connection_counter += 1;
                            self.handle_connection(&mut connections, stream);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                        }
                    }
                }

                Some(result) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = result {
                        if e.is_panic() {
                            error!(error = %e, "Connection task panicked");
                        }
                    }
                }
            }
        }

        self.shutdown(connections).await;
    }

    /// Spawns a handler task for an accepted connection.
    fn handle_connection(&self, connections: &mut JoinSet<()>, stream: TcpStream) {
        let handler = ConnectionHandler::new(
            stream,
            self.registry.clone(),
            self.settings,
            self.cancel_token.child_token(),
            self.connection_counter,
        );

        connections.spawn(async move {
            handler.run().await;
        });
    }

    /// Stops accepting, empties the registry and joins the handlers.
    async fn shutdown(self, mut connections: JoinSet<()>) {
        drop(self.listener);

        let drained = self.registry.drain().await;
        debug!(drained, open = connections.len(), "Registry drained");

        while let Some(result) = connections.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Connection task ended abnormally");
            }
        }

        info!("Server shutdown complete");
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: String, error: String },
}
