//! Registry actor commands, errors, and events.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `RegistryEvent`: Events published by the registry for subscribers
//!
//! All types are designed for async message passing and follow the panic-free policy.

use relay_core::ClientId;
use thiserror::Error;
use tokio::sync::oneshot;

use super::peer::Peer;

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command uses a oneshot channel for the response, enabling
/// request-response patterns in async code without blocking.
///
/// # Usage
///
/// ```ignore
/// let (tx, rx) = oneshot::channel();
/// registry_tx.send(RegistryCommand::Snapshot { respond_to: tx }).await?;
/// let peers = rx.await?;
/// ```
#[derive(Debug)]
pub enum RegistryCommand {
    /// Register a newly accepted connection.
    ///
    /// Responds with the registry size after the insert.
    ///
    /// # Errors
    /// - `RegistryError::AlreadyRegistered` if the id is taken
    /// - `RegistryError::RegistryFull` if at maximum capacity
    Add {
        /// The peer to register
        peer: Peer,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<usize, RegistryError>>,
    },

    /// Remove a connection.
    ///
    /// Responds `true` if the peer was present. Removing an absent id is
    /// not an error, so double cleanup stays harmless.
    Remove {
        /// ID of the peer to remove
        client_id: ClientId,
        /// Why the peer is leaving
        reason: RemovalReason,
        /// Channel to send the result
        respond_to: oneshot::Sender<bool>,
    },

    /// Copy all registered peers, in join order.
    Snapshot {
        /// Channel to send the results
        respond_to: oneshot::Sender<Vec<Peer>>,
    },

    /// Current number of registered peers.
    Size {
        /// Channel to send the result
        respond_to: oneshot::Sender<usize>,
    },

    /// Remove every peer (shutdown path).
    ///
    /// Responds with the number of peers dropped.
    Drain {
        /// Channel to send the result
        respond_to: oneshot::Sender<usize>,
    },
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
///
/// Uses `thiserror` for ergonomic error handling and Display implementations.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// The registry has reached its maximum client capacity.
    #[error("registry is full (max: {max} clients)")]
    RegistryFull {
        /// Maximum number of clients allowed
        max: usize,
    },

    /// A peer with this ID is already registered.
    #[error("client already registered: {0}")]
    AlreadyRegistered(ClientId),

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

// ============================================================================
// Registry Events
// ============================================================================

/// Events published by the registry to subscribers.
///
/// Every event carries the registry size after the change, which is all
/// the heartbeat scheduler needs to pick its mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A peer was registered.
    Joined {
        /// ID of the registered peer
        client_id: ClientId,
        /// Registry size after the insert
        count: usize,
    },

    /// A peer was removed.
    Left {
        /// ID of the removed peer
        client_id: ClientId,
        /// Why the peer was removed
        reason: RemovalReason,
        /// Registry size after the removal
        count: usize,
    },
}

impl RegistryEvent {
    /// Registry size after the change.
    pub fn count(&self) -> usize {
        match self {
            Self::Joined { count, .. } | Self::Left { count, .. } => *count,
        }
    }

    /// The peer the event is about.
    pub fn client_id(&self) -> &ClientId {
        match self {
            Self::Joined { client_id, .. } | Self::Left { client_id, .. } => client_id,
        }
    }
}

/// Reason why a peer was removed from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// The connection's read loop ended (EOF, error, oversize line).
    Disconnected,

    /// The registry was drained during shutdown.
    Shutdown,
}

impl std::fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "client disconnected"),
            Self::Shutdown => write!(f, "server shutting down"),
        }
    }
}
