//! Connection registry using Actor pattern.
//!
//! The registry is the only shared mutable state in the daemon: the map from
//! client identity to the peer's outbound queue. It receives commands via a
//! tokio mpsc channel and publishes join/leave events on a broadcast channel.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌───────────────────┐
//! │ConnectionHandler│────▶│  RegistryActor  │────▶│ Broadcast Channel │
//! └─────────────────┘     └─────────────────┘     └───────────────────┘
//!         │                       │                       │
//!         │   RegistryCommand     │   RegistryEvent       │
//!         │   (mpsc channel)      │   (broadcast)         │
//!         ▼                       ▼                       ▼
//!    Add/Remove/             HashMap<ClientId,      Heartbeat scheduler
//!    Snapshot/Size           Peer>                  (mode switching)
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::{broadcast, mpsc};

mod actor;
mod commands;
mod handle;
mod peer;

pub use actor::{RegistryActor, MAX_CLIENTS};
pub use commands::{RegistryCommand, RegistryError, RegistryEvent, RemovalReason};
pub use handle::RegistryHandle;
pub use peer::{fan_out, DeliveryError, FanoutReport, Line, Peer};

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 100;
const EVENT_BUFFER: usize = 100;

/// Spawn the registry actor and return a handle for interaction.
///
/// This function:
/// 1. Creates command and event channels
/// 2. Spawns the RegistryActor on a tokio task
/// 3. Returns a RegistryHandle for client use
///
/// The actor stops once every handle has been dropped.
///
/// # Example
///
/// ```no_run
/// use relayd::registry::{spawn_registry, MAX_CLIENTS};
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_registry(MAX_CLIENTS);
///     let peers = handle.snapshot().await;
///     assert!(peers.is_empty());
/// }
/// ```
pub fn spawn_registry(max_clients: usize) -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = RegistryActor::new(cmd_rx, event_tx.clone(), max_clients);
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx, event_tx)
}
