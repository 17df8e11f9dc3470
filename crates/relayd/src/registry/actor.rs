//! Registry actor - owns all connection state and processes commands.
//!
//! The RegistryActor is the single owner of the client map in the system.
//! It receives commands via an mpsc channel and publishes events via broadcast.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel send failures are logged but don't panic

use std::collections::HashMap;

use relay_core::ClientId;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::commands::{RegistryCommand, RegistryError, RegistryEvent, RemovalReason};
use super::peer::Peer;

/// Default maximum number of clients the registry can hold.
pub const MAX_CLIENTS: usize = 1024;

// ============================================================================
// Registry Actor
// ============================================================================

/// The registry actor - owns the identity -> peer map.
///
/// Implements the actor pattern: receives commands via mpsc channel,
/// processes them sequentially, and publishes events to subscribers.
/// Because every mutation and every snapshot runs inside this one task,
/// add/remove/snapshot can never interleave.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Registered peers with their join sequence number
    peers: HashMap<ClientId, (u64, Peer)>,

    /// Next join sequence number (snapshots are ordered by it)
    next_seq: u64,

    /// Capacity limit
    max_clients: usize,

    /// Event publisher for join/leave notifications
    event_publisher: broadcast::Sender<RegistryEvent>,
}

impl RegistryActor {
    /// Creates a new registry actor.
    ///
    /// # Arguments
    ///
    /// * `receiver` - Channel for receiving commands
    /// * `event_publisher` - Broadcast channel for publishing events
    /// * `max_clients` - Capacity limit
    pub fn new(
        receiver: mpsc::Receiver<RegistryCommand>,
        event_publisher: broadcast::Sender<RegistryEvent>,
        max_clients: usize,
    ) -> Self {
        Self {
            receiver,
            peers: HashMap::new(),
            next_seq: 0,
            max_clients,
            event_publisher,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    /// This is the main entry point - call this in a spawned task.
    pub async fn run(mut self) {
        info!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(clients = self.peers.len(), "Registry actor stopped");
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Add { peer, respond_to } => {
                let result = self.handle_add(peer);
                // Ignore send error - client may have dropped the receiver
                let _ = respond_to.send(result);
            }
            RegistryCommand::Remove {
                client_id,
                reason,
                respond_to,
            } => {
                let removed = self.handle_remove(&client_id, reason);
                let _ = respond_to.send(removed);
            }
            RegistryCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.handle_snapshot());
            }
            RegistryCommand::Size { respond_to } => {
                let _ = respond_to.send(self.peers.len());
            }
            RegistryCommand::Drain { respond_to } => {
                let _ = respond_to.send(self.handle_drain());
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_add(&mut self, peer: Peer) -> Result<usize, RegistryError> {
        let client_id = peer.client_id().clone();

        if self.peers.contains_key(&client_id) {
            warn!(
                client_id = %client_id,
                "Client id already registered, rejecting"
            );
            return Err(RegistryError::AlreadyRegistered(client_id));
        }

        if self.peers.len() >= self.max_clients {
            warn!(
                client_id = %client_id,
                current = self.peers.len(),
                max = self.max_clients,
                "Registry is full, rejecting registration"
            );
            return Err(RegistryError::RegistryFull {
                max: self.max_clients,
            });
        }

        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.peers.insert(client_id.clone(), (seq, peer));

        let count = self.peers.len();
        info!(client_id = %client_id, total_clients = count, "Client registered");

        // Publish event (ignore if no subscribers)
        let _ = self
            .event_publisher
            .send(RegistryEvent::Joined { client_id, count });

        Ok(count)
    }

    fn handle_remove(&mut self, client_id: &ClientId, reason: RemovalReason) -> bool {
        if self.peers.remove(client_id).is_none() {
            debug!(client_id = %client_id, "Remove for unknown client, ignoring");
            return false;
        }

        let count = self.peers.len();
        info!(
            client_id = %client_id,
            reason = %reason,
            total_clients = count,
            "Client removed"
        );

        let _ = self.event_publisher.send(RegistryEvent::Left {
            client_id: client_id.clone(),
            reason,
            count,
        });

        true
    }

    fn handle_snapshot(&self) -> Vec<Peer> {
        let mut entries: Vec<&(u64, Peer)> = self.peers.values().collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, peer)| peer.clone()).collect()
    }

    fn handle_drain(&mut self) -> usize {
        let drained: Vec<ClientId> = self.peers.keys().cloned().collect();
        let total = drained.len();

        for client_id in drained {
            self.handle_remove(&client_id, RemovalReason::Shutdown);
        }

        if total > 0 {
            info!(drained = total, "Registry drained");
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    fn create_actor(max: usize) -> (RegistryActor, broadcast::Receiver<RegistryEvent>) {
        let (_cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = broadcast::channel(16);
        (RegistryActor::new(cmd_rx, event_tx, max), event_rx)
    }

    fn create_peer(id: &str) -> Peer {
        let (tx, _rx) = mpsc::channel(4);
        Peer::new(ClientId::parse(id).unwrap(), tx)
    }

    #[test]
    fn test_add_and_size() {
        let (mut actor, _events) = create_actor(10);

        assert_eq!(actor.handle_add(create_peer("aaaaaaaaaa")).unwrap(), 1);
        assert_eq!(actor.handle_add(create_peer("bbbbbbbbbb")).unwrap(), 2);
        assert_eq!(actor.peers.len(), 2);
    }

    #[test]
    fn test_duplicate_add_rejected() {
        let (mut actor, _events) = create_actor(10);

        actor.handle_add(create_peer("aaaaaaaaaa")).unwrap();
        let result = actor.handle_add(create_peer("aaaaaaaaaa"));

        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(_))));
        assert_eq!(actor.peers.len(), 1);
    }

    #[test]
    fn test_capacity_limit() {
        let (mut actor, _events) = create_actor(1);

        actor.handle_add(create_peer("aaaaaaaaaa")).unwrap();
        let result = actor.handle_add(create_peer("bbbbbbbbbb"));

        assert!(matches!(result, Err(RegistryError::RegistryFull { max: 1 })));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (mut actor, _events) = create_actor(10);
        let id = ClientId::parse("aaaaaaaaaa").unwrap();

        actor.handle_add(create_peer("aaaaaaaaaa")).unwrap();
        assert!(actor.handle_remove(&id, RemovalReason::Disconnected));
        assert!(!actor.handle_remove(&id, RemovalReason::Disconnected));
        assert!(actor.peers.is_empty());
    }

    #[test]
    fn test_snapshot_is_in_join_order() {
        let (mut actor, _events) = create_actor(10);
        let ids = ["cccccccccc", "aaaaaaaaaa", "bbbbbbbbbb"];
        for id in ids {
            actor.handle_add(create_peer(id)).unwrap();
        }

        let snapshot: Vec<String> = actor
            .handle_snapshot()
            .iter()
            .map(|p| p.client_id().to_string())
            .collect();
        assert_eq!(snapshot, ids);
    }

    #[test]
    fn test_events_carry_post_change_count() {
        let (mut actor, mut events) = create_actor(10);
        let id = ClientId::parse("aaaaaaaaaa").unwrap();

        actor.handle_add(create_peer("aaaaaaaaaa")).unwrap();
        actor.handle_remove(&id, RemovalReason::Disconnected);
        // Absent removal publishes nothing
        actor.handle_remove(&id, RemovalReason::Disconnected);

        assert_eq!(
            events.try_recv().unwrap(),
            RegistryEvent::Joined {
                client_id: id.clone(),
                count: 1
            }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            RegistryEvent::Left {
                client_id: id,
                reason: RemovalReason::Disconnected,
                count: 0
            }
        );
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_drain_removes_everyone() {
        let (mut actor, _events) = create_actor(10);
        actor.handle_add(create_peer("aaaaaaaaaa")).unwrap();
        actor.handle_add(create_peer("bbbbbbbbbb")).unwrap();

        assert_eq!(actor.handle_drain(), 2);
        assert!(actor.peers.is_empty());
        assert_eq!(actor.handle_drain(), 0);
    }

    #[tokio::test]
    async fn test_run_processes_commands_until_closed() {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, _event_rx) = broadcast::channel(16);
        let actor = RegistryActor::new(cmd_rx, event_tx, 10);
        let task = tokio::spawn(actor.run());

        let (tx, rx) = oneshot::channel();
        cmd_tx
            .send(RegistryCommand::Add {
                peer: create_peer("aaaaaaaaaa"),
                respond_to: tx,
            })
            .await
            .unwrap();
        assert_eq!(rx.await.unwrap().unwrap(), 1);

        drop(cmd_tx);
        task.await.unwrap();
    }
}
