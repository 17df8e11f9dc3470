//! Integration tests for the Registry Actor.
//!
//! These tests verify the registry works correctly as a complete system,
//! testing the spawn_registry() function and RegistryHandle interface.
//!
//! Tests CAN use `.unwrap()` and `.expect()`; the panic-free behavior of
//! production code is checked through assertions.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use relay_core::ClientId;
use relayd::registry::{
    fan_out, spawn_registry, Line, Peer, RegistryError, RegistryEvent, RemovalReason, MAX_CLIENTS,
};
use tokio::sync::mpsc;
use tokio::time::timeout;

// ============================================================================
// Test Helpers
// ============================================================================

/// Helper to create a peer with a fixed id and its outbound receiver.
fn create_peer(id: &str) -> (Peer, mpsc::Receiver<Line>) {
    let (tx, rx) = mpsc::channel(16);
    (Peer::new(ClientId::parse(id).expect("valid id"), tx), rx)
}

fn id(s: &str) -> ClientId {
    ClientId::parse(s).expect("valid id")
}

// ============================================================================
// Basic Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_basic_lifecycle() {
    let handle = spawn_registry(MAX_CLIENTS);

    let (peer, _rx) = create_peer("aaaaaaaaaa");
    assert_eq!(handle.add(peer).await.expect("add should succeed"), 1);
    assert_eq!(handle.size().await, 1);

    let snapshot = handle.snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].client_id().as_str(), "aaaaaaaaaa");

    assert!(handle.remove(&id("aaaaaaaaaa")).await);
    assert_eq!(handle.size().await, 0);
    assert!(handle.is_connected());
}

#[tokio::test]
async fn test_remove_is_idempotent() {
    let handle = spawn_registry(MAX_CLIENTS);
    let mut events = handle.subscribe();

    let (peer, _rx) = create_peer("aaaaaaaaaa");
    handle.add(peer).await.unwrap();

    assert!(handle.remove(&id("aaaaaaaaaa")).await);
    assert!(!handle.remove(&id("aaaaaaaaaa")).await);
    assert!(!handle.remove(&id("neverthere")).await);

    // One join, exactly one leave
    assert!(matches!(
        events.recv().await.unwrap(),
        RegistryEvent::Joined { count: 1, .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        RegistryEvent::Left {
            count: 0,
            reason: RemovalReason::Disconnected,
            ..
        }
    ));
    assert!(timeout(Duration::from_millis(50), events.recv()).await.is_err());
}

#[tokio::test]
async fn test_duplicate_id_rejected() {
    let handle = spawn_registry(MAX_CLIENTS);

    let (first, _rx1) = create_peer("aaaaaaaaaa");
    let (second, _rx2) = create_peer("aaaaaaaaaa");

    handle.add(first).await.unwrap();
    let err = handle.add(second).await.unwrap_err();

    assert!(matches!(err, RegistryError::AlreadyRegistered(ref dup) if dup.as_str() == "aaaaaaaaaa"));
    assert_eq!(handle.size().await, 1);
}

#[tokio::test]
async fn test_capacity_limit() {
    let handle = spawn_registry(2);

    let (a, _ra) = create_peer("aaaaaaaaaa");
    let (b, _rb) = create_peer("bbbbbbbbbb");
    let (c, _rc) = create_peer("cccccccccc");

    handle.add(a).await.unwrap();
    handle.add(b).await.unwrap();
    assert!(matches!(
        handle.add(c).await,
        Err(RegistryError::RegistryFull { max: 2 })
    ));

    // A slot frees up after a removal
    handle.remove(&id("aaaaaaaaaa")).await;
    let (c, _rc) = create_peer("cccccccccc");
    assert_eq!(handle.add(c).await.unwrap(), 2);
}

// ============================================================================
// Snapshot Tests
// ============================================================================

#[tokio::test]
async fn test_snapshot_is_independent_of_later_changes() {
    let handle = spawn_registry(MAX_CLIENTS);

    let (a, _ra) = create_peer("aaaaaaaaaa");
    let (b, _rb) = create_peer("bbbbbbbbbb");
    handle.add(a).await.unwrap();
    handle.add(b).await.unwrap();

    let snapshot = handle.snapshot().await;
    handle.remove(&id("aaaaaaaaaa")).await;
    let (c, _rc) = create_peer("cccccccccc");
    handle.add(c).await.unwrap();

    let ids: Vec<&str> = snapshot.iter().map(|p| p.client_id().as_str()).collect();
    assert_eq!(ids, vec!["aaaaaaaaaa", "bbbbbbbbbb"]);

    let now: Vec<String> = handle
        .snapshot()
        .await
        .iter()
        .map(|p| p.client_id().to_string())
        .collect();
    assert_eq!(now, vec!["bbbbbbbbbb", "cccccccccc"]);
}

#[tokio::test]
async fn test_fan_out_over_snapshot() {
    let handle = spawn_registry(MAX_CLIENTS);

    let (a, mut ra) = create_peer("aaaaaaaaaa");
    let (b, mut rb) = create_peer("bbbbbbbbbb");
    handle.add(a).await.unwrap();
    handle.add(b).await.unwrap();

    let line: Line = Arc::from("aaaaaaaaaa: hello\n");
    let report = fan_out(&handle.snapshot().await, &line);

    assert_eq!(report.delivered, 2);
    assert_eq!(report.dropped, 0);
    assert_eq!(&*ra.recv().await.unwrap(), "aaaaaaaaaa: hello\n");
    assert_eq!(&*rb.recv().await.unwrap(), "aaaaaaaaaa: hello\n");
}

// ============================================================================
// Drain Tests
// ============================================================================

#[tokio::test]
async fn test_drain_closes_every_queue() {
    let handle = spawn_registry(MAX_CLIENTS);
    let mut events = handle.subscribe();

    let (a, mut ra) = create_peer("aaaaaaaaaa");
    let (b, mut rb) = create_peer("bbbbbbbbbb");
    handle.add(a).await.unwrap();
    handle.add(b).await.unwrap();

    assert_eq!(handle.drain().await, 2);
    assert_eq!(handle.size().await, 0);

    // The registry held the only senders
    assert!(ra.recv().await.is_none());
    assert!(rb.recv().await.is_none());

    let mut left = HashSet::new();
    for _ in 0..4 {
        if let RegistryEvent::Left { client_id, reason, .. } = events.recv().await.unwrap() {
            assert_eq!(reason, RemovalReason::Shutdown);
            left.insert(client_id);
        }
    }
    assert_eq!(left.len(), 2);
}

#[tokio::test]
async fn test_concurrent_adds_get_distinct_counts() {
    let handle = spawn_registry(MAX_CLIENTS);

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            let (tx, _rx) = mpsc::channel(1);
            handle.add(Peer::new(ClientId::generate(), tx)).await
        }));
    }

    let mut counts = HashSet::new();
    for task in tasks {
        counts.insert(task.await.unwrap().unwrap());
    }

    assert_eq!(counts.len(), 20);
    assert_eq!(handle.size().await, 20);
}
