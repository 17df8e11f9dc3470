//! Registry entries and fan-out.
//!
//! A `Peer` is the writable side of one connection as seen by everybody
//! else: its identity plus a bounded queue drained by the connection's own
//! writer task. Enqueueing never waits, so a slow consumer can only lose its
//! own lines; it cannot stall the sender's read loop.

use std::sync::Arc;

use relay_core::ClientId;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A broadcast line, shared between every peer queue it is pushed to.
pub type Line = Arc<str>;

/// Registry entry for one open connection.
#[derive(Debug, Clone)]
pub struct Peer {
    client_id: ClientId,
    outbound: mpsc::Sender<Line>,
}

impl Peer {
    /// Creates a peer from an id and the sending half of its outbound queue.
    pub fn new(client_id: ClientId, outbound: mpsc::Sender<Line>) -> Self {
        Self {
            client_id,
            outbound,
        }
    }

    /// Returns the peer's identity.
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Enqueues a line for this peer without waiting.
    pub fn deliver(&self, line: Line) -> Result<(), DeliveryError> {
        self.outbound.try_send(line).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// Why a line could not be handed to a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("outbound queue full")]
    QueueFull,

    #[error("peer writer closed")]
    Closed,
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// Pushes `line` to every peer in `peers`.
///
/// A failure for one peer is logged and skipped; the rest still get the line.
pub fn fan_out(peers: &[Peer], line: &Line) -> FanoutReport {
    let mut report = FanoutReport::default();

    for peer in peers {
        match peer.deliver(Arc::clone(line)) {
            Ok(()) => report.delivered += 1,
            Err(DeliveryError::QueueFull) => {
                warn!(client_id = %peer.client_id(), "Outbound queue full, dropping line");
                report.dropped += 1;
            }
            Err(DeliveryError::Closed) => {
                debug!(client_id = %peer.client_id(), "Peer writer closed, skipping");
                report.dropped += 1;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(id: &str, capacity: usize) -> (Peer, mpsc::Receiver<Line>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Peer::new(ClientId::parse(id).unwrap(), tx), rx)
    }

    #[test]
    fn test_fan_out_reaches_every_peer() {
        let (a, mut a_rx) = peer("aaaaaaaaaa", 4);
        let (b, mut b_rx) = peer("bbbbbbbbbb", 4);

        let line: Line = Arc::from("aaaaaaaaaa: hi\n");
        let report = fan_out(&[a, b], &line);

        assert_eq!(report, FanoutReport { delivered: 2, dropped: 0 });
        assert_eq!(&*a_rx.try_recv().unwrap(), "aaaaaaaaaa: hi\n");
        assert_eq!(&*b_rx.try_recv().unwrap(), "aaaaaaaaaa: hi\n");
    }

    #[test]
    fn test_full_queue_does_not_block_others() {
        let (slow, _slow_rx) = peer("ssssssssss", 1);
        let (fast, mut fast_rx) = peer("ffffffffff", 4);
        let peers = [slow, fast];

        let first: Line = Arc::from("one\n");
        let second: Line = Arc::from("two\n");
        assert_eq!(fan_out(&peers, &first).dropped, 0);

        let report = fan_out(&peers, &second);
        assert_eq!(report, FanoutReport { delivered: 1, dropped: 1 });

        assert_eq!(&*fast_rx.try_recv().unwrap(), "one\n");
        assert_eq!(&*fast_rx.try_recv().unwrap(), "two\n");
    }

    #[test]
    fn test_closed_peer_is_skipped() {
        let (gone, gone_rx) = peer("gggggggggg", 4);
        drop(gone_rx);

        assert_eq!(gone.deliver(Arc::from("x\n")), Err(DeliveryError::Closed));

        let report = fan_out(&[gone], &Arc::from("x\n"));
        assert_eq!(report.dropped, 1);
    }
}
