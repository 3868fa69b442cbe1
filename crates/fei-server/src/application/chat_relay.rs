//! ChatRelay: duplex fan-out between every connected chat peer.
//!
//! # How it works (for beginners)
//!
//! Each WebSocket connection on `/chat` calls [`ChatRelay::join`] and gets
//! two things back:
//!
//! - a [`RelayMembership`], which the connection uses to publish the text
//!   frames it reads, and
//! - an `mpsc::Receiver<Message>`, which the connection drains and writes
//!   back to its socket.
//!
//! The relay only stores the *sending* side of every peer's channel.
//! Broadcasting a message means a `try_send` into each of those channels.
//! `try_send` never waits, so one stuck browser whose queue is full only
//! loses its own copy of the message; every other peer still gets theirs.
//!
//! Membership is tied to the lifetime of the [`RelayMembership`] value:
//! dropping it (normal close, transport error, panic unwinding through the
//! handler, or the task being aborted) removes the peer from the set.
//!
//! The sender receives its own messages back.  Chat clients rely on that
//! echo to display what they sent in the same order everyone else sees it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use fei_core::protocol::sequence::{peer_name, SequenceCounter};
use fei_core::Message;

/// Messages queued per peer before further messages to that peer are dropped.
pub const PEER_QUEUE_CAPACITY: usize = 256;

struct Peer {
    name: String,
    tx: mpsc::Sender<Message>,
}

/// The set of connected chat peers.
#[derive(Default)]
pub struct ChatRelay {
    names: SequenceCounter,
    peers: Mutex<HashMap<u64, Peer>>,
}

impl std::fmt::Debug for ChatRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatRelay")
            .field("peers", &self.peer_count())
            .finish()
    }
}

impl ChatRelay {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Adds a peer, assigns it the next `user<N>` name and queues a welcome
    /// message stating how many peers are now connected.
    pub fn join(self: &Arc<Self>) -> (RelayMembership, mpsc::Receiver<Message>) {
        let id = self.names.next();
        let name = peer_name(id);
        let (tx, rx) = mpsc::channel(PEER_QUEUE_CAPACITY);

        let count = {
            let mut peers = self.lock_peers();
            peers.insert(
                id,
                Peer {
                    name: name.clone(),
                    tx: tx.clone(),
                },
            );
            peers.len()
        };

        // The receiver is still in hand, so the queue is empty and this
        // cannot fail.
        let _ = tx.try_send(Message::welcome(count));
        info!("chat peer {name} joined ({count} connected)");

        let membership = RelayMembership {
            relay: Arc::clone(self),
            id,
            name,
        };
        (membership, rx)
    }

    /// Forwards `message` to every connected peer, the sender included.
    ///
    /// Returns the number of peers the message was queued for.
    pub fn broadcast(&self, message: &Message) -> usize {
        let peers = self.lock_peers();
        let mut delivered = 0;
        for peer in peers.values() {
            match peer.tx.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("chat peer {} is not keeping up; message dropped", peer.name);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("chat peer {} already gone", peer.name);
                }
            }
        }
        delivered
    }

    pub fn peer_count(&self) -> usize {
        self.lock_peers().len()
    }

    /// Names of the connected peers in join order.
    pub fn peer_names(&self) -> Vec<String> {
        let peers = self.lock_peers();
        let mut entries: Vec<_> = peers.iter().map(|(id, p)| (*id, p.name.clone())).collect();
        entries.sort_unstable_by_key(|(id, _)| *id);
        entries.into_iter().map(|(_, name)| name).collect()
    }

    fn leave(&self, id: u64) {
        if let Some(peer) = self.lock_peers().remove(&id) {
            info!("chat peer {} left", peer.name);
        }
    }

    // A panic while holding the lock cannot leave the map half-updated, so a
    // poisoned lock is still safe to use.
    fn lock_peers(&self) -> MutexGuard<'_, HashMap<u64, Peer>> {
        self.peers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A peer's handle on the relay.  Dropping it leaves the relay.
pub struct RelayMembership {
    relay: Arc<ChatRelay>,
    id: u64,
    name: String,
}

impl RelayMembership {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wraps `data` as a message from this peer and broadcasts it.
    pub fn publish(&self, data: impl Into<String>) -> usize {
        self.relay.broadcast(&Message::new(self.name.clone(), data))
    }
}

impl Drop for RelayMembership {
    fn drop(&mut self) {
        self.relay.leave(self.id);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_assigns_sequential_names_and_welcomes() {
        // Arrange
        let relay = ChatRelay::new();

        // Act
        let (a, mut a_rx) = relay.join();
        let (b, mut b_rx) = relay.join();

        // Assert
        assert_eq!(a.name(), "user0");
        assert_eq!(b.name(), "user1");
        assert_eq!(a_rx.recv().await.unwrap(), Message::welcome(1));
        assert_eq!(b_rx.recv().await.unwrap(), Message::welcome(2));
    }

    #[tokio::test]
    async fn test_publish_reaches_every_peer_including_sender() {
        // Arrange
        let relay = ChatRelay::new();
        let (a, mut a_rx) = relay.join();
        let (_b, mut b_rx) = relay.join();
        a_rx.recv().await.unwrap();
        b_rx.recv().await.unwrap();

        // Act
        let delivered = a.publish("hello");

        // Assert
        assert_eq!(delivered, 2);
        let expected = Message::new("user0", "hello");
        assert_eq!(a_rx.recv().await.unwrap(), expected);
        assert_eq!(b_rx.recv().await.unwrap(), expected);
    }

    #[test]
    fn test_drop_removes_peer() {
        let relay = ChatRelay::new();
        let (a, _a_rx) = relay.join();
        let (_b, _b_rx) = relay.join();
        assert_eq!(relay.peer_count(), 2);

        drop(a);

        assert_eq!(relay.peer_names(), vec!["user1".to_string()]);
    }

    #[test]
    fn test_full_peer_does_not_block_others() {
        // Arrange: `slow` never drains its queue
        let relay = ChatRelay::new();
        let (sender, _slow_rx) = relay.join();
        let (_fast, mut fast_rx) = relay.join();

        // Act: fill the slow peer's queue (the welcome already used one slot)
        for n in 0..PEER_QUEUE_CAPACITY {
            sender.publish(n.to_string());
            while fast_rx.try_recv().is_ok() {}
        }
        let delivered = sender.publish("after");

        // Assert: only the fast peer still gets messages
        assert_eq!(delivered, 1);
        assert_eq!(fast_rx.try_recv().unwrap().data, "after");
    }

    #[test]
    fn test_closed_receiver_is_skipped() {
        let relay = ChatRelay::new();
        let (a, a_rx) = relay.join();
        drop(a_rx);
        assert_eq!(a.publish("x"), 0);
    }

    #[test]
    fn test_names_are_not_reused_after_leave() {
        let relay = ChatRelay::new();
        let (a, _) = relay.join();
        drop(a);
        let (b, _) = relay.join();
        assert_eq!(b.name(), "user1");
    }
}
