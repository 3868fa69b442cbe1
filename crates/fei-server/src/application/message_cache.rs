//! Per-session chat history.
//!
//! Every `Started` server owns one [`MessageCache`].  The self-client's
//! receive task is the only writer; the host application and tests read it.
//!
//! # Copy-on-write snapshots (for beginners)
//!
//! The cache never hands out a reference to a vector that might change
//! underneath the reader.  Each push builds a fresh `Vec`, wraps it in an
//! `Arc` and replaces the value held by a `tokio::sync::watch` channel.
//! Readers either clone the current `Arc` (cheap: one atomic increment) or
//! `await` the next change.  A reader that holds an old snapshot keeps seeing
//! exactly what was there when it looked.
//!
//! The cache is capped: once `limit` messages are stored, each push evicts
//! the oldest one.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::watch;

use fei_core::Message;

/// A read-only, observable view of the chat messages seen by a session.
pub type MessageSnapshot = Arc<Vec<Message>>;

/// Capped, observable, copy-on-write message history.
#[derive(Debug, Clone)]
pub struct MessageCache {
    tx: Arc<watch::Sender<MessageSnapshot>>,
    limit: usize,
}

impl MessageCache {
    /// Creates an empty cache keeping at most `limit` messages (minimum 1).
    pub fn new(limit: usize) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Vec::new()));
        Self {
            tx: Arc::new(tx),
            limit: limit.max(1),
        }
    }

    /// Appends `message`, evicting the oldest entries beyond the limit, and
    /// publishes the new snapshot.
    pub fn push(&self, message: Message) {
        let limit = self.limit;
        self.tx.send_modify(|current| {
            let mut next: VecDeque<Message> = current.iter().cloned().collect();
            next.push_back(message);
            while next.len() > limit {
                next.pop_front();
            }
            *current = Arc::new(next.into());
        });
    }

    /// Current contents.
    pub fn snapshot(&self) -> MessageSnapshot {
        Arc::clone(&self.tx.borrow())
    }

    /// A receiver that observes every future snapshot.
    pub fn subscribe(&self) -> watch::Receiver<MessageSnapshot> {
        self.tx.subscribe()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(n: usize) -> Message {
        Message::new("user0", format!("m{n}"))
    }

    #[test]
    fn test_new_cache_is_empty() {
        let cache = MessageCache::new(10);
        assert!(cache.is_empty());
        assert!(cache.snapshot().is_empty());
    }

    #[test]
    fn test_push_preserves_order() {
        // Arrange
        let cache = MessageCache::new(10);

        // Act
        cache.push(msg(1));
        cache.push(msg(2));

        // Assert
        let snap = cache.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].data, "m1");
        assert_eq!(snap[1].data, "m2");
    }

    #[test]
    fn test_oldest_messages_are_evicted_past_limit() {
        // Arrange
        let cache = MessageCache::new(3);

        // Act
        for n in 0..5 {
            cache.push(msg(n));
        }

        // Assert
        let data: Vec<_> = cache.snapshot().iter().map(|m| m.data.clone()).collect();
        assert_eq!(data, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_old_snapshot_is_not_mutated_by_push() {
        let cache = MessageCache::new(10);
        cache.push(msg(1));
        let before = cache.snapshot();

        cache.push(msg(2));

        assert_eq!(before.len(), 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_limit_is_raised_to_one() {
        let cache = MessageCache::new(0);
        cache.push(msg(1));
        cache.push(msg(2));
        assert_eq!(cache.limit(), 1);
        assert_eq!(cache.snapshot()[0].data, "m2");
    }

    #[tokio::test]
    async fn test_subscriber_observes_push() {
        // Arrange
        let cache = MessageCache::new(10);
        let mut rx = cache.subscribe();

        // Act
        cache.push(msg(7));
        rx.changed().await.unwrap();

        // Assert
        assert_eq!(rx.borrow().last().unwrap().data, "m7");
    }

    #[test]
    fn test_push_wakes_pending_observer() {
        use tokio_test::{assert_pending, assert_ready_ok, task};

        let cache = MessageCache::new(10);
        let mut rx = cache.subscribe();
        let mut changed = task::spawn(rx.changed());
        assert_pending!(changed.poll());

        cache.push(msg(1));

        assert!(changed.is_woken());
        assert_ready_ok!(changed.poll());
    }
}
