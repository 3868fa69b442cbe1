//! Fan-out channel for server-sent events.
//!
//! One [`EventBroadcaster`] exists per running listener.  Every `/sse`
//! connection subscribes to it; the registry watcher and
//! `FeiServer::emit_refresh_event` publish `refresh` events into it.
//!
//! Publishing never waits.  It is a `tokio::sync::broadcast` channel with a
//! fixed ring per subscriber: a subscriber that falls more than
//! [`EVENT_CHANNEL_CAPACITY`] events behind sees a `Lagged` error and skips
//! ahead, and a publish with no subscribers is simply dropped.

use tokio::sync::broadcast;
use tracing::trace;

use fei_core::SseEvent;

/// Events buffered per subscriber before the slowest one starts lagging.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Multi-subscriber, fire-and-forget publisher of [`SseEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<SseEvent>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Delivers `event` to every current subscriber and returns how many
    /// there were.
    pub fn publish(&self, event: SseEvent) -> usize {
        match self.tx.send(event) {
            Ok(n) => n,
            Err(_) => {
                trace!("sse event dropped: no subscribers");
                0
            }
        }
    }

    /// Publishes a `refresh` event.
    pub fn refresh(&self) -> usize {
        self.publish(SseEvent::refresh())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SseEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
