//! Message types exchanged with browsers.
//!
//! Two kinds of payload leave the server:
//!
//! - [`Message`] – a chat frame relayed over the `/chat` WebSocket.  It is
//!   serialised as a JSON object `{"from": "...", "data": "..."}`.
//! - [`SseEvent`] – a notification pushed over the `/sse` stream.  It is
//!   never serialised as JSON; see [`crate::protocol::sse`] for the text
//!   framing.
//!
//! Both are immutable once created.

use serde::{Deserialize, Serialize};

/// Sender name used for messages generated by the relay itself.
pub const SYSTEM_SENDER: &str = "system";

/// SSE event label for "the shared file list changed".
pub const REFRESH_EVENT: &str = "refresh";

/// SSE event label for the per-connection heartbeat.
pub const PING_EVENT: &str = "ping";

/// A chat message observed on the relay.
///
/// `from` is the name the relay assigned to the sending connection (for
/// example `"user3"`), never a value supplied by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Connection-assigned name of the sender.
    pub from: String,
    /// The text payload exactly as received.
    pub data: String,
}

impl Message {
    pub fn new(from: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            data: data.into(),
        }
    }

    /// The greeting sent to a connection right after it joins the relay.
    ///
    /// `peer_count` includes the connection being greeted.
    pub fn welcome(peer_count: usize) -> Self {
        let text = if peer_count == 1 {
            "You are connected! There is 1 user here.".to_string()
        } else {
            format!("You are connected! There are {peer_count} users here.")
        };
        Self::new(SYSTEM_SENDER, text)
    }

    /// Returns `true` for messages generated by the relay rather than a peer.
    pub fn is_system(&self) -> bool {
        self.from == SYSTEM_SENDER
    }
}

/// A server-sent event in transit to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Payload; may span several lines.
    pub data: String,
    /// Optional `event:` label.
    pub event: Option<String>,
    /// Optional `id:` value.
    pub id: Option<String>,
}

impl SseEvent {
    /// Creates an unlabelled event carrying `data`.
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            event: None,
            id: None,
        }
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The notification published whenever the shared list changes.
    pub fn refresh() -> Self {
        Self::new(REFRESH_EVENT).with_event(REFRESH_EVENT)
    }

    /// A heartbeat stamped with the current Unix time in milliseconds.
    ///
    /// The timestamp is used both as payload and as `id`, so a reconnecting
    /// browser reports the last heartbeat it saw in `Last-Event-ID`.
    pub fn ping(timestamp_ms: u64) -> Self {
        let stamp = timestamp_ms.to_string();
        Self::new(stamp.clone())
            .with_event(PING_EVENT)
            .with_id(stamp)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serializes_with_from_and_data_fields() {
        // Arrange
        let msg = Message::new("user1", "hello");

        // Act
        let json = serde_json::to_string(&msg).unwrap();

        // Assert
        assert_eq!(json, r#"{"from":"user1","data":"hello"}"#);
    }

    #[test]
    fn test_message_deserializes_from_browser_json() {
        let msg: Message = serde_json::from_str(r#"{"data":"hi","from":"user7"}"#).unwrap();
        assert_eq!(msg, Message::new("user7", "hi"));
    }

    #[test]
    fn test_welcome_uses_singular_for_one_peer() {
        let msg = Message::welcome(1);
        assert!(msg.data.contains("There is 1 user"));
        assert!(msg.is_system());
    }

    #[test]
    fn test_welcome_reports_peer_count() {
        let msg = Message::welcome(4);
        assert!(msg.data.contains("There are 4 users"));
    }

    #[test]
    fn test_peer_message_is_not_system() {
        assert!(!Message::new("user0", "x").is_system());
    }

    #[test]
    fn test_refresh_event_is_labelled() {
        let event = SseEvent::refresh();
        assert_eq!(event.event.as_deref(), Some(REFRESH_EVENT));
        assert_eq!(event.id, None);
    }

    #[test]
    fn test_ping_event_uses_timestamp_as_id() {
        let event = SseEvent::ping(1_700_000_000_123);
        assert_eq!(event.event.as_deref(), Some(PING_EVENT));
        assert_eq!(event.id.as_deref(), Some("1700000000123"));
        assert_eq!(event.data, "1700000000123");
    }
}
