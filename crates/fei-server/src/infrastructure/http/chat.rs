//! `GET /chat`: one WebSocket peer of the chat relay.
//!
//! After the upgrade the connection joins the relay and runs two loops:
//!
//! - **writer** (own task): drains the peer's relay queue and sends each
//!   [`Message`](fei_core::Message) as a JSON text frame;
//! - **reader** (this task): turns every inbound text frame into a relay
//!   broadcast.  Binary, ping and pong frames are skipped.
//!
//! The peer leaves the relay when the reader ends (close frame, transport
//! error, end of stream) or the listener is cancelled.  Dropping the
//! membership handles removal on every path; the socket is then closed
//! best-effort.

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::application::chat_relay::{ChatRelay, RelayMembership};

use super::HttpState;

/// `GET /chat`
pub async fn chat_upgrade(State(state): State<HttpState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_peer(socket, state.relay, state.shutdown))
}

async fn run_peer(socket: WebSocket, relay: Arc<ChatRelay>, shutdown: CancellationToken) {
    let (membership, mut outbound) = relay.join();
    let name = membership.name().to_string();

    let (sink, mut frames) = socket.split();
    let sink = Arc::new(Mutex::new(sink));

    let writer_sink = Arc::clone(&sink);
    let writer_name = name.clone();
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    warn!("chat {writer_name}: cannot encode message: {e}");
                    continue;
                }
            };
            if writer_sink.lock().await.send(WsMessage::Text(json)).await.is_err() {
                debug!("chat {writer_name}: send failed (peer disconnected)");
                break;
            }
        }
    });

    tokio::select! {
        _ = read_frames(&mut frames, &membership) => {}
        _ = shutdown.cancelled() => debug!("chat {name}: listener shutting down"),
    }

    drop(membership);
    writer.abort();
    let _ = writer.await;
    let closed = sink.lock().await.close().await;
    if let Err(e) = closed {
        debug!("chat {name}: close failed: {e}");
    }
}

async fn read_frames(frames: &mut SplitStream<WebSocket>, membership: &RelayMembership) {
    let name = membership.name();
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => {
                membership.publish(text);
            }
            Ok(WsMessage::Close(_)) => {
                debug!("chat {name}: closed by peer");
                return;
            }
            Ok(other) => debug!("chat {name}: skipping non-text frame ({} bytes)", other.into_data().len()),
            Err(e) => {
                debug!("chat {name}: transport error: {e}");
                return;
            }
        }
    }
    debug!("chat {name}: stream ended");
}
