//! `GET /sse`: the server-sent-event stream.
//!
//! Each connection merges two sources into one stream:
//!
//! - the listener's [`EventBroadcaster`](crate::application::broadcaster::EventBroadcaster)
//!   (`refresh` events, shared by every connection), and
//! - a per-connection interval producing `ping` events whose `id` and data
//!   are the current Unix time in milliseconds.
//!
//! Every event is encoded as one body chunk, so hyper flushes it to the
//! socket immediately.  The stream ends when the listener is cancelled,
//! which lets graceful shutdown complete while browsers are still attached.

use std::convert::Infallible;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures_util::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use fei_core::{encode_sse_event, SseEvent};

use super::HttpState;

/// `GET /sse`
pub async fn sse_stream(State(state): State<HttpState>) -> Response {
    let stream = event_stream(
        state.events.subscribe(),
        state.heartbeat,
        state.shutdown.clone(),
    )
    .map(|event| Ok::<_, Infallible>(encode_sse_event(&event)));

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

/// Merges broadcast events with a heartbeat until `shutdown` fires.
pub fn event_stream(
    events: broadcast::Receiver<SseEvent>,
    heartbeat: Duration,
    shutdown: CancellationToken,
) -> impl Stream<Item = SseEvent> + Send + 'static {
    let published = BroadcastStream::new(events).filter_map(|item| match item {
        Ok(event) => Some(event),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            debug!("sse subscriber lagged; skipped {skipped} event(s)");
            None
        }
    });

    let mut ticker = tokio::time::interval(heartbeat);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let pings = IntervalStream::new(ticker).map(|_| SseEvent::ping(now_ms()));

    futures_util::StreamExt::take_until(published.merge(pings), shutdown.cancelled_owned())
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
