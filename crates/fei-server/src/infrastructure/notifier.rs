//! Status notifications for the host.
//!
//! The host shows one line of status text (a mobile app would put it in a
//! persistent notification; the CLI logs it).  The controller's state stream
//! is mapped to that text here:
//!
//! | state            | text                 |
//! |------------------|----------------------|
//! | `Init`           | `Idle`               |
//! | `Started{port}`  | `Work on <port>`     |
//! | `Stopped`        | `Stopped`            |
//! | `Error{cause}`   | the error message    |
//!
//! The registry also reports user-visible failures (e.g. a file that could
//! not be unshared) through the same [`StatusNotifier`].

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::application::controller::ServerState;

/// Receives short, user-facing status texts.
#[cfg_attr(test, mockall::automock)]
pub trait StatusNotifier: Send + Sync {
    fn notify(&self, text: &str);
}

/// [`StatusNotifier`] that writes every status to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl StatusNotifier for LogNotifier {
    fn notify(&self, text: &str) {
        info!(target: "fei_server::status", "{text}");
    }
}

/// Status text for one controller state.
pub fn status_text(state: &ServerState) -> String {
    match state {
        ServerState::Init => "Idle".to_string(),
        ServerState::Started(server) => format!("Work on {}", server.port()),
        ServerState::Stopped { .. } => "Stopped".to_string(),
        ServerState::Error(cause) => cause.to_string(),
    }
}

/// Spawns a task that forwards every state change to `notifier`.
///
/// The current state is reported immediately.  The task ends when the
/// controller is dropped.
pub fn spawn_state_notifier(
    mut states: watch::Receiver<ServerState>,
    notifier: Arc<dyn StatusNotifier>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = String::new();
        loop {
            let text = status_text(&states.borrow_and_update());
            if text != last {
                notifier.notify(&text);
                last = text;
            }
            if states.changed().await.is_err() {
                debug!("state channel closed; status notifier exiting");
                break;
            }
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
