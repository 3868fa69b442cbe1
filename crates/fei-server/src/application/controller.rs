//! FeiServer: the server lifecycle state machine.
//!
//! # What does the controller do? (for beginners)
//!
//! The host application tells the controller two kinds of things: "the
//! configured port is now N" and "stop / restart / do nothing".  Both arrive
//! through [`FeiServer::on_receive_event`].  The controller decides what that
//! means with the pure decision table in `fei_core::domain::lifecycle` and
//! then performs the side effects: binding a listener, connecting the
//! self-client, tearing both down again.
//!
//! # One transition at a time
//!
//! Every call to `on_receive_event` first takes `transition_lock`, an async
//! mutex held for the whole transition.  Two concurrent calls therefore run
//! one after the other, never interleaved; there is never a moment where two
//! listeners are bound or a stop runs halfway through a start.
//!
//! # Observing the state
//!
//! The state is published two ways:
//!
//! - a `watch` channel ([`FeiServer::subscribe`]): always holds the latest
//!   state; a slow reader may skip intermediate states;
//! - a `broadcast` channel ([`FeiServer::transitions`]): every state in
//!   order, so a restart is seen as `Stopped` followed by `Started`.
//!
//! # Start sequence
//!
//! ```text
//! start(port)
//!  ├─ 1. bind listener, install routes, create broadcaster
//!  │     (spawn_listener returns only after the broadcaster hand-off)
//!  ├─ 2. SelfClient::connect → ws://127.0.0.1:port/chat  (handshake awaited)
//!  ├─ 3. receive task feeds the session's MessageCache
//!  └─ 4. publish Started
//! any failure: tear down what exists, publish Error
//! ```
//!
//! Stopping closes the self-client session, then the self-client, then the
//! listener.  Each step is best-effort: failures are logged and the next
//! step still runs.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, error, info, warn};

use fei_core::protocol::sequence::SequenceCounter;
use fei_core::{plan_transition, Phase, ServerCommand, StopReason, Transition};

use crate::application::broadcaster::EventBroadcaster;
use crate::application::message_cache::{MessageCache, MessageSnapshot};
use crate::application::share_registry::SharedFileRegistry;
use crate::infrastructure::http::{spawn_listener, HttpListener, ListenerConfig};
use crate::infrastructure::self_client::SelfClient;

/// States kept in the ordered transition feed for slow subscribers.
const TRANSITION_FEED_CAPACITY: usize = 32;

/// Error type for the server lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not bind, typically because the port is in use.
    #[error("failed to bind {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The configured port is outside the accepted range.
    #[error("invalid port {0}")]
    InvalidPort(i32),

    /// The listener started binding but never became ready.
    #[error("listener setup failed: {0}")]
    ListenerSetup(String),

    /// The loopback chat connection could not be opened.
    #[error("self-client could not connect to {url}: {source}")]
    SelfClientConnect {
        url: String,
        #[source]
        source: Box<tokio_tungstenite::tungstenite::Error>,
    },
}

/// Runtime parameters of every listener the controller starts.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind_ip: IpAddr,
    pub password: Option<String>,
    pub heartbeat_interval: Duration,
    pub message_cache_limit: usize,
    pub shutdown_grace: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            password: None,
            heartbeat_interval: Duration::from_secs(1),
            message_cache_limit: 500,
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

/// Everything that exists while a listener is up.
pub struct RunningServer {
    port: u16,
    generation: u64,
    started_at: Instant,
    listener: HttpListener,
    client: SelfClient,
    events: EventBroadcaster,
    messages: MessageCache,
}

impl fmt::Debug for RunningServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningServer")
            .field("port", &self.port)
            .field("generation", &self.generation)
            .field("addr", &self.listener.local_addr())
            .finish()
    }
}

impl RunningServer {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Strictly increasing across every start of the same controller.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    pub fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    pub fn messages(&self) -> &MessageCache {
        &self.messages
    }

    pub fn self_client(&self) -> &SelfClient {
        &self.client
    }

    pub fn listener(&self) -> &HttpListener {
        &self.listener
    }

    async fn teardown(&self) {
        if let Err(e) = self.client.close_session().await {
            warn!("closing self-client session failed: {e}");
        }
        self.client.close_client();
        self.listener.shutdown().await;
    }
}

/// The controller's observable state.
#[derive(Debug, Clone)]
pub enum ServerState {
    /// Nothing has been started yet.
    Init,
    /// A listener and its self-client are up.
    Started(Arc<RunningServer>),
    /// The listener was shut down on purpose.
    Stopped { reason: StopReason },
    /// Start failed or the port was rejected.
    Error(Arc<ServerError>),
}

impl ServerState {
    pub fn phase(&self) -> Phase {
        match self {
            ServerState::Started(server) => Phase::Running { port: server.port },
            _ => Phase::Idle,
        }
    }

    pub fn port(&self) -> Option<u16> {
        match self {
            ServerState::Started(server) => Some(server.port),
            _ => None,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, ServerState::Started(_))
    }

    pub fn running(&self) -> Option<&Arc<RunningServer>> {
        match self {
            ServerState::Started(server) => Some(server),
            _ => None,
        }
    }
}

/// The server controller.
pub struct FeiServer {
    settings: ServerSettings,
    registry: Arc<SharedFileRegistry>,
    transition_lock: Mutex<()>,
    state_tx: watch::Sender<ServerState>,
    feed_tx: broadcast::Sender<ServerState>,
    generations: SequenceCounter,
}

impl fmt::Debug for FeiServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeiServer")
            .field("settings", &self.settings)
            .field("state", &*self.state_tx.borrow())
            .finish()
    }
}

impl FeiServer {
    /// Creates an idle controller in the `Init` state.
    pub fn new(settings: ServerSettings, registry: Arc<SharedFileRegistry>) -> Arc<Self> {
        let (state_tx, _rx) = watch::channel(ServerState::Init);
        let (feed_tx, _rx) = broadcast::channel(TRANSITION_FEED_CAPACITY);
        Arc::new(Self {
            settings,
            registry,
            transition_lock: Mutex::new(()),
            state_tx,
            feed_tx,
            generations: SequenceCounter::new(),
        })
    }

    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<SharedFileRegistry> {
        &self.registry
    }

    pub fn current_state(&self) -> ServerState {
        self.state_tx.borrow().clone()
    }

    /// Latest-value view of the state.
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state_tx.subscribe()
    }

    /// Every state published from now on, in order.
    pub fn transitions(&self) -> broadcast::Receiver<ServerState> {
        self.feed_tx.subscribe()
    }

    /// The running session's chat history, or `None` when not started.
    pub fn messages(&self) -> Option<watch::Receiver<MessageSnapshot>> {
        self.state_tx
            .borrow()
            .running()
            .map(|server| server.messages.subscribe())
    }

    /// Drives every lifecycle transition.  Returns the resulting state.
    ///
    /// | command   | effect                                                  |
    /// |-----------|---------------------------------------------------------|
    /// | `Off`     | nothing                                                 |
    /// | `Stop`    | stop if running                                         |
    /// | `Restart` | stop if running, then start on `port`                   |
    /// | none      | start on `port`, move to `port`, or nothing if already on it |
    ///
    /// A `port` outside `1024..=65535` with no `Stop`/`Off` command stops a
    /// running server and ends in `Error`.
    pub async fn on_receive_event(&self, port: i32, command: Option<ServerCommand>) -> ServerState {
        let _guard = self.transition_lock.lock().await;
        let current = self.current_state();
        let plan = plan_transition(current.phase(), port, command);
        debug!("event port={port} command={command:?} in {:?} → {plan:?}", current.phase());

        match plan {
            Transition::Ignore => {}
            Transition::Stop { reason } => self.stop_locked(reason).await,
            Transition::Start { port } => self.start_locked(port).await,
            Transition::Restart { port, reason } => {
                self.stop_locked(reason).await;
                self.start_locked(port).await;
            }
            Transition::Reject { port } => {
                self.stop_locked(StopReason::InvalidPort).await;
                warn!("rejecting invalid port {port}");
                self.publish(ServerState::Error(Arc::new(ServerError::InvalidPort(port))));
            }
        }

        self.current_state()
    }

    /// Sends `content` to the chat relay through the self-client.  Dropped
    /// silently when not started.
    pub async fn send_message(&self, content: &str) {
        let Some(server) = self.current_state().running().cloned() else {
            debug!("not started; chat message dropped");
            return;
        };
        if let Err(e) = server.client.send(content).await {
            warn!("sending chat message failed: {e}");
        }
    }

    /// Publishes a `refresh` event to every `/sse` subscriber.  Dropped
    /// silently when not started.
    pub fn emit_refresh_event(&self) {
        match self.state_tx.borrow().running() {
            Some(server) => {
                let delivered = server.events.refresh();
                debug!("refresh sent to {delivered} subscriber(s)");
            }
            None => debug!("not started; refresh dropped"),
        }
    }

    /// Stops the server if it is running, with reason `Shutdown`.
    pub async fn shutdown(&self) {
        let _guard = self.transition_lock.lock().await;
        self.stop_locked(StopReason::Shutdown).await;
    }

    /// Synchronous [`shutdown`](Self::shutdown) for exit paths that cannot
    /// `await`.
    ///
    /// Inside a multi-thread Tokio runtime the current worker is handed off
    /// with `block_in_place`.  Outside any runtime a temporary one is built.
    /// A current-thread runtime cannot block on itself, so there the call
    /// only logs an error.
    pub fn stop_blocking(&self) {
        use tokio::runtime::{Handle, RuntimeFlavor};

        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(self.shutdown()));
            }
            Ok(_) => {
                error!("stop_blocking called on a current-thread runtime; use shutdown().await");
            }
            Err(_) => match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime.block_on(self.shutdown()),
                Err(e) => error!("cannot build a runtime for stop_blocking: {e}"),
            },
        }
    }

    // ── Private helpers ───────────────────────────────────────────────────────

    fn publish(&self, state: ServerState) {
        self.state_tx.send_replace(state.clone());
        // No feed subscribers is fine.
        let _ = self.feed_tx.send(state);
    }

    async fn stop_locked(&self, reason: StopReason) {
        let Some(server) = self.current_state().running().cloned() else {
            return;
        };
        info!("stopping server on port {} ({reason})", server.port);
        server.teardown().await;
        self.publish(ServerState::Stopped { reason });
    }

    async fn start_locked(&self, port: u16) {
        let generation = self.generations.next();
        info!("starting server on port {port} (generation {generation})");
        match self.launch(port, generation).await {
            Ok(server) => {
                info!("server started on {}", server.local_addr());
                self.publish(ServerState::Started(Arc::new(server)));
            }
            Err(e) => {
                error!("server failed to start on port {port}: {e}");
                self.publish(ServerState::Error(Arc::new(e)));
            }
        }
    }

    async fn launch(&self, port: u16, generation: u64) -> Result<RunningServer, ServerError> {
        let config = ListenerConfig {
            bind_ip: self.settings.bind_ip,
            port,
            password: self.settings.password.clone(),
            heartbeat: self.settings.heartbeat_interval,
            shutdown_grace: self.settings.shutdown_grace,
        };
        let (listener, events) = spawn_listener(config, Arc::clone(&self.registry)).await?;

        let messages = MessageCache::new(self.settings.message_cache_limit);
        let client = match SelfClient::connect(
            listener.loopback_addr(),
            listener.session_token(),
            messages.clone(),
        )
        .await
        {
            Ok(client) => client,
            Err(e) => {
                listener.shutdown().await;
                return Err(e);
            }
        };

        Ok(RunningServer {
            port,
            generation,
            started_at: Instant::now(),
            listener,
            client,
            events,
            messages,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
