//! HTTP listener: routes, per-listener state and lifecycle.
//!
//! # Routes
//!
//! | route                 | handler                      | gated |
//! |-----------------------|------------------------------|-------|
//! | `GET /`               | [`shares::landing`]          | yes   |
//! | `GET /shares`         | [`shares::list_shares`]      | yes   |
//! | `GET /shares/:index`  | [`shares::download_share`]   | yes   |
//! | `GET /sse`            | [`sse::sse_stream`]          | yes   |
//! | `GET /chat`           | [`chat::chat_upgrade`]       | yes   |
//! | `GET/POST /login`     | [`auth`]                     | no    |
//!
//! Unknown paths fall through to a `404`.  Handler errors are rendered by
//! [`HttpError`]'s `IntoResponse` impl.
//!
//! # Startup handshake
//!
//! [`spawn_listener`] binds the socket first, so a port conflict surfaces as
//! [`ServerError::BindFailed`] before anything else is created.  It then
//! spawns the serving task, which builds the [`EventBroadcaster`], the
//! chat relay and the router, and hands the broadcaster back over a
//! `oneshot` channel right before it starts accepting.  `spawn_listener`
//! returns only after that hand-off, so once it returns every route is live.
//!
//! # Shutdown
//!
//! [`HttpListener::shutdown`] cancels the listener's token.  `axum::serve`
//! stops accepting, the SSE streams and chat peers see the same token and
//! end, and in-flight requests drain.  If draining takes longer than the
//! configured grace period the task is aborted, which drops the socket.

pub mod auth;
pub mod chat;
pub mod error;
pub mod shares;
pub mod sse;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::routing::get;
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::broadcaster::EventBroadcaster;
use crate::application::chat_relay::ChatRelay;
use crate::application::controller::ServerError;
use crate::application::share_registry::SharedFileRegistry;

pub use auth::SessionStore;
pub use error::HttpError;

/// State shared by every handler of one listener.
#[derive(Clone)]
pub struct HttpState {
    pub registry: Arc<SharedFileRegistry>,
    pub events: EventBroadcaster,
    pub relay: Arc<ChatRelay>,
    pub sessions: Arc<SessionStore>,
    pub heartbeat: Duration,
    pub shutdown: CancellationToken,
}

/// Builds the router for one listener.
pub fn build_router(state: HttpState) -> Router {
    let gated = Router::new()
        .route("/", get(shares::landing))
        .route("/shares", get(shares::list_shares))
        .route("/shares/:index", get(shares::download_share))
        .route("/sse", get(sse::sse_stream))
        .route("/chat", get(chat::chat_upgrade))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ));

    Router::new()
        .route("/login", get(auth::login_form).post(auth::login_submit))
        .merge(gated)
        .fallback(error::not_found)
        .with_state(state)
}

/// Everything a listener needs to know at startup.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub bind_ip: IpAddr,
    pub port: u16,
    pub password: Option<String>,
    pub heartbeat: Duration,
    pub shutdown_grace: Duration,
}

/// A running HTTP listener.
pub struct HttpListener {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    relay: Arc<ChatRelay>,
    session_token: String,
    shutdown_grace: Duration,
}

impl std::fmt::Debug for HttpListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpListener")
            .field("local_addr", &self.local_addr)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl HttpListener {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Address a client on this host should connect to.  A wildcard bind
    /// address is replaced by loopback.
    pub fn loopback_addr(&self) -> SocketAddr {
        let ip = match self.local_addr.ip() {
            ip if ip.is_unspecified() => match ip {
                IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(_) => IpAddr::V6(std::net::Ipv6Addr::LOCALHOST),
            },
            ip => ip,
        };
        SocketAddr::new(ip, self.local_addr.port())
    }

    /// A session token registered at startup for in-process clients.
    pub fn session_token(&self) -> &str {
        &self.session_token
    }

    pub fn relay(&self) -> &Arc<ChatRelay> {
        &self.relay
    }

    /// Stops accepting, drains for up to the grace period, then aborts.
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self
            .task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(mut task) = task else {
            return;
        };

        match tokio::time::timeout(self.shutdown_grace, &mut task).await {
            Ok(Ok(())) => info!("listener on {} stopped", self.local_addr),
            Ok(Err(e)) => warn!("listener task on {} failed: {e}", self.local_addr),
            Err(_) => {
                warn!(
                    "listener on {} did not drain within {:?}; aborting",
                    self.local_addr, self.shutdown_grace
                );
                task.abort();
                let _ = task.await;
            }
        }
    }
}

impl Drop for HttpListener {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.get_mut().unwrap_or_else(|e| e.into_inner()).take() {
            task.abort();
        }
    }
}

/// Binds `config.bind_ip:config.port` and starts serving.
///
/// Returns once the router is installed and the broadcaster exists.
///
/// # Errors
///
/// - [`ServerError::BindFailed`] if the address cannot be bound.
/// - [`ServerError::ListenerSetup`] if the serving task exits before it is
///   ready.
pub async fn spawn_listener(
    config: ListenerConfig,
    registry: Arc<SharedFileRegistry>,
) -> Result<(HttpListener, EventBroadcaster), ServerError> {
    let addr = SocketAddr::new(config.bind_ip, config.port);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::BindFailed { addr, source })?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| ServerError::ListenerSetup(format!("cannot read bound address: {e}")))?;

    let sessions = Arc::new(SessionStore::new(config.password.clone()));
    let session_token = sessions.issue().await;
    let relay = ChatRelay::new();
    let cancel = CancellationToken::new();
    let (ready_tx, ready_rx) = oneshot::channel::<EventBroadcaster>();

    let task = tokio::spawn(serve(
        listener,
        registry,
        Arc::clone(&relay),
        sessions,
        config.heartbeat,
        cancel.clone(),
        ready_tx,
    ));

    let events = match ready_rx.await {
        Ok(events) => events,
        Err(_) => {
            cancel.cancel();
            task.abort();
            return Err(ServerError::ListenerSetup(format!(
                "listener on {local_addr} exited before it was ready"
            )));
        }
    };

    info!("listening on {local_addr}");
    let handle = HttpListener {
        local_addr,
        cancel,
        task: Mutex::new(Some(task)),
        relay,
        session_token,
        shutdown_grace: config.shutdown_grace,
    };
    Ok((handle, events))
}

async fn serve(
    listener: TcpListener,
    registry: Arc<SharedFileRegistry>,
    relay: Arc<ChatRelay>,
    sessions: Arc<SessionStore>,
    heartbeat: Duration,
    cancel: CancellationToken,
    ready: oneshot::Sender<EventBroadcaster>,
) {
    let events = EventBroadcaster::new();
    spawn_refresh_on_change(&registry, events.clone(), cancel.clone());

    let router = build_router(HttpState {
        registry,
        events: events.clone(),
        relay,
        sessions,
        heartbeat,
        shutdown: cancel.clone(),
    });

    if ready.send(events).is_err() {
        debug!("listener abandoned during startup");
        return;
    }

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
    {
        error!("http server error: {e}");
    }
}

/// Publishes `refresh` whenever the registry's published list changes.
fn spawn_refresh_on_change(
    registry: &SharedFileRegistry,
    events: EventBroadcaster,
    cancel: CancellationToken,
) {
    let mut shares = registry.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = shares.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let delivered = events.refresh();
                    debug!("share list changed; refresh sent to {delivered} subscriber(s)");
                }
                _ = cancel.cancelled() => break,
            }
        }
    });
}
