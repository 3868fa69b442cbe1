//! SelfClient: the controller's own chat connection to its listener.
//!
//! Right after a listener comes up, the controller opens a WebSocket to that
//! listener's `/chat` route over loopback.  From the relay's point of view it
//! is an ordinary peer: it gets a `user<N>` name, a welcome message and a
//! copy of every broadcast.  This gives the host a plain
//! "send text / observe messages" API without speaking to other devices
//! directly.
//!
//! # Tasks
//!
//! ```text
//! SelfClient::connect()
//!  ├─ handshake (awaited: connect fails if it fails)
//!  └─ receive task: JSON text frame → Message → MessageCache::push
//! ```
//!
//! The receive task logs and exits on a close frame, a transport error or
//! the end of the stream.  It never panics and nothing waits on it, so a
//! broken loopback connection cannot take the controller down with it.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use fei_core::Message;

use crate::application::controller::ServerError;
use crate::application::message_cache::MessageCache;
use crate::infrastructure::http::auth::SESSION_COOKIE;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;

/// A live loopback chat session.
pub struct SelfClient {
    url: String,
    sink: Arc<Mutex<WsSink>>,
    receive_task: StdMutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SelfClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelfClient").field("url", &self.url).finish()
    }
}

impl SelfClient {
    /// Connects to `ws://<addr>/chat`, authenticating with `session_token`,
    /// and starts feeding received messages into `cache`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::SelfClientConnect`] if the handshake fails.
    pub async fn connect(
        addr: SocketAddr,
        session_token: &str,
        cache: MessageCache,
    ) -> Result<Self, ServerError> {
        let url = format!("ws://{addr}/chat");
        let connect_error = |source: WsError| ServerError::SelfClientConnect {
            url: url.clone(),
            source: Box::new(source),
        };

        let mut request = url.as_str().into_client_request().map_err(connect_error)?;
        let cookie = HeaderValue::from_str(&format!("{SESSION_COOKIE}={session_token}"))
            .map_err(|e| connect_error(WsError::HttpFormat(e.into())))?;
        request.headers_mut().insert("Cookie", cookie);

        let (stream, _response) = connect_async(request).await.map_err(connect_error)?;
        info!("self-client connected to {url}");

        let (sink, frames) = stream.split();
        let receive_task = tokio::spawn(receive_loop(frames, cache, url.clone()));

        Ok(Self {
            url,
            sink: Arc::new(Mutex::new(sink)),
            receive_task: StdMutex::new(Some(receive_task)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends `content` as one chat text frame.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the frame cannot be written.
    pub async fn send(&self, content: &str) -> Result<(), WsError> {
        self.sink
            .lock()
            .await
            .send(WsMessage::Text(content.to_string()))
            .await
    }

    /// Sends a close frame and flushes it.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the close frame cannot be written.
    pub async fn close_session(&self) -> Result<(), WsError> {
        self.sink.lock().await.close().await
    }

    /// Stops the receive task.  Safe to call more than once.
    pub fn close_client(&self) {
        let task = self
            .receive_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
            debug!("self-client receive task for {} stopped", self.url);
        }
    }

    /// `true` while the receive task is still running.
    pub fn is_receiving(&self) -> bool {
        self.receive_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for SelfClient {
    fn drop(&mut self) {
        self.close_client();
    }
}

async fn receive_loop(mut frames: SplitStream<WsStream>, cache: MessageCache, url: String) {
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => match serde_json::from_str::<Message>(&text) {
                Ok(message) => {
                    debug!("self-client received message from {}", message.from);
                    cache.push(message);
                }
                Err(e) => warn!("self-client: undecodable chat frame: {e}"),
            },
            Ok(WsMessage::Close(_)) => {
                info!("self-client session to {url} closed by server");
                return;
            }
            Ok(_) => {}
            Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {
                debug!("self-client connection to {url} closed");
                return;
            }
            Err(e) => {
                warn!("self-client connection to {url} failed: {e}");
                return;
            }
        }
    }
    debug!("self-client stream from {url} ended");
}
