//! # fei-core
//!
//! Shared library for the FeiShare local-network file-sharing server.
//!
//! This crate holds everything that can be expressed without sockets, files
//! or an async runtime.  The server crate (`fei-server`) builds the HTTP
//! listener, chat relay and controller on top of these types.
//!
//! # Architecture overview (for beginners)
//!
//! FeiShare exposes a list of user-selected files to other devices on the
//! same network.  Browsers fetch the list, download files (with resumable
//! range requests), receive live `refresh` notifications over Server-Sent
//! Events and exchange short chat messages over a WebSocket.
//!
//! - **`protocol`** – What travels over the wire: chat [`Message`] frames,
//!   [`SseEvent`]s and their text encoding, byte-range parsing, and the
//!   header values used when streaming a file.
//!
//! - **`domain`** – Pure rules: what a shared item looks like, how the
//!   persisted share log is parsed and rewritten, and the decision table that
//!   tells the controller what to do when a port or command event arrives.

pub mod domain;
pub mod protocol;

pub use domain::lifecycle::{plan_transition, Phase, ServerCommand, StopReason, Transition};
pub use domain::share::{parse_locator, Locator, LocatorError, SharedFileInfo};
pub use protocol::messages::{Message, SseEvent};
pub use protocol::range::{parse_range_header, ByteRange, RangeError};
pub use protocol::sse::encode_sse_event;
