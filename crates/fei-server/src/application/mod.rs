//! Application layer: the long-lived objects a running server is made of.
//!
//! # Sub-modules
//!
//! - **`controller`** – `FeiServer`, the state machine that starts, stops and
//!   restarts the listener and its self-client in reaction to port changes
//!   and control commands.  Everything else in this layer is owned or
//!   referenced by it.
//!
//! - **`share_registry`** – computes the list of shared items from the share
//!   log and the local files directory and publishes it as a snapshot.
//!
//! - **`chat_relay`** – the set of connected chat peers and the fan-out of
//!   every message to all of them.
//!
//! - **`broadcaster`** – fire-and-forget fan-out of server-sent events.
//!
//! - **`message_cache`** – the capped chat history of one running session.

pub mod broadcaster;
pub mod chat_relay;
pub mod controller;
pub mod message_cache;
pub mod share_registry;
