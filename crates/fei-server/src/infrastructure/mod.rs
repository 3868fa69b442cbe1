//! Infrastructure layer: sockets, files and the host process.
//!
//! - **`http`** – the axum listener: routes, login gate, SSE and chat.
//! - **`self_client`** – the loopback WebSocket client of the controller.
//! - **`storage`** – TOML config, share log and locator resolution.
//! - **`notifier`** – maps controller states to user-facing status text.
//! - **`control`** – parses control commands typed on stdin.

pub mod control;
pub mod http;
pub mod notifier;
pub mod self_client;
pub mod storage;
