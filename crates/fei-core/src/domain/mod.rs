//! Domain rules for FeiShare.
//!
//! Nothing in here performs I/O.  The server crate reads files, binds sockets
//! and spawns tasks; this module only decides *what* those effects should be:
//!
//! - [`share`] – the shared-item model, locator parsing, and the text format
//!   of the persisted share log.
//! - [`lifecycle`] – the decision table that turns a `(port, command)` event
//!   into a start/stop/restart plan for the server controller.

pub mod lifecycle;
pub mod share;
