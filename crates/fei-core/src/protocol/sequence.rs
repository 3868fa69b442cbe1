//! Lock-free counter used for chat peer names and server generations.
//!
//! The relay names each new connection `user<N>` where `N` comes from a
//! [`SequenceCounter`]; the controller stamps every started server with the
//! next value of its own counter so that a restart is always observable as a
//! strictly larger generation, even when the port did not change.

use std::sync::atomic::{AtomicU64, Ordering};

/// Prefix of auto-assigned chat peer names.
pub const PEER_NAME_PREFIX: &str = "user";

/// A thread-safe, monotonically increasing counter starting at 0.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    inner: AtomicU64,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current value and advances the counter.
    pub fn next(&self) -> u64 {
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the value the next call to [`next`](Self::next) would hand out.
    pub fn peek(&self) -> u64 {
        self.inner.load(Ordering::Relaxed)
    }
}

/// Display name of the chat peer with sequence number `id`.
pub fn peer_name(id: u64) -> String {
    format!("{PEER_NAME_PREFIX}{id}")
}
