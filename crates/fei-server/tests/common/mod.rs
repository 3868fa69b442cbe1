//! Shared fixtures for the fei-server integration tests.
//!
//! Every test gets its own temporary data directory and its own free port on
//! loopback, so tests can run in parallel without stepping on each other.

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use fei_server::infrastructure::notifier::LogNotifier;
use fei_server::infrastructure::storage::{FsContentResolver, ShareStore};
use fei_server::{FeiServer, ServerSettings, SharedFileRegistry};

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

/// Asks the OS for a currently unused port.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .expect("no free port")
}

pub fn settings(password: Option<&str>) -> ServerSettings {
    ServerSettings {
        bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
        password: password.map(str::to_string),
        heartbeat_interval: Duration::from_millis(50),
        message_cache_limit: 100,
        shutdown_grace: Duration::from_millis(500),
    }
}

pub fn registry(dir: &Path) -> Arc<SharedFileRegistry> {
    SharedFileRegistry::new(
        ShareStore::new(dir.join("shares.txt"), dir.join("files")),
        Arc::new(FsContentResolver::new()),
        Arc::new(LogNotifier),
    )
}

pub fn server(dir: &Path) -> Arc<FeiServer> {
    FeiServer::new(settings(None), registry(dir))
}

pub fn server_with_password(dir: &Path, password: &str) -> Arc<FeiServer> {
    FeiServer::new(settings(Some(password)), registry(dir))
}

/// Writes `len` bytes where byte `i` is `i % 251`.
pub fn write_pattern_file(path: &Path, len: usize) -> Vec<u8> {
    let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    std::fs::write(path, &bytes).expect("write test file");
    bytes
}
