//! Integration tests for the HTTP surface of a started server.
//!
//! # Purpose
//!
//! Each test starts a real `FeiServer` on a free loopback port and talks to
//! it with `reqwest`, exactly like a browser on the LAN would:
//!
//! ```text
//! reqwest ──GET /shares──────────► listener ──► SharedFileRegistry
//! reqwest ──GET /shares/0 Range──► listener ──► FsContentResolver (seek)
//! reqwest ──GET /sse─────────────► listener ◄── emit_refresh_event()
//! reqwest ──POST /login──────────► SessionStore ──► Set-Cookie
//! ```
//!
//! Redirects are never followed so the login gate's 303s stay visible.

mod common;

use std::sync::Arc;

use reqwest::{header, redirect::Policy, Client, StatusCode};

use fei_core::SharedFileInfo;
use fei_server::FeiServer;

use common::{free_port, server, server_with_password, write_pattern_file, WAIT};

fn client() -> Client {
    Client::builder()
        .redirect(Policy::none())
        .build()
        .expect("client")
}

/// Starts `server` and returns its base URL.
async fn start(server: &Arc<FeiServer>) -> String {
    let port = free_port();
    let state = server.on_receive_event(i32::from(port), None).await;
    assert!(state.is_started(), "server did not start: {state:?}");
    format!("http://127.0.0.1:{port}")
}

/// Shares one 1000-byte file and returns its contents.
async fn share_pattern_file(server: &Arc<FeiServer>, dir: &std::path::Path) -> Vec<u8> {
    let path = dir.join("report.bin");
    let bytes = write_pattern_file(&path, 1000);
    let registry = server.registry();
    registry
        .append(path.to_str().expect("utf-8 path"))
        .await
        .expect("append");
    registry.invalidate().await;
    bytes
}

// ── Listing ───────────────────────────────────────────────────────────────────

/// `/shares` returns the registry snapshot as JSON.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_list_shares_returns_snapshot() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let server = server(dir.path());
    share_pattern_file(&server, dir.path()).await;
    let base = start(&server).await;

    // Act
    let response = client().get(format!("{base}/shares")).send().await.unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let listed: Vec<SharedFileInfo> = response.json().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].display_name, "report.bin");

    server.shutdown().await;
}

/// The landing page links every shared item by index.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_landing_page_links_shares() {
    let dir = tempfile::tempdir().unwrap();
    let server = server(dir.path());
    share_pattern_file(&server, dir.path()).await;
    let base = start(&server).await;

    let body = client()
        .get(format!("{base}/"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(body.contains("/shares/0"));
    assert!(body.contains("report.bin"));

    server.shutdown().await;
}

// ── Downloads ─────────────────────────────────────────────────────────────────

/// A plain GET streams the whole file with download headers.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_full_download() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let server = server(dir.path());
    let bytes = share_pattern_file(&server, dir.path()).await;
    let base = start(&server).await;

    // Act
    let response = client()
        .get(format!("{base}/shares/0"))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
    assert_eq!(headers[header::CONTENT_LENGTH], "1000");
    assert!(headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("report.bin"));
    assert!(headers.contains_key(header::ETAG));
    assert_eq!(response.bytes().await.unwrap().as_ref(), bytes.as_slice());

    server.shutdown().await;
}

/// `Range: bytes=100-199` yields 206 with exactly that slice.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_range_download() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let server = server(dir.path());
    let bytes = share_pattern_file(&server, dir.path()).await;
    let base = start(&server).await;

    // Act
    let response = client()
        .get(format!("{base}/shares/0"))
        .header(header::RANGE, "bytes=100-199")
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 100-199/1000");
    let body = response.bytes().await.unwrap();
    assert_eq!(body.as_ref(), &bytes[100..200]);

    server.shutdown().await;
}

/// A range that starts past the end is 416 with the total size.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unsatisfiable_range() {
    let dir = tempfile::tempdir().unwrap();
    let server = server(dir.path());
    share_pattern_file(&server, dir.path()).await;
    let base = start(&server).await;

    let response = client()
        .get(format!("{base}/shares/0"))
        .header(header::RANGE, "bytes=5000-")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1000");

    server.shutdown().await;
}

/// An `If-Range` that does not match the current ETag downgrades to 200.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stale_if_range_serves_full_file() {
    let dir = tempfile::tempdir().unwrap();
    let server = server(dir.path());
    share_pattern_file(&server, dir.path()).await;
    let base = start(&server).await;

    let response = client()
        .get(format!("{base}/shares/0"))
        .header(header::RANGE, "bytes=0-9")
        .header(header::IF_RANGE, "\"not-the-etag\"")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.bytes().await.unwrap().len(), 1000);

    server.shutdown().await;
}

/// Indices past the end and unknown paths are both 404.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let server = server(dir.path());
    share_pattern_file(&server, dir.path()).await;
    let base = start(&server).await;
    let client = client();

    let out_of_range = client.get(format!("{base}/shares/5")).send().await.unwrap();
    let not_a_number = client.get(format!("{base}/shares/abc")).send().await.unwrap();
    let unknown = client.get(format!("{base}/nope")).send().await.unwrap();

    assert_eq!(out_of_range.status(), StatusCode::NOT_FOUND);
    assert_eq!(not_a_number.status(), StatusCode::NOT_FOUND);
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    server.shutdown().await;
}

// ── Server-Sent Events ────────────────────────────────────────────────────────

/// Reads SSE chunks until one contains `needle`.
async fn wait_for_chunk(response: &mut reqwest::Response, needle: &str) {
    tokio::time::timeout(WAIT, async {
        let mut seen = String::new();
        while let Some(chunk) = response.chunk().await.unwrap() {
            seen.push_str(&String::from_utf8_lossy(&chunk));
            if seen.contains(needle) {
                return;
            }
        }
        panic!("stream ended before {needle:?}; got {seen:?}");
    })
    .await
    .expect("timed out waiting for SSE data");
}

/// `/sse` delivers heartbeat pings.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sse_heartbeat() {
    let dir = tempfile::tempdir().unwrap();
    let server = server(dir.path());
    let base = start(&server).await;

    let mut response = client().get(format!("{base}/sse")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    wait_for_chunk(&mut response, "event: ping").await;

    server.shutdown().await;
}

/// `emit_refresh_event` reaches a connected `/sse` client.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sse_refresh_after_emit() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let server = server(dir.path());
    let base = start(&server).await;
    let mut response = client().get(format!("{base}/sse")).send().await.unwrap();
    // The first ping proves the subscription exists.
    wait_for_chunk(&mut response, "event: ping").await;

    // Act
    server.emit_refresh_event();

    // Assert
    wait_for_chunk(&mut response, "refresh").await;

    server.shutdown().await;
}

/// A registry change pushes a refresh without an explicit emit.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sse_refresh_after_share_change() {
    let dir = tempfile::tempdir().unwrap();
    let server = server(dir.path());
    let base = start(&server).await;
    let mut response = client().get(format!("{base}/sse")).send().await.unwrap();
    wait_for_chunk(&mut response, "event: ping").await;

    share_pattern_file(&server, dir.path()).await;

    wait_for_chunk(&mut response, "refresh").await;

    server.shutdown().await;
}

// ── Login gate ────────────────────────────────────────────────────────────────

/// With a password set, the whole login flow works and the server keeps
/// running through a failed attempt.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_login_flow() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let server = server_with_password(dir.path(), "s3cret");
    let base = start(&server).await;
    let client = client();

    // Act + Assert: anonymous access is redirected to the form.
    let anonymous = client.get(format!("{base}/shares")).send().await.unwrap();
    assert_eq!(anonymous.status(), StatusCode::SEE_OTHER);
    assert_eq!(anonymous.headers()[header::LOCATION], "/login");

    // Wrong password.
    let wrong = client
        .post(format!("{base}/login"))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body("password=guess")
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert!(server.current_state().is_started());

    // Right password.
    let right = client
        .post(format!("{base}/login"))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body("password=s3cret")
        .send()
        .await
        .unwrap();
    assert_eq!(right.status(), StatusCode::SEE_OTHER);
    let cookie = right.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("fei_session="));

    // The cookie opens the gate.
    let admitted = client
        .get(format!("{base}/shares"))
        .header(header::COOKIE, cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(admitted.status(), StatusCode::OK);

    server.shutdown().await;
}
