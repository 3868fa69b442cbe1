//! Landing page, share listing and the download route.
//!
//! # Range requests (for beginners)
//!
//! Video players and download managers rarely fetch a file in one go.  They
//! send `Range: bytes=<start>-<end>` and expect `206 Partial Content` with
//! only those bytes plus a `Content-Range` header saying where the slice
//! sits in the whole file.
//!
//! A client resuming a download also sends `If-Range: <etag>`.  If the file
//! changed since the client got that tag, the partial bytes would be glued
//! onto a different file, so the server ignores the range and answers with
//! the full file (`200`).  The tag here is derived from the file's
//! last-modified time and size.
//!
//! A range starting past the end of the file gets `416 Range Not
//! Satisfiable` with `Content-Range: bytes */<size>`.  A syntactically broken
//! `Range` header is ignored and the full file is served.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Json, Response};
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use fei_core::protocol::headers::{content_disposition, entity_tag, if_range_matches};
use fei_core::protocol::range::unsatisfied_content_range;
use fei_core::{parse_locator, parse_range_header, ByteRange, RangeError, SharedFileInfo};

use super::error::HttpError;
use super::HttpState;

/// `GET /` – a small page listing the shares, reloading on `refresh` events.
pub async fn landing(State(state): State<HttpState>) -> Html<String> {
    let snapshot = state.registry.snapshot();
    let mut items = String::new();
    for (index, info) in snapshot.iter().enumerate() {
        items.push_str(&format!(
            "<li><a href=\"/shares/{index}\">{}</a></li>",
            escape_html(&info.display_name)
        ));
    }
    if snapshot.is_empty() {
        items.push_str("<li><em>Nothing shared yet</em></li>");
    }

    Html(format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>FeiShare</title></head>\
         <body><h1>FeiShare</h1><ul>{items}</ul>\
         <script>new EventSource('/sse').addEventListener('refresh', () => location.reload());</script>\
         </body></html>\n"
    ))
}

/// `GET /shares` – the current snapshot as `[{"uri": ..., "name": ...}]`.
pub async fn list_shares(State(state): State<HttpState>) -> Json<Vec<SharedFileInfo>> {
    Json(state.registry.snapshot().as_ref().clone())
}

/// `GET /shares/:index` – streams one shared item.
pub async fn download_share(
    State(state): State<HttpState>,
    Path(index): Path<String>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let info = index
        .parse::<usize>()
        .ok()
        .and_then(|i| state.registry.get(i))
        .ok_or_else(|| HttpError::NotFound(format!("no shared item at index {index}")))?;

    let locator =
        parse_locator(&info.locator).map_err(|e| HttpError::NotFound(e.to_string()))?;
    let resolver = state.registry.resolver();
    let meta = resolver.metadata(&locator).await?;
    let etag = entity_tag(meta.last_modified_ms, meta.size);

    let range = match requested_range(&headers, &etag, meta.size) {
        Ok(range) => range,
        Err(RangeError::Unsatisfiable { total }) => {
            return Ok((
                StatusCode::RANGE_NOT_SATISFIABLE,
                [
                    (header::CONTENT_RANGE, unsatisfied_content_range(total)),
                    (header::ACCEPT_RANGES, "bytes".to_string()),
                ],
            )
                .into_response());
        }
        Err(RangeError::Malformed(reason)) => {
            debug!("ignoring malformed range for {}: {reason}", info.locator);
            None
        }
    };

    let (status, offset, length) = match range {
        Some(r) => (StatusCode::PARTIAL_CONTENT, r.start, r.len()),
        None => (StatusCode::OK, 0, meta.size),
    };

    let reader = resolver.open(&locator, offset).await?;
    let body = Body::from_stream(ReaderStream::new(reader.take(length)));

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, meta.mime.as_str())
        .header(header::CONTENT_LENGTH, length)
        .header(header::CONTENT_DISPOSITION, content_disposition(&info.display_name))
        .header(header::ETAG, etag.as_str())
        .header(header::ACCEPT_RANGES, "bytes");
    if let Some(r) = range {
        builder = builder.header(header::CONTENT_RANGE, r.content_range(meta.size));
    }
    Ok(builder.body(body)?)
}

/// The byte range to serve, or `None` for the whole file.
fn requested_range(
    headers: &HeaderMap,
    etag: &str,
    size: u64,
) -> Result<Option<ByteRange>, RangeError> {
    let Some(range) = headers.get(header::RANGE).and_then(|v| v.to_str().ok()) else {
        return Ok(None);
    };

    if let Some(if_range) = headers.get(header::IF_RANGE).and_then(|v| v.to_str().ok()) {
        if !if_range_matches(if_range, etag) {
            return Ok(None);
        }
    }

    parse_range_header(range, size).map(Some)
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
