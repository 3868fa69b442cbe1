//! The one place where handler failures become HTTP responses.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, error};

use crate::infrastructure::storage::StorageError;

/// Error type returned by route handlers.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Unknown route, out-of-range index or vanished file.
    #[error("{0}")]
    NotFound(String),

    /// Anything else that went wrong while handling the request.
    #[error("{0}")]
    Internal(String),
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::NotFound(_) => StatusCode::NOT_FOUND,
            HttpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for HttpError {
    fn from(e: StorageError) -> Self {
        match &e {
            StorageError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                HttpError::NotFound(e.to_string())
            }
            StorageError::Io { .. } => HttpError::Internal(e.to_string()),
            StorageError::InvalidLocator(_)
            | StorageError::Unresolvable(_)
            | StorageError::Unsupported(_) => HttpError::NotFound(e.to_string()),
        }
    }
}

impl From<axum::http::Error> for HttpError {
    fn from(e: axum::http::Error) -> Self {
        HttpError::Internal(e.to_string())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            HttpError::NotFound(msg) => debug!("404: {msg}"),
            HttpError::Internal(msg) => error!("500: {msg}"),
        }
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

/// Router fallback for paths no route matches.
pub async fn not_found(uri: axum::http::Uri) -> HttpError {
    HttpError::NotFound(format!("no route for {uri}"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
