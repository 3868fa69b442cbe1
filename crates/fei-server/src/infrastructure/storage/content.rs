//! Locator resolution: display names, metadata and byte streams.
//!
//! The registry and the `/shares/{index}` route never touch a locator's
//! backing storage directly.  They go through a [`ContentResolver`], which
//! answers "what is this called", "how big is it, what type, when was it
//! modified" and "give me its bytes from offset N".
//!
//! [`FsContentResolver`] handles plain filesystem paths (including
//! `file://` URIs).  Other schemes, such as a mobile platform's
//! `content://` provider URIs, need a platform resolver and are reported as
//! [`StorageError::Unsupported`], which makes the registry drop them on the
//! next invalidation.

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncSeekExt};

use fei_core::Locator;

/// Error type for share storage and locator resolution.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A file system I/O error occurred.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A log line could not be parsed as a locator.
    #[error("invalid locator: {0}")]
    InvalidLocator(String),

    /// The locator parsed but no longer points at readable content.
    #[error("cannot resolve {0}")]
    Unresolvable(String),

    /// The resolver has no backend for this kind of locator.
    #[error("unsupported locator: {0}")]
    Unsupported(String),
}

impl StorageError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What the content route needs to know before streaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMeta {
    pub size: u64,
    pub mime: String,
    /// Milliseconds since the Unix epoch; 0 when the platform cannot tell.
    pub last_modified_ms: u64,
}

/// A boxed byte stream positioned at the requested offset.
pub type ContentReader = Pin<Box<dyn AsyncRead + Send>>;

/// Resolves locators to names, metadata and readable streams.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentResolver: Send + Sync {
    /// Human-readable name shown in the listing and used as download name.
    async fn display_name(&self, locator: &Locator) -> Result<String, StorageError>;

    /// Size, MIME type and modification time.
    async fn metadata(&self, locator: &Locator) -> Result<ContentMeta, StorageError>;

    /// Opens the content and skips to `offset`.
    async fn open(&self, locator: &Locator, offset: u64) -> Result<ContentReader, StorageError>;

    /// Gives up any access grant held for the locator.
    async fn release(&self, locator: &Locator) -> Result<(), StorageError>;
}

/// [`ContentResolver`] for filesystem paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsContentResolver;

impl FsContentResolver {
    pub fn new() -> Self {
        Self
    }

    fn path_of(locator: &Locator) -> Result<&Path, StorageError> {
        match locator {
            Locator::Path(path) => Ok(path),
            Locator::Uri { scheme, rest } => {
                Err(StorageError::Unsupported(format!("{scheme}://{rest}")))
            }
        }
    }
}

#[async_trait]
impl ContentResolver for FsContentResolver {
    async fn display_name(&self, locator: &Locator) -> Result<String, StorageError> {
        let path = Self::path_of(locator)?;
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        if !meta.is_file() {
            return Err(StorageError::Unresolvable(path.display().to_string()));
        }
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| StorageError::Unresolvable(path.display().to_string()))
    }

    async fn metadata(&self, locator: &Locator) -> Result<ContentMeta, StorageError> {
        let path = Self::path_of(locator)?;
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        if !meta.is_file() {
            return Err(StorageError::Unresolvable(path.display().to_string()));
        }

        let last_modified_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);

        Ok(ContentMeta {
            size: meta.len(),
            mime: mime_guess::from_path(path)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
            last_modified_ms,
        })
    }

    async fn open(&self, locator: &Locator, offset: u64) -> Result<ContentReader, StorageError> {
        let path = Self::path_of(locator)?;
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        if offset > 0 {
            file.seek(std::io::SeekFrom::Start(offset))
                .await
                .map_err(|e| StorageError::io(path, e))?;
        }
        Ok(Box::pin(file))
    }

    async fn release(&self, _locator: &Locator) -> Result<(), StorageError> {
        // Plain paths carry no grant.
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
