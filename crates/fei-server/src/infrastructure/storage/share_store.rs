//! On-disk layout of the share registry.
//!
//! Two things live on disk: the share log (one locator per line) and the
//! directory of files that were copied into local storage.  [`ShareStore`]
//! owns both paths and performs the raw reads and writes.  It does not lock
//! anything; `SharedFileRegistry` serialises callers.
//!
//! Both paths are made absolute on construction.  Local files are shared
//! under their full path, and a relative locator would not parse back.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use fei_core::domain::share::render_share_log;

use super::content::StorageError;

/// Paths of the share log and the local files directory.
#[derive(Debug, Clone)]
pub struct ShareStore {
    log_path: PathBuf,
    files_dir: PathBuf,
}

impl ShareStore {
    /// Relative paths are resolved against the current directory.
    pub fn new(log_path: impl Into<PathBuf>, files_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_path: absolute(log_path.into()),
            files_dir: absolute(files_dir.into()),
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }

    /// Reads the share log.  A log that does not exist yet reads as empty.
    pub async fn read_log(&self) -> Result<String, StorageError> {
        match tokio::fs::read_to_string(&self.log_path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(StorageError::io(&self.log_path, e)),
        }
    }

    /// Replaces the log with exactly `locators`.
    pub async fn write_log(&self, locators: &[String]) -> Result<(), StorageError> {
        self.ensure_parent().await?;
        tokio::fs::write(&self.log_path, render_share_log(locators))
            .await
            .map_err(|e| StorageError::io(&self.log_path, e))
    }

    /// Appends one locator line, creating the log if needed.
    pub async fn append_line(&self, locator: &str) -> Result<(), StorageError> {
        self.ensure_parent().await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await
            .map_err(|e| StorageError::io(&self.log_path, e))?;
        file.write_all(format!("{}\n", locator.trim()).as_bytes())
            .await
            .map_err(|e| StorageError::io(&self.log_path, e))?;
        file.flush()
            .await
            .map_err(|e| StorageError::io(&self.log_path, e))
    }

    /// Lists regular files in the local directory, sorted by name.
    ///
    /// A missing directory lists as empty.
    pub async fn list_files(&self) -> Result<Vec<PathBuf>, StorageError> {
        let mut entries = match tokio::fs::read_dir(&self.files_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&self.files_dir, e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&self.files_dir, e))?
        {
            match entry.file_type().await {
                Ok(kind) if kind.is_file() => files.push(entry.path()),
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!("skipping {}: {e}", entry.path().display());
                }
            }
        }
        files.sort();
        Ok(files)
    }

    /// Returns `true` when `path` names a file directly inside the local
    /// directory.
    pub fn is_local(&self, path: &Path) -> bool {
        path.parent() == Some(self.files_dir.as_path())
    }

    /// Copies `source` into the local directory.
    ///
    /// On a name clash the copy becomes `stem (1).ext`, `stem (2).ext`, ...
    pub async fn import(&self, source: &Path) -> Result<PathBuf, StorageError> {
        let file_name = source
            .file_name()
            .ok_or_else(|| StorageError::Unresolvable(source.display().to_string()))?;

        tokio::fs::create_dir_all(&self.files_dir)
            .await
            .map_err(|e| StorageError::io(&self.files_dir, e))?;

        let target = self.free_name(Path::new(file_name)).await?;
        tokio::fs::copy(source, &target)
            .await
            .map_err(|e| StorageError::io(source, e))?;
        Ok(target)
    }

    /// Deletes a file from the local directory.
    pub async fn delete_local(&self, path: &Path) -> Result<(), StorageError> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| StorageError::io(path, e))
    }

    async fn free_name(&self, name: &Path) -> Result<PathBuf, StorageError> {
        let candidate = self.files_dir.join(name);
        if !path_exists(&candidate).await? {
            return Ok(candidate);
        }

        let stem = name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = name
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut n = 1u32;
        loop {
            let candidate = self.files_dir.join(format!("{stem} ({n}){ext}"));
            if !path_exists(&candidate).await? {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    async fn ensure_parent(&self) -> Result<(), StorageError> {
        match self.log_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StorageError::io(dir, e)),
            _ => Ok(()),
        }
    }
}

async fn path_exists(path: &Path) -> Result<bool, StorageError> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| StorageError::io(path, e))
}

fn absolute(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(e) => {
            tracing::warn!("cannot resolve {}: {e}", path.display());
            path
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
