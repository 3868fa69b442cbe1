//! SharedFileRegistry: the list of items offered on `/shares`.
//!
//! The list is computed from two sources:
//!
//! 1. the share log, a text file of locators the user granted (one per line);
//! 2. the local files directory, holding files copied into app storage.
//!
//! [`SharedFileRegistry::invalidate`] recomputes the list and publishes it
//! as an immutable snapshot (`Arc<Vec<SharedFileInfo>>`) through a `watch`
//! channel.  Local files come first, then the log entries in log order.
//! Duplicates between the two halves are kept.
//!
//! # Self-healing log
//!
//! During invalidation every log line is parsed and its display name looked
//! up through the [`ContentResolver`].  Lines that fail either step are
//! dropped, and the log is rewritten with only the lines that survived.
//!
//! # Locking
//!
//! All log read-modify-write sequences run under one async mutex, so two
//! concurrent invalidations (or an append racing an invalidation) never
//! interleave their file operations.
//!
//! # Failure policy
//!
//! Nothing in here panics or aborts the whole operation because of one bad
//! entry.  `remove` never returns an error at all: failures are logged and
//! reported to the [`StatusNotifier`].

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use fei_core::domain::share::{parse_share_log, render_share_log, without_locator};
use fei_core::{parse_locator, Locator, SharedFileInfo};

use crate::infrastructure::notifier::StatusNotifier;
use crate::infrastructure::storage::{ContentResolver, ShareStore, StorageError};

/// Immutable list of shared items as last published.
pub type ShareSnapshot = Arc<Vec<SharedFileInfo>>;

/// Computes and publishes the list of shared items.
pub struct SharedFileRegistry {
    store: ShareStore,
    resolver: Arc<dyn ContentResolver>,
    notifier: Arc<dyn StatusNotifier>,
    log_lock: Mutex<()>,
    snapshot_tx: watch::Sender<ShareSnapshot>,
}

impl std::fmt::Debug for SharedFileRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedFileRegistry")
            .field("store", &self.store)
            .field("items", &self.snapshot_tx.borrow().len())
            .finish()
    }
}

impl SharedFileRegistry {
    /// Creates a registry with an empty snapshot.  Call
    /// [`invalidate`](Self::invalidate) to load the persisted state.
    pub fn new(
        store: ShareStore,
        resolver: Arc<dyn ContentResolver>,
        notifier: Arc<dyn StatusNotifier>,
    ) -> Arc<Self> {
        let (snapshot_tx, _rx) = watch::channel(Arc::new(Vec::new()));
        Arc::new(Self {
            store,
            resolver,
            notifier,
            log_lock: Mutex::new(()),
            snapshot_tx,
        })
    }

    pub fn resolver(&self) -> &Arc<dyn ContentResolver> {
        &self.resolver
    }

    pub fn store(&self) -> &ShareStore {
        &self.store
    }

    /// The last published snapshot.
    pub fn snapshot(&self) -> ShareSnapshot {
        Arc::clone(&self.snapshot_tx.borrow())
    }

    /// The item at `index` in the last published snapshot.
    pub fn get(&self, index: usize) -> Option<SharedFileInfo> {
        self.snapshot_tx.borrow().get(index).cloned()
    }

    /// A receiver notified whenever the published list changes.
    pub fn subscribe(&self) -> watch::Receiver<ShareSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Re-reads both sources, heals the log and publishes the merged list.
    ///
    /// Returns the newly published snapshot.  Subscribers are only woken when
    /// the list differs from the previous one.
    pub async fn invalidate(&self) -> ShareSnapshot {
        let _guard = self.log_lock.lock().await;
        self.invalidate_locked().await
    }

    /// Appends `locator` to the log.  The item shows up after the next
    /// [`invalidate`](Self::invalidate).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the log cannot be written.
    pub async fn append(&self, locator: &str) -> Result<(), StorageError> {
        let _guard = self.log_lock.lock().await;
        self.store.append_line(locator).await?;
        debug!("appended {locator} to share log");
        Ok(())
    }

    /// Copies `source` into the local files directory and republishes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the copy fails.
    pub async fn import_file(&self, source: &Path) -> Result<SharedFileInfo, StorageError> {
        let _guard = self.log_lock.lock().await;
        let target = self.store.import(source).await?;
        info!("imported {} as {}", source.display(), target.display());
        self.invalidate_locked().await;
        Ok(local_info(&target))
    }

    /// Stops sharing `info`.
    ///
    /// Removes every matching log line, releases the access grant held for
    /// the locator and, for files in the local directory, deletes the file.
    /// Failures are reported through the notifier and never returned.
    pub async fn remove(&self, info: &SharedFileInfo) {
        let _guard = self.log_lock.lock().await;

        if let Err(e) = self.remove_from_log(&info.locator).await {
            self.report_failure(info, &e);
        }

        match parse_locator(&info.locator) {
            Ok(locator) => {
                if let Err(e) = self.resolver.release(&locator).await {
                    self.report_failure(info, &e);
                }
                if let Some(path) = locator.as_path() {
                    if self.store.is_local(path) {
                        if let Err(e) = self.store.delete_local(path).await {
                            self.report_failure(info, &e);
                        }
                    }
                }
            }
            Err(e) => debug!("not releasing unparseable locator {}: {e}", info.locator),
        }

        self.invalidate_locked().await;
    }

    // ── Private helpers ───────────────────────────────────────────────────────

    async fn remove_from_log(&self, locator: &str) -> Result<(), StorageError> {
        let lines = parse_share_log(&self.store.read_log().await?);
        let before = lines.len();
        let kept = without_locator(lines, locator);
        if kept.len() != before {
            self.store.write_log(&kept).await?;
        }
        Ok(())
    }

    fn report_failure(&self, info: &SharedFileInfo, error: &StorageError) {
        warn!("failed to unshare {}: {error}", info.locator);
        self.notifier
            .notify(&format!("Could not remove {}: {error}", info.display_name));
    }

    async fn invalidate_locked(&self) -> ShareSnapshot {
        let remote = self.resolve_log().await;

        let local = match self.store.list_files().await {
            Ok(paths) => paths.iter().map(|p| local_info(p)).collect(),
            Err(e) => {
                warn!("cannot list local files: {e}");
                Vec::new()
            }
        };

        let mut items: Vec<SharedFileInfo> = local;
        items.extend(remote);
        let snapshot = Arc::new(items);

        let published = Arc::clone(&snapshot);
        let changed = self.snapshot_tx.send_if_modified(|current| {
            if **current == *published {
                false
            } else {
                *current = published;
                true
            }
        });
        debug!("share list has {} item(s), changed: {changed}", snapshot.len());
        snapshot
    }

    /// Resolves every log line and rewrites the log with the survivors.
    async fn resolve_log(&self) -> Vec<SharedFileInfo> {
        let text = match self.store.read_log().await {
            Ok(text) => text,
            Err(e) => {
                // The log is left untouched so a transient read failure
                // cannot wipe it.
                warn!("cannot read share log: {e}");
                return Vec::new();
            }
        };

        let lines = parse_share_log(&text);
        let mut kept = Vec::with_capacity(lines.len());
        let mut items = Vec::with_capacity(lines.len());

        for line in lines {
            let locator: Locator = match parse_locator(&line) {
                Ok(l) => l,
                Err(e) => {
                    debug!("dropping share log line {line:?}: {e}");
                    continue;
                }
            };
            match self.resolver.display_name(&locator).await {
                Ok(name) => {
                    items.push(SharedFileInfo::new(line.clone(), name));
                    kept.push(line);
                }
                Err(e) => debug!("dropping unresolvable share {line}: {e}"),
            }
        }

        if render_share_log(&kept) != text {
            if let Err(e) = self.store.write_log(&kept).await {
                warn!("cannot rewrite share log: {e}");
            }
        }
        items
    }
}

fn local_info(path: &Path) -> SharedFileInfo {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    SharedFileInfo::new(path.to_string_lossy(), name)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
