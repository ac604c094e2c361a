//! Cross-instance change detection.
//!
//! Watches the storage directory and, after a short quiet period, asks the
//! store to reload if the workspace blob no longer matches what this
//! instance last read or wrote. Our own writes therefore never trigger a
//! reload; another instance's write replaces local state wholesale.

use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{Error, Result};
use crate::store::SharedStore;

const WATCH_DEBOUNCE_MS: u64 = 200;

/// Messages sent by the watcher thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    /// Another instance changed the blob and the store reloaded it.
    Reloaded,
    Error(String),
}

/// Watch the store's blob file on a background thread.
///
/// The thread stops once `tx`'s receiver is dropped.
pub fn spawn_watch(store: SharedStore, tx: Sender<StoreChange>) -> Result<JoinHandle<()>> {
    let blob = store.storage_path()?;
    let dir = blob
        .parent()
        .map(PathBuf::from)
        .ok_or_else(|| Error::InvalidArgument(format!("{} has no parent", blob.display())))?;
    std::fs::create_dir_all(&dir)?;
    let blob_name = blob.file_name().map(|name| name.to_os_string());

    let (event_tx, event_rx) = mpsc::channel();
    let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res| {
        let _ = event_tx.send(res);
    })
    .map_err(|e| Error::OperationFailed(format!("failed to start watcher: {e}")))?;
    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .map_err(|e| Error::OperationFailed(format!("failed to watch {}: {e}", dir.display())))?;
    tracing::debug!(dir = %dir.display(), "watching storage directory");

    let handle = thread::spawn(move || {
        // Owned by the thread so the watch lives as long as the loop.
        let _watcher = watcher;
        let debounce = Duration::from_millis(WATCH_DEBOUNCE_MS);
        let mut pending: Option<Instant> = None;

        loop {
            let timeout = pending
                .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::from_secs(3600));
            match event_rx.recv_timeout(timeout) {
                Ok(Ok(event)) => {
                    let touches_blob = event.paths.is_empty()
                        || event
                            .paths
                            .iter()
                            .any(|path| path.file_name().map(|n| n.to_os_string()) == blob_name);
                    if touches_blob {
                        pending = Some(Instant::now() + debounce);
                    }
                }
                Ok(Err(err)) => {
                    if tx.send(StoreChange::Error(err.to_string())).is_err() {
                        break;
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if pending.take().is_none() {
                        continue;
                    }
                    let message = match store.refresh_if_changed() {
                        Ok(true) => StoreChange::Reloaded,
                        Ok(false) => continue,
                        Err(err) => StoreChange::Error(err.to_string()),
                    };
                    if tx.send(message).is_err() {
                        break;
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
        tracing::debug!("storage watcher stopped");
    });
    Ok(handle)
}
