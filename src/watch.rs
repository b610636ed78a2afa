//! Live watch: wires [`fsync_detector::FsWatcher`] to a
//! [`fsync_detector::ChangeDetector`] for one folder, so local edits are
//! classified and persisted into state/clock as they happen rather than
//! only at the next session's reconciliation pass.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use fsync_api_types::SyncFolder;
use fsync_detector::{ChangeDetector, FsWatcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Handle for one folder's live watch. Dropping it stops the underlying
/// `notify` watcher and lets the coalescing/classification task end once
/// its channel drains.
pub struct LiveWatch {
    _watcher: FsWatcher,
    task: JoinHandle<()>,
}

impl LiveWatch {
    /// Starts watching `folder.local_path`, classifying every coalesced
    /// batch of filesystem events through `detector`. `detector` is the
    /// same instance a session orchestrator uses for this folder, so a
    /// session's downloaded write and the watcher's resulting filesystem
    /// event share one sync-write cooldown table.
    pub fn start(folder: &SyncFolder, detector: Arc<ChangeDetector>) -> Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let root = PathBuf::from(&folder.local_path);
        let watcher = FsWatcher::watch(root, fsync_detector::watcher::DEFAULT_DEBOUNCE, tx)
            .with_context(|| format!("starting filesystem watch for folder '{}'", folder.id))?;

        let folder_id = folder.id.clone();
        let task = tokio::spawn(async move {
            while let Some(batch) = rx.recv().await {
                let now = now_unix();
                match detector.process_batch(batch, now).await {
                    Ok(changes) => {
                        for change in changes {
                            debug!(
                                folder_id = folder_id.as_str(),
                                path = change.path.as_str(),
                                change_type = ?change.change_type,
                                "local change detected"
                            );
                        }
                    }
                    Err(err) => warn!(folder_id = folder_id.as_str(), %err, "failed to classify filesystem batch"),
                }
            }
        });

        Ok(Self { _watcher: watcher, task })
    }

    /// Stops the watch and waits for the classification task to drain.
    pub async fn stop(self) {
        drop(self._watcher);
        let _ = self.task.await;
    }
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
