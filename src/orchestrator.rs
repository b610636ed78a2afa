//! Session Orchestrator: drives one sync session against one peer through
//! discovery, planning, execution, and finalization. Each completed
//! session appends one line to [`crate::session_log::SessionLog`].

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use async_trait::async_trait;
use fsync_api_types::{FileMetadata, FileState, PeerId, RelPath, SyncFolder, VectorClock};
use fsync_clock::{CausalClockManager, ClockKey};
use fsync_client::TransferClient;
use fsync_datastore::{BlockStore, MerkleIndex};
use fsync_detector::ChangeDetector;
use fsync_decision::{decide_with_mode, Action};
use fsync_protocol::{Request, Response, RpcTransport};
use fsync_state::FileStateStore;
use tracing::{info, warn};

use crate::ack_tracker::PeerAckTracker;
use crate::cancellation::SessionCancellation;
use crate::conflict::{self, ConflictLog, ConflictLogEntry};
use crate::reconcile::reconcile_local_changes;
use crate::session_log::{SessionLog, SessionLogEntry};

/// Clones the `Arc` inside rather than the transport itself, so a single
/// shared connection can back both the raw RPC calls this orchestrator
/// issues directly (`getMst`/`getFiles`/`deleteFiles`) and the
/// [`TransferClient`] it hands per-file transfers to.
pub struct SharedTransport<T>(Arc<T>);

impl<T> SharedTransport<T> {
    pub fn new(inner: Arc<T>) -> Self {
        Self(inner)
    }
}

impl<T> Clone for SharedTransport<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

#[async_trait]
impl<T: RpcTransport> RpcTransport for SharedTransport<T> {
    async fn call(&self, request: Request) -> Result<Response> {
        self.0.call(request).await
    }
}

#[derive(Debug, Default, Clone)]
pub struct SessionSummary {
    pub files_synced: u64,
    pub bytes_transferred: u64,
    pub conflicts: u64,
    pub up_to_date: bool,
}

pub struct SessionOrchestrator<T: RpcTransport + Clone> {
    pub folder: SyncFolder,
    pub peer_id: PeerId,
    pub local_peer_id: PeerId,
    pub appdata: PathBuf,
    pub clock: Arc<CausalClockManager>,
    pub state: Arc<FileStateStore>,
    pub detector: Arc<ChangeDetector>,
    pub ack_tracker: Arc<PeerAckTracker>,
    pub cancellation: SessionCancellation,
    pub transport: T,
}

impl<T: RpcTransport + Clone> SessionOrchestrator<T> {
    fn local_path(&self) -> PathBuf {
        PathBuf::from(&self.folder.local_path)
    }

    fn key(&self, path: &str) -> ClockKey {
        ClockKey::new(self.folder.id.as_str(), self.folder.sync_id.as_str(), path)
    }

    /// Runs one full session: discover -> plan -> execute -> finalize.
    pub async fn run(self) -> Result<SessionSummary> {
        let started = now_unix();

        reconcile_local_changes(&self.folder, &self.local_peer_id, &self.clock, &self.state).await?;

        if self.cancellation.is_cancelled() {
            return self.finalize(SessionSummary::default(), started, "cancelled").await;
        }

        let remote_root = match self.transport.call(Request::GetMst {
            sync_id: self.folder.sync_id.clone(),
        }).await? {
            Response::MstRoot { root, .. } => root,
            Response::Error { error, .. } => anyhow::bail!("getMst rejected: {error}"),
            other => anyhow::bail!("unexpected response to getMst: {other:?}"),
        };

        if remote_root == self.local_mst_root() {
            let summary = SessionSummary {
                up_to_date: true,
                ..Default::default()
            };
            return self.finalize(summary, started, "upToDate").await;
        }

        let remote_states = match self.transport.call(Request::GetFiles {
            sync_id: self.folder.sync_id.clone(),
        }).await? {
            Response::FilesV2 { states, .. } => states,
            Response::Error { error, .. } => anyhow::bail!("getFiles rejected: {error}"),
            other => anyhow::bail!("unexpected response to getFiles: {other:?}"),
        };

        let plan = self.plan(&remote_states);

        if self.cancellation.is_cancelled() {
            return self.finalize(SessionSummary::default(), started, "cancelled").await;
        }

        let summary = self.execute(plan, &remote_states).await?;
        self.finalize(summary, started, "synced").await
    }

    /// Builds the current Merkle root over locally-live paths.
    fn local_mst_root(&self) -> String {
        let mut index = MerkleIndex::new();
        for path in self.state.live_paths() {
            if let Some(meta) = self.state.get_live(&path) {
                index.insert(path, meta.hash);
            }
        }
        index.root()
    }

    /// Phase 3: decides an [`Action`] for every path known on either side.
    fn plan(&self, remote_states: &HashMap<RelPath, FileState>) -> Vec<(RelPath, Action)> {
        let mut paths: HashSet<RelPath> = self.state.live_paths().into_iter().collect();
        paths.extend(self.state.get_deleted_paths());
        paths.extend(remote_states.keys().cloned());

        paths
            .into_iter()
            .map(|path| {
                let local = self.state.get_state(&path);
                let remote = remote_states.get(&path);
                let action = decide_with_mode(local.as_ref(), remote, &path, self.folder.mode);
                (path, action)
            })
            .filter(|(_, action)| !matches!(action, Action::Skip | Action::Uncertain))
            .collect()
    }

    /// Phase 4: dispatches every planned action with bounded concurrency.
    async fn execute(&self, plan: Vec<(RelPath, Action)>, remote_states: &HashMap<RelPath, FileState>) -> Result<SessionSummary> {
        let blocks = BlockStore::open(fsync_buildcfg::blocks_dir(&self.appdata)).context("opening block store")?;
        let transfer = TransferClient::new(self.transport.clone(), blocks);
        let conflict_log = ConflictLog::new(&self.appdata);

        let bounded = fsync_tools::concurrency::Bounded::new(fsync_buildcfg::MAX_CONCURRENT_SESSION_ACTIONS);

        let mut files_synced = 0u64;
        let mut bytes_transferred = 0u64;
        let mut conflicts = 0u64;

        for chunk in plan.chunks(fsync_buildcfg::MAX_CONCURRENT_SESSION_ACTIONS) {
            if self.cancellation.is_cancelled() {
                break;
            }
            let items: Vec<(RelPath, Action)> = chunk.to_vec();
            let results = bounded
                .run_all(items, |(path, action)| {
                    let remote_state = remote_states.get(&path).cloned();
                    let transfer = &transfer;
                    let conflict_log = &conflict_log;
                    async move {
                        self.execute_one(&path, action, remote_state, transfer, conflict_log).await
                    }
                })
                .await;

            for result in results {
                match result {
                    Ok(Some(outcome)) => {
                        files_synced += 1;
                        bytes_transferred += outcome.bytes;
                        if outcome.conflict {
                            conflicts += 1;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "action failed during session execution"),
                }
            }
        }

        Ok(SessionSummary {
            files_synced,
            bytes_transferred,
            conflicts,
            up_to_date: false,
        })
    }

    async fn execute_one(
        &self,
        path: &str,
        action: Action,
        remote_state: Option<FileState>,
        transfer: &TransferClient<T>,
        conflict_log: &ConflictLog,
    ) -> Result<Option<ActionOutcome>> {
        match action {
            Action::Skip | Action::Uncertain => Ok(None),

            Action::Upload => {
                let Some(meta) = self.state.get_live(path) else {
                    return Ok(None);
                };
                let abs = self.local_path().join(path);
                if meta.is_directory {
                    return Ok(None);
                }
                let outcome = transfer
                    .upload(&self.folder.sync_id, &path.to_string(), &abs, meta.size, meta.vector_clock.clone())
                    .await
                    .with_context(|| format!("uploading {path}"))?;
                Ok(Some(ActionOutcome {
                    bytes: outcome.bytes_transferred,
                    conflict: false,
                }))
            }

            Action::Download => {
                let Some(FileState::Exists(remote_meta)) = remote_state else {
                    return Ok(None);
                };
                if remote_meta.is_directory {
                    std::fs::create_dir_all(self.local_path().join(path)).with_context(|| format!("creating directory {path}"))?;
                    let vc = CausalClockManager::merge(
                        &self.state.get_live(path).map(|m| m.vector_clock).unwrap_or_default(),
                        &remote_meta.vector_clock,
                    );
                    self.clock.save(&self.key(path), vc.clone())?;
                    self.state.set_live(path, FileMetadata { vector_clock: vc, ..remote_meta })?;
                    return Ok(None);
                }

                let abs = self.local_path().join(path);
                let local_vc = self.state.get_state(path).map(|s| s.vector_clock().clone()).unwrap_or_default();
                let outcome = transfer
                    .download(&self.folder.sync_id, &path.to_string(), &abs, remote_meta.size, &local_vc, || {
                        self.detector.note_remote_write(path, now_unix())
                    })
                    .await
                    .with_context(|| format!("downloading {path}"))?;

                let merged_vc = CausalClockManager::merge(&outcome.vc, &remote_meta.vector_clock);
                self.clock.save(&self.key(path), merged_vc.clone())?;
                self.state.set_live(path, written_metadata(&abs, &remote_meta.hash, merged_vc)?)?;

                Ok(Some(ActionOutcome {
                    bytes: outcome.bytes_transferred,
                    conflict: false,
                }))
            }

            Action::DeleteLocal => {
                let Some(FileState::Deleted(record)) = remote_state else {
                    return Ok(None);
                };
                let abs = self.local_path().join(path);
                remove_path(&abs)?;
                self.clock.save(&self.key(path), record.vector_clock.clone())?;
                self.state.set_deleted(path, record)?;
                Ok(Some(ActionOutcome { bytes: 0, conflict: false }))
            }

            Action::DeleteRemote => {
                let local_vc = self.state.get_state(path).map(|s| s.vector_clock().clone()).unwrap_or_default();
                let mut paths = HashMap::new();
                paths.insert(path.to_string(), Some(local_vc));
                match self
                    .transport
                    .call(Request::DeleteFiles {
                        sync_id: self.folder.sync_id.clone(),
                        paths,
                    })
                    .await?
                {
                    Response::DeleteAck { .. } => Ok(Some(ActionOutcome { bytes: 0, conflict: false })),
                    Response::Error { error, .. } => anyhow::bail!("deleteFiles rejected: {error}"),
                    other => anyhow::bail!("unexpected response to deleteFiles: {other:?}"),
                }
            }

            Action::Conflict => {
                let (Some(FileState::Exists(local_meta)), Some(FileState::Exists(remote_meta))) =
                    (self.state.get_state(path), remote_state)
                else {
                    return Ok(None);
                };

                let now = now_unix();
                let abs = self.local_path().join(path);
                let artifact = conflict::artifact_path(&self.local_path(), path, &self.peer_id, now);
                if let Some(parent) = artifact.parent() {
                    std::fs::create_dir_all(parent).ok();
                }
                std::fs::rename(&abs, &artifact)
                    .or_else(|_| std::fs::copy(&abs, &artifact).map(|_| ()))
                    .with_context(|| format!("preserving conflicting local version of {path} at {artifact:?}"))?;

                let local_vc = local_meta.vector_clock.clone();
                let outcome = transfer
                    .download(&self.folder.sync_id, &path.to_string(), &abs, remote_meta.size, &local_vc, || {
                        self.detector.note_remote_write(path, now_unix())
                    })
                    .await
                    .with_context(|| format!("downloading conflicting remote version of {path}"))?;

                let merged_vc = CausalClockManager::merge(&outcome.vc, &remote_meta.vector_clock).merge(&local_vc);
                self.clock.save(&self.key(path), merged_vc.clone())?;
                self.state.set_live(path, written_metadata(&abs, &remote_meta.hash, merged_vc)?)?;

                conflict_log.append(&ConflictLogEntry {
                    path: path.to_string(),
                    peer_id: self.peer_id.clone(),
                    local_hash: local_meta.hash,
                    remote_hash: remote_meta.hash,
                    artifact_path: artifact.display().to_string(),
                    timestamp: now,
                })?;

                Ok(Some(ActionOutcome {
                    bytes: outcome.bytes_transferred,
                    conflict: true,
                }))
            }
        }
    }

    async fn finalize(&self, summary: SessionSummary, started: i64, status: &str) -> Result<SessionSummary> {
        let finished_at = now_unix();
        self.ack_tracker.record_session(&self.folder.sync_id, &self.peer_id, finished_at);

        let log = SessionLog::new(&self.appdata);
        log.append(&SessionLogEntry {
            sync_id: self.folder.sync_id.clone(),
            folder_id: self.folder.id.clone(),
            peer_id: self.peer_id.clone(),
            bytes_transferred: summary.bytes_transferred,
            files_synced: summary.files_synced,
            conflicts: summary.conflicts,
            duration_ms: ((finished_at - started).max(0) * 1000) as u64,
            status: status.to_string(),
            finished_at,
        })?;

        info!(
            sync_id = %self.folder.sync_id,
            peer_id = %self.peer_id,
            files_synced = summary.files_synced,
            conflicts = summary.conflicts,
            status,
            "session finalized"
        );

        Ok(summary)
    }
}

struct ActionOutcome {
    bytes: u64,
    conflict: bool,
}

fn written_metadata(abs: &Path, hash: &str, vc: VectorClock) -> Result<FileMetadata> {
    let meta = std::fs::metadata(abs).with_context(|| format!("reading metadata for {abs:?}"))?;
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    Ok(FileMetadata {
        hash: hash.to_string(),
        mtime,
        size: meta.len(),
        creation_date: None,
        is_directory: false,
        vector_clock: vc,
    })
}

fn remove_path(abs: &Path) -> Result<()> {
    match std::fs::symlink_metadata(abs) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(abs).with_context(|| format!("removing directory {abs:?}")),
        Ok(_) => std::fs::remove_file(abs).with_context(|| format!("removing file {abs:?}")),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("stat-ing {abs:?} before removal")),
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
