//! `FoldersyncEngine`: the library-shaped construction surface wiring
//! together configuration, clocks, state, acknowledgement tracking, and
//! the Session Orchestrator behind a small public API a hosting process
//! (daemon, CLI, or test harness) drives directly. One struct owns every
//! long-lived subsystem handle; methods dispatch into it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{Context, Result};
use fsync_api_types::{PeerId, SyncFolder};
use fsync_clock::CausalClockManager;
use fsync_config::FolderConfigStore;
use fsync_datastore::BlockStore;
use fsync_detector::ChangeDetector;
use fsync_protocol::RpcTransport;
use fsync_server::{FolderContext, RequestHandler};
use fsync_state::FileStateStore;
use tracing::info;

use crate::ack_tracker::PeerAckTracker;
use crate::cancellation::SessionCancellation;
use crate::orchestrator::{SessionOrchestrator, SessionSummary, SharedTransport};
use crate::reconcile::reconcile_local_changes;
use crate::watch::LiveWatch;

pub struct FoldersyncEngine {
    appdata: PathBuf,
    local_peer_id: PeerId,
    config: FolderConfigStore,
    clock: Arc<CausalClockManager>,
    ack_tracker: Arc<PeerAckTracker>,
    states: RwLock<HashMap<String, Arc<FileStateStore>>>,
    detectors: RwLock<HashMap<String, Arc<ChangeDetector>>>,
    cooldowns: Mutex<HashMap<(String, String), i64>>,
}

impl FoldersyncEngine {
    pub fn new(appdata: impl Into<PathBuf>, local_peer_id: impl Into<PeerId>) -> Self {
        let appdata = appdata.into();
        Self {
            config: FolderConfigStore::new(&appdata),
            clock: Arc::new(CausalClockManager::new(&appdata)),
            ack_tracker: Arc::new(PeerAckTracker::new()),
            states: RwLock::new(HashMap::new()),
            detectors: RwLock::new(HashMap::new()),
            cooldowns: Mutex::new(HashMap::new()),
            appdata,
            local_peer_id: local_peer_id.into(),
        }
    }

    pub fn add_folder(&self, folder: &SyncFolder) -> Result<()> {
        self.config.save(folder)
    }

    pub fn remove_folder(&self, folder_id: &str) -> Result<()> {
        if let Some(folder) = self.config.load(folder_id)? {
            self.states.write().unwrap().remove(&folder.sync_id);
            self.detectors.write().unwrap().remove(&folder.sync_id);
        }
        self.config.remove(folder_id)
    }

    pub fn list_folders(&self) -> Result<HashMap<String, SyncFolder>> {
        self.config.load_all()
    }

    fn state_for(&self, sync_id: &str) -> Result<Arc<FileStateStore>> {
        if let Some(state) = self.states.read().unwrap().get(sync_id) {
            return Ok(state.clone());
        }
        let state = Arc::new(FileStateStore::open(&self.appdata, sync_id)?);
        self.states.write().unwrap().insert(sync_id.to_string(), state.clone());
        Ok(state)
    }

    /// The one [`ChangeDetector`] for `folder`, shared between its live
    /// watch (if any) and every session run against it, so a session's
    /// downloaded write and the live watcher's resulting filesystem event
    /// go through the same sync-write cooldown table instead of two
    /// independent ones that can never see each other.
    fn detector_for(&self, folder: &SyncFolder) -> Result<Arc<ChangeDetector>> {
        if let Some(detector) = self.detectors.read().unwrap().get(&folder.sync_id) {
            return Ok(detector.clone());
        }
        let state = self.state_for(&folder.sync_id)?;
        let detector = Arc::new(ChangeDetector::new(
            folder.id.clone(),
            folder.sync_id.clone(),
            self.local_peer_id.clone(),
            &folder.exclude_patterns,
            self.clock.clone(),
            state,
        ));
        self.detectors.write().unwrap().insert(folder.sync_id.clone(), detector.clone());
        Ok(detector)
    }

    /// Whether a session against `(sync_id, peer_id)` is still within the
    /// per-peer cooldown window and should be skipped.
    fn in_cooldown(&self, sync_id: &str, peer_id: &str, now: i64) -> bool {
        self.cooldowns
            .lock()
            .unwrap()
            .get(&(sync_id.to_string(), peer_id.to_string()))
            .is_some_and(|&until| now < until)
    }

    fn mark_session_started(&self, sync_id: &str, peer_id: &str, now: i64) {
        self.cooldowns.lock().unwrap().insert(
            (sync_id.to_string(), peer_id.to_string()),
            now + fsync_buildcfg::SESSION_COOLDOWN_SECS,
        );
    }

    /// Runs one sync session for `folder_id` against `peer_id` over
    /// `transport`, honoring the per-peer session cooldown. Returns
    /// `None` if the session was skipped because it is still cooling
    /// down.
    pub async fn sync_with_peer<T: RpcTransport + Clone>(
        &self,
        folder_id: &str,
        peer_id: &str,
        transport: T,
        cancellation: SessionCancellation,
    ) -> Result<Option<SessionSummary>> {
        let folder = self
            .config
            .load(folder_id)?
            .with_context(|| format!("folder '{folder_id}' is not configured"))?;

        let now = now_unix();
        if self.in_cooldown(&folder.sync_id, peer_id, now) {
            info!(folder_id, peer_id, "session skipped, still within cooldown window");
            return Ok(None);
        }
        self.mark_session_started(&folder.sync_id, peer_id, now);

        let state = self.state_for(&folder.sync_id)?;
        let detector = self.detector_for(&folder)?;
        let orchestrator = SessionOrchestrator {
            folder,
            peer_id: peer_id.to_string(),
            local_peer_id: self.local_peer_id.clone(),
            appdata: self.appdata.clone(),
            clock: self.clock.clone(),
            state,
            detector,
            ack_tracker: self.ack_tracker.clone(),
            cancellation,
            transport,
        };

        orchestrator.run().await.map(Some)
    }

    /// Reconciles `folder_id`'s persisted state against its current
    /// on-disk contents directly, without driving a full session against
    /// any peer. Exposed so a hosting process (or a test) can catch a
    /// folder up after a restart, or seed deterministic local state
    /// before the first session against a given peer.
    pub async fn reconcile_local(&self, folder_id: &str) -> Result<()> {
        let folder = self
            .config
            .load(folder_id)?
            .with_context(|| format!("folder '{folder_id}' is not configured"))?;
        let state = self.state_for(&folder.sync_id)?;
        reconcile_local_changes(&folder, &self.local_peer_id, &self.clock, &state).await
    }

    /// Starts a live filesystem watch for `folder_id`, classifying local
    /// edits into state/clock as they happen instead of only at the next
    /// session's reconciliation pass. The returned [`LiveWatch`] must be
    /// kept alive for as long as the watch should run; dropping or
    /// stopping it tears down the underlying OS watcher.
    pub fn watch_folder(&self, folder_id: &str) -> Result<LiveWatch> {
        let folder = self
            .config
            .load(folder_id)?
            .with_context(|| format!("folder '{folder_id}' is not configured"))?;
        let detector = self.detector_for(&folder)?;
        LiveWatch::start(&folder, detector)
    }

    /// Builds a [`RequestHandler`] pre-registered with every configured
    /// folder, for use as the server side of an inbound connection or as
    /// an in-process transport in tests.
    pub fn build_request_handler(&self) -> Result<RequestHandler> {
        let handler = RequestHandler::new();
        for folder in self.config.load_all()?.into_values() {
            let state = self.state_for(&folder.sync_id)?;
            let blocks = BlockStore::open(fsync_buildcfg::blocks_dir(&self.appdata))
                .with_context(|| format!("opening block store for folder '{}'", folder.id))?;
            handler.register(FolderContext {
                folder_id: folder.id.clone(),
                sync_id: folder.sync_id.clone(),
                local_path: PathBuf::from(&folder.local_path),
                local_peer_id: self.local_peer_id.clone(),
                state,
                clock: self.clock.clone(),
                blocks: Arc::new(blocks),
            });
        }
        Ok(handler)
    }

    /// Shares one transport connection across both the raw RPC calls a
    /// session issues directly and the transfer client it hands to
    /// per-file transfers.
    pub fn share_transport<T: RpcTransport>(transport: T) -> SharedTransport<T> {
        SharedTransport::new(Arc::new(transport))
    }

    /// Drops tombstones whose TTL has elapsed and which every currently
    /// online peer for that sync has acknowledged past their deletion,
    /// falling back to a TTL-only sweep at
    /// [`fsync_buildcfg::TOMBSTONE_FALLBACK_TTL_SECS`] to guarantee
    /// eventual collection even without full acknowledgement.
    pub fn collect_tombstones(&self, sync_id: &str) -> Result<Vec<String>> {
        let state = self.state_for(sync_id)?;
        let now = now_unix();
        let ack_tracker = self.ack_tracker.clone();
        let sync_id_owned = sync_id.to_string();
        let mut dropped = state.cleanup_expired(now, fsync_buildcfg::TOMBSTONE_TTL_SECS, |_path, deleted_at| {
            ack_tracker.acknowledged_by_all_online(&sync_id_owned, deleted_at)
        })?;

        // Fallback sweep: collect anything still lingering past 2x the TTL
        // regardless of acknowledgement, so a permanently-offline peer can
        // never pin a tombstone forever.
        dropped.extend(state.cleanup_expired(now, fsync_buildcfg::TOMBSTONE_FALLBACK_TTL_SECS, |_path, _deleted_at| true)?);
        Ok(dropped)
    }
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsync_api_types::SyncMode;

    fn folder(id: &str, sync_id: &str, local_path: &std::path::Path) -> SyncFolder {
        SyncFolder {
            id: id.to_string(),
            sync_id: sync_id.to_string(),
            local_path: local_path.display().to_string(),
            mode: SyncMode::TwoWay,
            exclude_patterns: vec![],
            file_count: None,
            folder_count: None,
            total_size: None,
        }
    }

    #[test]
    fn add_then_list_folders_roundtrips() {
        let appdata = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let engine = FoldersyncEngine::new(appdata.path(), "peerA".to_string());
        engine.add_folder(&folder("f1", "DEMO", local.path())).unwrap();

        let folders = engine.list_folders().unwrap();
        assert_eq!(folders.len(), 1);
        assert!(folders.contains_key("f1"));
    }

    #[tokio::test]
    async fn sync_with_peer_rejects_unconfigured_folder() {
        let appdata = tempfile::tempdir().unwrap();
        let engine = FoldersyncEngine::new(appdata.path(), "peerA".to_string());
        let transport = FoldersyncEngine::share_transport(RequestHandler::new());
        let result = engine
            .sync_with_peer("missing", "peerB", transport, SessionCancellation::new())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn watch_folder_detects_live_create() {
        let appdata = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let engine = FoldersyncEngine::new(appdata.path(), "peerA".to_string());
        let f = folder("f1", "DEMO", local.path());
        engine.add_folder(&f).unwrap();

        let watch = engine.watch_folder("f1").unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        std::fs::write(local.path().join("a.txt"), b"hello").unwrap();

        let state = engine.state_for("DEMO").unwrap();
        let mut seen = false;
        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            if state.get_live("a.txt").is_some() {
                seen = true;
                break;
            }
        }
        assert!(seen, "live watch should classify and persist the created file");
        watch.stop().await;
    }

    #[test]
    fn remove_folder_clears_cached_state() {
        let appdata = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let engine = FoldersyncEngine::new(appdata.path(), "peerA".to_string());
        let f = folder("f1", "DEMO", local.path());
        engine.add_folder(&f).unwrap();
        engine.state_for("DEMO").unwrap();
        assert!(engine.states.read().unwrap().contains_key("DEMO"));

        engine.remove_folder("f1").unwrap();
        assert!(!engine.states.read().unwrap().contains_key("DEMO"));
        assert!(engine.list_folders().unwrap().is_empty());
        assert!(!engine.detectors.read().unwrap().contains_key("DEMO"));
    }

    /// A session's downloaded write must land on the same
    /// [`fsync_detector::ChangeDetector`] a live watch for the same folder
    /// would consult, so the write doesn't get reclassified as a local
    /// change and re-uploaded in a loop.
    #[tokio::test]
    async fn sync_with_peer_sets_write_cooldown_on_shared_detector() {
        let remote_appdata = tempfile::tempdir().unwrap();
        let remote_local = tempfile::tempdir().unwrap();
        std::fs::write(remote_local.path().join("hello.txt"), b"hello").unwrap();
        let remote = FoldersyncEngine::new(remote_appdata.path(), "peerA".to_string());
        remote.add_folder(&folder("f1", "DEMO", remote_local.path())).unwrap();
        remote.reconcile_local("f1").await.unwrap();

        let local_appdata = tempfile::tempdir().unwrap();
        let local_dir = tempfile::tempdir().unwrap();
        let engine = FoldersyncEngine::new(local_appdata.path(), "peerB".to_string());
        engine.add_folder(&folder("f1", "DEMO", local_dir.path())).unwrap();

        let transport = FoldersyncEngine::share_transport(remote.build_request_handler().unwrap());
        let summary = engine
            .sync_with_peer("f1", "peerA", transport, SessionCancellation::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.files_synced, 1);

        let loaded = engine.config.load("f1").unwrap().unwrap();
        let detector = engine.detector_for(&loaded).unwrap();
        assert!(detector.in_cooldown("hello.txt", now_unix()));
    }

    /// A tombstone's ack-gated GC sweep must compare peer acknowledgements
    /// against the tombstone's own `deleted_at`, not against the sweep's
    /// current time (which no past acknowledgement can ever exceed).
    #[test]
    fn collect_tombstones_drops_once_acked_past_its_own_deleted_at() {
        use fsync_api_types::{DeletionRecord, VectorClock};

        let appdata = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let engine = FoldersyncEngine::new(appdata.path(), "peerB".to_string());
        engine.add_folder(&folder("f1", "DEMO", local.path())).unwrap();

        let now = now_unix();
        let deleted_at = now - fsync_buildcfg::TOMBSTONE_TTL_SECS - 10;
        let state = engine.state_for("DEMO").unwrap();
        state
            .set_deleted(
                "gone.txt",
                DeletionRecord {
                    deleted_at,
                    deleted_by: "peerA".to_string(),
                    vector_clock: VectorClock::new().increment("peerA"),
                },
            )
            .unwrap();

        // peerA acked a session well after the deletion, but long before
        // this sweep's `now` — a sweep comparing against `now` instead of
        // `deleted_at` would never see this as acknowledged.
        engine.ack_tracker.record_session("DEMO", "peerA", deleted_at + 5);

        let dropped = engine.collect_tombstones("DEMO").unwrap();
        assert_eq!(dropped, vec!["gone.txt".to_string()]);
        assert!(state.get_deletion_record("gone.txt").is_none());
    }
}
