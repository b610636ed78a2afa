//! Change Detector: converts raw filesystem observations into logical
//! [`LocalChange`] events, with sync-write cooldown, ignore rules, dedup,
//! and rename detection via a pending-rename table with a timeout sweep.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use fsync_api_types::{ChangeType, DeletionRecord, FileMetadata, FileState, LocalChange, PeerId, RelPath};
use fsync_clock::{CausalClockManager, ClockKey};
use fsync_state::FileStateStore;

pub mod ignore_rules;
pub mod watcher;
pub use ignore_rules::IgnoreMatcher;
pub use watcher::FsWatcher;

/// ORed raw signal from the underlying notify/walk layer about what kind
/// of disappearance/appearance was observed for a path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawFlags {
    pub created: bool,
    pub removed: bool,
    /// Set when the underlying watcher reports this specifically as a
    /// rename-away rather than a plain removal; ambiguous disappearances
    /// should also set this so they get a chance to be rename-matched.
    pub renamed: bool,
}

impl RawFlags {
    pub fn merge(self, other: Self) -> Self {
        Self {
            created: self.created || other.created,
            removed: self.removed || other.removed,
            renamed: self.renamed || other.renamed,
        }
    }
}

/// Result of the pure before/after classification table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Ignored,
    Created,
    Deleted,
    BufferRename,
    ModifiedIfHashChanged,
}

/// Table-driven classification: `known` = path had tracked state before,
/// `present` = path exists on disk now.
pub fn classify(known: bool, present: bool, flags: RawFlags) -> Classification {
    match (known, present) {
        (false, false) => Classification::Ignored,
        (false, true) => Classification::Created,
        (true, false) => {
            if flags.removed && !flags.renamed {
                Classification::Deleted
            } else {
                Classification::BufferRename
            }
        }
        (true, true) => Classification::ModifiedIfHashChanged,
    }
}

#[derive(Clone)]
struct PendingRemoval {
    hash: String,
    disappeared_at: i64,
}

/// One absolute-path observation for batch processing.
pub struct BatchObservation {
    pub path: RelPath,
    pub abs_path: PathBuf,
    pub flags: RawFlags,
}

/// Per-`(folderID, syncID)` change detector. Owns the ignore rules,
/// sync-write cooldown table, dedup cache, and pending-rename table for
/// one folder, and drives the paired [`CausalClockManager`] /
/// [`FileStateStore`] as changes are classified.
pub struct ChangeDetector {
    folder_id: String,
    sync_id: String,
    local_peer_id: PeerId,
    ignore: IgnoreMatcher,
    clock: Arc<CausalClockManager>,
    state: Arc<FileStateStore>,
    cooldowns: Mutex<HashMap<String, i64>>,
    dedup: Mutex<HashMap<String, (String, i64)>>,
    pending_renames: Mutex<HashMap<String, PendingRemoval>>,
}

impl ChangeDetector {
    pub fn new(
        folder_id: impl Into<String>,
        sync_id: impl Into<String>,
        local_peer_id: PeerId,
        ignore_patterns: &[String],
        clock: Arc<CausalClockManager>,
        state: Arc<FileStateStore>,
    ) -> Self {
        Self {
            folder_id: folder_id.into(),
            sync_id: sync_id.into(),
            local_peer_id,
            ignore: IgnoreMatcher::new(ignore_patterns),
            clock,
            state,
            cooldowns: Mutex::new(HashMap::new()),
            dedup: Mutex::new(HashMap::new()),
            pending_renames: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignore.is_ignored(path)
    }

    /// Records that `path` was just written by the engine itself, so the
    /// subsequent filesystem event for it is suppressed.
    pub fn note_remote_write(&self, path: &str, now: i64) {
        self.cooldowns
            .lock()
            .unwrap()
            .insert(path.to_string(), now + fsync_buildcfg::SYNC_WRITE_COOLDOWN_SECS);
    }

    pub fn in_cooldown(&self, path: &str, now: i64) -> bool {
        self.cooldowns
            .lock()
            .unwrap()
            .get(path)
            .is_some_and(|&until| now < until)
    }

    fn is_duplicate(&self, path: &str, hash: &str, now: i64) -> bool {
        let mut dedup = self.dedup.lock().unwrap();
        if let Some((last_hash, last_seen)) = dedup.get(path) {
            if last_hash == hash && now - *last_seen <= fsync_buildcfg::DEDUP_WINDOW_SECS {
                return true;
            }
        }
        dedup.insert(path.to_string(), (hash.to_string(), now));
        false
    }

    fn take_matching_pending_rename(&self, hash: &str, now: i64) -> Option<String> {
        let mut pending = self.pending_renames.lock().unwrap();
        let window = fsync_buildcfg::PENDING_RENAME_WINDOW_SECS;
        let matched = pending
            .iter()
            .find(|(_, removal)| removal.hash == hash && now - removal.disappeared_at <= window)
            .map(|(path, _)| path.clone());
        if let Some(path) = &matched {
            pending.remove(path);
        }
        matched
    }

    fn clock_advance(&self, path: &str) -> Result<fsync_api_types::VectorClock> {
        let key = ClockKey::new(self.folder_id.as_str(), self.sync_id.as_str(), path);
        Ok(self.clock.update_for_local_change(&key, &self.local_peer_id)?)
    }

    /// Directory-only events never produce a `LocalChange`; they only
    /// matter when a directory reappears over a tombstoned path, which
    /// clears that tombstone.
    pub fn handle_directory_event(&self, path: &str) -> Result<()> {
        if self.state.get_deletion_record(path).is_some() {
            self.state.remove_state(path)?;
        }
        Ok(())
    }

    /// Classifies and applies a single observation, returning the
    /// `LocalChange` to emit (if any). `current` is `Some((hash, size))`
    /// when the path currently exists on disk.
    pub fn process_single(
        &self,
        path: &str,
        present: bool,
        current: Option<(&str, u64)>,
        flags: RawFlags,
        now: i64,
    ) -> Result<Option<LocalChange>> {
        if self.is_ignored(path) || self.in_cooldown(path, now) {
            return Ok(None);
        }

        let known_state = self.state.get_state(path);
        let known = known_state.is_some();

        match classify(known, present, flags) {
            Classification::Ignored => Ok(None),
            Classification::Created => {
                let (hash, size) = current.expect("present implies content is available");
                if let Some(old_path) = self.take_matching_pending_rename(hash, now) {
                    self.apply_rename(&old_path, path, hash, size, now)
                } else {
                    if self.is_duplicate(path, hash, now) {
                        return Ok(None);
                    }
                    self.apply_created(path, hash, size, now)
                }
            }
            Classification::Deleted => self.apply_deleted(path, now),
            Classification::BufferRename => {
                let hash = match known_state {
                    Some(FileState::Exists(m)) => m.hash,
                    _ => return Ok(None),
                };
                self.pending_renames.lock().unwrap().insert(
                    path.to_string(),
                    PendingRemoval {
                        hash,
                        disappeared_at: now,
                    },
                );
                Ok(None)
            }
            Classification::ModifiedIfHashChanged => {
                let (hash, size) = current.expect("present implies content is available");
                let old_hash = match known_state {
                    Some(FileState::Exists(m)) => m.hash,
                    _ => return Ok(None),
                };
                if hash == old_hash {
                    return Ok(None);
                }
                if self.is_duplicate(path, hash, now) {
                    return Ok(None);
                }
                self.apply_modified(path, hash, size, now)
            }
        }
    }

    fn apply_created(&self, path: &str, hash: &str, size: u64, now: i64) -> Result<Option<LocalChange>> {
        let vc = self.clock_advance(path)?;
        self.state.set_live(
            path,
            FileMetadata {
                hash: hash.to_string(),
                mtime: now,
                size,
                creation_date: Some(now),
                is_directory: false,
                vector_clock: vc,
            },
        )?;
        Ok(Some(LocalChange {
            folder_id: self.folder_id.clone(),
            path: path.to_string(),
            change_type: ChangeType::Created,
            size: Some(size),
            timestamp: now,
            old_path: None,
        }))
    }

    fn apply_modified(&self, path: &str, hash: &str, size: u64, now: i64) -> Result<Option<LocalChange>> {
        let creation_date = self.state.get_live(path).and_then(|m| m.creation_date);
        let vc = self.clock_advance(path)?;
        self.state.set_live(
            path,
            FileMetadata {
                hash: hash.to_string(),
                mtime: now,
                size,
                creation_date,
                is_directory: false,
                vector_clock: vc,
            },
        )?;
        Ok(Some(LocalChange {
            folder_id: self.folder_id.clone(),
            path: path.to_string(),
            change_type: ChangeType::Modified,
            size: Some(size),
            timestamp: now,
            old_path: None,
        }))
    }

    fn apply_rename(&self, old_path: &str, new_path: &str, hash: &str, size: u64, now: i64) -> Result<Option<LocalChange>> {
        // migrate the VC entry before incrementing.
        self.clock.migrate(&self.folder_id, old_path, new_path)?;
        let vc = self.clock_advance(new_path)?;
        self.state.remove_state(old_path)?;
        self.state.set_live(
            new_path,
            FileMetadata {
                hash: hash.to_string(),
                mtime: now,
                size,
                creation_date: Some(now),
                is_directory: false,
                vector_clock: vc,
            },
        )?;
        Ok(Some(LocalChange {
            folder_id: self.folder_id.clone(),
            path: new_path.to_string(),
            change_type: ChangeType::Renamed,
            size: Some(size),
            timestamp: now,
            old_path: Some(old_path.to_string()),
        }))
    }

    fn apply_deleted(&self, path: &str, now: i64) -> Result<Option<LocalChange>> {
        let vc = self.clock_advance(path)?;
        self.state.set_deleted(
            path,
            DeletionRecord {
                deleted_at: now,
                deleted_by: self.local_peer_id.clone(),
                vector_clock: vc,
            },
        )?;
        Ok(Some(LocalChange {
            folder_id: self.folder_id.clone(),
            path: path.to_string(),
            change_type: ChangeType::Deleted,
            size: None,
            timestamp: now,
            old_path: None,
        }))
    }

    /// Scheduled sweep: any pending-rename entry older than the detection
    /// window with no matching create is promoted to a deletion.
    pub fn sweep_expired_renames(&self, now: i64) -> Result<Vec<LocalChange>> {
        let window = fsync_buildcfg::PENDING_RENAME_WINDOW_SECS;
        let expired: Vec<String> = {
            let mut pending = self.pending_renames.lock().unwrap();
            let expired: Vec<String> = pending
                .iter()
                .filter(|(_, removal)| now - removal.disappeared_at > window)
                .map(|(path, _)| path.clone())
                .collect();
            for path in &expired {
                pending.remove(path);
            }
            expired
        };

        let mut changes = Vec::new();
        for path in expired {
            if let Some(change) = self.apply_deleted(&path, now)? {
                changes.push(change);
            }
        }
        Ok(changes)
    }

    /// Batch mode: hashes are computed with bounded
    /// concurrency, then classification runs serially so state
    /// transitions (pending-rename matching in particular) stay
    /// consistent. Same-batch rename pairs are only matched correctly
    /// when the disappearance is classified before its paired create;
    /// callers that can order observations within a batch should put
    /// disappearances first.
    pub async fn process_batch(&self, observations: Vec<BatchObservation>, now: i64) -> Result<Vec<LocalChange>> {
        let bounded = fsync_tools::concurrency::Bounded::new(fsync_buildcfg::MAX_CONCURRENT_DETECTOR_HASHES);
        let hashed = bounded
            .run_all(observations, |obs| async move {
                let abs_path = obs.abs_path.clone();
                let current = tokio::task::spawn_blocking(move || hash_if_present(&abs_path))
                    .await
                    .unwrap_or(Ok(None))
                    .unwrap_or(None);
                (obs.path, obs.flags, current)
            })
            .await;

        let mut changes = Vec::new();
        for (path, flags, current) in hashed {
            let present = current.is_some();
            let current_ref = current.as_ref().map(|(h, s)| (h.as_str(), *s));
            if let Some(change) = self.process_single(&path, present, current_ref, flags, now)? {
                changes.push(change);
            }
        }
        Ok(changes)
    }
}

fn hash_if_present(path: &Path) -> std::io::Result<Option<(String, u64)>> {
    match std::fs::read(path) {
        Ok(data) => {
            let hash = fsync_tools::hash::sha256_hex(&data);
            Ok(Some((hash, data.len() as u64)))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
