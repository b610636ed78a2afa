//! File State Store: per-sync logical state over every tracked path,
//! split into a live side (metadata map) and a tombstone side (deletion
//! records), persisted as sibling `<appdata>/state/<syncID>/snapshot.json`
//! and `tombstones.json` documents.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use anyhow::{Context, Result};
use fsync_api_types::{DeletionRecord, FileMetadata, FileState};
use serde::{Deserialize, Serialize};

#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(flatten)]
    live: HashMap<String, FileMetadata>,
}

#[derive(Default, Serialize, Deserialize)]
struct Tombstones {
    #[serde(flatten)]
    deleted: HashMap<String, DeletionRecord>,
}

/// Holds the live-metadata map and the tombstone map for a single sync,
/// each persisted to its own JSON document. A path is never present in
/// both maps at once; every mutator here upholds that by removing from
/// the opposite map before inserting.
pub struct FileStateStore {
    snapshot_path: PathBuf,
    tombstones_path: PathBuf,
    live: RwLock<HashMap<String, FileMetadata>>,
    deleted: RwLock<HashMap<String, DeletionRecord>>,
}

impl FileStateStore {
    pub fn open(appdata: &std::path::Path, sync_id: &str) -> Result<Self> {
        let dir = fsync_buildcfg::state_dir(appdata, sync_id);
        let snapshot_path = dir.join("snapshot.json");
        let tombstones_path = dir.join("tombstones.json");

        let live = match fsync_tools::fs::read_optional(&snapshot_path)? {
            None => HashMap::new(),
            Some(data) => {
                let doc: Snapshot = serde_json::from_slice(&data)
                    .with_context(|| format!("parsing state snapshot {snapshot_path:?}"))?;
                doc.live
            }
        };
        let deleted = match fsync_tools::fs::read_optional(&tombstones_path)? {
            None => HashMap::new(),
            Some(data) => {
                let doc: Tombstones = serde_json::from_slice(&data)
                    .with_context(|| format!("parsing tombstones {tombstones_path:?}"))?;
                doc.deleted
            }
        };

        Ok(Self {
            snapshot_path,
            tombstones_path,
            live: RwLock::new(live),
            deleted: RwLock::new(deleted),
        })
    }

    fn persist_live(&self) -> Result<()> {
        let doc = Snapshot {
            live: self.live.read().unwrap().clone(),
        };
        let data = serde_json::to_vec_pretty(&doc)?;
        fsync_tools::fs::replace_file(&self.snapshot_path, &data)
    }

    fn persist_tombstones(&self) -> Result<()> {
        let doc = Tombstones {
            deleted: self.deleted.read().unwrap().clone(),
        };
        let data = serde_json::to_vec_pretty(&doc)?;
        fsync_tools::fs::replace_file(&self.tombstones_path, &data)
    }

    /// Combined view: `Exists` if live, `Deleted` if tombstoned, `None` if
    /// never observed.
    pub fn get_state(&self, path: &str) -> Option<FileState> {
        if let Some(meta) = self.live.read().unwrap().get(path) {
            return Some(FileState::Exists(meta.clone()));
        }
        self.deleted
            .read()
            .unwrap()
            .get(path)
            .map(|rec| FileState::Deleted(rec.clone()))
    }

    pub fn get_live(&self, path: &str) -> Option<FileMetadata> {
        self.live.read().unwrap().get(path).cloned()
    }

    /// Live-side write: records/updates metadata for `path`, clearing any
    /// tombstone at that path (a create resurrecting a deleted path).
    pub fn set_live(&self, path: &str, meta: FileMetadata) -> Result<()> {
        {
            let mut live = self.live.write().unwrap();
            live.insert(path.to_string(), meta);
        }
        let had_tombstone = self.deleted.write().unwrap().remove(path).is_some();
        self.persist_live()?;
        if had_tombstone {
            self.persist_tombstones()?;
        }
        Ok(())
    }

    /// Tombstone-side write: records a deletion, clearing any live entry.
    pub fn set_deleted(&self, path: &str, record: DeletionRecord) -> Result<()> {
        {
            let mut deleted = self.deleted.write().unwrap();
            deleted.insert(path.to_string(), record);
        }
        let had_live = self.live.write().unwrap().remove(path).is_some();
        self.persist_tombstones()?;
        if had_live {
            self.persist_live()?;
        }
        Ok(())
    }

    pub fn get_deleted_paths(&self) -> Vec<String> {
        self.deleted.read().unwrap().keys().cloned().collect()
    }

    pub fn get_deletion_record(&self, path: &str) -> Option<DeletionRecord> {
        self.deleted.read().unwrap().get(path).cloned()
    }

    /// Removes any state (live or tombstoned) held for `path`, e.g. once a
    /// rename has migrated it to a new path.
    pub fn remove_state(&self, path: &str) -> Result<()> {
        let had_live = self.live.write().unwrap().remove(path).is_some();
        let had_tombstone = self.deleted.write().unwrap().remove(path).is_some();
        if had_live {
            self.persist_live()?;
        }
        if had_tombstone {
            self.persist_tombstones()?;
        }
        Ok(())
    }

    /// Every path currently tracked as live, for scan/discovery.
    pub fn live_paths(&self) -> Vec<String> {
        self.live.read().unwrap().keys().cloned().collect()
    }

    /// Drops tombstones older than the TTL for which `predicate(path,
    /// deleted_at)` also holds, e.g. a `PeerAckTracker` check against the
    /// tombstone's own deletion time. Returns the set of paths actually
    /// dropped.
    pub fn cleanup_expired(&self, now: i64, ttl_secs: i64, predicate: impl Fn(&str, i64) -> bool) -> Result<Vec<String>> {
        let mut dropped = Vec::new();
        {
            let mut deleted = self.deleted.write().unwrap();
            deleted.retain(|path, record| {
                let expired = now.saturating_sub(record.deleted_at) > ttl_secs;
                let should_drop = expired && predicate(path, record.deleted_at);
                if should_drop {
                    dropped.push(path.clone());
                }
                !should_drop
            });
        }
        if !dropped.is_empty() {
            self.persist_tombstones()?;
        }
        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsync_api_types::VectorClock;

    fn meta(hash: &str) -> FileMetadata {
        FileMetadata {
            hash: hash.to_string(),
            mtime: 0,
            size: 0,
            creation_date: None,
            is_directory: false,
            vector_clock: VectorClock::new().increment("p1"),
        }
    }

    fn tombstone() -> DeletionRecord {
        DeletionRecord {
            deleted_at: 1000,
            deleted_by: "p1".to_string(),
            vector_clock: VectorClock::new().increment("p1"),
        }
    }

    #[test]
    fn set_live_clears_tombstone_for_resurrection() {
        let appdata = tempfile::tempdir().unwrap();
        let store = FileStateStore::open(appdata.path(), "DEMO").unwrap();
        store.set_deleted("a.txt", tombstone()).unwrap();
        assert!(store.get_state("a.txt").unwrap().is_deleted());

        store.set_live("a.txt", meta("h1")).unwrap();
        assert!(!store.get_state("a.txt").unwrap().is_deleted());
        assert!(store.get_deleted_paths().is_empty());
    }

    #[test]
    fn set_deleted_clears_live_entry() {
        let appdata = tempfile::tempdir().unwrap();
        let store = FileStateStore::open(appdata.path(), "DEMO").unwrap();
        store.set_live("a.txt", meta("h1")).unwrap();
        store.set_deleted("a.txt", tombstone()).unwrap();

        assert!(store.get_live("a.txt").is_none());
        assert_eq!(store.get_deleted_paths(), vec!["a.txt".to_string()]);
    }

    #[test]
    fn state_persists_across_instances() {
        let appdata = tempfile::tempdir().unwrap();
        {
            let store = FileStateStore::open(appdata.path(), "DEMO").unwrap();
            store.set_live("a.txt", meta("h1")).unwrap();
            store.set_deleted("b.txt", tombstone()).unwrap();
        }
        let reopened = FileStateStore::open(appdata.path(), "DEMO").unwrap();
        assert!(reopened.get_live("a.txt").is_some());
        assert!(reopened.get_deletion_record("b.txt").is_some());
    }

    #[test]
    fn cleanup_expired_drops_only_when_predicate_and_ttl_hold() {
        let appdata = tempfile::tempdir().unwrap();
        let store = FileStateStore::open(appdata.path(), "DEMO").unwrap();
        store.set_deleted("old.txt", tombstone()).unwrap(); // deleted_at = 1000

        // not yet expired
        let dropped = store.cleanup_expired(1500, 1000, |_, _| true).unwrap();
        assert!(dropped.is_empty());

        // expired but predicate false
        let dropped = store.cleanup_expired(3000, 1000, |_, _| false).unwrap();
        assert!(dropped.is_empty());

        // expired and predicate true, and the tombstone's own deleted_at is passed through
        let dropped = store.cleanup_expired(3000, 1000, |_, deleted_at| deleted_at == 1000).unwrap();
        assert_eq!(dropped, vec!["old.txt".to_string()]);
        assert!(store.get_deleted_paths().is_empty());
    }

    #[test]
    fn remove_state_clears_either_side() {
        let appdata = tempfile::tempdir().unwrap();
        let store = FileStateStore::open(appdata.path(), "DEMO").unwrap();
        store.set_live("a.txt", meta("h1")).unwrap();
        store.remove_state("a.txt").unwrap();
        assert!(store.get_state("a.txt").is_none());
    }
}
