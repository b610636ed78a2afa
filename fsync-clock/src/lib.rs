//! Causal Clock Manager: a persisted, keyed store of per-`(folderID,
//! syncID, path)` vector clocks, one JSON document per folder at
//! `clocks/<folderID>.db`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use fsync_api_types::{PeerId, VectorClock};
use serde::{Deserialize, Serialize};

/// Identifies a single tracked path within a folder/sync pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClockKey {
    pub folder_id: String,
    pub sync_id: String,
    pub path: String,
}

impl ClockKey {
    pub fn new(folder_id: impl Into<String>, sync_id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            folder_id: folder_id.into(),
            sync_id: sync_id.into(),
            path: path.into(),
        }
    }
}

#[derive(Default, Serialize, Deserialize)]
struct ClockDocument {
    #[serde(flatten)]
    clocks: HashMap<String, VectorClock>,
}

/// Manages vector clocks for every path in every folder. One JSON document
/// per folder is kept on disk at `<appdata>/clocks/<folderID>.db`; a
/// per-folder document is loaded lazily, cached in memory, and mutated
/// in place before being saved back on demand.
pub struct CausalClockManager {
    base: PathBuf,
    cache: Mutex<HashMap<String, ClockDocument>>,
}

impl CausalClockManager {
    pub fn new(appdata: &std::path::Path) -> Self {
        Self {
            base: fsync_buildcfg::clocks_dir(appdata),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn doc_path(&self, folder_id: &str) -> PathBuf {
        self.base.join(format!("{folder_id}.db"))
    }

    fn load_doc(&self, folder_id: &str) -> Result<ClockDocument> {
        let path = self.doc_path(folder_id);
        match fsync_tools::fs::read_optional(&path)? {
            None => Ok(ClockDocument::default()),
            Some(data) => serde_json::from_slice(&data)
                .with_context(|| format!("parsing clock document {path:?}")),
        }
    }

    fn with_doc<R>(&self, folder_id: &str, f: impl FnOnce(&mut ClockDocument) -> Result<R>) -> Result<R> {
        let mut cache = self.cache.lock().unwrap();
        if !cache.contains_key(folder_id) {
            let doc = self.load_doc(folder_id)?;
            cache.insert(folder_id.to_string(), doc);
        }
        let doc = cache.get_mut(folder_id).unwrap();
        f(doc)
    }

    fn persist(&self, folder_id: &str) -> Result<()> {
        let cache = self.cache.lock().unwrap();
        if let Some(doc) = cache.get(folder_id) {
            let data = serde_json::to_vec_pretty(doc)?;
            fsync_tools::fs::replace_file(&self.doc_path(folder_id), &data)?;
        }
        Ok(())
    }

    pub fn get(&self, key: &ClockKey) -> Result<Option<VectorClock>> {
        self.with_doc(&key.folder_id, |doc| Ok(doc.clocks.get(&key.path).cloned()))
    }

    pub fn save(&self, key: &ClockKey, vc: VectorClock) -> Result<()> {
        self.with_doc(&key.folder_id, |doc| {
            doc.clocks.insert(key.path.clone(), vc);
            Ok(())
        })?;
        self.persist(&key.folder_id)
    }

    /// Batched write: saves many path->clock pairs for one folder/sync
    /// with a single fsync at the end, to avoid an fsync storm when the
    /// change detector reports a large batch at once.
    pub fn save_many(
        &self,
        folder_id: &str,
        _sync_id: &str,
        updates: HashMap<String, VectorClock>,
    ) -> Result<()> {
        self.with_doc(folder_id, |doc| {
            doc.clocks.extend(updates);
            Ok(())
        })?;
        self.persist(folder_id)
    }

    pub fn merge(local: &VectorClock, remote: &VectorClock) -> VectorClock {
        local.merge(remote)
    }

    /// Advances the clock for `key` by `peer_id`'s counter and persists it.
    pub fn update_for_local_change(&self, key: &ClockKey, peer_id: &PeerId) -> Result<VectorClock> {
        let current = self.get(key)?.unwrap_or_default();
        let next = current.increment(peer_id);
        self.save(key, next.clone())?;
        Ok(next)
    }

    /// Moves the vector clock entry from `old_path` to `new_path` within
    /// the same folder; the caller is responsible for the subsequent
    /// increment that accompanies a rename.
    pub fn migrate(&self, folder_id: &str, old_path: &str, new_path: &str) -> Result<()> {
        self.with_doc(folder_id, |doc| {
            if let Some(vc) = doc.clocks.remove(old_path) {
                doc.clocks.insert(new_path.to_string(), vc);
            }
            Ok(())
        })?;
        self.persist(folder_id)
    }
}
