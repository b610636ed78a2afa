//! Local-state reconciliation: diffs a fresh directory scan against the
//! persisted [`FileStateStore`], catching up on filesystem changes made
//! while nothing was watching live (across a restart, or before the first
//! session against a given peer), including rename detection by
//! content-hash match.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::Result;
use fsync_api_types::{DeletionRecord, FileMetadata, PeerId, RelPath, SyncFolder};
use fsync_clock::{CausalClockManager, ClockKey};
use fsync_detector::IgnoreMatcher;
use fsync_state::FileStateStore;

use crate::scan;

fn key(folder: &SyncFolder, path: &str) -> ClockKey {
    ClockKey::new(folder.id.as_str(), folder.sync_id.as_str(), path)
}

/// Scans `folder.local_path`, diffs it against `state`, and persists the
/// resulting creates/modifies/renames/deletes, advancing `clock` for
/// every path touched.
pub async fn reconcile_local_changes(
    folder: &SyncFolder,
    local_peer_id: &PeerId,
    clock: &CausalClockManager,
    state: &FileStateStore,
) -> Result<()> {
    let local_path = Path::new(&folder.local_path);
    let ignore = IgnoreMatcher::new(&folder.exclude_patterns);
    let fresh = scan::scan_folder(local_path, &ignore).await?;
    let now = now_unix();

    let old_live: HashMap<RelPath, FileMetadata> = state
        .live_paths()
        .into_iter()
        .filter_map(|p| state.get_live(&p).map(|m| (p, m)))
        .collect();

    let mut disappeared: Vec<(RelPath, FileMetadata)> = old_live
        .iter()
        .filter(|(p, _)| !fresh.contains_key(*p))
        .map(|(p, m)| (p.clone(), m.clone()))
        .collect();

    let mut appeared: Vec<(RelPath, FileMetadata)> = fresh
        .iter()
        .filter(|(p, _)| !old_live.contains_key(*p))
        .map(|(p, m)| (p.clone(), m.clone()))
        .collect();

    // Rename matching: pair up a disappeared path with an appeared one
    // sharing the same content hash.
    let mut renamed_disappeared = HashSet::new();
    let mut renamed_appeared = HashSet::new();
    for (old_path, old_meta) in &disappeared {
        if renamed_disappeared.contains(old_path) {
            continue;
        }
        if let Some((new_path, new_meta)) = appeared
            .iter()
            .find(|(new_path, new_meta)| !renamed_appeared.contains(new_path) && new_meta.hash == old_meta.hash)
            .cloned()
        {
            clock.migrate(&folder.id, old_path, &new_path)?;
            let vc = clock.update_for_local_change(&key(folder, &new_path), local_peer_id)?;
            state.remove_state(old_path)?;
            state.set_live(
                &new_path,
                FileMetadata {
                    hash: new_meta.hash.clone(),
                    mtime: new_meta.mtime,
                    size: new_meta.size,
                    creation_date: old_meta.creation_date,
                    is_directory: new_meta.is_directory,
                    vector_clock: vc,
                },
            )?;
            renamed_disappeared.insert(old_path.clone());
            renamed_appeared.insert(new_path);
        }
    }
    disappeared.retain(|(p, _)| !renamed_disappeared.contains(p));
    appeared.retain(|(p, _)| !renamed_appeared.contains(p));

    for (path, _) in disappeared {
        let vc = clock.update_for_local_change(&key(folder, &path), local_peer_id)?;
        state.set_deleted(
            &path,
            DeletionRecord {
                deleted_at: now,
                deleted_by: local_peer_id.clone(),
                vector_clock: vc,
            },
        )?;
    }

    for (path, meta) in appeared {
        let vc = clock.update_for_local_change(&key(folder, &path), local_peer_id)?;
        state.set_live(
            &path,
            FileMetadata {
                hash: meta.hash,
                mtime: meta.mtime,
                size: meta.size,
                creation_date: Some(now),
                is_directory: meta.is_directory,
                vector_clock: vc,
            },
        )?;
    }

    for (path, old_meta) in &old_live {
        let Some(new_meta) = fresh.get(path) else { continue };
        if new_meta.hash == old_meta.hash {
            continue;
        }
        let vc = clock.update_for_local_change(&key(folder, path), local_peer_id)?;
        state.set_live(
            path,
            FileMetadata {
                hash: new_meta.hash.clone(),
                mtime: new_meta.mtime,
                size: new_meta.size,
                creation_date: old_meta.creation_date,
                is_directory: new_meta.is_directory,
                vector_clock: vc,
            },
        )?;
    }

    Ok(())
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
