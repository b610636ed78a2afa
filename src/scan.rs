//! Full local-state scan: walks a folder's tree into the
//! `{path -> FileMetadata}` shape the Decision Engine and Merkle index
//! consume, yielding to the scheduler every ~50 files so hash computation
//! doesn't starve other tasks. Directories carry the `DIRECTORY` sentinel
//! hash.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use fsync_api_types::{FileMetadata, RelPath, VectorClock, DIRECTORY_HASH};
use fsync_detector::IgnoreMatcher;

struct Entry {
    rel_path: RelPath,
    abs_path: PathBuf,
    is_dir: bool,
}

/// Walks `local_path`, skipping anything `ignore` matches, and returns
/// every surviving path's current on-disk metadata. Vector clocks in the
/// returned map are empty placeholders; callers merge in the persisted
/// clock (or advance it) themselves — a scan has no opinion on causality.
pub async fn scan_folder(local_path: &Path, ignore: &IgnoreMatcher) -> Result<HashMap<RelPath, FileMetadata>> {
    let root = local_path.to_path_buf();
    let entries = tokio::task::spawn_blocking(move || walk(&root))
        .await
        .context("scan task panicked")??
        .into_iter()
        .filter(|e| !ignore.is_ignored(&e.rel_path))
        .collect::<Vec<_>>();

    let mut out = HashMap::with_capacity(entries.len());
    let bounded = fsync_tools::concurrency::Bounded::new(fsync_buildcfg::MAX_CONCURRENT_SCAN_HASHES);

    let mut processed = 0usize;
    let mut chunk = Vec::new();
    for entry in entries {
        chunk.push(entry);
        if chunk.len() >= fsync_buildcfg::SCAN_YIELD_INTERVAL {
            let batch = std::mem::take(&mut chunk);
            processed += batch.len();
            let results = bounded.run_all(batch, |e| async move { hash_entry(e) }).await;
            for (rel_path, meta) in results.into_iter().flatten() {
                out.insert(rel_path, meta);
            }
            tokio::task::yield_now().await;
        }
    }
    if !chunk.is_empty() {
        processed += chunk.len();
        let results = bounded.run_all(chunk, |e| async move { hash_entry(e) }).await;
        for (rel_path, meta) in results.into_iter().flatten() {
            out.insert(rel_path, meta);
        }
    }
    tracing::debug!(scanned = processed, local_path = %local_path.display(), "full scan complete");

    Ok(out)
}

fn walk(root: &Path) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    for dirent in walkdir::WalkDir::new(root).min_depth(1).into_iter() {
        let dirent = dirent.with_context(|| format!("walking {root:?}"))?;
        let abs_path = dirent.path().to_path_buf();
        let rel = abs_path.strip_prefix(root).unwrap_or(&abs_path);
        let Some(rel_str) = rel.to_str() else { continue };
        let Some(rel_path) = fsync_tools::path::normalize_rel_path(rel_str) else {
            continue;
        };
        entries.push(Entry {
            rel_path,
            abs_path,
            is_dir: dirent.file_type().is_dir(),
        });
    }
    Ok(entries)
}

fn hash_entry(entry: Entry) -> Option<(RelPath, FileMetadata)> {
    if entry.is_dir {
        return Some((
            entry.rel_path,
            FileMetadata {
                hash: DIRECTORY_HASH.to_string(),
                mtime: mtime_of(&entry.abs_path).unwrap_or(0),
                size: 0,
                creation_date: None,
                is_directory: true,
                vector_clock: VectorClock::new(),
            },
        ));
    }

    let data = std::fs::read(&entry.abs_path).ok()?;
    let hash = fsync_tools::hash::sha256_hex(&data);
    Some((
        entry.rel_path,
        FileMetadata {
            hash,
            mtime: mtime_of(&entry.abs_path).unwrap_or(0),
            size: data.len() as u64,
            creation_date: None,
            is_directory: false,
            vector_clock: VectorClock::new(),
        },
    ))
}

fn mtime_of(path: &Path) -> Option<i64> {
    let meta = std::fs::metadata(path).ok()?;
    let modified = meta.modified().ok()?;
    Some(modified.duration_since(UNIX_EPOCH).ok()?.as_secs() as i64)
}
