//! Live filesystem watcher: wires a `notify` watcher to the classification
//! pipeline, coalescing a short debounce window of raw OS events into
//! batches the caller feeds to [`crate::ChangeDetector::process_batch`].
//!
//! Mirrors the cold-scan/live-watch split a poll-based reconciler needs
//! alongside it: this module only ever reports what changed *since the
//! watcher started*; catching up on changes made while nothing was
//! watching (e.g. across a restart) is a separate, rescan-based concern.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::{BatchObservation, RawFlags};

/// Default quiet period after the last observed event before a coalesced
/// batch is flushed. Chosen well below [`fsync_buildcfg::SYNC_WRITE_COOLDOWN_SECS`]
/// so a burst of writes from one save operation lands in a single batch.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Owns a live `notify` watcher rooted at one folder. Dropping it stops
/// the watch and ends the background coalescing task.
pub struct FsWatcher {
    _watcher: RecommendedWatcher,
}

impl FsWatcher {
    /// Watches `root` recursively, forwarding coalesced batches of
    /// [`BatchObservation`] on `tx` after `debounce` of quiet. Each batch
    /// carries at most one entry per path, with flags ORed across every
    /// raw event seen for that path during the window.
    pub fn watch(
        root: PathBuf,
        debounce: Duration,
        tx: mpsc::UnboundedSender<Vec<BatchObservation>>,
    ) -> notify::Result<Self> {
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<Event>();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if let Ok(event) = res {
                    let _ = raw_tx.send(event);
                }
            },
            notify::Config::default(),
        )?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        tokio::spawn(async move {
            let mut pending: HashMap<PathBuf, RawFlags> = HashMap::new();
            while let Some(first) = raw_rx.recv().await {
                merge_event(&mut pending, &root, first);

                while let Ok(Some(event)) = tokio::time::timeout(debounce, raw_rx.recv()).await {
                    merge_event(&mut pending, &root, event);
                }

                let batch: Vec<BatchObservation> = pending
                    .drain()
                    .filter_map(|(abs_path, flags)| {
                        let rel = abs_path.strip_prefix(&root).ok()?;
                        let rel_str = rel.to_str()?;
                        let rel_path = fsync_tools::path::normalize_rel_path(rel_str)?;
                        Some(BatchObservation { path: rel_path, abs_path, flags })
                    })
                    .collect();

                if !batch.is_empty() && tx.send(batch).is_err() {
                    break;
                }
            }
        });

        Ok(Self { _watcher: watcher })
    }
}

fn merge_event(pending: &mut HashMap<PathBuf, RawFlags>, root: &std::path::Path, event: Event) {
    let flags = match &event.kind {
        EventKind::Create(_) => RawFlags {
            created: true,
            ..Default::default()
        },
        EventKind::Remove(_) => RawFlags {
            removed: true,
            ..Default::default()
        },
        EventKind::Modify(notify::event::ModifyKind::Name(_)) => RawFlags {
            removed: true,
            renamed: true,
            ..Default::default()
        },
        EventKind::Modify(_) => RawFlags::default(),
        _ => return,
    };
    for path in event.paths {
        if path.strip_prefix(root).is_err() {
            continue;
        }
        pending
            .entry(path)
            .and_modify(|existing| *existing = existing.merge(flags))
            .or_insert(flags);
    }
}
