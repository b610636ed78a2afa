//! Decision Engine: a pure function reconciling local and
//! remote logical state for one path into an [`Action`]. No I/O, no side
//! effects: every input is taken by value/ref and the result is a plain
//! enum the caller then acts on.

use fsync_api_types::{ClockOrder, FileState, SyncMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Skip,
    Download,
    Upload,
    DeleteLocal,
    DeleteRemote,
    Conflict,
    /// Reserved for states the table does not (yet) resolve; callers should
    /// treat this as "do nothing, but log for investigation" rather than
    /// act on it.
    Uncertain,
}

/// Reconciles `local` and `remote` logical state for one path into an
/// [`Action`] by comparing vector clocks and existence/tombstone state.
/// `path` is accepted for diagnostics callers may want to attach; it does
/// not affect the result.
pub fn decide(local: Option<&FileState>, remote: Option<&FileState>, _path: &str) -> Action {
    let raw = match (local, remote) {
        (None, None) => Action::Skip,
        (None, Some(FileState::Exists(_))) => Action::Download,
        (None, Some(FileState::Deleted(_))) => Action::Skip,

        (Some(FileState::Exists(_)), None) => Action::Upload,

        (Some(FileState::Exists(l)), Some(FileState::Exists(r))) => {
            if l.hash == r.hash {
                Action::Skip
            } else {
                match l.vector_clock.compare(&r.vector_clock) {
                    ClockOrder::Less => Action::Download,
                    ClockOrder::Greater => Action::Upload,
                    ClockOrder::Equal => Action::Conflict,
                    ClockOrder::Concurrent => Action::Conflict,
                }
            }
        }

        (Some(FileState::Exists(l)), Some(FileState::Deleted(t))) => {
            if t.vector_clock.is_greater_than(&l.vector_clock) {
                Action::DeleteLocal
            } else {
                Action::Upload
            }
        }

        (Some(FileState::Deleted(t)), Some(FileState::Exists(r))) => {
            if t.vector_clock.is_greater_than(&r.vector_clock) {
                Action::DeleteRemote
            } else {
                Action::Download
            }
        }

        (Some(FileState::Deleted(_)), None) => Action::Skip,
        (Some(FileState::Deleted(_)), Some(FileState::Deleted(_))) => Action::Skip,
    };

    raw
}

/// Applies a folder's `SyncMode` on top of the raw decision, masking out
/// directions the mode forbids: `UploadOnly` turns a would-be
/// `download`/`deleteLocal` into `skip`; `DownloadOnly` turns a would-be
/// `upload`/`deleteRemote` into `skip`. Conflicts and uncertain results
/// pass through unmasked, since neither direction alone resolves them.
pub fn apply_mode(action: Action, mode: SyncMode) -> Action {
    match (mode, action) {
        (SyncMode::UploadOnly, Action::Download | Action::DeleteLocal) => Action::Skip,
        (SyncMode::DownloadOnly, Action::Upload | Action::DeleteRemote) => Action::Skip,
        (_, other) => other,
    }
}

/// Convenience: `decide` followed by `apply_mode`.
pub fn decide_with_mode(local: Option<&FileState>, remote: Option<&FileState>, path: &str, mode: SyncMode) -> Action {
    apply_mode(decide(local, remote, path), mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsync_api_types::{DeletionRecord, FileMetadata, VectorClock};

    fn exists(hash: &str, vc: VectorClock) -> FileState {
        FileState::Exists(FileMetadata {
            hash: hash.to_string(),
            mtime: 0,
            size: 0,
            creation_date: None,
            is_directory: false,
            vector_clock: vc,
        })
    }

    fn deleted(vc: VectorClock) -> FileState {
        FileState::Deleted(DeletionRecord {
            deleted_at: 0,
            deleted_by: "p1".to_string(),
            vector_clock: vc,
        })
    }

    #[test]
    fn both_absent_is_skip() {
        assert_eq!(decide(None, None, "a"), Action::Skip);
    }

    #[test]
    fn absent_local_remote_exists_is_download() {
        let r = exists("h1", VectorClock::new().increment("p1"));
        assert_eq!(decide(None, Some(&r), "a"), Action::Download);
    }

    #[test]
    fn absent_local_remote_deleted_is_skip() {
        let r = deleted(VectorClock::new().increment("p1"));
        assert_eq!(decide(None, Some(&r), "a"), Action::Skip);
    }

    #[test]
    fn local_exists_remote_absent_is_upload() {
        let l = exists("h1", VectorClock::new().increment("p1"));
        assert_eq!(decide(Some(&l), None, "a"), Action::Upload);
    }

    #[test]
    fn identical_hash_is_skip_even_if_clocks_differ() {
        let vc1 = VectorClock::new().increment("p1");
        let vc2 = vc1.increment("p1");
        let l = exists("same", vc2);
        let r = exists("same", vc1);
        assert_eq!(decide(Some(&l), Some(&r), "a"), Action::Skip);
    }

    #[test]
    fn local_behind_is_download() {
        let base = VectorClock::new().increment("p1");
        let ahead = base.increment("p1");
        let l = exists("h-old", base);
        let r = exists("h-new", ahead);
        assert_eq!(decide(Some(&l), Some(&r), "a"), Action::Download);
    }

    #[test]
    fn local_ahead_is_upload() {
        let base = VectorClock::new().increment("p1");
        let ahead = base.increment("p1");
        let l = exists("h-new", ahead);
        let r = exists("h-old", base);
        assert_eq!(decide(Some(&l), Some(&r), "a"), Action::Upload);
    }

    #[test]
    fn equal_clocks_differing_hash_is_conflict() {
        let vc = VectorClock::new().increment("p1");
        let l = exists("ha", vc.clone());
        let r = exists("hb", vc);
        assert_eq!(decide(Some(&l), Some(&r), "a"), Action::Conflict);
    }

    #[test]
    fn concurrent_clocks_is_conflict() {
        let base = VectorClock::new().increment("p1").increment("p2");
        let l = exists("ha", base.increment("p1"));
        let r = exists("hb", base.increment("p2"));
        assert_eq!(decide(Some(&l), Some(&r), "a"), Action::Conflict);
    }

    #[test]
    fn remote_tombstone_ahead_of_local_deletes_local() {
        let base = VectorClock::new().increment("p1");
        let l = exists("h1", base.clone());
        let t = deleted(base.increment("p2"));
        assert_eq!(decide(Some(&l), Some(&t), "a"), Action::DeleteLocal);
    }

    #[test]
    fn remote_tombstone_not_ahead_means_local_wins_upload() {
        let base = VectorClock::new().increment("p1");
        let l = exists("h1", base.increment("p1"));
        let t = deleted(base);
        assert_eq!(decide(Some(&l), Some(&t), "a"), Action::Upload);
    }

    #[test]
    fn local_tombstone_ahead_of_remote_deletes_remote() {
        let base = VectorClock::new().increment("p2");
        let t = deleted(base.increment("p1"));
        let r = exists("h1", base);
        assert_eq!(decide(Some(&t), Some(&r), "a"), Action::DeleteRemote);
    }

    #[test]
    fn local_tombstone_not_ahead_resurrects_via_download() {
        let base = VectorClock::new().increment("p2");
        let t = deleted(base.clone());
        let r = exists("h1", base.increment("p2"));
        assert_eq!(decide(Some(&t), Some(&r), "a"), Action::Download);
    }

    #[test]
    fn upload_only_masks_download_and_delete_local() {
        assert_eq!(apply_mode(Action::Download, SyncMode::UploadOnly), Action::Skip);
        assert_eq!(apply_mode(Action::DeleteLocal, SyncMode::UploadOnly), Action::Skip);
        assert_eq!(apply_mode(Action::Upload, SyncMode::UploadOnly), Action::Upload);
    }

    #[test]
    fn download_only_masks_upload_and_delete_remote() {
        assert_eq!(apply_mode(Action::Upload, SyncMode::DownloadOnly), Action::Skip);
        assert_eq!(apply_mode(Action::DeleteRemote, SyncMode::DownloadOnly), Action::Skip);
        assert_eq!(apply_mode(Action::Download, SyncMode::DownloadOnly), Action::Download);
    }

    #[test]
    fn conflict_passes_through_regardless_of_mode() {
        assert_eq!(apply_mode(Action::Conflict, SyncMode::UploadOnly), Action::Conflict);
        assert_eq!(apply_mode(Action::Conflict, SyncMode::DownloadOnly), Action::Conflict);
    }
}
