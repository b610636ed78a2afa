//! Shared plain data types for the folder sync engine.
//!
//! These types carry no I/O of their own; they are the values that flow
//! between the other `fsync-*` crates and across the wire protocol.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

mod error;
pub use error::{ConfigError, DataError, ProtocolError, ResourceError, SafetyError, SyncError, TransientError};

/// Sentinel hash value used for directories, so that a directory's
/// presence/rename can be tracked the same way as a file's.
pub const DIRECTORY_HASH: &str = "DIRECTORY";

/// A peer identifier, opaque to this crate.
pub type PeerId = String;

/// Relative, NFC-normalized, forward-slash path. Stored keys never carry
/// a leading `/`, a trailing `/`, or a bare `.` component.
pub type RelPath = String;

/// Per-path mapping of peer -> monotonic counter.
///
/// Comparison is pointwise: `A < B` iff every component `A[p] <= B[p]` and at
/// least one component is strictly less. Two vector clocks that are neither
/// `<=` nor `>=` of each other are `Concurrent`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorClock(BTreeMap<PeerId, u64>);

/// Three-valued (well, four-valued including equality) comparison result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockOrder {
    Less,
    Greater,
    Equal,
    Concurrent,
}

impl VectorClock {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, peer: &str) -> u64 {
        self.0.get(peer).copied().unwrap_or(0)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a clock with `peer`'s counter advanced by one.
    pub fn increment(&self, peer: &str) -> Self {
        let mut next = self.0.clone();
        let counter = next.entry(peer.to_string()).or_insert(0);
        *counter += 1;
        Self(next)
    }

    /// Pointwise maximum of two clocks.
    pub fn merge(&self, other: &Self) -> Self {
        let mut out = self.0.clone();
        for (peer, count) in other.0.iter() {
            let entry = out.entry(peer.clone()).or_insert(0);
            if *count > *entry {
                *entry = *count;
            }
        }
        Self(out)
    }

    /// Three-(four-)valued causal comparison.
    pub fn compare(&self, other: &Self) -> ClockOrder {
        if self.0 == other.0 {
            return ClockOrder::Equal;
        }

        let mut self_less = false;
        let mut self_greater = false;

        let mut peers: Vec<&str> = self.0.keys().map(|k| k.as_str()).collect();
        for peer in other.0.keys() {
            if !self.0.contains_key(peer) {
                peers.push(peer.as_str());
            }
        }

        for peer in peers {
            let a = self.get(peer);
            let b = other.get(peer);
            match a.cmp(&b) {
                Ordering::Less => self_less = true,
                Ordering::Greater => self_greater = true,
                Ordering::Equal => {}
            }
        }

        match (self_less, self_greater) {
            (true, false) => ClockOrder::Less,
            (false, true) => ClockOrder::Greater,
            (false, false) => ClockOrder::Equal, // unreachable given the early-exit above
            (true, true) => ClockOrder::Concurrent,
        }
    }

    pub fn is_less_than(&self, other: &Self) -> bool {
        self.compare(other) == ClockOrder::Less
    }

    pub fn is_greater_than(&self, other: &Self) -> bool {
        self.compare(other) == ClockOrder::Greater
    }
}

impl From<BTreeMap<PeerId, u64>> for VectorClock {
    fn from(map: BTreeMap<PeerId, u64>) -> Self {
        Self(map)
    }
}

/// Live file or directory metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Lowercase-hex SHA-256 of content, or [`DIRECTORY_HASH`] for directories.
    pub hash: String,
    /// Modification time, unix seconds.
    pub mtime: i64,
    pub size: u64,
    pub creation_date: Option<i64>,
    pub is_directory: bool,
    pub vector_clock: VectorClock,
}

impl FileMetadata {
    pub fn new_directory(vector_clock: VectorClock) -> Self {
        Self {
            hash: DIRECTORY_HASH.to_string(),
            mtime: 0,
            size: 0,
            creation_date: None,
            is_directory: true,
            vector_clock,
        }
    }

    pub fn is_directory_hash(hash: &str) -> bool {
        hash == DIRECTORY_HASH
    }
}

/// A persistent deletion record ("tombstone").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionRecord {
    pub deleted_at: i64,
    pub deleted_by: PeerId,
    pub vector_clock: VectorClock,
}

/// Per-path logical state: a path is either live or tombstoned, never both,
/// never absent once observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum FileState {
    Exists(FileMetadata),
    Deleted(DeletionRecord),
}

impl FileState {
    pub fn vector_clock(&self) -> &VectorClock {
        match self {
            FileState::Exists(m) => &m.vector_clock,
            FileState::Deleted(d) => &d.vector_clock,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, FileState::Deleted(_))
    }
}

/// Synchronization direction for a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncMode {
    TwoWay,
    UploadOnly,
    DownloadOnly,
}

/// A configured folder participating in sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFolder {
    pub id: String,
    pub sync_id: String,
    pub local_path: String,
    pub mode: SyncMode,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    pub file_count: Option<u64>,
    pub folder_count: Option<u64>,
    pub total_size: Option<u64>,
}

impl SyncFolder {
    /// `syncID` must be >= 4 chars, alphanumeric only.
    pub fn validate_sync_id(sync_id: &str) -> Result<(), ConfigError> {
        if sync_id.chars().count() < 4 {
            return Err(ConfigError::InvalidSyncId(format!(
                "sync id '{sync_id}' is shorter than 4 characters"
            )));
        }
        if !sync_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::InvalidSyncId(format!(
                "sync id '{sync_id}' must be alphanumeric"
            )));
        }
        Ok(())
    }
}

/// A logical change emitted by the Change Detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalChange {
    pub folder_id: String,
    pub path: RelPath,
    pub change_type: ChangeType,
    pub size: Option<u64>,
    pub timestamp: i64,
    /// Populated only for `ChangeType::Renamed`.
    pub old_path: Option<RelPath>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeType {
    Created,
    Modified,
    Renamed,
    Deleted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_merge_is_pointwise_max() {
        let mut a = VectorClock::new();
        a = a.increment("p1");
        a = a.increment("p1");
        let mut b = VectorClock::new();
        b = b.increment("p1");
        b = b.increment("p2");

        let merged = a.merge(&b);
        assert_eq!(merged.get("p1"), 2);
        assert_eq!(merged.get("p2"), 1);
    }

    #[test]
    fn clock_order_detects_concurrent() {
        let base = VectorClock::new().increment("p1").increment("p2");
        let a = base.increment("p1");
        let b = base.increment("p2");
        assert_eq!(a.compare(&b), ClockOrder::Concurrent);
        assert_eq!(b.compare(&a), ClockOrder::Concurrent);
    }

    #[test]
    fn clock_order_strict_less() {
        let a = VectorClock::new().increment("p1");
        let b = a.increment("p1");
        assert_eq!(a.compare(&b), ClockOrder::Less);
        assert_eq!(b.compare(&a), ClockOrder::Greater);
    }

    #[test]
    fn clock_equal_requires_identical_maps() {
        let a = VectorClock::new().increment("p1");
        let b = VectorClock::new().increment("p1");
        assert_eq!(a.compare(&b), ClockOrder::Equal);
    }

    #[test]
    fn sync_id_validation() {
        assert!(SyncFolder::validate_sync_id("DEMO").is_ok());
        assert!(SyncFolder::validate_sync_id("abc").is_err());
        assert!(SyncFolder::validate_sync_id("bad-id").is_err());
    }
}
