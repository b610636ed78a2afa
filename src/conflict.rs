//! Conflict artifact naming and the append-only conflicts log. Conflict
//! *resolution* is out of scope; this module only names and records the
//! preserved artifact.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Builds `<basename>.conflict.<peerID-prefix8>.<unix-seconds>` next to
/// `path`. `peer_id` is truncated to its first 8 characters, or padded
/// with itself if shorter.
pub fn artifact_name(path: &str, peer_id: &str, unix_seconds: i64) -> String {
    let prefix: String = peer_id.chars().take(8).collect();
    format!("{path}.conflict.{prefix}.{unix_seconds}")
}

/// Resolves the conflict artifact path on disk for `local_path`.
pub fn artifact_path(local_root: &Path, rel_path: &str, peer_id: &str, unix_seconds: i64) -> PathBuf {
    local_root.join(artifact_name(rel_path, peer_id, unix_seconds))
}

/// One entry in `<appdata>/logs/conflicts.log`, appended as a JSON line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictLogEntry {
    pub path: String,
    pub peer_id: String,
    pub local_hash: String,
    pub remote_hash: String,
    pub artifact_path: String,
    pub timestamp: i64,
}

/// Append-only JSON-lines writer for conflict records, mirroring
/// [`crate::session_log::SessionLog`]'s discipline.
pub struct ConflictLog {
    path: PathBuf,
}

impl ConflictLog {
    pub fn new(appdata: &Path) -> Self {
        Self {
            path: fsync_buildcfg::logs_dir(appdata).join("conflicts.log"),
        }
    }

    pub fn append(&self, entry: &ConflictLogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("creating {parent:?}"))?;
        }
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {:?}", self.path))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("appending to {:?}", self.path))
    }
}
