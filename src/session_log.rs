//! Append-only session log at `<appdata>/logs/sync.log`: one JSON line
//! per completed session.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLogEntry {
    pub sync_id: String,
    pub folder_id: String,
    pub peer_id: String,
    pub bytes_transferred: u64,
    pub files_synced: u64,
    pub conflicts: u64,
    pub duration_ms: u64,
    pub status: String,
    pub finished_at: i64,
}

pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    pub fn new(appdata: &Path) -> Self {
        Self {
            path: fsync_buildcfg::logs_dir(appdata).join("sync.log"),
        }
    }

    pub fn append(&self, entry: &SessionLogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("creating {parent:?}"))?;
        }
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {:?}", self.path))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("appending to {:?}", self.path))
    }
}
