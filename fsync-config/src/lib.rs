//! Persisted `SyncFolder` configuration.
//!
//! Each folder is stored as its own JSON document at
//! `<appdata>/folders/<folderID>.json`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use fsync_api_types::SyncFolder;

/// Handle to the `<appdata>/folders` directory.
pub struct FolderConfigStore {
    dir: PathBuf,
}

impl FolderConfigStore {
    pub fn new(appdata: &Path) -> Self {
        Self {
            dir: fsync_buildcfg::folders_dir(appdata),
        }
    }

    fn path_for(&self, folder_id: &str) -> PathBuf {
        self.dir.join(format!("{folder_id}.json"))
    }

    /// Loads a single folder's configuration, if present.
    pub fn load(&self, folder_id: &str) -> Result<Option<SyncFolder>> {
        let path = self.path_for(folder_id);
        match fsync_tools::fs::read_optional(&path)? {
            None => Ok(None),
            Some(data) => {
                let folder: SyncFolder = serde_json::from_slice(&data)
                    .with_context(|| format!("parsing folder config {path:?}"))?;
                Ok(Some(folder))
            }
        }
    }

    /// Loads every persisted folder configuration, keyed by `SyncFolder::id`.
    pub fn load_all(&self) -> Result<HashMap<String, SyncFolder>> {
        let mut out = HashMap::new();
        if !self.dir.exists() {
            return Ok(out);
        }
        for entry in std::fs::read_dir(&self.dir)
            .with_context(|| format!("listing folder config dir {:?}", self.dir))?
        {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let data = std::fs::read(&path)?;
            let folder: SyncFolder = serde_json::from_slice(&data)
                .with_context(|| format!("parsing folder config {path:?}"))?;
            out.insert(folder.id.clone(), folder);
        }
        Ok(out)
    }

    /// Validates and persists a folder configuration. Rejects a `syncID`
    /// already bound to a *different* folder id.
    pub fn save(&self, folder: &SyncFolder) -> Result<()> {
        SyncFolder::validate_sync_id(&folder.sync_id)?;

        for (existing_id, existing) in self.load_all()? {
            if existing_id != folder.id && existing.sync_id == folder.sync_id {
                bail!(fsync_api_types::ConfigError::SyncIdAlreadyBound(
                    folder.sync_id.clone()
                ));
            }
        }

        let path = self.path_for(&folder.id);
        let data = serde_json::to_vec_pretty(folder)?;
        fsync_tools::fs::replace_file(&path, &data)?;
        Ok(())
    }

    pub fn remove(&self, folder_id: &str) -> Result<()> {
        let path = self.path_for(folder_id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing folder config {path:?}")),
        }
    }
}
