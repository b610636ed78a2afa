//! Persistent, content-addressed block store.
//!
//! A two-hex-prefix directory fan-out under the store root, atomic insert
//! via temp file + rename, idempotent writes. Every `put` validates
//! `sha256(data) == hash`, so a corrupt or mislabeled block is rejected
//! before it ever lands on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fsync_api_types::DataError;
use fsync_tools::hash::sha256_hex;

/// File-system-backed content-addressed block store.
pub struct BlockStore {
    base: PathBuf,
    // Serializes concurrent `put`s of *different* hashes touching the same
    // two-hex-prefix directory.
    write_lock: Mutex<()>,
}

impl BlockStore {
    pub fn open(base: impl Into<PathBuf>) -> std::io::Result<Self> {
        let base = base.into();
        std::fs::create_dir_all(&base)?;
        Ok(Self {
            base,
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, hash: &str) -> PathBuf {
        fsync_tools::fs::prefixed_path(&self.base, hash)
    }

    pub fn has(&self, hash: &str) -> bool {
        self.path_for(hash).is_file()
    }

    pub fn has_many<'a>(&self, hashes: impl IntoIterator<Item = &'a str>) -> HashMap<String, bool> {
        hashes
            .into_iter()
            .map(|h| (h.to_string(), self.has(h)))
            .collect()
    }

    /// Validates `sha256(data) == hash`, then atomically writes it if not
    /// already present. Returns `Ok(true)` if the block was newly written,
    /// `Ok(false)` if it already existed (idempotent).
    pub fn put(&self, hash: &str, data: &[u8]) -> Result<bool, DataError> {
        let computed = sha256_hex(data);
        if !computed.eq_ignore_ascii_case(hash) {
            return Err(DataError::HashMismatch {
                expected: hash.to_string(),
                computed,
            });
        }

        let path = self.path_for(hash);
        let _guard = self.write_lock.lock().unwrap();

        if path.is_file() {
            return Ok(false);
        }

        fsync_tools::fs::replace_file(&path, data)
            .map_err(|e| DataError::MissingBlocks(vec![format!("write failed for {hash}: {e}")]))?;

        Ok(true)
    }

    pub fn get(&self, hash: &str) -> std::io::Result<Option<Vec<u8>>> {
        match std::fs::read(self.path_for(hash)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsync_tools::hash::sha256_hex;

    #[test]
    fn put_then_get_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::open(dir.path()).unwrap();
        let data = b"some chunk bytes".to_vec();
        let hash = sha256_hex(&data);

        assert!(!store.has(&hash));
        let inserted = store.put(&hash, &data).unwrap();
        assert!(inserted);
        assert!(store.has(&hash));
        assert_eq!(store.get(&hash).unwrap(), Some(data));
    }

    #[test]
    fn put_rejects_hash_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::open(dir.path()).unwrap();
        let err = store.put("deadbeef", b"mismatched").unwrap_err();
        assert!(matches!(err, DataError::HashMismatch { .. }));
    }

    #[test]
    fn put_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::open(dir.path()).unwrap();
        let data = b"same bytes twice".to_vec();
        let hash = sha256_hex(&data);
        assert!(store.put(&hash, &data).unwrap());
        assert!(!store.put(&hash, &data).unwrap());
    }

    #[test]
    fn has_many_reports_each_hash() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::open(dir.path()).unwrap();
        let present = sha256_hex(b"present");
        store.put(&present, b"present").unwrap();
        let absent = sha256_hex(b"absent-data");

        let result = store.has_many([present.as_str(), absent.as_str()]);
        assert_eq!(result.get(&present), Some(&true));
        assert_eq!(result.get(&absent), Some(&false));
    }
}
