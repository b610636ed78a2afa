//! Atomic filesystem write helpers.
//!
//! Every persisted write in foldersync goes through [`replace_file`]: write
//! to a sibling temp file, `fsync`, then atomically `rename` into place.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Atomically (over)write `path` with `data`: a temp file in the same
/// directory is written, fsync'd, then renamed over the destination.
/// Creates the parent directory if it does not already exist.
pub fn replace_file(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)
        .with_context(|| format!("creating parent directory {parent:?}"))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("creating temp file in {parent:?}"))?;
    tmp.write_all(data)
        .with_context(|| format!("writing temp file for {path:?}"))?;
    tmp.as_file().sync_all().context("fsync of temp file")?;

    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("renaming temp file into place at {path:?}"))?;

    if let Ok(dir) = File::open(parent) {
        let _ = dir.sync_all();
    }

    Ok(())
}

/// Reads a file if present, returning `None` for a missing file rather
/// than erroring.
pub fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading {path:?}")),
    }
}

/// Removes a stale file/directory collision: if `path` exists but is not
/// the expected type (a file where a directory is required, or vice
/// versa), remove it so callers can create the expected entry fresh.
pub fn clear_type_collision(path: &Path, want_dir: bool) -> Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() != want_dir => {
            if meta.is_dir() {
                std::fs::remove_dir_all(path)
                    .with_context(|| format!("removing stale directory at {path:?}"))?;
            } else {
                std::fs::remove_file(path)
                    .with_context(|| format!("removing stale file at {path:?}"))?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Builds the canonical two-hex-prefix path for a block store entry,
/// e.g. `<base>/ab/abcdef...`.
pub fn prefixed_path(base: &Path, hash_hex: &str) -> PathBuf {
    let prefix = &hash_hex[..2.min(hash_hex.len())];
    base.join(prefix).join(hash_hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_file_is_readable_after_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("file.json");
        replace_file(&path, b"hello").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn replace_file_overwrites_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.json");
        replace_file(&path, b"first").unwrap();
        replace_file(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
    }

    #[test]
    fn read_optional_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert!(read_optional(&path).unwrap().is_none());
    }

    #[test]
    fn prefixed_path_uses_first_two_hex_chars() {
        let base = Path::new("/blocks");
        let p = prefixed_path(base, "abcdef0123");
        assert_eq!(p, Path::new("/blocks/ab/abcdef0123"));
    }
}
