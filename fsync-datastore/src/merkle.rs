//! Merkle state index: an ordered `path -> hash` map whose root digest is
//! a commitment over the whole set, used as the cheap equality check
//! during session discovery.
//!
//! Entries are kept in a `BTreeMap`, which already gives `O(log n)`
//! amortized insertion/removal and, crucially, a canonical (sorted)
//! iteration order independent of insertion order. The root digest is the
//! SHA-256 of the ordered concatenation of `sha256(path) || hash` for
//! every entry — since the iteration order never depends on insertion
//! order, two indexes with identical `{path -> hash}` sets always produce
//! identical roots.

use std::collections::BTreeMap;

use fsync_tools::hash::sha256_hex;

#[derive(Debug, Default, Clone)]
pub struct MerkleIndex {
    entries: BTreeMap<String, String>,
}

impl MerkleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }

    pub fn insert(&mut self, path: String, hash: String) {
        self.entries.insert(path, hash);
    }

    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.entries.remove(path)
    }

    pub fn get(&self, path: &str) -> Option<&String> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Commitment over the entire `{path -> hash}` set.
    pub fn root(&self) -> String {
        let mut buf = String::new();
        for (path, hash) in &self.entries {
            buf.push_str(&sha256_hex(path.as_bytes()));
            buf.push(':');
            buf.push_str(hash);
            buf.push('\n');
        }
        sha256_hex(buf.as_bytes())
    }
}
