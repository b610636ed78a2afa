//! Gitignore-style ignore matcher: exact match, `*.ext`
//! suffix, `name/` directory match, and mid-path segment match, combined
//! with a fixed filter for the engine's own conflict artifacts (so the
//! engine never re-syncs the byproducts of its own conflict handling).

use globset::{Glob, GlobSet, GlobSetBuilder};

/// Suffix every conflict artifact carries; see
/// `foldersync::conflict::artifact_name`.
const CONFLICT_MARKER: &str = ".conflict.";

pub struct IgnoreMatcher {
    set: GlobSet,
}

impl IgnoreMatcher {
    /// Builds a matcher from user patterns. Each pattern is interpreted as:
    /// - an exact relative path (`docs/readme.txt`)
    /// - a `*.ext` suffix glob
    /// - a `name/` directory match (matches `name` and everything under it)
    /// - a bare `name` mid-path segment match (matches `name` anywhere in
    ///   the path, like gitignore's unanchored patterns)
    pub fn new(patterns: &[String]) -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            if let Some(dir) = pattern.strip_suffix('/') {
                push_glob(&mut builder, dir);
                push_glob(&mut builder, &format!("{dir}/**"));
            } else if pattern.contains('/') || pattern.contains('*') {
                push_glob(&mut builder, pattern);
            } else {
                // unanchored mid-path segment, gitignore-style.
                push_glob(&mut builder, pattern);
                push_glob(&mut builder, &format!("**/{pattern}"));
                push_glob(&mut builder, &format!("**/{pattern}/**"));
            }
        }
        Self {
            set: builder.build().unwrap_or_else(|_| GlobSet::empty()),
        }
    }

    pub fn empty() -> Self {
        Self { set: GlobSet::empty() }
    }

    /// Whether `rel_path` matches any configured ignore pattern or is one
    /// of the engine's own conflict artifacts.
    pub fn is_ignored(&self, rel_path: &str) -> bool {
        is_conflict_artifact(rel_path) || self.set.is_match(rel_path)
    }
}

fn push_glob(builder: &mut GlobSetBuilder, pattern: &str) {
    if let Ok(glob) = Glob::new(pattern) {
        builder.add(glob);
    }
}

/// Recognizes a path produced by the engine's own conflict-naming scheme
/// (`<basename>.conflict.<peerID-prefix8>.<unix-seconds>`), so change
/// detection never re-ingests its own artifacts.
pub fn is_conflict_artifact(rel_path: &str) -> bool {
    let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    file_name.contains(CONFLICT_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_path_match() {
        let m = IgnoreMatcher::new(&["docs/readme.txt".to_string()]);
        assert!(m.is_ignored("docs/readme.txt"));
        assert!(!m.is_ignored("docs/other.txt"));
    }

    #[test]
    fn extension_suffix_match() {
        let m = IgnoreMatcher::new(&["*.tmp".to_string()]);
        assert!(m.is_ignored("a.tmp"));
        assert!(!m.is_ignored("a.txt"));
    }

    #[test]
    fn directory_match_covers_contents() {
        let m = IgnoreMatcher::new(&["node_modules/".to_string()]);
        assert!(m.is_ignored("node_modules"));
        assert!(m.is_ignored("node_modules/pkg/index.js"));
        assert!(!m.is_ignored("src/node_modules_helper.rs"));
    }

    #[test]
    fn unanchored_segment_match() {
        let m = IgnoreMatcher::new(&[".git".to_string()]);
        assert!(m.is_ignored(".git"));
        assert!(m.is_ignored("a/b/.git"));
        assert!(m.is_ignored("a/.git/HEAD"));
    }

    #[test]
    fn conflict_artifacts_always_ignored() {
        let m = IgnoreMatcher::empty();
        assert!(m.is_ignored("a.txt.conflict.deadbeef.1700000000"));
    }
}
