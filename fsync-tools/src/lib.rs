//! Small helpers shared across the foldersync workspace: atomic file
//! replace, path normalization, hashing, bounded concurrency, and logging
//! init.

pub mod concurrency;
pub mod fs;
pub mod hash;
pub mod logging;
pub mod path;

pub use concurrency::Bounded;
pub use hash::{sha256_hex, verify_sha256};
pub use path::normalize_rel_path;
