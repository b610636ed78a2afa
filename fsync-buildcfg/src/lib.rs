//! Deployment path layout and tuning constants for foldersync.
//!
//! Every persisted-state path and deployment directory is named as a
//! single constant or macro here, rather than letting path fragments
//! leak into call sites.

/// Root application-data directory. Overridden in tests via
/// [`appdata_dir`] rather than this constant directly.
#[macro_export]
macro_rules! FOLDERSYNC_APPDATA_DIR_M {
    () => {
        "/var/lib/foldersync"
    };
}

pub const FOLDERSYNC_APPDATA_DIR: &str = FOLDERSYNC_APPDATA_DIR_M!();

/// Returns the `<appdata>/folders` directory under `base`.
pub fn folders_dir(base: &std::path::Path) -> std::path::PathBuf {
    base.join("folders")
}

/// Returns the `<appdata>/state/<syncID>` directory under `base`.
pub fn state_dir(base: &std::path::Path, sync_id: &str) -> std::path::PathBuf {
    base.join("state").join(sync_id)
}

/// Returns the `<appdata>/clocks` directory under `base`.
pub fn clocks_dir(base: &std::path::Path) -> std::path::PathBuf {
    base.join("clocks")
}

/// Returns the `<appdata>/blocks` directory under `base`.
pub fn blocks_dir(base: &std::path::Path) -> std::path::PathBuf {
    base.join("blocks")
}

/// Returns the `<appdata>/logs` directory under `base`.
pub fn logs_dir(base: &std::path::Path) -> std::path::PathBuf {
    base.join("logs")
}

// --- Content-defined chunking parameters ---

pub const CDC_MIN_CHUNK_SIZE: usize = 4096;
pub const CDC_AVG_CHUNK_SIZE: usize = 16384;
pub const CDC_MAX_CHUNK_SIZE: usize = 65536;

// --- Transfer layer thresholds ---

/// Files at or below this size use the full-transfer RPC; larger files use
/// chunked transfer.
pub const CHUNK_TRANSFER_THRESHOLD: u64 = 256 * 1024;

/// Hard ceiling past which a fallback-to-full-transfer is refused rather
/// than materializing the file in memory.
pub const OOM_GUARD_LIMIT: u64 = 100 * 1024 * 1024;

// --- Concurrency limits ---

pub const MAX_CONCURRENT_CHUNK_UPLOADS: usize = 4;
pub const MAX_CONCURRENT_CHUNK_DOWNLOADS: usize = 4;
pub const MAX_CONCURRENT_SESSION_ACTIONS: usize = 8;
pub const MAX_CONCURRENT_SCAN_HASHES: usize = 8;
pub const MAX_CONCURRENT_DETECTOR_HASHES: usize = 8;

/// Scan-time hash computation yields to the scheduler every N files.
pub const SCAN_YIELD_INTERVAL: usize = 50;

// --- Timeouts & windows ---

/// Per-RPC timeout lower bound (small payloads), seconds.
pub const RPC_TIMEOUT_MIN_SECS: u64 = 90;
/// Per-RPC timeout upper bound (large payloads), seconds.
pub const RPC_TIMEOUT_MAX_SECS: u64 = 180;
/// Bounded retry count for transient failures.
pub const MAX_RETRIES: u32 = 3;

/// Sync-write cooldown window: remote writes suppress local FS events for
/// this many seconds afterwards.
pub const SYNC_WRITE_COOLDOWN_SECS: i64 = 5;

/// Bounded window within which a disappear/appear pair with matching
/// content hash is classified as a rename.
pub const PENDING_RENAME_WINDOW_SECS: i64 = 10;

/// Change-detector event dedup window.
pub const DEDUP_WINDOW_SECS: i64 = 3;

/// `getFileData` write-in-progress guard: a zero-length, recently-modified
/// file is re-checked for up to this long before the read is attempted.
pub const WRITE_STABILITY_WINDOW_SECS: i64 = 3;

/// Session-level abandon timer for a transfer whose peer stopped
/// responding mid-stream. Distinct from [`WRITE_STABILITY_WINDOW_SECS`],
/// which only guards the start of a read.
pub const STALE_TRANSFER_TIMEOUT_SECS: i64 = 60;

/// Per-`(peerID, syncID)` cooldown between sessions.
pub const SESSION_COOLDOWN_SECS: i64 = 30;

/// Tombstone time-to-live before it becomes GC-eligible, subject also to
/// the peer-acknowledgement predicate.
pub const TOMBSTONE_TTL_SECS: i64 = 30 * 24 * 3600;

/// Fallback TTL-only tombstone sweep interval, applied even without full
/// peer acknowledgement, to guarantee eventual GC.
pub const TOMBSTONE_FALLBACK_TTL_SECS: i64 = 2 * TOMBSTONE_TTL_SECS;
