//! Error taxonomy shared across the engine.

use thiserror::Error;

/// Network timeout, connection reset, or a transient filesystem busy
/// condition. Retried locally before being surfaced to the session.
#[derive(Debug, Error)]
pub enum TransientError {
    #[error("request to peer timed out after {0} attempt(s)")]
    Timeout(u32),
    #[error("connection reset: {0}")]
    ConnectionReset(String),
    #[error("filesystem temporarily busy: {0}")]
    FilesystemBusy(String),
}

/// Malformed response, missing expected variant, or version mismatch.
/// The session aborts but the peer is not removed.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed response from peer: {0}")]
    InvalidResponse(String),
    #[error("expected response variant '{expected}', got '{actual}'")]
    UnexpectedVariant { expected: String, actual: String },
    #[error("protocol version mismatch: local={local}, remote={remote}")]
    VersionMismatch { local: u32, remote: u32 },
}

/// Hash mismatch on put, or a block missing during reconstruction.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch { expected: String, computed: String },
    #[error("missing block(s) during reconstruction: {0:?}")]
    MissingBlocks(Vec<String>),
}

/// No read/write permission, a file/directory type collision, or disk full.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("path collision: {path} is a {found}, expected a {expected}")]
    TypeCollision {
        path: String,
        found: &'static str,
        expected: &'static str,
    },
    #[error("disk full while writing {0}")]
    DiskFull(String),
}

/// Invalid `syncID` format, or `syncID` already bound to another folder.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid sync id: {0}")]
    InvalidSyncId(String),
    #[error("sync id '{0}' is already bound to another folder")]
    SyncIdAlreadyBound(String),
}

/// OOM-guard triggered by a >100MiB fallback-to-memory attempt. Fatal for
/// the file in this session, not the session as a whole.
#[derive(Debug, Error)]
pub enum SafetyError {
    #[error("refusing to materialize {size} bytes for '{path}' in memory (limit {limit} bytes)")]
    OomGuard { path: String, size: u64, limit: u64 },
}

/// Top-level error used at the crate boundaries that aggregate the above.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Transient(#[from] TransientError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Safety(#[from] SafetyError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
