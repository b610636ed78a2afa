//! Tracing subscriber initialization (fmt + env-filter).

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global `tracing` subscriber reading its level from
/// `RUST_LOG` (defaulting to `info`). Safe to call more than once; later
/// calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// Installs a JSON-formatted subscriber, for deployments that ship logs to
/// a collector rather than a terminal.
pub fn init_json_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().json().with_env_filter(filter).try_init();
}
