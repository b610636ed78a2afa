//! Peer-to-peer folder synchronization engine.
//!
//! This crate wires the `fsync-*` library crates together behind
//! [`engine::FoldersyncEngine`], the construction surface a hosting
//! process (daemon, CLI, or test) drives: configure folders, run sessions
//! against peers, and serve inbound requests from a [`fsync_server::RequestHandler`].

pub mod ack_tracker;
pub mod cancellation;
pub mod conflict;
pub mod engine;
pub mod orchestrator;
pub mod reconcile;
pub mod scan;
pub mod session_log;
pub mod watch;

pub use ack_tracker::PeerAckTracker;
pub use cancellation::SessionCancellation;
pub use conflict::{ConflictLog, ConflictLogEntry};
pub use engine::FoldersyncEngine;
pub use orchestrator::{SessionOrchestrator, SessionSummary, SharedTransport};
pub use reconcile::reconcile_local_changes;
pub use session_log::{SessionLog, SessionLogEntry};
pub use watch::LiveWatch;
