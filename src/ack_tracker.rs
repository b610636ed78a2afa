//! Tracks, per `(syncID, peerID)`, the last time that peer was seen to have
//! fully absorbed this node's state. Used to give "acknowledged by all
//! currently-online peers" a concrete meaning for tombstone GC, instead of
//! treating every tombstone as immediately collectible.

use std::collections::HashMap;
use std::sync::RwLock;

/// Records the most recent successful-session timestamp per `(syncID,
/// peerID)`. A tombstone is GC-eligible only once every peer this tracker
/// considers "online" has acknowledged a session newer than the deletion.
#[derive(Default)]
pub struct PeerAckTracker {
    // sync_id -> peer_id -> last acked unix-seconds
    acks: RwLock<HashMap<String, HashMap<String, i64>>>,
    // sync_id -> set of peers considered online for GC purposes
    online: RwLock<HashMap<String, Vec<String>>>,
}

impl PeerAckTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a peer as online for this sync (called when a session against
    /// it starts) and records the session's completion timestamp.
    pub fn record_session(&self, sync_id: &str, peer_id: &str, completed_at: i64) {
        self.acks
            .write()
            .unwrap()
            .entry(sync_id.to_string())
            .or_default()
            .insert(peer_id.to_string(), completed_at);

        let mut online = self.online.write().unwrap();
        let peers = online.entry(sync_id.to_string()).or_default();
        if !peers.iter().any(|p| p == peer_id) {
            peers.push(peer_id.to_string());
        }
    }

    /// `true` if every peer tracked as online for `sync_id` has an
    /// acknowledgement strictly newer than `deleted_at`. A sync with no
    /// known peers yet is considered unacknowledged (conservative default:
    /// don't GC a tombstone nobody has had a chance to see).
    pub fn acknowledged_by_all_online(&self, sync_id: &str, deleted_at: i64) -> bool {
        let online = self.online.read().unwrap();
        let Some(peers) = online.get(sync_id) else {
            return false;
        };
        if peers.is_empty() {
            return false;
        }

        let acks = self.acks.read().unwrap();
        let Some(per_peer) = acks.get(sync_id) else {
            return false;
        };
        peers
            .iter()
            .all(|peer| per_peer.get(peer).is_some_and(|&acked_at| acked_at > deleted_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unacknowledged_by_default() {
        let tracker = PeerAckTracker::new();
        assert!(!tracker.acknowledged_by_all_online("DEMO", 1000));
    }

    #[test]
    fn acknowledged_once_every_online_peer_is_newer() {
        let tracker = PeerAckTracker::new();
        tracker.record_session("DEMO", "peerA", 500);
        tracker.record_session("DEMO", "peerB", 500);
        assert!(!tracker.acknowledged_by_all_online("DEMO", 1000));

        tracker.record_session("DEMO", "peerA", 1500);
        tracker.record_session("DEMO", "peerB", 1500);
        assert!(tracker.acknowledged_by_all_online("DEMO", 1000));
    }

    #[test]
    fn one_stale_peer_blocks_acknowledgement() {
        let tracker = PeerAckTracker::new();
        tracker.record_session("DEMO", "peerA", 1500);
        tracker.record_session("DEMO", "peerB", 500);
        assert!(!tracker.acknowledged_by_all_online("DEMO", 1000));
    }
}
