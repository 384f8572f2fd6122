use serde::{Deserialize, Serialize};

/// One pointer declared in a peer's index, with its resolution outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerEntry {
    pub display_name: String,
    pub pointer_name: String,
    /// `None` when resolution failed or timed out.
    pub content_id: Option<String>,
    /// `None` unless the scan was asked to pin resolved content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
}

impl PeerEntry {
    pub fn is_resolved(&self) -> bool {
        self.content_id.is_some()
    }
}

/// Everything learned from one peer that served an index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanResult {
    pub peer_id: String,
    pub entries: Vec<PeerEntry>,
}

impl ScanResult {
    pub fn new(peer_id: impl Into<String>) -> Self {
        Self {
            peer_id: peer_id.into(),
            entries: Vec::new(),
        }
    }

    pub fn resolved_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_resolved()).count()
    }
}

/// Final tally of a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Swarm peers probed.
    pub peers: usize,
    /// Peers that served a non-empty index.
    pub indexed_peers: usize,
    /// Declared pointers observed across all indexed peers.
    pub entries: usize,
}

impl ScanSummary {
    pub fn no_peers(&self) -> bool {
        self.peers == 0
    }
}

/// Progress stream of a scan.
///
/// `Started` is always sent first so consumers can compute `completed/total`;
/// `Peer` events arrive in completion order; `Completed` is always last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Started { total: usize },
    Peer(ScanResult),
    Completed(ScanSummary),
}
