//! Fetches one peer's index document and resolves every pointer it declares.

use futures::stream::{self, StreamExt};
use peerdex_content::{ContentService, DEFAULT_RESOLVE_TIMEOUT};
use peerdex_types::{PeerEntry, PeerIndexDocument, ScanResult, INDEX_FILE_NAME};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on simultaneous resolutions for one peer.
pub const MAX_CONCURRENT_RESOLUTIONS: usize = 10;

/// Path of the index document served by `peer_id`.
pub fn index_path(peer_id: &str) -> String {
    format!("/ipns/{peer_id}/{INDEX_FILE_NAME}")
}

pub struct PeerIndexFetcher {
    service: Arc<dyn ContentService>,
    resolve_timeout: Duration,
    pin: bool,
}

impl PeerIndexFetcher {
    pub fn new(service: Arc<dyn ContentService>) -> Self {
        Self {
            service,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            pin: false,
        }
    }

    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    /// Pin the content behind every pointer that resolves.
    pub fn with_pinning(mut self, pin: bool) -> Self {
        self.pin = pin;
        self
    }

    /// Fetch and resolve the index of `peer_id`.
    ///
    /// Returns `None` when the peer serves no usable index: the fetch failed or
    /// timed out, the document was malformed, or it declared no pointers. A
    /// missing index is normal for most peers and is not an error.
    pub async fn fetch(&self, peer_id: &str, timeout: Duration) -> Option<ScanResult> {
        let raw = match self.service.fetch_path(&index_path(peer_id), timeout).await {
            Ok(raw) => raw,
            Err(err) => {
                debug!(peer = peer_id, error = %err, "no index served");
                return None;
            }
        };

        let document = match PeerIndexDocument::parse(&raw) {
            Ok(document) => document,
            Err(err) => {
                debug!(peer = peer_id, error = %err, "ignoring malformed index");
                return None;
            }
        };
        if document.is_empty() {
            return None;
        }

        let limit = MAX_CONCURRENT_RESOLUTIONS.min(document.len());
        let entries = stream::iter(document.ipns)
            .map(|(display_name, pointer_name)| self.resolve_entry(display_name, pointer_name))
            .buffer_unordered(limit)
            .collect::<Vec<_>>()
            .await;

        Some(ScanResult {
            peer_id: peer_id.to_string(),
            entries,
        })
    }

    async fn resolve_entry(&self, display_name: String, pointer_name: String) -> PeerEntry {
        let content_id = match self
            .service
            .resolve_name(&pointer_name, self.resolve_timeout)
            .await
        {
            Ok(content_id) => Some(content_id),
            Err(err) => {
                debug!(pointer = %pointer_name, error = %err, "pointer unresolved");
                None
            }
        };

        let pinned = match (&content_id, self.pin) {
            (Some(content_id), true) => Some(self.pin_content(content_id).await),
            _ => None,
        };

        PeerEntry {
            display_name,
            pointer_name,
            content_id,
            pinned,
        }
    }

    async fn pin_content(&self, content_id: &str) -> bool {
        match self.service.pin_add(content_id).await {
            Ok(()) => true,
            Err(err) => {
                warn!(content_id, error = %err, "pin failed");
                false
            }
        }
    }
}
