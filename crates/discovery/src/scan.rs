//! Swarm-wide scan: probe every peer for an index and record what it declares.

use crate::error::Result;
use crate::fetcher::PeerIndexFetcher;
use peerdex_content::{ContentService, DEFAULT_FETCH_TIMEOUT};
use peerdex_storage::Storage;
use peerdex_types::{DiscoveredEntry, ScanEvent, ScanResult, ScanSummary};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

/// Upper bound on peers probed at the same time.
pub const MAX_CONCURRENT_PEERS: usize = 20;
/// Above this many peers the index fetch timeout is shortened.
pub const MANY_PEERS_THRESHOLD: usize = 20;
/// Index fetch timeout used for large swarms.
pub const FAST_FETCH_TIMEOUT: Duration = Duration::from_millis(2690);

/// Index fetch timeout for a swarm of `peer_count` peers.
///
/// Large swarms get a shorter budget so a scan stays bounded in wall-clock
/// time; small ones get the default.
pub fn timeout_for(peer_count: usize) -> Duration {
    if peer_count > MANY_PEERS_THRESHOLD {
        FAST_FETCH_TIMEOUT
    } else {
        DEFAULT_FETCH_TIMEOUT
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Pin the content behind every resolved pointer.
    pub pin: bool,
}

pub struct Scanner {
    service: Arc<dyn ContentService>,
    storage: Arc<dyn Storage>,
    fetcher: Arc<PeerIndexFetcher>,
    max_concurrent_peers: usize,
}

impl Scanner {
    pub fn new(
        service: Arc<dyn ContentService>,
        storage: Arc<dyn Storage>,
        options: ScanOptions,
    ) -> Self {
        let fetcher = PeerIndexFetcher::new(Arc::clone(&service)).with_pinning(options.pin);
        Self::with_fetcher(service, storage, fetcher)
    }

    pub fn with_fetcher(
        service: Arc<dyn ContentService>,
        storage: Arc<dyn Storage>,
        fetcher: PeerIndexFetcher,
    ) -> Self {
        Self {
            service,
            storage,
            fetcher: Arc::new(fetcher),
            max_concurrent_peers: MAX_CONCURRENT_PEERS,
        }
    }

    /// Scan the swarm, streaming progress into `events`.
    ///
    /// Sends `Started` with the peer count first, one `Peer` per peer that
    /// served an index in completion order, then `Completed`. A closed
    /// receiver does not stop the scan. Only a failure to list the swarm or to
    /// write the state store is returned as an error. A store failure still
    /// ends the stream with `Completed`, carrying what was recorded before it.
    pub async fn run(&self, events: mpsc::Sender<ScanEvent>) -> Result<ScanSummary> {
        let peers = self.service.list_swarm_peers().await?;
        let total = peers.len();
        emit(&events, ScanEvent::Started { total }).await;

        let mut summary = ScanSummary {
            peers: total,
            ..ScanSummary::default()
        };
        if total == 0 {
            info!("no swarm peers to scan");
            emit(&events, ScanEvent::Completed(summary)).await;
            return Ok(summary);
        }

        let outcome = self.probe_peers(peers, &events, &mut summary).await;
        match &outcome {
            Ok(()) => info!(
                peers = summary.peers,
                indexed = summary.indexed_peers,
                entries = summary.entries,
                "scan complete"
            ),
            Err(err) => warn!(
                indexed = summary.indexed_peers,
                error = %err,
                "scan aborted"
            ),
        }
        emit(&events, ScanEvent::Completed(summary)).await;
        outcome.map(|()| summary)
    }

    async fn probe_peers(
        &self,
        peers: BTreeSet<String>,
        events: &mpsc::Sender<ScanEvent>,
        summary: &mut ScanSummary,
    ) -> Result<()> {
        let timeout = timeout_for(peers.len());
        info!(peers = peers.len(), ?timeout, "scanning swarm peers");

        let permits = Arc::new(Semaphore::new(self.max_concurrent_peers));
        let mut in_flight: JoinSet<Option<ScanResult>> = JoinSet::new();
        for peer in peers {
            let permits = Arc::clone(&permits);
            let fetcher = Arc::clone(&self.fetcher);
            in_flight.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return None;
                };
                fetcher.fetch(&peer, timeout).await
            });
        }

        while let Some(joined) = in_flight.join_next().await {
            let result = match joined {
                Ok(Some(result)) => result,
                Ok(None) => continue,
                Err(err) => {
                    warn!(error = %err, "peer probe task failed");
                    continue;
                }
            };

            // Returning drops the join set, which aborts the remaining probes.
            self.record(&result)?;
            summary.indexed_peers += 1;
            summary.entries += result.entries.len();
            debug!(
                peer = %result.peer_id,
                entries = result.entries.len(),
                resolved = result.resolved_count(),
                "peer index recorded"
            );
            emit(events, ScanEvent::Peer(result)).await;
        }
        Ok(())
    }

    /// Run the scan on its own task and hand back the event stream.
    pub fn spawn(
        self: Arc<Self>,
        buffer: usize,
    ) -> (mpsc::Receiver<ScanEvent>, JoinHandle<Result<ScanSummary>>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let handle = tokio::spawn(async move { self.run(tx).await });
        (rx, handle)
    }

    fn record(&self, result: &ScanResult) -> Result<()> {
        self.storage
            .upsert_discovered(DiscoveredEntry::self_pointer(&result.peer_id))?;
        for entry in &result.entries {
            self.storage.upsert_discovered(DiscoveredEntry::new(
                &result.peer_id,
                &entry.pointer_name,
                Some(entry.display_name.clone()),
            ))?;
        }
        Ok(())
    }
}

async fn emit(events: &mpsc::Sender<ScanEvent>, event: ScanEvent) {
    if events.send(event).await.is_err() {
        debug!("scan event receiver dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_shrinks_for_large_swarms() {
        assert_eq!(timeout_for(0), DEFAULT_FETCH_TIMEOUT);
        assert_eq!(timeout_for(1), Duration::from_secs(5));
        assert_eq!(timeout_for(MANY_PEERS_THRESHOLD), Duration::from_secs(5));
        assert_eq!(timeout_for(MANY_PEERS_THRESHOLD + 1), Duration::from_millis(2690));
        assert_eq!(timeout_for(10_000), FAST_FETCH_TIMEOUT);
    }
}
