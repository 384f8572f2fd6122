//! Re-publishes tracked directories under their naming keys, then publishes a
//! discovery index of everything that succeeded under the node's self name.

use crate::artifact::write_index_artifact;
use crate::error::{PublishError, Result};
use peerdex_content::{ContentService, SELF_KEY};
use peerdex_storage::Storage;
use peerdex_types::{
    IndexOutcome, OutcomeError, PublishEvent, PublishOutcome, PublishSummary, PublishedEntry,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Time-to-live attached to published names.
pub const DEFAULT_TTL: &str = "1m";

const SCRATCH_PREFIX: &str = "peerdex-index-";

pub struct Publisher {
    service: Arc<dyn ContentService>,
    storage: Arc<dyn Storage>,
    ttl: String,
}

impl Publisher {
    pub fn new(service: Arc<dyn ContentService>, storage: Arc<dyn Storage>) -> Self {
        Self {
            service,
            storage,
            ttl: DEFAULT_TTL.to_string(),
        }
    }

    pub fn with_ttl(mut self, ttl: impl Into<String>) -> Self {
        self.ttl = ttl.into();
        self
    }

    /// Re-publish every tracked directory, streaming progress into `events`.
    ///
    /// Sends `Started`, one `Outcome` per tracked directory in store order, an
    /// `Index` event when at least one directory was published, and finally
    /// `Completed`. Per-directory failures are reported as outcomes and never
    /// stop the run. With nothing tracked no external call is made. When the
    /// naming keys cannot be listed the run fails, still ending with
    /// `Completed`.
    pub async fn publish_all(&self, events: mpsc::Sender<PublishEvent>) -> Result<PublishSummary> {
        let tracked = self.storage.list_published()?;
        let total = tracked.len();
        emit(&events, PublishEvent::Started { total }).await;

        let mut summary = PublishSummary {
            total,
            ..PublishSummary::default()
        };
        if total == 0 {
            info!("nothing to publish");
            emit(&events, PublishEvent::Completed(summary.clone())).await;
            return Ok(summary);
        }

        let outcome = self.publish_tracked(&tracked, &events, &mut summary).await;
        match &outcome {
            Ok(()) => info!(
                total = summary.total,
                published = summary.published,
                failed = summary.failed,
                "publish complete"
            ),
            Err(err) => warn!(error = %err, "publish aborted"),
        }
        emit(&events, PublishEvent::Completed(summary.clone())).await;
        outcome.map(|()| summary)
    }

    async fn publish_tracked(
        &self,
        tracked: &[PublishedEntry],
        events: &mpsc::Sender<PublishEvent>,
        summary: &mut PublishSummary,
    ) -> Result<()> {
        let keys = self.service.list_local_keys().await?;
        let mut published = BTreeMap::new();
        for row in tracked {
            let outcome = self.publish_entry(row, &keys).await;
            match &outcome.error {
                None => {
                    summary.published += 1;
                    published.insert(outcome.key.clone(), outcome.pointer_name.clone());
                }
                Some(err) => {
                    summary.failed += 1;
                    warn!(key = %outcome.key, path = %row.path.display(), error = %err, "not published");
                }
            }
            emit(events, PublishEvent::Outcome(outcome)).await;
        }

        if published.is_empty() {
            debug!("no directory published, keeping the previous discovery index");
        } else {
            let index = self.publish_index(&published).await;
            emit(events, PublishEvent::Index(index.clone())).await;
            summary.index = Some(index);
        }
        Ok(())
    }

    /// Run [`Publisher::publish_all`] on its own task and hand back the event
    /// stream.
    pub fn spawn(
        self: Arc<Self>,
        buffer: usize,
    ) -> (mpsc::Receiver<PublishEvent>, JoinHandle<Result<PublishSummary>>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let handle = tokio::spawn(async move { self.publish_all(tx).await });
        (rx, handle)
    }

    async fn publish_entry(
        &self,
        row: &PublishedEntry,
        keys: &BTreeMap<String, String>,
    ) -> PublishOutcome {
        let Some(pointer) = keys.get(&row.key) else {
            return PublishOutcome::failure(&row.key, "", OutcomeError::NamingKeyNotFound);
        };
        if !row.path.is_dir() {
            return PublishOutcome::failure(
                &row.key,
                pointer,
                OutcomeError::DirectoryNotFound(row.path.clone()),
            );
        }

        match self.add_and_publish(&row.path, &row.key).await {
            Ok(content_id) => PublishOutcome::success(&row.key, pointer, content_id),
            Err(err) => {
                PublishOutcome::failure(&row.key, pointer, OutcomeError::PublishFailed(err.to_string()))
            }
        }
    }

    async fn add_and_publish(&self, path: &Path, key: &str) -> Result<String> {
        // Directories may have changed since the last run, so always re-add.
        let content_id = self.service.add_directory(path).await?;
        self.service
            .publish_name(&content_id, Some(key), Some(&self.ttl))
            .await?;
        debug!(key, %content_id, "published");
        Ok(content_id)
    }

    async fn publish_index(&self, pointers: &BTreeMap<String, String>) -> IndexOutcome {
        match self.try_publish_index(pointers).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "discovery index not published");
                IndexOutcome::Failed(err.to_string())
            }
        }
    }

    async fn try_publish_index(&self, pointers: &BTreeMap<String, String>) -> Result<IndexOutcome> {
        // Removed when dropped, whichever way this function returns.
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir()?;
        write_index_artifact(scratch.path(), pointers)?;

        let content_id = self.service.add_directory(scratch.path()).await?;
        self.service
            .publish_name(&content_id, None, Some(&self.ttl))
            .await?;
        let node_id = self.service.local_identity().await?;
        info!(%node_id, %content_id, keys = pointers.len(), "discovery index published");

        Ok(IndexOutcome::Published {
            content_id,
            node_id,
            keys: pointers.len(),
        })
    }

    /// Start tracking `path`: publish it under `key_name` (default: the
    /// directory's name), creating the naming key when missing.
    pub async fn add_directory(&self, path: &Path, key_name: Option<&str>) -> Result<PublishOutcome> {
        let path = match tokio::fs::canonicalize(path).await {
            Ok(path) if path.is_dir() => path,
            _ => return Err(PublishError::NotADirectory(path.to_path_buf())),
        };
        let key = match key_name {
            Some(name) => name.to_string(),
            None => path
                .file_name()
                .and_then(|name| name.to_str())
                .map(str::to_string)
                .ok_or_else(|| PublishError::NoKeyName(path.clone()))?,
        };
        if key == SELF_KEY {
            return Err(PublishError::ReservedKey(key));
        }

        let keys = self.service.list_local_keys().await?;
        if !keys.contains_key(&key) {
            info!(%key, "creating naming key");
            self.service.create_key(&key).await?;
        }

        let content_id = self.add_and_publish(&path, &key).await?;
        let pointer = self
            .service
            .list_local_keys()
            .await?
            .remove(&key)
            .unwrap_or_default();

        self.storage.upsert_published(&path, &key)?;
        info!(%key, path = %path.display(), %content_id, "tracking directory");
        Ok(PublishOutcome::success(key, pointer, content_id))
    }

    /// Stop tracking `path`. Returns whether it was tracked.
    pub async fn remove(&self, path: &Path) -> Result<bool> {
        let resolved = tokio::fs::canonicalize(path)
            .await
            .unwrap_or_else(|_| path.to_path_buf());
        let removed = self.storage.delete_published(&resolved)?
            || (resolved != path && self.storage.delete_published(path)?);
        if removed {
            info!(path = %resolved.display(), "stopped tracking directory");
        }
        Ok(removed)
    }
}

async fn emit(events: &mpsc::Sender<PublishEvent>, event: PublishEvent) {
    if events.send(event).await.is_err() {
        debug!("publish event receiver dropped");
    }
}
