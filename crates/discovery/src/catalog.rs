//! Browsable view over local keys and discovered pointers, plus pinning.

use crate::error::Result;
use futures::stream::{self, StreamExt};
use peerdex_content::{ContentService, DEFAULT_RESOLVE_TIMEOUT, SELF_KEY};
use peerdex_storage::Storage;
use peerdex_types::{CatalogEntry, EntrySource, INDEX_LABEL};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Concurrent pin status checks while building the catalog.
const PIN_CHECK_CONCURRENCY: usize = 10;

pub struct Catalog {
    service: Arc<dyn ContentService>,
    storage: Arc<dyn Storage>,
}

impl Catalog {
    pub fn new(service: Arc<dyn ContentService>, storage: Arc<dyn Storage>) -> Self {
        Self { service, storage }
    }

    /// Local naming keys first, then every discovered pointer with its pin
    /// status.
    pub async fn entries(&self) -> Result<Vec<CatalogEntry>> {
        let keys = self.service.list_local_keys().await?;
        let tracked: HashMap<_, _> = self
            .storage
            .list_published()?
            .into_iter()
            .map(|row| (row.key, row.path))
            .collect();

        let mut entries: Vec<CatalogEntry> = keys
            .into_iter()
            .map(|(name, pointer_name)| CatalogEntry {
                source: EntrySource::Local {
                    path: tracked.get(&name).cloned(),
                },
                display_name: if name == SELF_KEY {
                    INDEX_LABEL.to_string()
                } else {
                    name
                },
                pointer_name,
                pinned: false,
            })
            .collect();

        let discovered = self.storage.list_discovered()?;
        if discovered.is_empty() {
            return Ok(entries);
        }

        let pinned = self.service.list_pinned_content_ids().await?;
        let service = &self.service;
        let pinned = &pinned;
        let remote = stream::iter(discovered)
            .map(|row| async move {
                let is_pinned = service.is_pinned(&row.pointer_name, pinned).await;
                CatalogEntry {
                    source: EntrySource::Peer(row.node_id),
                    display_name: row.display_name.unwrap_or_else(|| INDEX_LABEL.to_string()),
                    pointer_name: row.pointer_name,
                    pinned: is_pinned,
                }
            })
            .buffered(PIN_CHECK_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;

        entries.extend(remote);
        Ok(entries)
    }
}

/// Resolve `pointer` and pin the content it names. Returns the content id.
pub async fn pin_pointer(service: &dyn ContentService, pointer: &str) -> Result<String> {
    let content_id = service.resolve_name(pointer, DEFAULT_RESOLVE_TIMEOUT).await?;
    service.pin_add(&content_id).await?;
    info!(pointer, %content_id, "pinned");
    Ok(content_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerdex_content::{Canned, StubContentService};
    use peerdex_storage::MemoryStorage;
    use peerdex_types::DiscoveredEntry;
    use std::path::PathBuf;

    #[tokio::test]
    async fn lists_local_then_discovered() {
        let stub = StubContentService::new()
            .with_key("blog", "k51blog")
            .with_resolution("k51docs", Canned::Value("bafydocs".into()))
            .with_pin("bafydocs");
        let storage = MemoryStorage::new();
        storage
            .upsert_published(&PathBuf::from("/srv/blog"), "blog")
            .unwrap();
        storage
            .upsert_discovered(DiscoveredEntry::self_pointer("peerA"))
            .unwrap();
        storage
            .upsert_discovered(DiscoveredEntry::new("peerA", "k51docs", Some("docs".into())))
            .unwrap();

        let catalog = Catalog::new(Arc::new(stub), Arc::new(storage));
        let entries = catalog.entries().await.unwrap();

        let rows: Vec<_> = entries
            .iter()
            .map(|e| (e.source.to_string(), e.display_name.as_str(), e.pinned))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("local (/srv/blog)".to_string(), "blog", false),
                ("local".to_string(), "(index)", false),
                ("peerA".to_string(), "(index)", false),
                ("peerA".to_string(), "docs", true),
            ]
        );
    }

    #[tokio::test]
    async fn pin_pointer_pins_resolved_content() {
        let stub = StubContentService::new()
            .with_resolution("k51docs", Canned::Value("bafydocs".into()));
        let content_id = pin_pointer(&stub, "k51docs").await.unwrap();
        assert_eq!(content_id, "bafydocs");
        assert!(stub.pins().contains("bafydocs"));

        assert!(pin_pointer(&stub, "k51unknown").await.is_err());
    }
}
