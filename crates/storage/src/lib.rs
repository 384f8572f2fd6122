use anyhow::Result;
use chrono::Utc;
use parking_lot::RwLock;
use peerdex_types::{DiscoveredEntry, PublishedEntry};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::{Db, Tree};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Version of the row layout written by this crate.
pub const SCHEMA_VERSION: u32 = 1;

/// Storage errors
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Unsupported schema version {found} (expected {expected})")]
    SchemaMismatch { found: u32, expected: u32 },
}

/// Abstract storage trait
///
/// Every write is an upsert keyed by the row's natural key, so concurrent
/// writers never conflict.
pub trait Storage: Send + Sync {
    /// Insert or replace the row keyed by `(node_id, pointer_name)`.
    fn upsert_discovered(&self, entry: DiscoveredEntry) -> Result<()>;
    /// All discovered rows ordered by node id, then display name.
    fn list_discovered(&self) -> Result<Vec<DiscoveredEntry>>;

    /// Insert or replace the row keyed by `path`, stamping `added_at` now.
    fn upsert_published(&self, path: &Path, key: &str) -> Result<PublishedEntry>;
    fn get_published(&self, path: &Path) -> Result<Option<PublishedEntry>>;
    /// All published rows ordered by path.
    fn list_published(&self) -> Result<Vec<PublishedEntry>>;
    /// Returns whether a row was removed.
    fn delete_published(&self, path: &Path) -> Result<bool>;
}

fn discovered_key(node_id: &str, pointer_name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(node_id.len() + pointer_name.len() + 1);
    key.extend_from_slice(node_id.as_bytes());
    key.push(0);
    key.extend_from_slice(pointer_name.as_bytes());
    key
}

fn published_key(path: &Path) -> &[u8] {
    path.as_os_str().as_encoded_bytes()
}

fn sort_discovered(rows: &mut [DiscoveredEntry]) {
    rows.sort_by(|a, b| {
        (&a.node_id, &a.display_name, &a.pointer_name).cmp(&(
            &b.node_id,
            &b.display_name,
            &b.pointer_name,
        ))
    });
}

/// Sled-backed implementation
pub struct SledStorage {
    db: Db,
    discovered: Tree,
    published: Tree,
}

impl SledStorage {
    /// Open (creating if absent) the database at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::open(path.as_ref())?)
    }

    fn open(path: &Path) -> std::result::Result<Self, StorageError> {
        let db = sled::open(path)?;
        let meta = db.open_tree("meta")?;
        let discovered = db.open_tree("discovered")?;
        let published = db.open_tree("published")?;

        let version = SCHEMA_VERSION.to_be_bytes();
        if let Err(current) = meta.compare_and_swap(
            b"schema_version",
            None as Option<&[u8]>,
            Some(&version[..]),
        )? {
            let found = current
                .current
                .as_deref()
                .and_then(|bytes| <[u8; 4]>::try_from(bytes).ok())
                .map(u32::from_be_bytes)
                .unwrap_or(0);
            if found != SCHEMA_VERSION {
                return Err(StorageError::SchemaMismatch {
                    found,
                    expected: SCHEMA_VERSION,
                });
            }
        } else {
            tracing::info!(version = SCHEMA_VERSION, "Initialized state store");
        }

        Ok(Self {
            db,
            discovered,
            published,
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush().map_err(StorageError::from)?;
        Ok(())
    }
}

fn encode<T: Serialize>(row: &T) -> std::result::Result<Vec<u8>, StorageError> {
    Ok(serde_json::to_vec(row)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> std::result::Result<T, StorageError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn decode_all<T: DeserializeOwned>(tree: &Tree) -> std::result::Result<Vec<T>, StorageError> {
    tree.iter()
        .map(|row| {
            let (_, value) = row?;
            decode(&value)
        })
        .collect()
}

impl Storage for SledStorage {
    fn upsert_discovered(&self, entry: DiscoveredEntry) -> Result<()> {
        let key = discovered_key(&entry.node_id, &entry.pointer_name);
        self.discovered
            .insert(key, encode(&entry)?)
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn list_discovered(&self) -> Result<Vec<DiscoveredEntry>> {
        let mut rows = decode_all(&self.discovered)?;
        sort_discovered(&mut rows);
        Ok(rows)
    }

    fn upsert_published(&self, path: &Path, key: &str) -> Result<PublishedEntry> {
        let entry = PublishedEntry::new(path, key);
        self.published
            .insert(published_key(path), encode(&entry)?)
            .map_err(StorageError::from)?;
        Ok(entry)
    }

    fn get_published(&self, path: &Path) -> Result<Option<PublishedEntry>> {
        let value = self
            .published
            .get(published_key(path))
            .map_err(StorageError::from)?;
        Ok(value.map(|bytes| decode(&bytes)).transpose()?)
    }

    fn list_published(&self) -> Result<Vec<PublishedEntry>> {
        // Sled iterates in key order, which is path order.
        Ok(decode_all(&self.published)?)
    }

    fn delete_published(&self, path: &Path) -> Result<bool> {
        let removed = self
            .published
            .remove(published_key(path))
            .map_err(StorageError::from)?;
        Ok(removed.is_some())
    }
}

/// In-memory testing backend
#[derive(Clone, Default)]
pub struct MemoryStorage {
    discovered: Arc<RwLock<BTreeMap<(String, String), DiscoveredEntry>>>,
    published: Arc<RwLock<BTreeMap<PathBuf, PublishedEntry>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn upsert_discovered(&self, entry: DiscoveredEntry) -> Result<()> {
        self.discovered
            .write()
            .insert((entry.node_id.clone(), entry.pointer_name.clone()), entry);
        Ok(())
    }

    fn list_discovered(&self) -> Result<Vec<DiscoveredEntry>> {
        let mut rows: Vec<_> = self.discovered.read().values().cloned().collect();
        sort_discovered(&mut rows);
        Ok(rows)
    }

    fn upsert_published(&self, path: &Path, key: &str) -> Result<PublishedEntry> {
        let entry = PublishedEntry {
            path: path.to_path_buf(),
            key: key.to_string(),
            added_at: Utc::now(),
        };
        self.published
            .write()
            .insert(path.to_path_buf(), entry.clone());
        Ok(entry)
    }

    fn get_published(&self, path: &Path) -> Result<Option<PublishedEntry>> {
        Ok(self.published.read().get(path).cloned())
    }

    fn list_published(&self) -> Result<Vec<PublishedEntry>> {
        Ok(self.published.read().values().cloned().collect())
    }

    fn delete_published(&self, path: &Path) -> Result<bool> {
        Ok(self.published.write().remove(path).is_some())
    }
}
