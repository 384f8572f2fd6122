use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Label shown for a node's own index pointer.
pub const INDEX_LABEL: &str = "(index)";

/// Where a catalog row came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntrySource {
    /// A local naming key, with the tracked directory if one uses it.
    Local { path: Option<PathBuf> },
    /// Discovered in the index of the given peer.
    Peer(String),
}

impl fmt::Display for EntrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntrySource::Local { path: Some(path) } => write!(f, "local ({})", path.display()),
            EntrySource::Local { path: None } => f.write_str("local"),
            EntrySource::Peer(node_id) => f.write_str(node_id),
        }
    }
}

/// One browsable pointer, local or discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub source: EntrySource,
    pub display_name: String,
    pub pointer_name: String,
    pub pinned: bool,
}
