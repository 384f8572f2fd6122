//! The index document a node serves at `/ipns/<node_id>/index.json`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// File name of the index document inside a published index directory.
pub const INDEX_FILE_NAME: &str = "index.json";

#[derive(Debug, Error)]
pub enum IndexDocumentError {
    #[error("index document is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("malformed index document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Mapping of display name to naming pointer advertised by a node.
///
/// Only the `"ipns"` top-level key is recognized. Unknown keys are ignored and
/// a missing `"ipns"` key reads as an empty map.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerIndexDocument {
    #[serde(default)]
    pub ipns: BTreeMap<String, String>,
}

impl PeerIndexDocument {
    pub fn new(ipns: BTreeMap<String, String>) -> Self {
        Self { ipns }
    }

    /// Parse raw bytes fetched from a peer.
    pub fn parse(raw: &[u8]) -> Result<Self, IndexDocumentError> {
        let text = std::str::from_utf8(raw)?;
        Ok(serde_json::from_str(text)?)
    }

    /// Pretty-printed JSON, as written into a published index directory.
    pub fn to_json_pretty(&self) -> Result<String, IndexDocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn is_empty(&self) -> bool {
        self.ipns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ipns.len()
    }
}
