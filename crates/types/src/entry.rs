use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A naming pointer observed in some peer's index.
///
/// The peer itself is recorded as a self-pointer entry where
/// `pointer_name == node_id` and `display_name` is `None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscoveredEntry {
    pub node_id: String,
    pub pointer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl DiscoveredEntry {
    pub fn new(
        node_id: impl Into<String>,
        pointer_name: impl Into<String>,
        display_name: Option<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            pointer_name: pointer_name.into(),
            display_name,
        }
    }

    /// Entry recording that `node_id` serves an index at all.
    pub fn self_pointer(node_id: impl Into<String>) -> Self {
        let node_id = node_id.into();
        Self {
            pointer_name: node_id.clone(),
            node_id,
            display_name: None,
        }
    }

    pub fn is_self_pointer(&self) -> bool {
        self.node_id == self.pointer_name && self.display_name.is_none()
    }
}

/// A local directory tracked for re-publishing under a naming key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishedEntry {
    /// Absolute directory path; the natural key of the row.
    pub path: PathBuf,
    /// Name of the local naming key the directory is published under.
    pub key: String,
    pub added_at: DateTime<Utc>,
}

impl PublishedEntry {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
            added_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_pointer_uses_node_id_as_pointer() {
        let entry = DiscoveredEntry::self_pointer("12D3KooWpeer");
        assert_eq!(entry.pointer_name, "12D3KooWpeer");
        assert!(entry.display_name.is_none());
        assert!(entry.is_self_pointer());

        let named = DiscoveredEntry::new("12D3KooWpeer", "k51docs", Some("docs".into()));
        assert!(!named.is_self_pointer());
    }

    #[test]
    fn discovered_entry_omits_missing_display_name() {
        let json = serde_json::to_string(&DiscoveredEntry::self_pointer("peer")).unwrap();
        assert_eq!(json, r#"{"node_id":"peer","pointer_name":"peer"}"#);
        let back: DiscoveredEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.display_name, None);
    }
}
