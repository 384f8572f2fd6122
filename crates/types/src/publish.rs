use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Why a tracked directory was not published.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeError {
    #[error("naming key not found")]
    NamingKeyNotFound,
    #[error("directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),
    #[error("publish failed: {0}")]
    PublishFailed(String),
}

/// Result of publishing one naming key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub key: String,
    /// Empty when the naming key could not be found.
    pub pointer_name: String,
    pub content_id: Option<String>,
    pub error: Option<OutcomeError>,
}

impl PublishOutcome {
    pub fn success(
        key: impl Into<String>,
        pointer_name: impl Into<String>,
        content_id: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            pointer_name: pointer_name.into(),
            content_id: Some(content_id.into()),
            error: None,
        }
    }

    pub fn failure(
        key: impl Into<String>,
        pointer_name: impl Into<String>,
        error: OutcomeError,
    ) -> Self {
        Self {
            key: key.into(),
            pointer_name: pointer_name.into(),
            content_id: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.content_id.is_some()
    }
}

/// Result of re-publishing the node's discovery index under its self name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexOutcome {
    Published {
        content_id: String,
        node_id: String,
        keys: usize,
    },
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishSummary {
    pub total: usize,
    pub published: usize,
    pub failed: usize,
    /// `None` when the index step was skipped.
    pub index: Option<IndexOutcome>,
}

impl PublishSummary {
    pub fn nothing_to_publish(&self) -> bool {
        self.total == 0
    }
}

/// Progress stream of a publish run, mirroring [`crate::ScanEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishEvent {
    Started { total: usize },
    Outcome(PublishOutcome),
    Index(IndexOutcome),
    Completed(PublishSummary),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_error_messages() {
        assert_eq!(
            OutcomeError::NamingKeyNotFound.to_string(),
            "naming key not found"
        );
        assert_eq!(
            OutcomeError::DirectoryNotFound(PathBuf::from("/srv/blog")).to_string(),
            "directory not found: /srv/blog"
        );
    }

    #[test]
    fn success_requires_content_id() {
        assert!(PublishOutcome::success("blog", "k51blog", "bafyblog").is_success());
        let failed = PublishOutcome::failure("blog", "", OutcomeError::NamingKeyNotFound);
        assert!(!failed.is_success());
        assert!(failed.content_id.is_none());
    }
}
