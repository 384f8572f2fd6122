//! Error types for the content service adapter

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("ipfs binary is not installed")]
    NotInstalled,

    #[error("ipfs daemon did not become ready within {0:?}")]
    DaemonStartup(Duration),

    #[error("`{command}` exited with {}: {stderr}", code.map(|c| c.to_string()).unwrap_or_else(|| "signal".into()))]
    ProcessFailure {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("`{command}` timed out after {after:?}")]
    Timeout { command: String, after: Duration },

    #[error("unexpected output: {0}")]
    ParseFailure(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContentError {
    /// Failures that make the whole service unusable rather than one call.
    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, ContentError::NotInstalled | ContentError::DaemonStartup(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ContentError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, ContentError>;
