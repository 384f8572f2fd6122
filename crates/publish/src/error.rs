use peerdex_content::ContentError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("content service error: {0}")]
    Service(#[from] ContentError),

    #[error("state store error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("cannot infer a key name from {}", .0.display())]
    NoKeyName(PathBuf),

    #[error("key name `{0}` is reserved for the discovery index")]
    ReservedKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PublishError>;
