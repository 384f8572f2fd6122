use peerdex_content::ContentError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("content service error: {0}")]
    Service(#[from] ContentError),

    #[error("state store error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;
