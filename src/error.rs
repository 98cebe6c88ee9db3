use crate::model::{BlockId, PageId};
use thiserror::Error;

/// Failures of the durable storage path.
///
/// Always non-fatal for a running session: the in-memory document stays
/// authoritative and the next save retries.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum FolioError {
    #[error("Page not found: {0}")]
    PageNotFound(PageId),

    #[error("Block {block} not found in page {page}")]
    BlockNotFound { page: PageId, block: BlockId },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid block payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, FolioError>;
