use crate::error::StorageError;

/// Abstract interface for raw blob I/O.
///
/// The backend only knows how to keep named byte blobs; [`PageStore`](super::sqlite::PageStore)
/// decides what goes in them. Implementations must be `Send` so the store can be
/// handed to the background writer.
pub trait BlobStore: Send {
    /// Read a blob.
    /// Returns Ok(None) if nothing was ever written under `key`.
    /// Returns Err only on actual I/O errors (permissions, disk failure).
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replace a blob.
    /// MUST be atomic (e.g. write to tmp then rename): readers see the old
    /// bytes or the new bytes, never a mix.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;
}
