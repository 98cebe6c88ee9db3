//! # Storage Layer
//!
//! This module defines the persistence abstraction for folio. The [`DataStore`]
//! trait lets the workspace work against different stores; production uses
//! [`PageStore`] (optionally behind the background [`Autosaver`]).
//!
//! ## Two Layers
//!
//! 1. **Relational snapshot**: [`PageStore`] denormalizes pages into a `pages`
//!    relation and a `blocks` relation inside an SQLite database.
//! 2. **Blob substrate**: after every save the whole database is serialized to a
//!    single byte blob and handed to a [`BlobStore`] under a fixed key. The blob
//!    store is the only durable primitive: `get(key)` and `put(key, bytes)`.
//!
//! ## Full-Rewrite Saves
//!
//! A save is never incremental. Inside one transaction both relations are
//! cleared and the complete model is re-inserted. Block order is written as an
//! explicit `sort_order` column (the block's index in its page at save time) and
//! is the only thing `load` uses to rebuild the order.
//!
//! ## Failure Semantics
//!
//! - A failed save leaves the caller's in-memory model untouched; the next save
//!   retries with the complete state.
//! - A missing blob means a fresh, empty schema.
//! - A corrupt or unreadable blob is logged and replaced by a fresh, empty schema
//!   instead of failing the open.
//!
//! ## Storage Layout
//!
//! ```text
//! <data dir>/
//! ├── folio.toml          # Optional configuration
//! └── workspace.sqlite    # Relational snapshot blob
//! ```
//!
//! ## Implementations
//!
//! - [`fs_backend::FsBackend`]: blobs as files, atomic tmp + rename writes.
//! - [`mem_backend::MemBackend`]: blobs in memory, for tests.

use crate::error::StorageError;
use crate::model::Page;

pub mod autosave;
pub mod backend;
pub mod fs_backend;
pub mod mem_backend;
pub mod sqlite;

pub use autosave::Autosaver;
pub use backend::BlobStore;
pub use fs_backend::FsBackend;
pub use mem_backend::MemBackend;
pub use sqlite::PageStore;

/// Abstract interface for page persistence.
pub trait DataStore {
    /// Replace everything persisted with `pages`.
    fn save(&mut self, pages: &[Page]) -> Result<(), StorageError>;

    /// All persisted pages, most recently updated first.
    fn load(&mut self) -> Result<Vec<Page>, StorageError>;

    /// The current durable snapshot, as stored in the blob backend.
    fn export_blob(&mut self) -> Result<Vec<u8>, StorageError>;

    /// Block until every accepted save has reached durable storage.
    fn flush(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}
