use super::backend::BlobStore;
use crate::error::StorageError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// In-memory blob backend for testing.
///
/// Clones share the same blobs, so a test can keep a handle while the store
/// owns another and inspect what was persisted.
#[derive(Clone, Default)]
pub struct MemBackend {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    simulate_write_error: Arc<AtomicBool>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.store(simulate, Ordering::SeqCst);
    }

    /// Test helper to plant raw bytes, e.g. a corrupt blob.
    pub fn insert_raw(&self, key: &str, bytes: Vec<u8>) {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), bytes);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

impl BlobStore for MemBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let blobs = self.blobs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(blobs.get(key).cloned())
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        if self.simulate_write_error.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("Simulated write error".to_string()));
        }
        let mut blobs = self.blobs.lock().unwrap_or_else(PoisonError::into_inner);
        blobs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}
