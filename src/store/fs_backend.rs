use super::backend::BlobStore;
use crate::error::StorageError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Keeps each blob as a file under a root directory.
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn blob_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn ensure_dir(&self) -> Result<(), StorageError> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root)?;
        }
        Ok(())
    }
}

impl BlobStore for FsBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.blob_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.ensure_dir()?;

        // Atomic write
        let tmp_file = self.root.join(format!(".{}-{}.tmp", key, Uuid::new_v4()));
        fs::write(&tmp_file, bytes)?;
        if let Err(e) = fs::rename(&tmp_file, self.blob_path(key)) {
            let _ = fs::remove_file(&tmp_file);
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn put_creates_root_and_get_reads_back() {
        let dir = TempDir::new().unwrap();
        let backend = FsBackend::new(dir.path().join("nested"));

        assert!(backend.get("blob").unwrap().is_none());
        backend.put("blob", b"hello").unwrap();
        assert_eq!(backend.get("blob").unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn put_replaces_and_leaves_no_tmp_files() {
        let dir = TempDir::new().unwrap();
        let backend = FsBackend::new(dir.path());

        backend.put("blob", b"one").unwrap();
        backend.put("blob", b"two").unwrap();

        assert_eq!(backend.get("blob").unwrap(), Some(b"two".to_vec()));
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
