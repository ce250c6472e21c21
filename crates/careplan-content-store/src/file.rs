//! Filesystem implementation of BlobStorage
//!
//! Blobs are written under a root directory, created on first upload.

use crate::{validate_name, BlobStorage, BlobStoreError, BlobStoreResult, StoredBlob};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Filesystem implementation of BlobStorage
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    /// Create a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> BlobStoreResult<PathBuf> {
        Ok(self.root.join(validate_name(name)?))
    }
}

fn not_found(name: &str, e: std::io::Error) -> BlobStoreError {
    if e.kind() == ErrorKind::NotFound {
        BlobStoreError::NotFound(name.to_string())
    } else {
        BlobStoreError::Io(e)
    }
}

#[async_trait]
impl BlobStorage for FileBlobStore {
    async fn upload(&self, content: &[u8], name: &str) -> BlobStoreResult<StoredBlob> {
        let path = self.path_for(name)?;

        if let Some(parent) = path.parent() {
            if !fs::try_exists(parent).await? {
                fs::create_dir_all(parent).await?;
                info!(dir = %parent.display(), "Created upload directory");
            }
        }

        fs::write(&path, content).await?;

        let blob = StoredBlob::describe(name, content);
        debug!(path = %path.display(), size = blob.size, "Stored blob on disk");
        Ok(blob)
    }

    async fn read(&self, name: &str) -> BlobStoreResult<Vec<u8>> {
        let path = self.path_for(name)?;
        fs::read(&path).await.map_err(|e| not_found(name, e))
    }

    async fn delete(&self, name: &str) -> BlobStoreResult<()> {
        let path = self.path_for(name)?;
        fs::remove_file(&path).await.map_err(|e| not_found(name, e))
    }

    async fn health_check(&self) -> BlobStoreResult<bool> {
        match fs::metadata(&self.root).await {
            Ok(meta) => Ok(meta.is_dir()),
            // Created lazily on first upload
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
            Err(e) => Err(BlobStoreError::Io(e)),
        }
    }
}
