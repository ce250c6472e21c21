//! In-memory implementation of BlobStorage
//!
//! Intended for tests and development. All data is lost when the instance
//! is dropped.

use crate::{validate_name, BlobStorage, BlobStoreError, BlobStoreResult, StoredBlob};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory implementation of BlobStorage
#[derive(Debug, Clone, Default)]
pub struct InMemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryBlobStore {
    /// Create a new in-memory blob store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    /// True when nothing is stored
    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStorage for InMemoryBlobStore {
    async fn upload(&self, content: &[u8], name: &str) -> BlobStoreResult<StoredBlob> {
        let name = validate_name(name)?;
        let blob = StoredBlob::describe(name, content);

        self.blobs
            .write()
            .await
            .insert(name.to_string(), content.to_vec());

        debug!(name, size = blob.size, "Stored blob in memory");
        Ok(blob)
    }

    async fn read(&self, name: &str) -> BlobStoreResult<Vec<u8>> {
        let name = validate_name(name)?;
        self.blobs
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| BlobStoreError::NotFound(name.to_string()))
    }

    async fn delete(&self, name: &str) -> BlobStoreResult<()> {
        let name = validate_name(name)?;
        match self.blobs.write().await.remove(name) {
            Some(_) => Ok(()),
            None => Err(BlobStoreError::NotFound(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_read_delete() {
        let store = InMemoryBlobStore::new();

        let blob = store.upload(b"scan", "xray.png").await.unwrap();
        assert_eq!(blob.url, "/uploads/xray.png");
        assert_eq!(store.read("xray.png").await.unwrap(), b"scan".to_vec());

        store.delete("xray.png").await.unwrap();
        assert!(matches!(
            store.read("xray.png").await,
            Err(BlobStoreError::NotFound(_))
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_upload_replaces_existing() {
        let store = InMemoryBlobStore::new();
        store.upload(b"v1", "a.txt").await.unwrap();
        store.upload(b"v2", "a.txt").await.unwrap();

        assert_eq!(store.read("a.txt").await.unwrap(), b"v2".to_vec());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let store = InMemoryBlobStore::new();
        assert!(matches!(
            store.upload(b"x", "../x").await,
            Err(BlobStoreError::InvalidName(_))
        ));
    }
}
