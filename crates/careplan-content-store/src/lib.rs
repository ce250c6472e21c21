//! Care Plan Content Store
//!
//! Stores attachment blobs under caller-chosen names and hands back the
//! public URL they are served from. The [`BlobStorage`] trait is the
//! contract; [`memory::InMemoryBlobStore`] and [`file::FileBlobStore`]
//! implement it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Debug;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

pub mod file;
pub mod memory;

pub use file::FileBlobStore;
pub use memory::InMemoryBlobStore;

/// URL prefix under which stored blobs are served
pub const PUBLIC_PREFIX: &str = "/uploads";

/// Metadata of a stored blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlob {
    /// Public URL, `/uploads/{name}`
    pub url: String,
    /// Name the blob was stored under
    pub name: String,
    /// Size in bytes
    pub size: usize,
    /// Hex SHA-256 of the content
    pub sha256: String,
}

impl StoredBlob {
    /// Describe `content` stored under `name`
    pub fn describe(name: &str, content: &[u8]) -> Self {
        Self {
            url: public_url(name),
            name: name.to_string(),
            size: content.len(),
            sha256: sha256_hex(content),
        }
    }
}

/// Errors that can occur during blob store operations
#[derive(Error, Debug)]
pub enum BlobStoreError {
    #[error("Invalid blob name: {0}")]
    InvalidName(String),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown storage provider: {0}")]
    UnknownProvider(String),
}

/// Result alias for blob store operations
pub type BlobStoreResult<T> = Result<T, BlobStoreError>;

/// Async storage for named attachment blobs
#[async_trait]
pub trait BlobStorage: Send + Sync + Debug {
    /// Store `content` under `name`, replacing any previous blob
    async fn upload(&self, content: &[u8], name: &str) -> BlobStoreResult<StoredBlob>;

    /// Read back a stored blob
    async fn read(&self, name: &str) -> BlobStoreResult<Vec<u8>>;

    /// Delete a stored blob
    async fn delete(&self, name: &str) -> BlobStoreResult<()>;

    /// Check that the backend is usable
    async fn health_check(&self) -> BlobStoreResult<bool> {
        Ok(true)
    }
}

/// Reject names that are empty, absolute or able to escape the store root
pub fn validate_name(name: &str) -> BlobStoreResult<&str> {
    let invalid = name.trim().is_empty()
        || name.starts_with('/')
        || name.contains('\\')
        || name.contains('\0')
        || name.split('/').any(|segment| segment == ".." || segment == "." || segment.is_empty());

    if invalid {
        return Err(BlobStoreError::InvalidName(name.to_string()));
    }
    Ok(name)
}

/// Public URL of a stored blob
pub fn public_url(name: &str) -> String {
    format!("{}/{}", PUBLIC_PREFIX, name)
}

/// Hex SHA-256 digest
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Storage backend selection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    #[default]
    Memory,
    Filesystem,
}

impl FromStr for StorageProvider {
    type Err = BlobStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageProvider::Memory),
            "filesystem" | "fs" | "local" => Ok(StorageProvider::Filesystem),
            other => Err(BlobStoreError::UnknownProvider(other.to_string())),
        }
    }
}

/// Build the configured backend; `upload_dir` is used by the filesystem one
pub fn create_storage(provider: &StorageProvider, upload_dir: impl Into<PathBuf>) -> Arc<dyn BlobStorage> {
    match provider {
        StorageProvider::Memory => Arc::new(InMemoryBlobStore::new()),
        StorageProvider::Filesystem => Arc::new(FileBlobStore::new(upload_dir)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        for ok in ["report.pdf", "patients/12/xray.png", "a-b_c.txt"] {
            assert!(validate_name(ok).is_ok(), "{} should be accepted", ok);
        }
        for bad in ["", "  ", "/etc/passwd", "../secret", "a/../../b", "a\\b", "a//b", "./x"] {
            assert!(
                matches!(validate_name(bad), Err(BlobStoreError::InvalidName(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_describe() {
        let blob = StoredBlob::describe("notes.txt", b"abc");
        assert_eq!(blob.url, "/uploads/notes.txt");
        assert_eq!(blob.size, 3);
        assert_eq!(
            blob.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("Memory".parse::<StorageProvider>().unwrap(), StorageProvider::Memory);
        assert_eq!("filesystem".parse::<StorageProvider>().unwrap(), StorageProvider::Filesystem);
        assert!("s3".parse::<StorageProvider>().is_err());
    }
}
