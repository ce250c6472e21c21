use careplan_content_store::{
    create_storage, BlobStorage, BlobStoreError, FileBlobStore, StorageProvider,
};
use tempfile::TempDir;

#[tokio::test]
async fn test_upload_creates_directory_and_file() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("uploads");
    let store = FileBlobStore::new(&root);

    let blob = store.upload(b"lab results", "patients/7/labs.txt").await.unwrap();

    assert_eq!(blob.url, "/uploads/patients/7/labs.txt");
    assert_eq!(blob.size, 11);
    assert_eq!(
        std::fs::read(root.join("patients/7/labs.txt")).unwrap(),
        b"lab results".to_vec()
    );
}

#[tokio::test]
async fn test_read_and_delete() {
    let dir = TempDir::new().unwrap();
    let store = FileBlobStore::new(dir.path());

    store.upload(b"pdf bytes", "referral.pdf").await.unwrap();
    assert_eq!(store.read("referral.pdf").await.unwrap(), b"pdf bytes".to_vec());

    store.delete("referral.pdf").await.unwrap();
    assert!(matches!(
        store.read("referral.pdf").await,
        Err(BlobStoreError::NotFound(_))
    ));
    assert!(matches!(
        store.delete("referral.pdf").await,
        Err(BlobStoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_traversal_never_touches_disk() {
    let dir = TempDir::new().unwrap();
    let store = FileBlobStore::new(dir.path().join("root"));

    let err = store.upload(b"x", "../escape.txt").await.unwrap_err();
    assert!(matches!(err, BlobStoreError::InvalidName(_)));
    assert!(!dir.path().join("escape.txt").exists());
}

#[tokio::test]
async fn test_health_check_before_first_upload() {
    let dir = TempDir::new().unwrap();
    let store = FileBlobStore::new(dir.path().join("not-yet"));
    assert!(store.health_check().await.unwrap());
}

#[tokio::test]
async fn test_create_storage_selects_backend() {
    let dir = TempDir::new().unwrap();

    let fs_store = create_storage(&StorageProvider::Filesystem, dir.path());
    fs_store.upload(b"1", "one.txt").await.unwrap();
    assert!(dir.path().join("one.txt").exists());

    let mem_store = create_storage(&StorageProvider::Memory, dir.path());
    mem_store.upload(b"2", "two.txt").await.unwrap();
    assert!(!dir.path().join("two.txt").exists());
}
