// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Encrypted object storage on a flat directory.
//!
//! The directory listing is the catalog: an object exists exactly when a
//! regular file with its storage name exists under the root. Payloads are
//! written through a hidden staging directory and hard-linked into place, so
//! a reader never observes a partial object and an existing object is never
//! overwritten.
//!
//! Encryption and decryption run on the blocking pool; file I/O goes
//! through `tokio::fs`.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::cipher::{CipherEngine, CryptoError};
use super::naming;
use super::StoragePaths;
use crate::models::StoredObject;

/// Error type for storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Malformed or missing input; nothing was touched on disk.
    #[error("{0}")]
    Validation(String),
    /// No object with that storage name.
    #[error("File not found: {0}")]
    NotFound(String),
    /// Upload larger than the configured cap.
    #[error("File size exceeds maximum limit of {limit} bytes")]
    SizeLimitExceeded { limit: u64 },
    /// Generated storage name already taken.
    #[error("Storage name collision: {0}")]
    Collision(String),
    /// Filesystem failure while creating or removing an object.
    #[error("Storage write failed: {0}")]
    Write(#[source] io::Error),
    /// Filesystem failure while reading the catalog or an object.
    #[error("Storage read failed: {0}")]
    Read(#[source] io::Error),
    /// Payload could not be decrypted with the current key.
    #[error("Decryption failed: {0}")]
    Decryption(#[source] CryptoError),
    /// Encryption or randomness failure.
    #[error("Encryption failed: {0}")]
    Crypto(#[from] CryptoError),
    /// Blocking crypto task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Removes a staging file on drop unless it was already cleaned up.
///
/// Covers requests cancelled mid-write as well as error paths.
struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    error = %e,
                    path = %self.path.display(),
                    "Failed to remove staging file"
                );
            }
        }
    }
}

/// An object opened for streaming its at-rest bytes.
#[derive(Debug)]
pub struct RawObject {
    pub file: File,
    pub size: u64,
}

/// Encrypted storage manager.
///
/// Cheap to clone; the cipher engine is shared.
#[derive(Debug, Clone)]
pub struct EncryptedStorage {
    paths: StoragePaths,
    cipher: Arc<CipherEngine>,
    max_upload_bytes: u64,
}

impl EncryptedStorage {
    /// Create a new EncryptedStorage instance.
    ///
    /// Does NOT create the directory structure. Call `initialize()` first.
    pub fn new(paths: StoragePaths, cipher: CipherEngine, max_upload_bytes: u64) -> Self {
        Self {
            paths,
            cipher: Arc::new(cipher),
            max_upload_bytes,
        }
    }

    /// Get the storage paths.
    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Largest plaintext accepted by [`ingest`](Self::ingest).
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Create the storage and staging directories and purge staging files
    /// left behind by an earlier process.
    ///
    /// Safe to call multiple times (idempotent).
    pub async fn initialize(&self) -> StorageResult<()> {
        let staging = self.paths.staging_dir();
        fs::create_dir_all(&staging)
            .await
            .map_err(StorageError::Write)?;

        let mut entries = fs::read_dir(&staging).await.map_err(StorageError::Read)?;
        let mut purged = 0usize;
        while let Some(entry) = entries.next_entry().await.map_err(StorageError::Read)? {
            match fs::remove_file(entry.path()).await {
                Ok(()) => purged += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::Write(e)),
            }
        }
        if purged > 0 {
            tracing::info!(purged, "Removed stale staging files");
        }
        Ok(())
    }

    /// Check that the storage directory is present.
    pub async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(self.paths.root())
            .await
            .map_err(StorageError::Read)?;
        if !metadata.is_dir() {
            return Err(StorageError::Read(io::Error::other(
                "storage root is not a directory",
            )));
        }
        Ok(())
    }

    /// Reject sizes above the upload cap.
    pub fn check_size(&self, size: u64) -> StorageResult<()> {
        if size > self.max_upload_bytes {
            return Err(StorageError::SizeLimitExceeded {
                limit: self.max_upload_bytes,
            });
        }
        Ok(())
    }

    // ========== Ingest ==========

    /// Encrypt `plaintext` and persist it under a fresh storage name.
    pub async fn ingest(&self, original_name: &str, plaintext: Vec<u8>) -> StorageResult<StoredObject> {
        if original_name.trim().is_empty() {
            return Err(StorageError::Validation("File name is required".to_string()));
        }
        self.check_size(plaintext.len() as u64)?;

        let storage_name = naming::obfuscate(original_name)?;
        let target = self.paths.object(&storage_name)?;

        let cipher = Arc::clone(&self.cipher);
        let payload = tokio::task::spawn_blocking(move || cipher.encrypt(&plaintext))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))??;

        self.write_new(&target, &storage_name, &payload).await?;

        let metadata = fs::metadata(&target).await.map_err(StorageError::Read)?;
        tracing::debug!(
            original_name,
            storage_name = %storage_name,
            size = metadata.len(),
            "Stored object"
        );
        Ok(StoredObject::from_metadata(storage_name, &metadata))
    }

    /// Write `payload` to a staging file, then link it to `target`.
    ///
    /// Fails with [`StorageError::Collision`] if `target` already exists.
    async fn write_new(&self, target: &Path, storage_name: &str, payload: &[u8]) -> StorageResult<()> {
        let staged = StagedFile {
            path: self.paths.staging_file(),
        };

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(staged.path())
            .await
            .map_err(StorageError::Write)?;
        file.write_all(payload).await.map_err(StorageError::Write)?;
        file.flush().await.map_err(StorageError::Write)?;
        file.sync_all().await.map_err(StorageError::Write)?;
        drop(file);

        match fs::hard_link(staged.path(), target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(StorageError::Collision(storage_name.to_string()))
            }
            Err(e) => Err(StorageError::Write(e)),
        }
    }

    // ========== Catalog ==========

    /// Enumerate stored objects in directory order.
    ///
    /// Metadata is read per entry at call time. Entries that vanish or cannot
    /// be inspected are skipped; only an unreadable root fails the call.
    pub async fn list_objects(&self) -> StorageResult<Vec<StoredObject>> {
        let mut entries = fs::read_dir(self.paths.root())
            .await
            .map_err(StorageError::Read)?;

        let mut objects = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Directory enumeration stopped early");
                    break;
                }
            };

            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!(path = %entry.path().display(), "Skipping non UTF-8 entry");
                continue;
            };
            if naming::validate_storage_name(&name).is_err() {
                continue;
            }

            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!(storage_name = %name, "Entry vanished during listing");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(error = %e, storage_name = %name, "Skipping unreadable entry");
                    continue;
                }
            };
            if metadata.is_file() {
                objects.push(StoredObject::from_metadata(name, &metadata));
            }
        }
        Ok(objects)
    }

    // ========== Retrieval / Deletion ==========

    /// Open an object for streaming its at-rest bytes.
    pub async fn open_raw(&self, storage_name: &str) -> StorageResult<RawObject> {
        let path = self.paths.object(storage_name)?;
        let file = File::open(&path)
            .await
            .map_err(|e| not_found_or(e, storage_name, StorageError::Read))?;
        let metadata = file.metadata().await.map_err(StorageError::Read)?;
        if !metadata.is_file() {
            return Err(StorageError::NotFound(storage_name.to_string()));
        }
        Ok(RawObject {
            file,
            size: metadata.len(),
        })
    }

    /// Read the at-rest bytes of an object.
    pub async fn read_raw(&self, storage_name: &str) -> StorageResult<Vec<u8>> {
        let path = self.paths.object(storage_name)?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| not_found_or(e, storage_name, StorageError::Read))?;
        if !metadata.is_file() {
            return Err(StorageError::NotFound(storage_name.to_string()));
        }
        fs::read(&path)
            .await
            .map_err(|e| not_found_or(e, storage_name, StorageError::Read))
    }

    /// Read and decrypt an object.
    pub async fn read_plaintext(&self, storage_name: &str) -> StorageResult<Vec<u8>> {
        let payload = self.read_raw(storage_name).await?;
        let cipher = Arc::clone(&self.cipher);
        tokio::task::spawn_blocking(move || cipher.decrypt(&payload))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?
            .map_err(StorageError::Decryption)
    }

    /// Remove an object.
    ///
    /// A file that disappears before the unlink (for example a concurrent
    /// delete) is reported as [`StorageError::NotFound`].
    pub async fn delete(&self, storage_name: &str) -> StorageResult<()> {
        let path = self.paths.object(storage_name)?;
        fs::remove_file(&path)
            .await
            .map_err(|e| not_found_or(e, storage_name, StorageError::Write))?;
        tracing::debug!(storage_name, "Deleted object");
        Ok(())
    }
}

fn not_found_or(
    e: io::Error,
    storage_name: &str,
    other: fn(io::Error) -> StorageError,
) -> StorageError {
    if e.kind() == io::ErrorKind::NotFound {
        StorageError::NotFound(storage_name.to_string())
    } else {
        other(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::cipher::{payload_len, EncryptionKey, IV_LEN, KEY_LEN};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    const MAX: u64 = 1024;

    async fn test_storage() -> (TempDir, EncryptedStorage) {
        storage_with_cap(MAX).await
    }

    async fn storage_with_cap(cap: u64) -> (TempDir, EncryptedStorage) {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = EncryptedStorage::new(
            StoragePaths::new(dir.path()),
            CipherEngine::new(EncryptionKey::from_bytes([3u8; KEY_LEN])),
            cap,
        );
        storage.initialize().await.expect("Failed to initialize test storage");
        (dir, storage)
    }

    fn staged_count(storage: &EncryptedStorage) -> usize {
        std::fs::read_dir(storage.paths().staging_dir()).unwrap().count()
    }

    fn names(objects: &[StoredObject]) -> BTreeSet<String> {
        objects.iter().map(|o| o.name.clone()).collect()
    }

    #[tokio::test]
    async fn initialize_creates_directories_and_purges_staging() {
        let (_dir, storage) = test_storage().await;
        let stale = storage.paths().staging_file();
        std::fs::write(&stale, b"partial").unwrap();

        storage.initialize().await.unwrap();

        assert!(storage.paths().staging_dir().is_dir());
        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn ingest_writes_encrypted_payload() {
        let (_dir, storage) = test_storage().await;

        let object = storage.ingest("hello.txt", b"hi".to_vec()).await.unwrap();

        assert!(object.name.ends_with(".txt"));
        assert_eq!(object.name.len(), 24 + ".txt".len());
        assert_eq!(object.size, payload_len(2) as u64);

        let raw = storage.read_raw(&object.name).await.unwrap();
        assert_eq!(raw.len() as u64, object.size);
        assert_ne!(&raw[IV_LEN..], b"hi");
        assert_eq!(storage.read_plaintext(&object.name).await.unwrap(), b"hi");
    }

    #[tokio::test]
    async fn ingest_leaves_staging_empty() {
        let (_dir, storage) = test_storage().await;
        storage.ingest("a.bin", vec![1, 2, 3]).await.unwrap();

        assert_eq!(staged_count(&storage), 0);
    }

    #[test]
    fn staged_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending.part");
        std::fs::write(&path, b"partial payload").unwrap();

        drop(StagedFile { path: path.clone() });

        assert!(!path.exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancelled_ingest_leaves_nothing_behind() {
        const CAP: u64 = 16 * 1024 * 1024;
        let (_dir, storage) = storage_with_cap(CAP).await;

        for i in 0..8 {
            let storage_task = storage.clone();
            let task = tokio::spawn(async move {
                storage_task
                    .ingest(&format!("big-{i}.bin"), vec![7u8; 8 * 1024 * 1024])
                    .await
            });
            task.abort();
            let err = task.await.unwrap_err();
            assert!(err.is_cancelled());
        }

        assert_eq!(staged_count(&storage), 0);
        assert!(storage.list_objects().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ingest_rejects_empty_name() {
        let (_dir, storage) = test_storage().await;
        let result = storage.ingest("  ", b"data".to_vec()).await;
        assert!(matches!(result, Err(StorageError::Validation(_))));
        assert!(storage.list_objects().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ingest_accepts_cap_and_rejects_cap_plus_one() {
        let (_dir, storage) = test_storage().await;

        let result = storage.ingest("big.bin", vec![0u8; MAX as usize + 1]).await;
        assert!(matches!(result, Err(StorageError::SizeLimitExceeded { limit: MAX })));
        assert!(storage.list_objects().await.unwrap().is_empty());

        storage.ingest("max.bin", vec![0u8; MAX as usize]).await.unwrap();
        assert_eq!(storage.list_objects().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn write_new_refuses_to_overwrite() {
        let (_dir, storage) = test_storage().await;
        let object = storage.ingest("first.txt", b"one".to_vec()).await.unwrap();
        let before = storage.read_raw(&object.name).await.unwrap();

        let target = storage.paths().object(&object.name).unwrap();
        let result = storage.write_new(&target, &object.name, b"clobber").await;

        assert!(matches!(result, Err(StorageError::Collision(_))));
        assert_eq!(storage.read_raw(&object.name).await.unwrap(), before);
        assert_eq!(staged_count(&storage), 0);
    }

    #[tokio::test]
    async fn listing_is_stable_and_skips_internal_entries() {
        let (_dir, storage) = test_storage().await;
        let a = storage.ingest("a.txt", b"a".to_vec()).await.unwrap();
        let b = storage.ingest("b.md", b"bb".to_vec()).await.unwrap();
        std::fs::write(storage.paths().root().join(".hidden"), b"x").unwrap();
        std::fs::create_dir(storage.paths().root().join("subdir")).unwrap();

        let first = storage.list_objects().await.unwrap();
        let second = storage.list_objects().await.unwrap();

        let expected: BTreeSet<String> = [a.name, b.name].into_iter().collect();
        assert_eq!(names(&first), expected);
        assert_eq!(names(&second), expected);
    }

    #[tokio::test]
    async fn delete_then_read_is_not_found() {
        let (_dir, storage) = test_storage().await;
        let object = storage.ingest("gone.txt", b"bye".to_vec()).await.unwrap();

        storage.delete(&object.name).await.unwrap();

        assert!(matches!(
            storage.read_raw(&object.name).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.open_raw(&object.name).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.delete(&object.name).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(storage.list_objects().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn traversal_names_are_rejected_before_io() {
        let (dir, storage) = test_storage().await;
        let sibling = dir.path().parent().unwrap().join("secret");
        let sibling_existed = sibling.exists();

        assert!(matches!(
            storage.read_raw("../../etc/passwd").await,
            Err(StorageError::Validation(_))
        ));
        assert!(matches!(
            storage.delete("../secret").await,
            Err(StorageError::Validation(_))
        ));
        assert!(matches!(
            storage.open_raw(".staging").await,
            Err(StorageError::Validation(_))
        ));
        assert_eq!(sibling.exists(), sibling_existed);
    }

    #[tokio::test]
    async fn directory_is_not_an_object() {
        let (_dir, storage) = test_storage().await;
        std::fs::create_dir(storage.paths().root().join("folder.txt")).unwrap();

        assert!(matches!(
            storage.read_raw("folder.txt").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.open_raw("folder.txt").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn open_raw_reports_payload_size() {
        let (_dir, storage) = test_storage().await;
        let object = storage.ingest("doc.pdf", vec![42u8; 100]).await.unwrap();

        let raw = storage.open_raw(&object.name).await.unwrap();
        assert_eq!(raw.size, object.size);
        assert_eq!(raw.size, payload_len(100) as u64);
    }

    #[tokio::test]
    async fn corrupted_payload_fails_decryption() {
        let (_dir, storage) = test_storage().await;
        let object = storage.ingest("c.bin", b"content".to_vec()).await.unwrap();
        let path = storage.paths().object(&object.name).unwrap();
        std::fs::write(&path, vec![0u8; 7]).unwrap();

        assert!(matches!(
            storage.read_plaintext(&object.name).await,
            Err(StorageError::Decryption(_))
        ));
    }

    #[tokio::test]
    async fn health_check_requires_root_directory() {
        let (dir, storage) = test_storage().await;
        storage.health_check().await.expect("healthy");

        drop(dir);
        assert!(matches!(
            storage.health_check().await,
            Err(StorageError::Read(_))
        ));
    }
}
