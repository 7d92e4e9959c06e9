// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the storage directory layout.
//!
//! ```text
//! {root}/
//!   {token}.{ext}      # one EncryptedPayload per stored object
//!   .staging/
//!     {uuid}.part      # in-flight writes, never listed
//! ```

use std::path::{Path, PathBuf};

use super::naming::validate_storage_name;
use super::StorageResult;

/// Default storage directory, relative to the working directory.
pub const DEFAULT_DATA_ROOT: &str = "./uploads";

/// Hidden subdirectory holding partially written objects.
pub const STAGING_DIR: &str = ".staging";

/// Storage path utilities.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root of the storage directory. Doubles as the catalog.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a stored object. Rejects names that would escape the root.
    pub fn object(&self, storage_name: &str) -> StorageResult<PathBuf> {
        validate_storage_name(storage_name)?;
        Ok(self.root.join(storage_name))
    }

    /// Directory for in-flight writes.
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    /// Fresh staging file path.
    pub fn staging_file(&self) -> PathBuf {
        self.staging_dir()
            .join(format!("{}.part", uuid::Uuid::new_v4()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    #[test]
    fn default_paths_use_uploads_dir() {
        let paths = StoragePaths::default();
        assert_eq!(paths.root(), Path::new("./uploads"));
    }

    #[test]
    fn object_paths_stay_inside_root() {
        let paths = StoragePaths::new("/tmp/test-data");
        assert_eq!(
            paths.object("0123456789abcdef01234567.txt").unwrap(),
            PathBuf::from("/tmp/test-data/0123456789abcdef01234567.txt")
        );
        assert!(matches!(
            paths.object("../../etc/passwd"),
            Err(StorageError::Validation(_))
        ));
        assert!(matches!(
            paths.object(STAGING_DIR),
            Err(StorageError::Validation(_))
        ));
    }

    #[test]
    fn staging_files_are_unique_and_hidden() {
        let paths = StoragePaths::new("/tmp/test-data");
        let a = paths.staging_file();
        let b = paths.staging_file();
        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(paths.staging_dir().as_path()));
        assert_eq!(paths.staging_dir(), PathBuf::from("/tmp/test-data/.staging"));
    }
}
