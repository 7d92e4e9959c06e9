// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::storage::EncryptedStorage;

/// Per-request context. The storage (and the key inside it) is built once at
/// startup and only shared by reference afterwards.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<EncryptedStorage>,
}

impl AppState {
    pub fn new(storage: EncryptedStorage) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }

    /// Upload cap enforced by the upload handlers.
    pub fn max_upload_bytes(&self) -> u64 {
        self.storage.max_upload_bytes()
    }
}
