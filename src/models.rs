// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response structures used by the REST API. Response types
//! derive `Serialize` and `ToSchema` for JSON handling and OpenAPI
//! documentation.
//!
//! ## Model Categories
//!
//! - **Objects**: catalog entries describing stored files
//! - **Uploads**: multipart form and upload acknowledgement
//! - **Downloads / Deletes**: query options and acknowledgements

use std::fs::Metadata;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// =============================================================================
// Object Models
// =============================================================================

/// A persisted object as seen through the catalog.
///
/// The storage name is the only identity; the name the file was uploaded
/// under is not retained anywhere.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredObject {
    /// Obfuscated storage name (`<24 hex chars>.<extension>`).
    pub name: String,
    /// Size of the at-rest payload in bytes (IV + ciphertext).
    pub size: u64,
    /// Last modification time reported by the filesystem.
    #[serde(rename = "uploadDate")]
    pub upload_date: DateTime<Utc>,
}

impl StoredObject {
    /// Build a catalog entry from filesystem metadata.
    pub fn from_metadata(name: impl Into<String>, metadata: &Metadata) -> Self {
        let upload_date = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_default();
        Self {
            name: name.into(),
            size: metadata.len(),
            upload_date,
        }
    }
}

// =============================================================================
// Upload Models
// =============================================================================

/// Multipart form accepted by the upload endpoints.
#[derive(ToSchema)]
pub struct UploadForm {
    /// File content; the part's filename supplies the extension.
    #[schema(value_type = String, format = Binary, rename = "uploadFile")]
    pub upload_file: Vec<u8>,
}

/// Acknowledgement of a successful upload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    /// Storage name to use for download and delete.
    pub filename: String,
}

// =============================================================================
// Download / Delete Models
// =============================================================================

/// Options for `GET /download/{filename}`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DownloadQuery {
    /// Return decrypted plaintext instead of the at-rest payload.
    #[serde(default)]
    pub decrypt: bool,
}

/// Acknowledgement of a successful delete.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}
