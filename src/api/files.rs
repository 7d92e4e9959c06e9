// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File storage endpoints.
//!
//! Uploads are encrypted and stored under an obfuscated name; every other
//! endpoint addresses objects by that storage name only.

use axum::{
    body::Body,
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, Path, Query, State,
    },
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
        StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use tokio_util::io::ReaderStream;
use tracing::info;

use crate::{
    error::{ApiError, ErrorResponse},
    models::{DeleteResponse, DownloadQuery, StoredObject, UploadForm, UploadResponse},
    state::AppState,
    storage::StorageError,
};

/// Multipart field that carries the uploaded file.
pub const UPLOAD_FIELD: &str = "uploadFile";

const OCTET_STREAM: &str = "application/octet-stream";

fn multipart_error(err: MultipartError, limit: u64) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        StorageError::SizeLimitExceeded { limit }.into()
    } else {
        ApiError::bad_request(err.body_text())
    }
}

/// Read a multipart field, failing as soon as it grows past `limit`.
async fn read_field(field: &mut Field<'_>, limit: u64) -> Result<Vec<u8>, ApiError> {
    let mut data = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if (data.len() + chunk.len()) as u64 > limit {
            return Err(StorageError::SizeLimitExceeded { limit }.into());
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

/// Upload a file.
///
/// The file is encrypted at rest and stored under a random name that keeps
/// only the original extension. The returned `filename` is the only handle
/// to the object; the original name is not retained.
#[utoipa::path(
    post,
    path = "/upload",
    tag = "Files",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "No file, bad name or file too large", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart =
        multipart.map_err(|_| ApiError::bad_request("No files were uploaded"))?;
    let limit = state.max_upload_bytes();

    let mut saw_other_file = false;
    let mut upload = None;
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        // Browsers send an empty file input as a part with `filename=""`.
        let Some(file_name) = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
        else {
            continue;
        };
        if field.name() != Some(UPLOAD_FIELD) {
            saw_other_file = true;
            continue;
        }
        let data = read_field(&mut field, limit).await?;
        upload = Some((file_name, data));
        break;
    }

    let Some((file_name, data)) = upload else {
        let message = if saw_other_file {
            format!("No file with name '{UPLOAD_FIELD}' found")
        } else {
            "No files were uploaded".to_string()
        };
        return Err(ApiError::bad_request(message));
    };

    let object = state.storage.ingest(&file_name, data).await?;
    info!(
        storage_name = %object.name,
        size = object.size,
        "File uploaded successfully"
    );

    Ok(Json(UploadResponse {
        success: true,
        message: "File uploaded successfully!".to_string(),
        filename: object.name,
    }))
}

/// Upload a file (alias of `/upload`).
#[utoipa::path(
    post,
    path = "/submitData",
    tag = "Files",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "No file, bad name or file too large", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub async fn submit_data(
    state: State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    upload_file(state, multipart).await
}

/// List stored files, sorted by storage name.
#[utoipa::path(
    get,
    path = "/files",
    tag = "Files",
    responses(
        (status = 200, description = "Stored objects", body = [StoredObject]),
        (status = 500, description = "Storage directory unreadable", body = ErrorResponse)
    )
)]
pub async fn list_files(State(state): State<AppState>) -> Result<Json<Vec<StoredObject>>, ApiError> {
    let mut objects = state.storage.list_objects().await?;
    objects.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(objects))
}

fn attachment(filename: &str) -> String {
    format!(
        "attachment; filename=\"{}\"",
        filename.replace('\\', "\\\\").replace('"', "\\\"")
    )
}

/// Download a stored file.
///
/// By default the at-rest payload (IV followed by ciphertext) is streamed
/// unchanged. With `decrypt=true` the plaintext is returned instead.
#[utoipa::path(
    get,
    path = "/download/{filename}",
    tag = "Files",
    params(
        ("filename" = String, Path, description = "Storage name returned by upload"),
        DownloadQuery
    ),
    responses(
        (status = 200, description = "File content (application/octet-stream)"),
        (status = 400, description = "Invalid file name", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse),
        (status = 500, description = "Read or decryption failure", body = ErrorResponse)
    )
)]
pub async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    if query.decrypt {
        let plaintext = state.storage.read_plaintext(&filename).await?;
        return Ok((
            [
                (CONTENT_TYPE, OCTET_STREAM.to_string()),
                (CONTENT_DISPOSITION, attachment(&filename)),
            ],
            plaintext,
        )
            .into_response());
    }

    let raw = state.storage.open_raw(&filename).await?;
    let body = Body::from_stream(ReaderStream::new(raw.file));
    Ok((
        [
            (CONTENT_TYPE, OCTET_STREAM.to_string()),
            (CONTENT_DISPOSITION, attachment(&filename)),
            (CONTENT_LENGTH, raw.size.to_string()),
        ],
        body,
    )
        .into_response())
}

/// Delete a stored file.
#[utoipa::path(
    delete,
    path = "/delete/{filename}",
    tag = "Files",
    params(
        ("filename" = String, Path, description = "Storage name returned by upload")
    ),
    responses(
        (status = 200, description = "File deleted", body = DeleteResponse),
        (status = 400, description = "Invalid file name", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse),
        (status = 500, description = "Delete failure", body = ErrorResponse)
    )
)]
pub async fn delete_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.storage.delete(&filename).await?;
    info!(storage_name = %filename, "File deleted");
    Ok(Json(DeleteResponse {
        success: true,
        message: "File deleted successfully".to_string(),
    }))
}
