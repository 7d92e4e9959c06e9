// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::any::Any;
use std::path::Path;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, CONTENT_TYPE, ORIGIN},
        HeaderName, Method,
    },
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::{ApiError, ErrorResponse},
    models::{DeleteResponse, StoredObject, UploadForm, UploadResponse},
    state::AppState,
};

pub mod files;
pub mod health;

/// Allowance on top of the upload cap for multipart framing.
pub const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Build the application router.
///
/// When `static_dir` is given, paths not matched by the API are served from
/// it (`/` resolves to `index.html`).
pub fn router(state: AppState, static_dir: Option<&Path>) -> Router {
    let body_limit = usize::try_from(state.max_upload_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let api_routes = Router::new()
        .route("/upload", post(files::upload_file))
        .route("/submitData", post(files::submit_data))
        .route("/files", get(files::list_files))
        .route("/download/{filename}", get(files::download_file))
        .route("/delete/{filename}", delete(files::delete_file))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    let mut app = Router::new()
        .merge(api_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()));

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors_layer())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            ORIGIN,
            HeaderName::from_static("x-requested-with"),
            CONTENT_TYPE,
            ACCEPT,
        ])
}

/// Last-resort boundary: a panicking handler becomes a generic 500.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    tracing::error!(panic = detail, "Request handler panicked");
    ApiError::internal("Internal server error").into_response()
}

#[derive(OpenApi)]
#[openapi(
    paths(
        files::upload_file,
        files::submit_data,
        files::list_files,
        files::download_file,
        files::delete_file,
        health::health,
        health::readiness
    ),
    components(
        schemas(
            StoredObject,
            UploadForm,
            UploadResponse,
            DeleteResponse,
            ErrorResponse,
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks
        )
    ),
    tags(
        (name = "Files", description = "Encrypted file storage"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
