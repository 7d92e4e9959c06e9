// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;
use std::time::Duration;

use axum_server::Handle;
use tracing_subscriber::EnvFilter;

use file_vault_server::{
    api::router,
    config::{AppConfig, KeySource, LogFormat, DEFAULT_LOG_FILTER},
    state::AppState,
    storage::{CipherEngine, EncryptedStorage, StoragePaths},
};

/// Grace period for in-flight requests after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn shutdown_signal(handle: Handle<std::net::SocketAddr>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.log_format);

    if config.key_source == KeySource::Generated {
        tracing::warn!(
            "ENCRYPTION_KEY not set; using a key generated for this process. \
             Stored files cannot be decrypted after a restart."
        );
    }

    let storage = EncryptedStorage::new(
        StoragePaths::new(&config.data_dir),
        CipherEngine::new(config.encryption_key.clone()),
        config.max_upload_bytes,
    );
    if let Err(e) = storage.initialize().await {
        tracing::error!(
            error = %e,
            data_dir = %config.data_dir.display(),
            "Failed to initialize storage directory"
        );
        return ExitCode::FAILURE;
    }

    let static_dir = config.static_dir.is_dir().then_some(config.static_dir.as_path());
    if static_dir.is_none() {
        tracing::info!(
            static_dir = %config.static_dir.display(),
            "Static directory not found; serving API only"
        );
    }

    let app = router(AppState::new(storage), static_dir);
    let addr = config.bind_addr();

    tracing::info!(
        %addr,
        data_dir = %config.data_dir.display(),
        max_upload_bytes = config.max_upload_bytes,
        "File vault listening (docs at /docs)"
    );

    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    if let Err(e) = axum_server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service())
        .await
    {
        tracing::error!(error = %e, "HTTP server failed");
        return ExitCode::FAILURE;
    }

    tracing::info!("Server stopped");
    ExitCode::SUCCESS
}
