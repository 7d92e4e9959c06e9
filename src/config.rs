// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! [`AppConfig`] loaded from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `10000` |
//! | `DATA_DIR` | Storage directory for encrypted objects | `./uploads` |
//! | `STATIC_DIR` | Static front-end files | `./public` |
//! | `MAX_UPLOAD_BYTES` | Largest accepted upload | `104857600` (100 MiB) |
//! | `ENCRYPTION_KEY` | AES-256 key as 64 hex characters | Generated per process |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use thiserror::Error;

use crate::storage::paths::DEFAULT_DATA_ROOT;
use crate::storage::{CryptoError, EncryptionKey};

/// Environment variable name for the bind address.
pub const HOST_ENV: &str = "HOST";

/// Environment variable name for the bind port.
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the storage directory path.
///
/// Every object lives directly in this directory; its listing is the
/// catalog.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Environment variable name for the static front-end directory.
pub const STATIC_DIR_ENV: &str = "STATIC_DIR";

/// Environment variable name for the upload size cap in bytes.
pub const MAX_UPLOAD_BYTES_ENV: &str = "MAX_UPLOAD_BYTES";

/// Environment variable name for the hex encoded encryption key.
///
/// When unset a key is generated at startup, and objects written by this
/// process cannot be decrypted after it exits.
pub const ENCRYPTION_KEY_ENV: &str = "ENCRYPTION_KEY";

/// Environment variable name for the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 10000;
pub const DEFAULT_STATIC_DIR: &str = "./public";
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not valid: {reason}")]
    Invalid { var: &'static str, reason: String },
    #[error("ENCRYPTION_KEY is not valid: {0}")]
    Key(#[source] CryptoError),
    #[error("failed to generate encryption key: {0}")]
    KeyGeneration(#[source] CryptoError),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Where the encryption key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Environment,
    Generated,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: IpAddr,
    pub port: u16,
    pub data_dir: PathBuf,
    pub static_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub encryption_key: EncryptionKey,
    pub key_source: KeySource,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to resolve variables. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host: IpAddr = match get(HOST_ENV) {
            Some(v) => v.trim().parse().map_err(|e| ConfigError::Invalid {
                var: HOST_ENV,
                reason: format!("{e}"),
            })?,
            None => DEFAULT_HOST.parse().map_err(|e| ConfigError::Invalid {
                var: HOST_ENV,
                reason: format!("{e}"),
            })?,
        };

        let port: u16 = match get(PORT_ENV) {
            Some(v) => v.trim().parse().map_err(|e| ConfigError::Invalid {
                var: PORT_ENV,
                reason: format!("{e}"),
            })?,
            None => DEFAULT_PORT,
        };

        let max_upload_bytes: u64 = match get(MAX_UPLOAD_BYTES_ENV) {
            Some(v) => v.trim().parse().map_err(|e| ConfigError::Invalid {
                var: MAX_UPLOAD_BYTES_ENV,
                reason: format!("{e}"),
            })?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };
        if max_upload_bytes == 0 {
            return Err(ConfigError::Invalid {
                var: MAX_UPLOAD_BYTES_ENV,
                reason: "must be greater than zero".to_string(),
            });
        }

        let (encryption_key, key_source) = match get(ENCRYPTION_KEY_ENV) {
            Some(v) => (
                EncryptionKey::from_hex(&v).map_err(ConfigError::Key)?,
                KeySource::Environment,
            ),
            None => (
                EncryptionKey::generate().map_err(ConfigError::KeyGeneration)?,
                KeySource::Generated,
            ),
        };

        let log_format = match get(LOG_FORMAT_ENV).as_deref().map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            host,
            port,
            data_dir: get(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_ROOT)),
            static_dir: get(STATIC_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR)),
            max_upload_bytes,
            encryption_key,
            key_source,
            log_format,
        })
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
