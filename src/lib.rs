// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File Vault - Encrypted File Storage Service
//!
//! Clients upload files over HTTP; the service encrypts each one at rest
//! and stores it under an unguessable name that keeps only the original
//! extension. Stored objects can be listed, downloaded and deleted by that
//! name.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `config` - Environment configuration
//! - `storage` - Encryption, name obfuscation and the storage directory

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
