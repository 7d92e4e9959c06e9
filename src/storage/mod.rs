// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Encrypted Storage Module
//!
//! Persistent object storage with encryption at rest. Every uploaded file is
//! encrypted with AES-256-CBC under the process key and written to a flat
//! directory under an obfuscated name.
//!
//! ## Security Model
//!
//! - File content is encrypted before it touches the disk
//! - A fresh random IV per object hides equality of stored content
//! - Storage names carry only the original extension
//! - The original name is never persisted
//! - Lookups cannot escape the storage root
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   {24 hex chars}.{ext}   # IV || ciphertext
//!   .staging/              # in-flight writes (never listed)
//! ```
//!
//! ## Important Notes
//!
//! - There is no index file; the directory listing is the catalog
//! - Objects are immutable; there is no update operation
//! - Payloads written under a generated key are unreadable after restart

pub mod cipher;
pub mod encrypted_fs;
pub mod naming;
pub mod paths;

pub use cipher::{CipherEngine, CryptoError, EncryptionKey};
pub use encrypted_fs::{EncryptedStorage, RawObject, StorageError, StorageResult};
pub use paths::StoragePaths;
