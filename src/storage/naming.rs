// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Storage name derivation and validation.
//!
//! A storage name is `<24 hex chars>.<extension>`. Only the extension of the
//! submitted name survives; nothing else links the stored object back to it.

use super::cipher::fill_random;
use super::{StorageError, StorageResult};

/// Random bytes per token (96 bits, 24 hex chars).
pub const TOKEN_BYTES: usize = 12;

/// Longest extension carried over from a submitted name.
pub const MAX_EXTENSION_LEN: usize = 64;

/// Longest storage name accepted by lookups.
pub const MAX_STORAGE_NAME_LEN: usize = 255;

/// Extract the extension of a submitted file name.
///
/// Directory components are ignored. Without a `.` the whole final component
/// is the extension.
pub fn extension_of(original_name: &str) -> &str {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);
    match base.rfind('.') {
        Some(idx) => &base[idx + 1..],
        None => base,
    }
}

/// Derive an unlinkable storage name from `original_name`.
pub fn obfuscate(original_name: &str) -> StorageResult<String> {
    let extension = extension_of(original_name);
    if extension.is_empty() {
        return Err(StorageError::Validation(
            "File name has no usable extension".to_string(),
        ));
    }
    if extension.len() > MAX_EXTENSION_LEN
        || extension.chars().any(|c| c.is_control() || c == '"')
    {
        return Err(StorageError::Validation(
            "File extension is not supported".to_string(),
        ));
    }

    let mut token = [0u8; TOKEN_BYTES];
    fill_random(&mut token)?;
    Ok(format!("{}.{extension}", hex::encode(token)))
}

/// Check that `name` maps to exactly one entry directly inside the storage
/// directory.
pub fn validate_storage_name(name: &str) -> StorageResult<()> {
    let invalid = name.is_empty()
        || name.len() > MAX_STORAGE_NAME_LEN
        || name.starts_with('.')
        || name
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '\0' || c.is_control());

    if invalid {
        return Err(StorageError::Validation("Invalid file name".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_token_name(name: &str, extension: &str) -> bool {
        let Some((token, ext)) = name.split_once('.') else {
            return false;
        };
        token.len() == TOKEN_BYTES * 2
            && token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
            && ext == extension
    }

    #[test]
    fn preserves_extension_case() {
        let name = obfuscate("report.PDF").unwrap();
        assert!(name.ends_with(".PDF"));
        assert!(!name.starts_with("report"));
        assert!(is_token_name(&name, "PDF"));
    }

    #[test]
    fn uses_last_dot_and_drops_directories() {
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("../../etc/passwd.txt"), "txt");
        assert_eq!(extension_of("C:\\Users\\me\\notes.md"), "md");
        assert_eq!(extension_of("dir.d/README"), "README");
    }

    #[test]
    fn name_without_dot_uses_whole_name() {
        let name = obfuscate("Makefile").unwrap();
        assert!(is_token_name(&name, "Makefile"));
    }

    #[test]
    fn tokens_differ_between_calls() {
        let a = obfuscate("a.txt").unwrap();
        let b = obfuscate("a.txt").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_unusable_extensions() {
        assert!(matches!(obfuscate("trailing."), Err(StorageError::Validation(_))));
        assert!(matches!(obfuscate("dir/"), Err(StorageError::Validation(_))));
        assert!(matches!(obfuscate("x.a\"b"), Err(StorageError::Validation(_))));
        let long = format!("x.{}", "e".repeat(MAX_EXTENSION_LEN + 1));
        assert!(matches!(obfuscate(&long), Err(StorageError::Validation(_))));
    }

    #[test]
    fn obfuscated_names_pass_validation() {
        let name = obfuscate("photo.jpeg").unwrap();
        assert!(validate_storage_name(&name).is_ok());
    }

    #[test]
    fn traversal_and_hidden_names_are_invalid() {
        for bad in [
            "",
            ".",
            "..",
            "../secret",
            "../../etc/passwd",
            "a/b.txt",
            "a\\b.txt",
            ".staging",
            "nul\0.txt",
        ] {
            assert!(
                matches!(validate_storage_name(bad), Err(StorageError::Validation(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(validate_storage_name(&"a".repeat(MAX_STORAGE_NAME_LEN + 1)).is_err());
    }
}
