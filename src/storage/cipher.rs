// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! At-rest encryption for stored objects.
//!
//! ## Payload Layout
//!
//! ```text
//! +----------------+--------------------------------------+
//! | IV (16 bytes)  | AES-256-CBC ciphertext (PKCS#7 pad)  |
//! +----------------+--------------------------------------+
//! ```
//!
//! A fresh IV is drawn for every call to [`CipherEngine::encrypt`], so the
//! same plaintext never produces the same payload twice.
//!
//! CBC carries no authentication tag. A wrong key or a tampered payload is
//! detected only when the PKCS#7 padding fails to verify, which catches the
//! vast majority of cases but not all of them.

use std::fmt;

use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Length of the IV prefix of every payload.
pub const IV_LEN: usize = 16;

/// AES-256 key length.
pub const KEY_LEN: usize = 32;

/// AES block size; ciphertext is always a non-zero multiple of it.
const BLOCK_LEN: usize = 16;

/// Errors raised by the encryption engine.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The system random source failed.
    #[error("secure random source unavailable")]
    RandomUnavailable,
    /// Key material has the wrong shape.
    #[error("invalid key: {0}")]
    InvalidKey(String),
    /// Payload is too short or not block aligned.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    /// Padding check failed (wrong key or corrupted payload).
    #[error("decryption failed: padding check did not pass")]
    BadPadding,
}

/// Fill `buf` from the operating system CSPRNG.
pub fn fill_random(buf: &mut [u8]) -> Result<(), CryptoError> {
    SystemRandom::new()
        .fill(buf)
        .map_err(|_| CryptoError::RandomUnavailable)
}

/// Process-wide symmetric key. Zeroized on drop, never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a 64 character hex string.
    pub fn from_hex(encoded: &str) -> Result<Self, CryptoError> {
        let mut decoded = hex::decode(encoded.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("not valid hex: {e}")))?;
        if decoded.len() != KEY_LEN {
            let len = decoded.len();
            decoded.zeroize();
            return Err(CryptoError::InvalidKey(format!(
                "expected {KEY_LEN} bytes, got {len}"
            )));
        }
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self(bytes))
    }

    /// Generate a random key. Payloads written under it are unreadable once
    /// the process exits.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; KEY_LEN];
        fill_random(&mut bytes)?;
        Ok(Self(bytes))
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

/// AES-256-CBC encryption engine bound to one key.
///
/// Constructed once at startup and shared read-only by every request.
#[derive(Debug, Clone)]
pub struct CipherEngine {
    key: EncryptionKey,
}

impl CipherEngine {
    pub fn new(key: EncryptionKey) -> Self {
        Self { key }
    }

    /// Encrypt `plaintext` into `IV || ciphertext`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut iv = [0u8; IV_LEN];
        fill_random(&mut iv)?;

        let cipher = Aes256CbcEnc::new_from_slices(self.key.as_bytes(), &iv)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut payload = Vec::with_capacity(IV_LEN + ciphertext.len());
        payload.extend_from_slice(&iv);
        payload.extend_from_slice(&ciphertext);
        Ok(payload)
    }

    /// Reverse [`encrypt`](Self::encrypt).
    pub fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if payload.len() < IV_LEN + BLOCK_LEN {
            return Err(CryptoError::MalformedPayload(format!(
                "{} bytes is shorter than IV plus one block",
                payload.len()
            )));
        }
        let (iv, ciphertext) = payload.split_at(IV_LEN);
        if ciphertext.len() % BLOCK_LEN != 0 {
            return Err(CryptoError::MalformedPayload(
                "ciphertext is not block aligned".to_string(),
            ));
        }

        let cipher = Aes256CbcDec::new_from_slices(self.key.as_bytes(), iv)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        cipher
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CryptoError::BadPadding)
    }
}

/// Size of the payload produced for a plaintext of `plaintext_len` bytes.
pub fn payload_len(plaintext_len: usize) -> usize {
    IV_LEN + (plaintext_len / BLOCK_LEN + 1) * BLOCK_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> CipherEngine {
        CipherEngine::new(EncryptionKey::from_bytes([7u8; KEY_LEN]))
    }

    #[test]
    fn round_trip_various_lengths() {
        let engine = engine();
        for len in [0usize, 1, 15, 16, 17, 1024, 4099] {
            let plaintext: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let payload = engine.encrypt(&plaintext).unwrap();
            assert_eq!(payload.len(), payload_len(len));
            assert_eq!(engine.decrypt(&payload).unwrap(), plaintext);
        }
    }

    #[test]
    fn same_plaintext_encrypts_differently() {
        let engine = engine();
        let a = engine.encrypt(b"identical content").unwrap();
        let b = engine.encrypt(b"identical content").unwrap();
        assert_ne!(a, b);
        assert_ne!(a[..IV_LEN], b[..IV_LEN]);
    }

    #[test]
    fn two_byte_plaintext_is_one_block() {
        let payload = engine().encrypt(b"hi").unwrap();
        assert_eq!(payload.len(), IV_LEN + BLOCK_LEN);
    }

    #[test]
    fn wrong_key_never_yields_plaintext() {
        let payload = engine().encrypt(b"top secret report").unwrap();
        let other = CipherEngine::new(EncryptionKey::from_bytes([9u8; KEY_LEN]));
        match other.decrypt(&payload) {
            Err(CryptoError::BadPadding) => {}
            Err(e) => panic!("unexpected error: {e}"),
            Ok(garbage) => assert_ne!(garbage, b"top secret report"),
        }
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let engine = engine();
        assert!(matches!(
            engine.decrypt(&[0u8; IV_LEN]),
            Err(CryptoError::MalformedPayload(_))
        ));

        let mut payload = engine.encrypt(b"some bytes").unwrap();
        payload.pop();
        assert!(matches!(
            engine.decrypt(&payload),
            Err(CryptoError::MalformedPayload(_))
        ));
    }

    #[test]
    fn key_from_hex_validates_length() {
        let hex_key = "ab".repeat(KEY_LEN);
        assert!(EncryptionKey::from_hex(&hex_key).is_ok());
        assert!(matches!(
            EncryptionKey::from_hex("abcd"),
            Err(CryptoError::InvalidKey(_))
        ));
        assert!(matches!(
            EncryptionKey::from_hex(&"zz".repeat(KEY_LEN)),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn key_debug_is_redacted() {
        let key = EncryptionKey::from_hex(&"ab".repeat(KEY_LEN)).unwrap();
        let printed = format!("{key:?} {:?}", CipherEngine::new(key.clone()));
        assert!(!printed.contains("ab"));
        assert!(printed.contains("redacted"));
    }
}
