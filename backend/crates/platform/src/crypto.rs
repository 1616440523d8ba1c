//! Cryptographic Utilities
//!
//! Base64 helpers plus AES-GCM secret encryption. Encrypted
//! secrets are `base64(nonce || ciphertext || tag)` with a 96-bit random nonce.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use base64::{Engine, engine::general_purpose};
use rand::{RngCore, rngs::OsRng};
use thiserror::Error;

const NONCE_SIZE: usize = 12;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("cipher key must be 16 or 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("invalid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("ciphertext too short")]
    TooShort,

    /// Wrong key or tampered data
    #[error("decryption failed")]
    Decryption,

    #[error("encryption failed")]
    Encryption,

    #[error("plaintext is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Encode bytes as base64
pub fn to_base64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// Decode base64 to bytes
pub fn from_base64(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    general_purpose::STANDARD.decode(s)
}

/// Constant-time comparison to prevent timing attacks
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

// ============================================================================
// AES-GCM
// ============================================================================

/// AES-128-GCM or AES-256-GCM, picked by key length
enum SecretCipher {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

impl SecretCipher {
    fn new(key: &[u8]) -> Result<Self, CipherError> {
        match key.len() {
            16 => Aes128Gcm::new_from_slice(key)
                .map(|c| Self::Aes128(Box::new(c)))
                .map_err(|_| CipherError::InvalidKeyLength(key.len())),
            32 => Aes256Gcm::new_from_slice(key)
                .map(|c| Self::Aes256(Box::new(c)))
                .map_err(|_| CipherError::InvalidKeyLength(key.len())),
            other => Err(CipherError::InvalidKeyLength(other)),
        }
    }

    fn seal(&self, nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        match self {
            Self::Aes128(c) => c.encrypt(Nonce::from_slice(nonce), plaintext),
            Self::Aes256(c) => c.encrypt(Nonce::from_slice(nonce), plaintext),
        }
        .map_err(|_| CipherError::Encryption)
    }

    fn open(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        match self {
            Self::Aes128(c) => c.decrypt(Nonce::from_slice(nonce), ciphertext),
            Self::Aes256(c) => c.decrypt(Nonce::from_slice(nonce), ciphertext),
        }
        .map_err(|_| CipherError::Decryption)
    }
}

/// Encrypt and return base64(nonce || ciphertext)
pub fn encrypt_secret(key: &[u8], plaintext: &[u8]) -> Result<String, CipherError> {
    let cipher = SecretCipher::new(key)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);

    let sealed = cipher.seal(&nonce_bytes, plaintext)?;

    let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&sealed);
    Ok(to_base64(&out))
}

pub fn decrypt_secret(key: &[u8], encoded: &str) -> Result<Vec<u8>, CipherError> {
    let cipher = SecretCipher::new(key)?;
    let data = from_base64(encoded.trim())?;
    if data.len() < NONCE_SIZE {
        return Err(CipherError::TooShort);
    }
    let (nonce, ciphertext) = data.split_at(NONCE_SIZE);
    cipher.open(nonce, ciphertext)
}

pub fn encrypt_string(key: &[u8], plaintext: &str) -> Result<String, CipherError> {
    encrypt_secret(key, plaintext.as_bytes())
}

pub fn decrypt_string(key: &[u8], encoded: &str) -> Result<String, CipherError> {
    Ok(String::from_utf8(decrypt_secret(key, encoded)?)?)
}

/// Check that `encoded` is the key encrypted under itself.
///
/// A deployment proves it holds the right key by shipping this sealed
/// token next to it. `Ok(false)` means the token decrypted to something
/// else; a wrong key surfaces as [`CipherError::Decryption`].
pub fn verify_secret(key: &[u8], encoded: &str) -> Result<bool, CipherError> {
    let plaintext = decrypt_secret(key, encoded)?;
    Ok(constant_time_eq(&plaintext, key))
}
