//! Simple Bank Crypto - protection of card data at rest
//!
//! This crate provides:
//! - Public-key encryption of card numbers (RSA-OAEP with SHA-256)
//! - HMAC-SHA256 over the immutable card fields for tamper detection
//! - PAN masking for card listings
//!
//! # Security Invariant
//!
//! **A plaintext PAN is never persisted.** Only ciphertext reaches storage,
//! and decrypted values are wiped on drop.

pub mod cipher;
pub mod mac;
pub mod mask;

pub use cipher::*;
pub use mac::*;
pub use mask::*;

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Failed to load key: {0}")]
    KeyLoad(String),

    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("No private key configured")]
    MissingPrivateKey,
}

pub type CryptoResult<T> = Result<T, CryptoError>;
