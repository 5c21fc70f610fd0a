//! Error types for the crypto primitives.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key derivation failed (bad cost parameters, empty salt, ...).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Authenticated decryption failed (wrong key or tampered data).
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// A byte buffer was too short or otherwise malformed.
    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },

    /// Invalid key length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Bytes do not form a valid Ed25519 public key.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// Ed25519 signature verification failed.
    #[error("signature verification failed")]
    SignatureInvalid,
}
