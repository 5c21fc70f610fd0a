//! Error types for the licensing engine.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Licensing errors.
///
/// Resource problems (configuration, keystore, storage) are kept apart from
/// the cryptographic and validity outcomes so a caller can tell a
/// misconfigured install from a tampered or expired license.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Missing or invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Keystore could not be opened or a password is wrong.
    #[error("keystore error: {0}")]
    KeyStore(String),

    /// Alias absent from the keystore (or present without the needed key).
    #[error("key not found in keystore: {0}")]
    KeyNotFound(String),

    /// Malformed license blob.
    #[error("invalid license format: {0}")]
    Format(String),

    /// Authenticated decryption failed: wrong cipher secret or corrupted data.
    #[error("license decryption failed (wrong cipher secret or corrupted data)")]
    Decrypt,

    /// Signature verification failed: tampered license or wrong verification key.
    #[error("license signature invalid (tampered or signed with another key)")]
    Integrity,

    /// Current time is past the license's `not_after`.
    #[error("license expired on {not_after}")]
    Expired { not_after: DateTime<Utc> },

    /// License was issued for another subject.
    #[error("license subject mismatch: expected {expected:?}, found {actual:?}")]
    SubjectMismatch { expected: String, actual: String },

    /// License content constraints violated.
    #[error("invalid license content: {0}")]
    Validation(String),

    /// Nothing installed for the subject.
    #[error("no license installed for {0:?}")]
    NotInstalled(String),

    /// Persisted store failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// IO error (license files, config files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LicenseError {
    /// True for errors caused by the environment rather than by the license:
    /// configuration, keystore, storage and IO failures.
    #[must_use]
    pub fn is_resource_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::KeyStore(_)
                | Self::KeyNotFound(_)
                | Self::Storage(_)
                | Self::Io(_)
        )
    }

    /// Short stable name of the error kind, for operator-facing output.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::KeyStore(_) => "keystore",
            Self::KeyNotFound(_) => "key-not-found",
            Self::Format(_) => "format",
            Self::Decrypt => "decrypt",
            Self::Integrity => "integrity",
            Self::Expired { .. } => "expired",
            Self::SubjectMismatch { .. } => "subject-mismatch",
            Self::Validation(_) => "validation",
            Self::NotInstalled(_) => "not-installed",
            Self::Storage(_) => "storage",
            Self::Io(_) => "io",
        }
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
