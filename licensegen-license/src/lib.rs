//! Offline software licensing.
//!
//! This crate handles:
//! - Building license content bound to a subject (application) and holder
//! - Encoding content into a signed, encrypted, versioned blob
//! - Installing a blob into local storage and re-verifying it later
//!
//! # Design Principles
//!
//! - **Offline only**: verification needs the public keystore and cipher secret, nothing else
//! - **One license per subject**: installing always replaces the previous entry
//! - **Distinct failures**: misconfiguration, tampering and expiry surface as different errors
//!
//! # License Blob Format
//!
//! `version ‖ argon2 salt and costs ‖ nonce ‖ ChaCha20-Poly1305(canonical content ‖ Ed25519 signature)`.
//! See [`codec`] for the byte layout and canonical serialization.

mod builder;
mod clock;
pub mod codec;
mod config;
mod content;
mod controller;
mod error;
mod identity;
mod keystore;
mod manager;
mod secret;
mod store;

pub use builder::{LicenseContentBuilder, DEFAULT_CONSUMER_TYPE};
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{decode, encode, Blob, CipherParams, FORMAT_VERSION};
pub use config::{GenerateConfig, InstallConfig, DEFAULT_LICENSE_EXTENSION};
pub use content::LicenseContent;
pub use controller::{LicenseController, LicenseIssuer, NoStore};
pub use error::{LicenseError, LicenseResult};
pub use identity::DistinguishedName;
pub use keystore::{FileKeyStore, KeyStoreProvider, KeyStoreWriter, MemoryKeyStore, KEYSTORE_VERSION};
pub use manager::{LicenseManager, LicenseState};
pub use secret::Secret;
pub use store::{FileStore, LicenseStore, MemoryStore};

pub use licensegen_crypto::{KdfParams, KeyPair, SigningKey, VerifyingKey};
