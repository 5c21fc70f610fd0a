//! Cryptographic primitives for licensegen.
//!
//! - Argon2id password key derivation ([`derive_key`])
//! - ChaCha20-Poly1305 authenticated encryption ([`encrypt`], [`decrypt`])
//! - Password sealing that carries its own salt and costs ([`PasswordSealed`])
//! - Ed25519 signing and verification ([`SigningKey`], [`VerifyingKey`])
//!
//! Nothing in this crate knows about licenses; it only moves bytes.

mod cipher;
mod error;
mod key;
mod seal;
mod signing;

pub use cipher::{decrypt, encrypt, EncryptedData, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use key::{derive_key, DerivedKey, KdfParams, Salt, KDF_PARAMS_SIZE, KEY_SIZE, SALT_SIZE};
pub use seal::{PasswordSealed, MIN_SEALED_SIZE, SEAL_HEADER_SIZE};
pub use signing::{
    KeyPair, Signature, SigningKey, VerifyingKey, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE,
    SIGNATURE_SIZE,
};
