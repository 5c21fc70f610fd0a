//! Password sealing: Argon2id key derivation followed by ChaCha20-Poly1305.
//!
//! A sealed payload is self-describing apart from the password. Its byte
//! form is
//!
//! ```text
//! salt (16) ‖ memory_cost (u32 LE) ‖ time_cost (u32 LE) ‖ parallelism (u32 LE) ‖ nonce (12) ‖ ciphertext+tag
//! ```

use crate::cipher::{self, EncryptedData, NONCE_SIZE, TAG_SIZE};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{derive_key, KdfParams, Salt, KDF_PARAMS_SIZE, SALT_SIZE};

/// Size of the header that precedes the nonce.
pub const SEAL_HEADER_SIZE: usize = SALT_SIZE + KDF_PARAMS_SIZE;

/// Smallest valid sealed payload (empty plaintext).
pub const MIN_SEALED_SIZE: usize = SEAL_HEADER_SIZE + NONCE_SIZE + TAG_SIZE;

/// Data encrypted under a password-derived key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswordSealed {
    pub salt: Salt,
    pub params: KdfParams,
    pub data: EncryptedData,
}

impl PasswordSealed {
    /// Seals `plaintext` under `password` with a fresh salt and nonce.
    pub fn seal(password: &str, plaintext: &[u8], params: &KdfParams) -> CryptoResult<Self> {
        let salt = Salt::random();
        let key = derive_key(password, &salt, params)?;
        let data = cipher::encrypt(&key, plaintext)?;
        Ok(Self {
            salt,
            params: *params,
            data,
        })
    }

    /// Derives the key from `password` and decrypts.
    ///
    /// A wrong password and a corrupted payload are indistinguishable here;
    /// both fail with [`CryptoError::Decryption`].
    pub fn open(&self, password: &str) -> CryptoResult<Vec<u8>> {
        let key = derive_key(password, &self.salt, &self.params)?;
        cipher::decrypt(&key, &self.data)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SEAL_HEADER_SIZE + self.data.len());
        out.extend_from_slice(self.salt.as_bytes());
        out.extend_from_slice(&self.params.to_bytes());
        out.extend_from_slice(&self.data.to_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() < MIN_SEALED_SIZE {
            return Err(CryptoError::Malformed {
                what: "sealed payload",
                reason: format!("{} bytes, need at least {MIN_SEALED_SIZE}", bytes.len()),
            });
        }

        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&bytes[..SALT_SIZE]);
        let mut params = [0u8; KDF_PARAMS_SIZE];
        params.copy_from_slice(&bytes[SALT_SIZE..SEAL_HEADER_SIZE]);

        Ok(Self {
            salt: Salt::from_bytes(salt),
            params: KdfParams::from_bytes(&params),
            data: EncryptedData::from_bytes(&bytes[SEAL_HEADER_SIZE..])?,
        })
    }
}
