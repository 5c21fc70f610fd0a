//! Ed25519 signing and verification.

use ed25519_dalek::{
    Signature as DalekSignature, Signer as _, SigningKey as DalekSigningKey,
    VerifyingKey as DalekVerifyingKey,
};
use rand::rngs::OsRng;

use crate::error::{CryptoError, CryptoResult};

/// Size of an Ed25519 secret key in bytes.
pub const SECRET_KEY_SIZE: usize = 32;

/// Size of an Ed25519 public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of an Ed25519 signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// Ed25519 signing key (secret). Zeroized on drop by `ed25519-dalek`.
#[derive(Clone)]
pub struct SigningKey(DalekSigningKey);

/// Ed25519 verifying key (public).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VerifyingKey(DalekVerifyingKey);

/// Ed25519 signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature(DalekSignature);

/// A signing key together with its verifying key.
pub struct KeyPair {
    pub signing_key: SigningKey,
    pub verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Generates a new random key pair from the OS RNG.
    pub fn generate() -> Self {
        let signing = DalekSigningKey::generate(&mut OsRng);
        let verifying = signing.verifying_key();
        Self {
            signing_key: SigningKey(signing),
            verifying_key: VerifyingKey(verifying),
        }
    }
}

impl SigningKey {
    pub fn from_bytes(bytes: &[u8; SECRET_KEY_SIZE]) -> Self {
        Self(DalekSigningKey::from_bytes(bytes))
    }

    /// Builds a signing key from an untyped slice, checking its length.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let array: [u8; SECRET_KEY_SIZE] =
            bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: SECRET_KEY_SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self::from_bytes(&array))
    }

    pub fn to_bytes(&self) -> [u8; SECRET_KEY_SIZE] {
        self.0.to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.0.sign(message))
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey(self.0.verifying_key())
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("public", &self.verifying_key())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl VerifyingKey {
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_SIZE]) -> CryptoResult<Self> {
        DalekVerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidPublicKey)
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let array: [u8; PUBLIC_KEY_SIZE] =
            bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            })?;
        Self::from_bytes(&array)
    }

    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0.to_bytes()
    }

    /// Verifies `signature` over `message`. Uses strict verification so
    /// malleable signatures are rejected.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> CryptoResult<()> {
        self.0
            .verify_strict(message, &signature.0)
            .map_err(|_| CryptoError::SignatureInvalid)
    }
}

impl Signature {
    pub fn from_bytes(bytes: &[u8; SIGNATURE_SIZE]) -> Self {
        Self(DalekSignature::from_bytes(bytes))
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        DalekSignature::from_slice(bytes)
            .map(Self)
            .map_err(|_| CryptoError::Malformed {
                what: "signature",
                reason: format!("{} bytes, expected {SIGNATURE_SIZE}", bytes.len()),
            })
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_SIZE] {
        self.0.to_bytes()
    }
}
