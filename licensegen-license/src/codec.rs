//! License blob encoding and decoding.
//!
//! # Blob format (version 1)
//!
//! ```text
//! 0x01 ‖ salt (16) ‖ m_cost (u32 LE) ‖ t_cost (u32 LE) ‖ p_cost (u32 LE) ‖ nonce (12) ‖ ciphertext+tag
//! ```
//!
//! The ciphertext is ChaCha20-Poly1305 under an Argon2id key derived from
//! the cipher secret. It decrypts to `canonical-content ‖ ed25519-signature (64)`.
//!
//! # Canonical content (version 1)
//!
//! Compact `serde_json` of a fixed-order record:
//! `v, subject, holder, issuer, consumer_type, consumer_amount, info,
//! issued_at_ms, not_after_ms`. Identities are their rendered
//! distinguished names; timestamps are UTC milliseconds since the epoch.
//! The signature covers exactly these bytes, and decode rejects input that
//! does not re-serialize to the same bytes.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::DateTime;
use licensegen_crypto::{
    CryptoError, KdfParams, PasswordSealed, Signature, SigningKey, VerifyingKey, SIGNATURE_SIZE,
};
use serde::{Deserialize, Serialize};

use crate::content::LicenseContent;
use crate::error::{LicenseError, LicenseResult};
use crate::identity::DistinguishedName;
use crate::secret::Secret;

/// Blob format version written by [`encode`].
pub const FORMAT_VERSION: u8 = 1;

/// Heaviest Argon2 costs [`decode`] will run. A blob asking for more is
/// rejected before any key derivation happens.
pub const MAX_KDF_PARAMS: KdfParams = KdfParams {
    memory_cost: 256 * 1024,
    time_cost: 16,
    parallelism: 16,
};

const ARMOR_BEGIN: &str = "-----BEGIN LICENSE-----";
const ARMOR_END: &str = "-----END LICENSE-----";
const ARMOR_LINE: usize = 64;

/// Symmetric encryption parameters used when encoding.
#[derive(Debug, Clone)]
pub struct CipherParams {
    secret: Secret,
    kdf: KdfParams,
}

impl CipherParams {
    /// Cipher secret with the default Argon2id costs.
    pub fn new(secret: impl Into<Secret>) -> Self {
        Self {
            secret: secret.into(),
            kdf: KdfParams::default(),
        }
    }

    #[must_use]
    pub fn with_kdf_params(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn secret(&self) -> &Secret {
        &self.secret
    }

    pub fn kdf_params(&self) -> &KdfParams {
        &self.kdf
    }
}

/// An encoded license: signed, encrypted, versioned bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob(Vec<u8>);

impl Blob {
    /// Wraps raw blob bytes. No validation happens until [`decode`].
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Renders the blob as base64 between `BEGIN/END LICENSE` lines.
    pub fn to_armored(&self) -> String {
        let encoded = STANDARD.encode(&self.0);
        let mut out = String::with_capacity(encoded.len() + encoded.len() / ARMOR_LINE + 64);
        out.push_str(ARMOR_BEGIN);
        out.push('\n');
        // base64 output is ASCII, so byte chunks are valid str slices
        for line in encoded.as_bytes().chunks(ARMOR_LINE) {
            out.push_str(&String::from_utf8_lossy(line));
            out.push('\n');
        }
        out.push_str(ARMOR_END);
        out.push('\n');
        out
    }

    /// Parses the armored form.
    pub fn from_armored(text: &str) -> LicenseResult<Self> {
        let body = text
            .trim()
            .strip_prefix(ARMOR_BEGIN)
            .and_then(|rest| rest.strip_suffix(ARMOR_END))
            .ok_or_else(|| LicenseError::Format("missing license armor lines".into()))?;
        let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        STANDARD
            .decode(compact)
            .map(Self)
            .map_err(|e| LicenseError::Format(format!("invalid armored base64: {e}")))
    }

    /// Accepts either the armored text form or raw binary.
    pub fn from_file_bytes(bytes: Vec<u8>) -> LicenseResult<Self> {
        let trimmed = bytes.trim_ascii_start();
        if trimmed.starts_with(ARMOR_BEGIN.as_bytes()) {
            let text = std::str::from_utf8(trimmed)
                .map_err(|e| LicenseError::Format(format!("armored license is not UTF-8: {e}")))?;
            return Self::from_armored(text);
        }
        Ok(Self(bytes))
    }
}

/// Fixed-order wire record. Field order here *is* the canonical order.
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CanonicalContent {
    v: u8,
    subject: String,
    holder: String,
    issuer: String,
    consumer_type: String,
    consumer_amount: u32,
    info: String,
    issued_at_ms: i64,
    not_after_ms: i64,
}

impl From<&LicenseContent> for CanonicalContent {
    fn from(content: &LicenseContent) -> Self {
        Self {
            v: FORMAT_VERSION,
            subject: content.subject.clone(),
            holder: content.holder.to_string(),
            issuer: content.issuer.to_string(),
            consumer_type: content.consumer_type.clone(),
            consumer_amount: content.consumer_amount,
            info: content.info.clone(),
            issued_at_ms: content.issued_at.timestamp_millis(),
            not_after_ms: content.not_after.timestamp_millis(),
        }
    }
}

impl TryFrom<CanonicalContent> for LicenseContent {
    type Error = LicenseError;

    fn try_from(wire: CanonicalContent) -> LicenseResult<Self> {
        let malformed = |what: &str| LicenseError::Format(format!("license content: {what}"));

        if wire.v != FORMAT_VERSION {
            return Err(malformed(&format!("unsupported content version {}", wire.v)));
        }
        if wire.subject.is_empty() {
            return Err(malformed("empty subject"));
        }
        if wire.consumer_amount == 0 {
            return Err(malformed("zero consumer amount"));
        }
        let holder: DistinguishedName = wire
            .holder
            .parse()
            .map_err(|e| malformed(&format!("holder: {e}")))?;
        let issuer: DistinguishedName = wire
            .issuer
            .parse()
            .map_err(|e| malformed(&format!("issuer: {e}")))?;
        let issued_at = DateTime::from_timestamp_millis(wire.issued_at_ms)
            .ok_or_else(|| malformed("issued_at out of range"))?;
        let not_after = DateTime::from_timestamp_millis(wire.not_after_ms)
            .ok_or_else(|| malformed("not_after out of range"))?;
        if not_after <= issued_at {
            return Err(malformed("not_after is not after issued_at"));
        }

        Ok(Self {
            subject: wire.subject,
            holder,
            issuer,
            consumer_type: wire.consumer_type,
            consumer_amount: wire.consumer_amount,
            info: wire.info,
            issued_at,
            not_after,
        })
    }
}

/// Canonical bytes of `content`: what the signature covers.
pub fn canonical_bytes(content: &LicenseContent) -> LicenseResult<Vec<u8>> {
    serde_json::to_vec(&CanonicalContent::from(content))
        .map_err(|e| LicenseError::Format(format!("cannot serialize license content: {e}")))
}

fn parse_canonical(bytes: &[u8]) -> LicenseResult<LicenseContent> {
    let wire: CanonicalContent = serde_json::from_slice(bytes)
        .map_err(|e| LicenseError::Format(format!("license content: {e}")))?;
    let content = LicenseContent::try_from(wire)?;
    if canonical_bytes(&content)? != bytes {
        return Err(LicenseError::Format(
            "license content is not in canonical form".into(),
        ));
    }
    Ok(content)
}

/// Signs and encrypts `content` into a portable blob.
pub fn encode(
    content: &LicenseContent,
    signing_key: &SigningKey,
    cipher: &CipherParams,
) -> LicenseResult<Blob> {
    let mut payload = canonical_bytes(content)?;
    let signature = signing_key.sign(&payload);
    payload.extend_from_slice(&signature.to_bytes());

    let sealed = PasswordSealed::seal(cipher.secret.expose(), &payload, &cipher.kdf).map_err(
        |e| match e {
            CryptoError::KeyDerivation(msg) => {
                LicenseError::Config(format!("invalid cipher key derivation parameters: {msg}"))
            }
            other => LicenseError::Format(other.to_string()),
        },
    )?;

    let sealed = sealed.to_bytes();
    let mut out = Vec::with_capacity(1 + sealed.len());
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&sealed);
    Ok(Blob(out))
}

/// Decrypts, verifies and parses a blob.
///
/// Failure kinds, in the order they are checked:
/// - [`LicenseError::Format`]: unknown version, truncation, oversize KDF costs
/// - [`LicenseError::Decrypt`]: wrong cipher secret or corrupted ciphertext
/// - [`LicenseError::Integrity`]: signature does not verify under `verifying_key`
/// - [`LicenseError::Format`]: signed content is structurally invalid
pub fn decode(
    blob: &Blob,
    verifying_key: &VerifyingKey,
    cipher_secret: &str,
) -> LicenseResult<LicenseContent> {
    let (&version, rest) = blob
        .0
        .split_first()
        .ok_or_else(|| LicenseError::Format("empty license".into()))?;
    if version != FORMAT_VERSION {
        return Err(LicenseError::Format(format!(
            "unsupported license format version {version}"
        )));
    }

    let sealed =
        PasswordSealed::from_bytes(rest).map_err(|e| LicenseError::Format(e.to_string()))?;
    if !sealed.params.within(&MAX_KDF_PARAMS) {
        return Err(LicenseError::Format(format!(
            "key derivation costs {:?} exceed the allowed maximum",
            sealed.params
        )));
    }

    let payload = sealed.open(cipher_secret).map_err(|e| match e {
        CryptoError::Decryption(_) => LicenseError::Decrypt,
        other => LicenseError::Format(other.to_string()),
    })?;

    if payload.len() <= SIGNATURE_SIZE {
        return Err(LicenseError::Format(format!(
            "decrypted payload too short ({} bytes)",
            payload.len()
        )));
    }
    let (content_bytes, signature_bytes) = payload.split_at(payload.len() - SIGNATURE_SIZE);
    let signature =
        Signature::from_slice(signature_bytes).map_err(|e| LicenseError::Format(e.to_string()))?;
    verifying_key
        .verify(content_bytes, &signature)
        .map_err(|_| LicenseError::Integrity)?;

    parse_canonical(content_bytes)
}
