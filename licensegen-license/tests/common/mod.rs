//! Shared test helpers for license tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use licensegen_license::{
    CipherParams, DistinguishedName, KdfParams, KeyPair, KeyStoreWriter, LicenseContent,
    LicenseContentBuilder, ManualClock, SigningKey,
};

pub const SUBJECT: &str = "MyApp";
pub const CIPHER_SECRET: &str = "s3cret-2024";
pub const ALIAS: &str = "license-signing";
pub const STORE_PASSWORD: &str = "store-pw";
pub const KEY_PASSWORD: &str = "key-pw";

/// Fixed issuing instant: 2023-11-14T22:13:20Z.
pub const T0_MS: i64 = 1_700_000_000_000;

pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(T0_MS).unwrap()
}

pub fn clock_at_t0() -> ManualClock {
    ManualClock::new(t0())
}

/// Returns a deterministic Ed25519 key pair from a fixed seed.
pub fn test_keypair() -> KeyPair {
    let seed: [u8; 32] = [
        1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
        25, 26, 27, 28, 29, 30, 31, 32,
    ];
    let signing_key = SigningKey::from_bytes(&seed);
    KeyPair {
        verifying_key: signing_key.verifying_key(),
        signing_key,
    }
}

/// Cheap Argon2 costs so tests do not spend seconds in key derivation.
pub fn fast_kdf() -> KdfParams {
    KdfParams {
        memory_cost: 1024,
        time_cost: 1,
        parallelism: 1,
    }
}

pub fn cipher() -> CipherParams {
    CipherParams::new(CIPHER_SECRET).with_kdf_params(fast_kdf())
}

pub fn holder() -> DistinguishedName {
    "CN=John Doe,L=Paris,ST=IDF,C=FR".parse().unwrap()
}

pub fn issuer() -> DistinguishedName {
    DistinguishedName::new("ACME Licensing")
        .with_organization("ACME")
        .with_country("FR")
}

/// License for `subject` issued at T0, valid for `validity`.
pub fn content_for(subject: &str, validity: TimeDelta) -> LicenseContent {
    LicenseContentBuilder::new(subject)
        .holder(holder())
        .issuer(issuer())
        .validity(validity)
        .build_with_clock(&clock_at_t0())
        .unwrap()
}

/// One-minute license for [`SUBJECT`] issued at T0.
pub fn content() -> LicenseContent {
    content_for(SUBJECT, TimeDelta::seconds(60))
}

/// Writes a private and a public keystore for [`test_keypair`] into `dir`.
pub fn write_keystores(dir: &Path) -> (PathBuf, PathBuf) {
    let private = dir.join("private.keystore");
    let public = dir.join("public.keystore");

    let mut writer = KeyStoreWriter::new(fast_kdf());
    writer
        .add_key_pair(ALIAS, &test_keypair(), KEY_PASSWORD)
        .unwrap();
    writer.save(&private, STORE_PASSWORD).unwrap();

    let mut writer = KeyStoreWriter::new(fast_kdf());
    writer.add_public_key(ALIAS, &test_keypair().verifying_key);
    writer.save(&public, STORE_PASSWORD).unwrap();

    (private, public)
}
