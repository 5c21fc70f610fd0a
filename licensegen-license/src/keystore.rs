//! Key material providers.
//!
//! The engine asks a [`KeyStoreProvider`] for keys by alias and never looks
//! at key bytes itself. Two providers ship here: [`FileKeyStore`], backed by
//! a password-sealed JSON file, and [`MemoryKeyStore`].
//!
//! # Keystore file (version 1)
//!
//! ```json
//! { "version": 1, "sealed": "<base64 PasswordSealed>" }
//! ```
//!
//! The sealed payload opens with the store password to a JSON map
//! `alias -> { "public_key": base64, "private_key": base64 PasswordSealed? }`.
//! Each private key is the 32-byte Ed25519 secret sealed with its own key
//! password.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write as _;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use licensegen_crypto::{KdfParams, KeyPair, PasswordSealed, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::MAX_KDF_PARAMS;
use crate::error::{LicenseError, LicenseResult};

/// Keystore file format version.
pub const KEYSTORE_VERSION: u8 = 1;

/// Source of signing and verification keys, addressed by alias.
pub trait KeyStoreProvider {
    /// Private signing key for `alias`, unsealed with `key_password`.
    /// Only needed when generating licenses.
    fn signing_key(&self, alias: &str, key_password: &str) -> LicenseResult<SigningKey>;

    /// Public verification key for `alias`.
    fn verifying_key(&self, alias: &str) -> LicenseResult<VerifyingKey>;

    /// All aliases held, in sorted order.
    fn aliases(&self) -> Vec<String>;
}

#[derive(Serialize, Deserialize)]
struct KeyStoreFile {
    version: u8,
    sealed: String,
}

#[derive(Serialize, Deserialize)]
struct EntryRecord {
    public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    private_key: Option<String>,
}

struct FileEntry {
    verifying_key: VerifyingKey,
    sealed_private: Option<PasswordSealed>,
}

fn keystore_err(path: &Path, what: impl std::fmt::Display) -> LicenseError {
    LicenseError::KeyStore(format!("{}: {what}", path.display()))
}

fn excessive_kdf(params: &KdfParams) -> String {
    format!("key derivation costs {params:?} exceed the allowed maximum")
}

/// Keystore loaded from a password-sealed file.
///
/// The file is read completely and closed inside [`FileKeyStore::open`];
/// nothing stays open afterwards.
pub struct FileKeyStore {
    entries: BTreeMap<String, FileEntry>,
}

impl FileKeyStore {
    /// Reads and unseals the keystore at `path` with `store_password`.
    ///
    /// Seals declaring Argon2 costs above [`MAX_KDF_PARAMS`] are refused
    /// without deriving a key.
    pub fn open(path: impl AsRef<Path>, store_password: &str) -> LicenseResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Opening keystore");

        let raw = fs::read(path).map_err(|e| keystore_err(path, format!("cannot open: {e}")))?;
        let file: KeyStoreFile = serde_json::from_slice(&raw)
            .map_err(|e| keystore_err(path, format!("not a keystore: {e}")))?;
        if file.version != KEYSTORE_VERSION {
            return Err(keystore_err(
                path,
                format!("unsupported keystore version {}", file.version),
            ));
        }

        let sealed = STANDARD
            .decode(&file.sealed)
            .map_err(|e| keystore_err(path, format!("corrupted keystore: {e}")))?;
        let sealed = PasswordSealed::from_bytes(&sealed)
            .map_err(|e| keystore_err(path, format!("corrupted keystore: {e}")))?;
        if !sealed.params.within(&MAX_KDF_PARAMS) {
            return Err(keystore_err(path, excessive_kdf(&sealed.params)));
        }
        let plain = sealed
            .open(store_password)
            .map_err(|_| keystore_err(path, "wrong keystore password or corrupted keystore"))?;
        let records: BTreeMap<String, EntryRecord> = serde_json::from_slice(&plain)
            .map_err(|e| keystore_err(path, format!("corrupted keystore entries: {e}")))?;

        let mut entries = BTreeMap::new();
        for (alias, record) in records {
            let public = STANDARD
                .decode(&record.public_key)
                .map_err(|e| keystore_err(path, format!("alias {alias:?}: {e}")))?;
            let verifying_key = VerifyingKey::from_slice(&public)
                .map_err(|e| keystore_err(path, format!("alias {alias:?}: {e}")))?;
            let sealed_private = record
                .private_key
                .map(|encoded| {
                    STANDARD
                        .decode(encoded)
                        .map_err(|e| e.to_string())
                        .and_then(|b| PasswordSealed::from_bytes(&b).map_err(|e| e.to_string()))
                })
                .transpose()
                .map_err(|e| keystore_err(path, format!("alias {alias:?}: {e}")))?;
            entries.insert(
                alias,
                FileEntry {
                    verifying_key,
                    sealed_private,
                },
            );
        }

        Ok(Self { entries })
    }

    fn entry(&self, alias: &str) -> LicenseResult<&FileEntry> {
        self.entries
            .get(alias)
            .ok_or_else(|| LicenseError::KeyNotFound(alias.to_string()))
    }
}

impl KeyStoreProvider for FileKeyStore {
    fn signing_key(&self, alias: &str, key_password: &str) -> LicenseResult<SigningKey> {
        let entry = self.entry(alias)?;
        let sealed = entry
            .sealed_private
            .as_ref()
            .ok_or_else(|| LicenseError::KeyNotFound(format!("{alias} (no private key)")))?;
        if !sealed.params.within(&MAX_KDF_PARAMS) {
            return Err(LicenseError::KeyStore(format!(
                "alias {alias:?}: {}",
                excessive_kdf(&sealed.params)
            )));
        }
        let secret = sealed.open(key_password).map_err(|_| {
            LicenseError::KeyStore(format!("wrong key password for alias {alias:?}"))
        })?;
        let signing_key = SigningKey::from_slice(&secret)
            .map_err(|e| LicenseError::KeyStore(format!("alias {alias:?}: {e}")))?;
        if signing_key.verifying_key() != entry.verifying_key {
            return Err(LicenseError::KeyStore(format!(
                "alias {alias:?}: private key does not match its public key"
            )));
        }
        Ok(signing_key)
    }

    fn verifying_key(&self, alias: &str) -> LicenseResult<VerifyingKey> {
        Ok(self.entry(alias)?.verifying_key)
    }

    fn aliases(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// In-process keystore. Key passwords are not checked.
#[derive(Default)]
pub struct MemoryKeyStore {
    entries: HashMap<String, (Option<SigningKey>, VerifyingKey)>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_key_pair(&mut self, alias: impl Into<String>, signing_key: SigningKey) {
        let verifying_key = signing_key.verifying_key();
        self.entries
            .insert(alias.into(), (Some(signing_key), verifying_key));
    }

    pub fn insert_public_key(&mut self, alias: impl Into<String>, verifying_key: VerifyingKey) {
        self.entries.insert(alias.into(), (None, verifying_key));
    }
}

impl KeyStoreProvider for MemoryKeyStore {
    fn signing_key(&self, alias: &str, _key_password: &str) -> LicenseResult<SigningKey> {
        match self.entries.get(alias) {
            Some((Some(signing_key), _)) => Ok(signing_key.clone()),
            Some((None, _)) => Err(LicenseError::KeyNotFound(format!("{alias} (no private key)"))),
            None => Err(LicenseError::KeyNotFound(alias.to_string())),
        }
    }

    fn verifying_key(&self, alias: &str) -> LicenseResult<VerifyingKey> {
        self.entries
            .get(alias)
            .map(|(_, verifying_key)| *verifying_key)
            .ok_or_else(|| LicenseError::KeyNotFound(alias.to_string()))
    }

    fn aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.entries.keys().cloned().collect();
        aliases.sort();
        aliases
    }
}

/// Creates keystore files.
///
/// A private keystore holds key pairs for the issuing side; a public
/// keystore, holding only verifying keys, is what ships with the
/// application.
pub struct KeyStoreWriter {
    kdf: KdfParams,
    records: BTreeMap<String, EntryRecord>,
}

impl Default for KeyStoreWriter {
    fn default() -> Self {
        Self::new(KdfParams::default())
    }
}

impl KeyStoreWriter {
    /// `kdf` applies to the store seal and to every private key seal.
    pub fn new(kdf: KdfParams) -> Self {
        Self {
            kdf,
            records: BTreeMap::new(),
        }
    }

    /// Starts a public keystore holding every verifying key of `source`.
    pub fn public_from(source: &dyn KeyStoreProvider, kdf: KdfParams) -> LicenseResult<Self> {
        let mut writer = Self::new(kdf);
        for alias in source.aliases() {
            let verifying_key = source.verifying_key(&alias)?;
            writer.add_public_key(alias, &verifying_key);
        }
        Ok(writer)
    }

    /// Adds a key pair; the private half is sealed with `key_password`.
    pub fn add_key_pair(
        &mut self,
        alias: impl Into<String>,
        key_pair: &KeyPair,
        key_password: &str,
    ) -> LicenseResult<&mut Self> {
        let alias = alias.into();
        let sealed = PasswordSealed::seal(key_password, &key_pair.signing_key.to_bytes(), &self.kdf)
            .map_err(|e| LicenseError::KeyStore(format!("alias {alias:?}: {e}")))?;
        self.records.insert(
            alias,
            EntryRecord {
                public_key: STANDARD.encode(key_pair.verifying_key.to_bytes()),
                private_key: Some(STANDARD.encode(sealed.to_bytes())),
            },
        );
        Ok(self)
    }

    pub fn add_public_key(
        &mut self,
        alias: impl Into<String>,
        verifying_key: &VerifyingKey,
    ) -> &mut Self {
        self.records.insert(
            alias.into(),
            EntryRecord {
                public_key: STANDARD.encode(verifying_key.to_bytes()),
                private_key: None,
            },
        );
        self
    }

    /// Seals the entries with `store_password` and writes the file atomically.
    pub fn save(&self, path: impl AsRef<Path>, store_password: &str) -> LicenseResult<()> {
        let path = path.as_ref();
        let plain = serde_json::to_vec(&self.records)
            .map_err(|e| keystore_err(path, format!("cannot serialize entries: {e}")))?;
        let sealed = PasswordSealed::seal(store_password, &plain, &self.kdf)
            .map_err(|e| keystore_err(path, e))?;
        let file = KeyStoreFile {
            version: KEYSTORE_VERSION,
            sealed: STANDARD.encode(sealed.to_bytes()),
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| keystore_err(path, format!("cannot serialize keystore: {e}")))?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| LicenseError::Io(e.error))?;

        debug!(path = %path.display(), entries = self.records.len(), "Keystore written");
        Ok(())
    }
}
