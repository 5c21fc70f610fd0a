//! Configuration-driven entry points.
//!
//! [`LicenseIssuer`] is the vendor side: it turns a [`GenerateConfig`] into
//! a license file. [`LicenseController`] is the application side: it
//! installs, verifies and uninstalls against an [`InstallConfig`]. Both
//! open the keystore per call and drop it before returning.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use licensegen_crypto::KdfParams;
use tracing::info;

use crate::builder::LicenseContentBuilder;
use crate::clock::{Clock, SystemClock};
use crate::codec::{Blob, CipherParams};
use crate::config::{GenerateConfig, InstallConfig};
use crate::content::LicenseContent;
use crate::error::LicenseResult;
use crate::keystore::{FileKeyStore, KeyStoreProvider};
use crate::manager::{LicenseManager, LicenseState};
use crate::store::{FileStore, LicenseStore};

/// Generates license files from a [`GenerateConfig`].
pub struct LicenseIssuer<C = SystemClock> {
    config: GenerateConfig,
    kdf: KdfParams,
    manager: LicenseManager<NoStore, C>,
}

/// Stand-in store for the issuing side, which never persists anything.
#[derive(Debug, Default)]
pub struct NoStore;

impl LicenseStore for NoStore {
    fn get(&self, _key: &str) -> LicenseResult<Option<Vec<u8>>> {
        Ok(None)
    }

    fn put(&self, _key: &str, _value: &[u8]) -> LicenseResult<()> {
        Ok(())
    }

    fn delete(&self, _key: &str) -> LicenseResult<()> {
        Ok(())
    }

    fn locked<R>(&self, _key: &str, op: impl FnOnce() -> LicenseResult<R>) -> LicenseResult<R> {
        op()
    }
}

impl LicenseIssuer {
    pub fn new(config: GenerateConfig) -> LicenseResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> LicenseIssuer<C> {
    pub fn with_clock(config: GenerateConfig, clock: C) -> LicenseResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            kdf: KdfParams::default(),
            manager: LicenseManager::with_clock(NoStore, clock),
        })
    }

    /// Overrides the Argon2 costs used to seal generated blobs.
    #[must_use]
    pub fn with_kdf_params(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn config(&self) -> &GenerateConfig {
        &self.config
    }

    /// Builds the content a generated license will carry, issued now.
    pub fn content(&self) -> LicenseResult<LicenseContent> {
        let config = &self.config;
        let mut builder = LicenseContentBuilder::new(&config.subject)
            .holder(config.holder())
            .issuer(config.issuer_name()?)
            .consumer(&config.consumer_type, config.consumer_amount)
            .validity(config.validity());
        if let Some(info) = &config.info {
            builder = builder.info(info);
        }
        builder.build_with_clock(self.manager.clock())
    }

    /// Encodes a fresh license without writing it anywhere.
    pub fn generate_blob(&self) -> LicenseResult<(LicenseContent, Blob)> {
        let config = &self.config;
        let signing_key = {
            let keystore =
                FileKeyStore::open(&config.keystore_filename, config.keystore_password.expose())?;
            keystore.signing_key(&config.alias, config.key_password.expose())?
        };
        let content = self.content()?;
        let cipher = CipherParams::new(config.cipher_secret.clone()).with_kdf_params(self.kdf);
        let blob = self.manager.generate(&content, &signing_key, &cipher)?;
        Ok((content, blob))
    }

    /// Writes `<output_basename><license_file_extension>` and returns its path.
    pub fn generate(&self, output_basename: impl AsRef<Path>) -> LicenseResult<PathBuf> {
        let (_, blob) = self.generate_blob()?;

        let mut name = OsString::from(output_basename.as_ref().as_os_str());
        name.push(&self.config.license_file_extension);
        let path = PathBuf::from(name);
        fs::write(&path, blob.to_armored())?;

        info!(path = %path.display(), subject = %self.config.subject, "License file written");
        Ok(path)
    }
}

/// Installs and verifies licenses for one application.
pub struct LicenseController<S = FileStore, C = SystemClock> {
    config: InstallConfig,
    manager: LicenseManager<S, C>,
}

impl LicenseController {
    /// Uses a [`FileStore`] at the configured (or default) store directory.
    pub fn new(config: InstallConfig) -> LicenseResult<Self> {
        config.validate()?;
        let store = FileStore::open(config.store_dir()?)?;
        Ok(Self {
            config,
            manager: LicenseManager::new(store),
        })
    }
}

impl<S: LicenseStore, C: Clock> LicenseController<S, C> {
    pub fn with_manager(config: InstallConfig, manager: LicenseManager<S, C>) -> LicenseResult<Self> {
        config.validate()?;
        Ok(Self { config, manager })
    }

    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    pub fn manager(&self) -> &LicenseManager<S, C> {
        &self.manager
    }

    fn verifying_key(&self) -> LicenseResult<licensegen_crypto::VerifyingKey> {
        let keystore = FileKeyStore::open(
            &self.config.keystore_filename,
            self.config.keystore_password.expose(),
        )?;
        keystore.verifying_key(&self.config.alias)
    }

    /// Installs the license file at `path` (armored or raw).
    ///
    /// The installed license is removed before the file or the keystore is
    /// read, so any failure leaves the subject uninstalled.
    pub fn install(&self, path: impl AsRef<Path>) -> LicenseResult<LicenseContent> {
        self.manager.uninstall(&self.config.subject)?;
        let blob = Blob::from_file_bytes(fs::read(path.as_ref())?)?;
        self.install_cleared(&blob)
    }

    pub fn install_blob(&self, blob: &Blob) -> LicenseResult<LicenseContent> {
        self.manager.uninstall(&self.config.subject)?;
        self.install_cleared(blob)
    }

    fn install_cleared(&self, blob: &Blob) -> LicenseResult<LicenseContent> {
        let verifying_key = self.verifying_key()?;
        self.manager.install(
            blob,
            &verifying_key,
            self.config.cipher_secret.expose(),
            &self.config.subject,
        )
    }

    pub fn verify(&self) -> LicenseResult<LicenseContent> {
        let verifying_key = self.verifying_key()?;
        self.manager.verify(
            &verifying_key,
            self.config.cipher_secret.expose(),
            &self.config.subject,
        )
    }

    pub fn uninstall(&self) -> LicenseResult<()> {
        self.manager.uninstall(&self.config.subject)
    }

    pub fn state(&self) -> LicenseResult<LicenseState> {
        self.manager.state(&self.config.subject)
    }
}
