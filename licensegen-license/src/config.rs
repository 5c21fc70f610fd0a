//! TOML configuration for the issuing and installing sides.
//!
//! ```toml
//! # generate.toml
//! subject = "MyApp"
//! keystore_filename = "private.keystore"
//! keystore_password = "store-pw"
//! key_password = "key-pw"
//! alias = "license-signing"
//! cipher_secret = "s3cret-2024"
//! first_name = "John"
//! last_name = "Doe"
//! city = "Paris"
//! state = "IDF"
//! country = "FR"
//! issuer = "CN=ACME Licensing,O=ACME,C=FR"
//! validity_secs = 2592000
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::builder::DEFAULT_CONSUMER_TYPE;
use crate::error::{LicenseError, LicenseResult};
use crate::identity::DistinguishedName;
use crate::secret::Secret;

/// Default license file extension.
pub const DEFAULT_LICENSE_EXTENSION: &str = ".lic";

fn default_extension() -> String {
    DEFAULT_LICENSE_EXTENSION.to_string()
}

fn default_consumer_type() -> String {
    DEFAULT_CONSUMER_TYPE.to_string()
}

fn default_consumer_amount() -> u32 {
    1
}

fn load_toml<T: DeserializeOwned>(path: &Path) -> LicenseResult<T> {
    let text = fs::read_to_string(path)
        .map_err(|e| LicenseError::Config(format!("cannot read {}: {e}", path.display())))?;
    toml::from_str(&text)
        .map_err(|e| LicenseError::Config(format!("{}: {e}", path.display())))
}

fn require(field: &str, empty: bool) -> LicenseResult<()> {
    if empty {
        return Err(LicenseError::Config(format!("missing value for `{field}`")));
    }
    Ok(())
}

/// Settings for generating licenses.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateConfig {
    pub subject: String,
    #[serde(default = "default_extension")]
    pub license_file_extension: String,
    /// Private keystore holding the signing key.
    pub keystore_filename: PathBuf,
    pub keystore_password: Secret,
    pub key_password: Secret,
    pub alias: String,
    pub cipher_secret: Secret,
    pub first_name: String,
    pub last_name: String,
    pub city: String,
    pub state: String,
    pub country: String,
    /// Issuer distinguished name.
    pub issuer: String,
    /// Length of the validity window in seconds.
    pub validity_secs: u64,
    #[serde(default = "default_consumer_type")]
    pub consumer_type: String,
    #[serde(default = "default_consumer_amount")]
    pub consumer_amount: u32,
    #[serde(default)]
    pub info: Option<String>,
}

impl GenerateConfig {
    pub fn from_toml_str(text: &str) -> LicenseResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| LicenseError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> LicenseResult<Self> {
        let config: Self = load_toml(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LicenseResult<()> {
        require("subject", self.subject.trim().is_empty())?;
        require("keystore_filename", self.keystore_filename.as_os_str().is_empty())?;
        require("keystore_password", self.keystore_password.is_empty())?;
        require("alias", self.alias.is_empty())?;
        require("cipher_secret", self.cipher_secret.is_empty())?;
        require("first_name", self.first_name.trim().is_empty())?;
        require("issuer", self.issuer.trim().is_empty())?;
        if self.validity_secs == 0 {
            return Err(LicenseError::Config("`validity_secs` must be positive".into()));
        }
        if Self::seconds(self.validity_secs).is_none() {
            return Err(LicenseError::Config("`validity_secs` is too large".into()));
        }
        self.issuer_name()?;
        Ok(())
    }

    /// Holder identity from the person fields.
    pub fn holder(&self) -> DistinguishedName {
        DistinguishedName::person(
            &self.first_name,
            &self.last_name,
            &self.city,
            &self.state,
            &self.country,
        )
    }

    pub fn issuer_name(&self) -> LicenseResult<DistinguishedName> {
        self.issuer
            .parse()
            .map_err(|e| LicenseError::Config(format!("`issuer`: {e}")))
    }

    pub fn validity(&self) -> TimeDelta {
        Self::seconds(self.validity_secs).unwrap_or(TimeDelta::MAX)
    }

    fn seconds(secs: u64) -> Option<TimeDelta> {
        i64::try_from(secs).ok().and_then(TimeDelta::try_seconds)
    }
}

/// Settings for installing and verifying licenses.
#[derive(Debug, Clone, Deserialize)]
pub struct InstallConfig {
    pub subject: String,
    /// Public keystore holding the verification key.
    pub keystore_filename: PathBuf,
    pub keystore_password: Secret,
    pub alias: String,
    pub cipher_secret: Secret,
    /// Directory of the installed-license store. Defaults to a per-user
    /// `licensegen` directory under the platform config dir.
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
}

impl InstallConfig {
    pub fn from_toml_str(text: &str) -> LicenseResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| LicenseError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> LicenseResult<Self> {
        let config: Self = load_toml(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LicenseResult<()> {
        require("subject", self.subject.trim().is_empty())?;
        require("keystore_filename", self.keystore_filename.as_os_str().is_empty())?;
        require("keystore_password", self.keystore_password.is_empty())?;
        require("alias", self.alias.is_empty())?;
        require("cipher_secret", self.cipher_secret.is_empty())?;
        Ok(())
    }

    /// Resolved store directory.
    pub fn store_dir(&self) -> LicenseResult<PathBuf> {
        if let Some(dir) = &self.store_dir {
            return Ok(dir.clone());
        }
        dirs::config_dir()
            .map(|base| base.join("licensegen"))
            .ok_or_else(|| {
                LicenseError::Config(
                    "no `store_dir` configured and no user config directory found".into(),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENERATE: &str = r#"
subject = "MyApp"
keystore_filename = "private.keystore"
keystore_password = "store-pw"
key_password = "key-pw"
alias = "signing"
cipher_secret = "s3cret"
first_name = "John"
last_name = "Doe"
city = "Paris"
state = "IDF"
country = "FR"
issuer = "CN=ACME,C=FR"
validity_secs = 60
"#;

    #[test]
    fn generate_defaults() {
        let config = GenerateConfig::from_toml_str(GENERATE).unwrap();
        assert_eq!(config.license_file_extension, ".lic");
        assert_eq!(config.consumer_type, "User");
        assert_eq!(config.consumer_amount, 1);
        assert_eq!(config.validity(), TimeDelta::seconds(60));
        assert_eq!(config.holder().to_string(), "CN=John Doe,L=Paris,ST=IDF,C=FR");
    }

    #[test]
    fn secrets_are_redacted_in_debug() {
        let config = GenerateConfig::from_toml_str(GENERATE).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("store-pw"));
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    fn missing_and_empty_values_are_config_errors() {
        let missing = GENERATE.replace("alias = \"signing\"\n", "");
        assert!(matches!(
            GenerateConfig::from_toml_str(&missing),
            Err(LicenseError::Config(_))
        ));

        let empty = GENERATE.replace("\"s3cret\"", "\"\"");
        let err = GenerateConfig::from_toml_str(&empty).unwrap_err();
        assert!(err.to_string().contains("cipher_secret"));

        let zero = GENERATE.replace("validity_secs = 60", "validity_secs = 0");
        assert!(GenerateConfig::from_toml_str(&zero).is_err());

        let bad_issuer = GENERATE.replace("CN=ACME,C=FR", "X=1");
        assert!(GenerateConfig::from_toml_str(&bad_issuer).is_err());
    }

    #[test]
    fn install_store_dir_override() {
        let config = InstallConfig::from_toml_str(
            r#"
subject = "MyApp"
keystore_filename = "public.keystore"
keystore_password = "store-pw"
alias = "signing"
cipher_secret = "s3cret"
store_dir = "/var/lib/myapp/license"
"#,
        )
        .unwrap();
        assert_eq!(
            config.store_dir().unwrap(),
            PathBuf::from("/var/lib/myapp/license")
        );
    }
}
