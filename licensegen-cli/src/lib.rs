//! Command-line surface for issuing and installing licenses.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use licensegen_license::{
    GenerateConfig, InstallConfig, KeyPair, KeyStoreWriter, LicenseController, LicenseIssuer,
    LicenseState,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "licensegen")]
#[command(about = "Issue, install and verify offline software licenses")]
pub struct Cli {
    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a private keystore and the matching public keystore
    Keygen {
        /// Alias of the new key pair
        #[arg(long)]
        alias: String,

        /// Private keystore to create (kept by the issuer)
        #[arg(long)]
        private_out: PathBuf,

        /// Public keystore to create (shipped with the application)
        #[arg(long)]
        public_out: PathBuf,

        /// Password sealing both keystore files
        #[arg(long, env = "LICENSEGEN_STORE_PASSWORD", hide_env_values = true)]
        store_password: String,

        /// Password sealing the private key inside the private keystore
        #[arg(long, env = "LICENSEGEN_KEY_PASSWORD", hide_env_values = true)]
        key_password: String,
    },

    /// Generate a license file
    Generate {
        /// Generation settings (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Output path without extension
        #[arg(short, long, default_value = "license")]
        out: PathBuf,
    },

    /// Install a license file, replacing any installed license
    Install {
        /// Install settings (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// License file (armored or raw)
        file: PathBuf,
    },

    /// Verify the installed license
    Verify {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Remove the installed license
    Uninstall {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Report whether a license is installed, without verifying it
    Status {
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn controller(config: &Path) -> Result<LicenseController> {
    let config = InstallConfig::load(config)
        .with_context(|| format!("Failed to load install config {}", config.display()))?;
    Ok(LicenseController::new(config)?)
}

/// Runs one command, writing human-readable results to `out`.
pub fn run(command: Command, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Keygen {
            alias,
            private_out,
            public_out,
            store_password,
            key_password,
        } => {
            let key_pair = KeyPair::generate();

            let mut private = KeyStoreWriter::default();
            private.add_key_pair(alias.as_str(), &key_pair, &key_password)?;
            private
                .save(&private_out, &store_password)
                .with_context(|| format!("Failed to write {}", private_out.display()))?;

            let mut public = KeyStoreWriter::default();
            public.add_public_key(alias.as_str(), &key_pair.verifying_key);
            public
                .save(&public_out, &store_password)
                .with_context(|| format!("Failed to write {}", public_out.display()))?;

            info!(alias = %alias, "Key pair generated");
            writeln!(out, "Private keystore: {}", private_out.display())?;
            writeln!(out, "Public keystore:  {}", public_out.display())?;
        }
        Command::Generate { config, out: basename } => {
            let settings = GenerateConfig::load(&config)
                .with_context(|| format!("Failed to load generate config {}", config.display()))?;
            let path = LicenseIssuer::new(settings)?.generate(&basename)?;
            writeln!(out, "License written to {}", path.display())?;
        }
        Command::Install { config, file } => {
            let content = controller(&config)?
                .install(&file)
                .with_context(|| format!("Failed to install {}", file.display()))?;
            writeln!(out, "License installed\n{content}")?;
        }
        Command::Verify { config } => {
            let content = controller(&config)?.verify()?;
            writeln!(out, "License valid\n{content}")?;
        }
        Command::Uninstall { config } => {
            controller(&config)?.uninstall()?;
            writeln!(out, "License uninstalled")?;
        }
        Command::Status { config } => {
            let state = match controller(&config)?.state()? {
                LicenseState::Installed => "installed",
                LicenseState::Uninstalled => "not installed",
            };
            writeln!(out, "{state}")?;
        }
    }
    Ok(())
}
