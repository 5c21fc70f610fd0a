//! licensegen: offline license issuing and installation.
//!
//! Usage:
//!   licensegen keygen --alias signing --private-out private.keystore \
//!       --public-out public.keystore --store-password S --key-password K
//!   licensegen generate --config generate.toml --out john
//!   licensegen install --config install.toml john.lic
//!   licensegen verify --config install.toml
//!   licensegen uninstall --config install.toml

use std::process::ExitCode;

use clap::Parser;
use licensegen_cli::{run, Cli};
use licensegen_license::LicenseError;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match run(cli.command, &mut std::io::stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let kind = e
                .downcast_ref::<LicenseError>()
                .map_or("error", LicenseError::kind);
            error!(kind, "{e:#}");
            ExitCode::FAILURE
        }
    }
}
