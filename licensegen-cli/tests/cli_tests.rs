use std::path::Path;

use clap::{CommandFactory, Parser};
use licensegen_cli::{Cli, Command, run};
use licensegen_license::LicenseError;

fn exec(args: &[&str]) -> anyhow::Result<String> {
    let cli = Cli::try_parse_from(std::iter::once("licensegen").chain(args.iter().copied()))?;
    let mut out = Vec::new();
    run(cli.command, &mut out)?;
    Ok(String::from_utf8(out)?)
}

fn path(p: &Path) -> &str {
    p.to_str().unwrap()
}

fn keygen(dir: &Path) {
    exec(&[
        "keygen",
        "--alias",
        "signing",
        "--private-out",
        path(&dir.join("private.keystore")),
        "--public-out",
        path(&dir.join("public.keystore")),
        "--store-password",
        "store-pw",
        "--key-password",
        "key-pw",
    ])
    .unwrap();
}

fn write_configs(dir: &Path, subject_on_install: &str) {
    let generate = format!(
        r#"
subject = "MyApp"
keystore_filename = {:?}
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
validity_secs = 3600
"#,
        dir.join("private.keystore")
    );
    std::fs::write(dir.join("generate.toml"), generate).unwrap();

    let install = format!(
        r#"
subject = "{subject_on_install}"
keystore_filename = {:?}
keystore_password = "store-pw"
alias = "signing"
cipher_secret = "s3cret"
store_dir = {:?}
"#,
        dir.join("public.keystore"),
        dir.join("store"),
    );
    std::fs::write(dir.join("install.toml"), install).unwrap();
}

#[test]
fn parses_global_verbose_after_subcommand() {
    let cli = Cli::try_parse_from(["licensegen", "verify", "-c", "install.toml", "--verbose"]).unwrap();
    assert!(cli.verbose);
    assert!(matches!(cli.command, Command::Verify { .. }));
}

#[test]
fn generate_defaults_output_basename() {
    let cli = Cli::try_parse_from(["licensegen", "generate", "--config", "g.toml"]).unwrap();
    match cli.command {
        Command::Generate { out, .. } => assert_eq!(out, Path::new("license")),
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn install_requires_a_file() {
    assert!(Cli::try_parse_from(["licensegen", "install", "--config", "i.toml"]).is_err());
}

#[test]
fn keygen_passwords_fall_back_to_hidden_env_vars() {
    let cli = Cli::command();
    let keygen = cli.find_subcommand("keygen").unwrap();
    for (id, var) in [
        ("store_password", "LICENSEGEN_STORE_PASSWORD"),
        ("key_password", "LICENSEGEN_KEY_PASSWORD"),
    ] {
        let arg = keygen.get_arguments().find(|a| a.get_id() == id).unwrap();
        assert_eq!(arg.get_env().and_then(|v| v.to_str()), Some(var));
        assert!(arg.is_hide_env_values_set(), "{id} leaks its value in --help");
    }
    let help = keygen.clone().render_long_help().to_string();
    assert!(help.contains("LICENSEGEN_STORE_PASSWORD"));
}

#[test]
fn full_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    keygen(dir.path());
    write_configs(dir.path(), "MyApp");
    let install_toml = dir.path().join("install.toml");
    let generate_toml = dir.path().join("generate.toml");

    let out = exec(&[
        "generate",
        "--config",
        path(&generate_toml),
        "--out",
        path(&dir.path().join("john")),
    ])
    .unwrap();
    assert!(out.contains("john.lic"));

    let out = exec(&["status", "--config", path(&install_toml)]).unwrap();
    assert_eq!(out.trim(), "not installed");

    let license = dir.path().join("john.lic");
    let out = exec(&["install", "--config", path(&install_toml), path(&license)]).unwrap();
    assert!(out.contains("License installed"));
    assert!(out.contains("CN=John Doe,L=Paris,ST=IDF,C=FR"));

    let out = exec(&["verify", "--config", path(&install_toml)]).unwrap();
    assert!(out.contains("Subject   : MyApp"));

    exec(&["uninstall", "--config", path(&install_toml)]).unwrap();
    let err = exec(&["verify", "--config", path(&install_toml)]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LicenseError>(),
        Some(LicenseError::NotInstalled(_))
    ));
}

#[test]
fn subject_mismatch_surfaces_as_license_error() {
    let dir = tempfile::tempdir().unwrap();
    keygen(dir.path());
    write_configs(dir.path(), "OtherApp");

    exec(&[
        "generate",
        "--config",
        path(&dir.path().join("generate.toml")),
        "--out",
        path(&dir.path().join("john")),
    ])
    .unwrap();

    let err = exec(&[
        "install",
        "--config",
        path(&dir.path().join("install.toml")),
        path(&dir.path().join("john.lic")),
    ])
    .unwrap_err();
    let license_err = err.downcast_ref::<LicenseError>().unwrap();
    assert_eq!(license_err.kind(), "subject-mismatch");
}

#[test]
fn missing_config_file_has_context() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let err = exec(&["verify", "--config", path(&missing)]).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to load install config"));
    assert_eq!(err.downcast_ref::<LicenseError>().map(LicenseError::kind), Some("config"));
}
