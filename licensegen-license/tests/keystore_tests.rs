mod common;

use base64::{Engine, engine::general_purpose::STANDARD};
use common::{ALIAS, KEY_PASSWORD, STORE_PASSWORD, fast_kdf, test_keypair, write_keystores};
use licensegen_crypto::PasswordSealed;
use licensegen_license::{
    FileKeyStore, KeyPair, KeyStoreProvider, KeyStoreWriter, LicenseError, MemoryKeyStore,
};

#[test]
fn private_keystore_yields_signing_key() {
    let dir = tempfile::tempdir().unwrap();
    let (private, _) = write_keystores(dir.path());

    let store = FileKeyStore::open(&private, STORE_PASSWORD).unwrap();
    assert_eq!(store.aliases(), vec![ALIAS.to_string()]);
    let signing_key = store.signing_key(ALIAS, KEY_PASSWORD).unwrap();
    assert_eq!(signing_key.to_bytes(), test_keypair().signing_key.to_bytes());
    assert_eq!(store.verifying_key(ALIAS).unwrap(), test_keypair().verifying_key);
}

#[test]
fn public_keystore_has_no_private_key() {
    let dir = tempfile::tempdir().unwrap();
    let (_, public) = write_keystores(dir.path());

    let store = FileKeyStore::open(&public, STORE_PASSWORD).unwrap();
    assert_eq!(store.verifying_key(ALIAS).unwrap(), test_keypair().verifying_key);
    let err = store.signing_key(ALIAS, KEY_PASSWORD).unwrap_err();
    assert!(matches!(err, LicenseError::KeyNotFound(_)), "{err:?}");
}

#[test]
fn wrong_store_password_is_keystore_error() {
    let dir = tempfile::tempdir().unwrap();
    let (private, _) = write_keystores(dir.path());
    let err = FileKeyStore::open(&private, "nope").err().unwrap();
    assert!(matches!(err, LicenseError::KeyStore(_)), "{err:?}");
    assert!(err.is_resource_error());
}

#[test]
fn wrong_key_password_is_keystore_error() {
    let dir = tempfile::tempdir().unwrap();
    let (private, _) = write_keystores(dir.path());
    let store = FileKeyStore::open(&private, STORE_PASSWORD).unwrap();
    let err = store.signing_key(ALIAS, "nope").unwrap_err();
    assert!(matches!(err, LicenseError::KeyStore(_)), "{err:?}");
}

#[test]
fn unknown_alias_is_key_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (_, public) = write_keystores(dir.path());
    let store = FileKeyStore::open(&public, STORE_PASSWORD).unwrap();
    let err = store.verifying_key("missing").unwrap_err();
    assert!(matches!(err, LicenseError::KeyNotFound(ref a) if a == "missing"), "{err:?}");
}

#[test]
fn missing_or_garbage_file_is_keystore_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.keystore");
    assert!(matches!(
        FileKeyStore::open(&missing, STORE_PASSWORD),
        Err(LicenseError::KeyStore(_))
    ));

    let garbage = dir.path().join("garbage.keystore");
    std::fs::write(&garbage, b"{\"version\":1,\"sealed\":\"AAAA\"}").unwrap();
    assert!(matches!(
        FileKeyStore::open(&garbage, STORE_PASSWORD),
        Err(LicenseError::KeyStore(_))
    ));

    let future = dir.path().join("future.keystore");
    std::fs::write(&future, b"{\"version\":9,\"sealed\":\"\"}").unwrap();
    let err = FileKeyStore::open(&future, STORE_PASSWORD).err().unwrap();
    assert!(err.to_string().contains("version 9"));
}

#[test]
fn public_from_copies_only_verifying_keys() {
    let dir = tempfile::tempdir().unwrap();
    let mut memory = MemoryKeyStore::new();
    memory.insert_key_pair("a", test_keypair().signing_key);
    memory.insert_key_pair("b", KeyPair::generate().signing_key);

    let path = dir.path().join("public.keystore");
    KeyStoreWriter::public_from(&memory, fast_kdf())
        .unwrap()
        .save(&path, STORE_PASSWORD)
        .unwrap();

    let store = FileKeyStore::open(&path, STORE_PASSWORD).unwrap();
    assert_eq!(store.aliases(), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(store.verifying_key("a").unwrap(), test_keypair().verifying_key);
    assert!(matches!(
        store.signing_key("b", ""),
        Err(LicenseError::KeyNotFound(_))
    ));
}

#[test]
fn memory_keystore_lookup() {
    let mut store = MemoryKeyStore::new();
    store.insert_public_key("pub", test_keypair().verifying_key);
    assert!(store.verifying_key("pub").is_ok());
    assert!(matches!(
        store.signing_key("pub", ""),
        Err(LicenseError::KeyNotFound(_))
    ));
    assert!(matches!(
        store.verifying_key("other"),
        Err(LicenseError::KeyNotFound(_))
    ));
}

#[test]
fn keystore_file_does_not_leak_secrets() {
    let dir = tempfile::tempdir().unwrap();
    let (private, _) = write_keystores(dir.path());
    let text = std::fs::read_to_string(private).unwrap();
    assert!(!text.contains(KEY_PASSWORD));
    assert!(!text.contains(ALIAS));
}

/// Rewrites the keystore file at `path`, editing the decoded alias map
/// and then the fresh outer seal built from it.
fn rewrite_keystore(
    path: &std::path::Path,
    edit_entries: impl FnOnce(&mut serde_json::Value),
    edit_seal: impl FnOnce(&mut PasswordSealed),
) {
    let mut file: serde_json::Value =
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
    let sealed = STANDARD.decode(file["sealed"].as_str().unwrap()).unwrap();
    let sealed = PasswordSealed::from_bytes(&sealed).unwrap();
    let mut entries: serde_json::Value =
        serde_json::from_slice(&sealed.open(STORE_PASSWORD).unwrap()).unwrap();
    edit_entries(&mut entries);

    let plain = serde_json::to_vec(&entries).unwrap();
    let mut resealed = PasswordSealed::seal(STORE_PASSWORD, &plain, &fast_kdf()).unwrap();
    edit_seal(&mut resealed);
    file["sealed"] = STANDARD.encode(resealed.to_bytes()).into();
    std::fs::write(path, serde_json::to_vec(&file).unwrap()).unwrap();
}

#[test]
fn oversized_kdf_costs_are_refused_before_derivation() {
    let dir = tempfile::tempdir().unwrap();
    let (private, public) = write_keystores(dir.path());

    // Store seal: opening would otherwise ask Argon2 for 4 TiB.
    rewrite_keystore(&public, |_| {}, |sealed| sealed.params.memory_cost = u32::MAX);
    let err = FileKeyStore::open(&public, STORE_PASSWORD).err().unwrap();
    assert!(matches!(err, LicenseError::KeyStore(_)), "{err:?}");
    assert!(err.to_string().contains("exceed the allowed maximum"), "{err}");

    // Private key seal: the store opens and keeps serving verifying keys.
    rewrite_keystore(
        &private,
        |entries| {
            let encoded = entries[ALIAS]["private_key"].as_str().unwrap();
            let mut key = PasswordSealed::from_bytes(&STANDARD.decode(encoded).unwrap()).unwrap();
            key.params.time_cost = u32::MAX;
            entries[ALIAS]["private_key"] = STANDARD.encode(key.to_bytes()).into();
        },
        |_| {},
    );
    let store = FileKeyStore::open(&private, STORE_PASSWORD).unwrap();
    assert_eq!(store.verifying_key(ALIAS).unwrap(), test_keypair().verifying_key);
    let err = store.signing_key(ALIAS, KEY_PASSWORD).unwrap_err();
    assert!(matches!(err, LicenseError::KeyStore(_)), "{err:?}");
    assert!(err.to_string().contains("exceed the allowed maximum"), "{err}");
}
