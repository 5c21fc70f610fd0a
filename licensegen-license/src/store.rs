//! Persisted license storage.
//!
//! A [`LicenseStore`] is a small key-value collaborator keyed by subject.
//! The manager keeps at most one blob per key in it.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use fd_lock::RwLock;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{LicenseError, LicenseResult};

/// Key-value storage for installed license blobs.
pub trait LicenseStore: Send + Sync {
    /// Returns the stored value, if any.
    fn get(&self, key: &str) -> LicenseResult<Option<Vec<u8>>>;

    /// Stores `value`, replacing any previous value.
    fn put(&self, key: &str, value: &[u8]) -> LicenseResult<()>;

    /// Removes the value. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> LicenseResult<()>;

    /// Runs `op` while holding an exclusive lock on `key`.
    ///
    /// Stores shared between processes must make this a real cross-process
    /// lock so a clear-then-write sequence cannot interleave with another.
    fn locked<R>(&self, key: &str, op: impl FnOnce() -> LicenseResult<R>) -> LicenseResult<R>
    where
        Self: Sized;
}

impl<S: LicenseStore> LicenseStore for Arc<S> {
    fn get(&self, key: &str) -> LicenseResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> LicenseResult<()> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &str) -> LicenseResult<()> {
        (**self).delete(key)
    }

    fn locked<R>(&self, key: &str, op: impl FnOnce() -> LicenseResult<R>) -> LicenseResult<R> {
        (**self).locked(key, op)
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LicenseStore for MemoryStore {
    fn get(&self, key: &str) -> LicenseResult<Option<Vec<u8>>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> LicenseResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> LicenseResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }

    // Callers in one process are already serialized by the manager.
    fn locked<R>(&self, _key: &str, op: impl FnOnce() -> LicenseResult<R>) -> LicenseResult<R> {
        op()
    }
}

/// Directory-backed store: one file per key.
///
/// File names are `hex(sha256(key)).lic`, so any subject string maps to a
/// safe name. Writes go through a temp file in the same directory and are
/// renamed into place. [`LicenseStore::locked`] takes an advisory
/// exclusive lock on a sibling `.lock` file.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

fn storage_err(path: &Path, e: impl std::fmt::Display) -> LicenseError {
    LicenseError::Storage(format!("{}: {e}", path.display()))
}

impl FileStore {
    /// Opens (creating if needed) the store directory.
    pub fn open(dir: impl Into<PathBuf>) -> LicenseResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| storage_err(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_stem(key: &str) -> String {
        hex::encode(Sha256::digest(key.as_bytes()))
    }

    /// Path of the entry file for `key`.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.lic", Self::file_stem(key)))
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", Self::file_stem(key)))
    }
}

impl LicenseStore for FileStore {
    fn get(&self, key: &str) -> LicenseResult<Option<Vec<u8>>> {
        let path = self.entry_path(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_err(&path, e)),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> LicenseResult<()> {
        let path = self.entry_path(key);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(|e| storage_err(&path, e))?;
        tmp.write_all(value).map_err(|e| storage_err(&path, e))?;
        tmp.as_file().sync_all().map_err(|e| storage_err(&path, e))?;
        tmp.persist(&path).map_err(|e| storage_err(&path, e.error))?;
        debug!(path = %path.display(), bytes = value.len(), "Stored license entry");
        Ok(())
    }

    fn delete(&self, key: &str) -> LicenseResult<()> {
        let path = self.entry_path(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "Removed license entry");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_err(&path, e)),
        }
    }

    fn locked<R>(&self, key: &str, op: impl FnOnce() -> LicenseResult<R>) -> LicenseResult<R> {
        let path = self.lock_path(key);
        let file: File = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| storage_err(&path, e))?;
        let mut lock = RwLock::new(file);
        let _guard = lock.write().map_err(|e| storage_err(&path, e))?;
        op()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_put_get_delete() {
        let store = MemoryStore::new();
        assert!(store.get("a").unwrap().is_none());
        store.put("a", b"one").unwrap();
        store.put("a", b"two").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some(&b"two"[..]));
        assert_eq!(store.len(), 1);
        store.delete("a").unwrap();
        store.delete("a").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn entry_names_are_hashed() {
        let store = FileStore {
            dir: PathBuf::from("/tmp/x"),
        };
        let path = store.entry_path("../../etc/passwd");
        assert_eq!(path.parent(), Some(Path::new("/tmp/x")));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(name.len(), 64 + ".lic".len());
    }
}
