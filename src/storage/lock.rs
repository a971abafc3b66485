//! Advisory store-level locking.
//!
//! A single `.lock` file at the store root serializes mutation of
//! `vectors.bin`, `metadata.jsonl`, and session logs. Readers take a
//! shared lock; writers take an exclusive lock.

use std::fs::OpenOptions;
use std::path::Path;

use fd_lock::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Result, StorageError};

/// A held shared (read) lock on a store. Dropping it releases the lock.
pub struct StoreReadGuard<'a> {
    _guard: RwLockReadGuard<'a, std::fs::File>,
}

/// A held exclusive (write) lock on a store. Dropping it releases the
/// lock.
pub struct StoreWriteGuard<'a> {
    _guard: RwLockWriteGuard<'a, std::fs::File>,
}

/// A store's lock file handle.
///
/// Owns the open file descriptor the OS-level advisory lock is taken
/// against; must outlive any guard produced from it.
pub struct StoreLock {
    inner: RwLock<std::fs::File>,
    path: String,
}

impl StoreLock {
    /// Opens (creating if necessary) the lock file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockFailed`] if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        let path_str = path.to_string_lossy().to_string();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| StorageError::LockFailed {
                path: path_str.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            inner: RwLock::new(file),
            path: path_str,
        })
    }

    /// Acquires a shared lock, blocking until available.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockFailed`] if the OS call fails.
    pub fn read(&mut self) -> Result<StoreReadGuard<'_>> {
        let guard = self.inner.read().map_err(|e| StorageError::LockFailed {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        Ok(StoreReadGuard { _guard: guard })
    }

    /// Acquires an exclusive lock, blocking until available.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockFailed`] if the OS call fails.
    pub fn write(&mut self) -> Result<StoreWriteGuard<'_>> {
        let guard = self.inner.write().map_err(|e| StorageError::LockFailed {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        Ok(StoreWriteGuard { _guard: guard })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_lock_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".lock");
        let _lock = StoreLock::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn read_and_write_guards_can_be_acquired() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".lock");
        let mut lock = StoreLock::open(&path).unwrap();
        {
            let _read = lock.read().unwrap();
        }
        let _write = lock.write().unwrap();
    }
}
