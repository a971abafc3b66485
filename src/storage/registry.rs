//! Process-user-scoped global project registry, enabling cross-project
//! search (`<home>/.memory-bank/projects.json`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, StorageError};
use crate::io;

use super::layout::global_registry_path;

/// One registered project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEntry {
    /// Absolute path to the project's store root.
    pub root: PathBuf,
    /// Seconds since epoch of the last successful import into this
    /// project's store.
    pub last_import_at: i64,
    /// Number of sessions currently recorded in this project's store.
    pub session_count: usize,
}

/// The global registry document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    /// Registered project roots.
    #[serde(default)]
    pub projects: Vec<ProjectEntry>,
}

impl Registry {
    /// Loads the registry from `path`, or an empty registry if it
    /// doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = io::read_file(path)?;
        serde_json::from_str(&content).map_err(|e| {
            StorageError::Corrupt {
                path: path.to_string_lossy().to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Loads the registry from the default per-user location.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Registry`] if the home directory cannot
    /// be resolved, or an error if the file exists but cannot be parsed.
    pub fn load_default() -> Result<Self> {
        let path = global_registry_path().ok_or_else(|| StorageError::Registry(
            "could not resolve the current user's home directory".to_string(),
        ))?;
        Self::load(&path)
    }

    /// Persists the registry to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(StorageError::from)?;
        io::write_file(path, &json)
    }

    /// Registers or updates a project's entry, keyed by root path.
    pub fn upsert(&mut self, root: PathBuf, last_import_at: i64, session_count: usize) {
        if let Some(entry) = self.projects.iter_mut().find(|e| e.root == root) {
            entry.last_import_at = last_import_at;
            entry.session_count = session_count;
        } else {
            self.projects.push(ProjectEntry {
                root,
                last_import_at,
                session_count,
            });
        }
    }

    /// Removes a project's entry, if present.
    pub fn remove(&mut self, root: &Path) {
        self.projects.retain(|e| e.root != root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("projects.json");
        let registry = Registry::load(&path).unwrap();
        assert!(registry.projects.is_empty());
    }

    #[test]
    fn upsert_inserts_then_updates() {
        let mut registry = Registry::default();
        registry.upsert(PathBuf::from("/a"), 100, 3);
        assert_eq!(registry.projects.len(), 1);
        registry.upsert(PathBuf::from("/a"), 200, 5);
        assert_eq!(registry.projects.len(), 1);
        assert_eq!(registry.projects[0].session_count, 5);
    }

    #[test]
    fn save_and_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("projects.json");
        let mut registry = Registry::default();
        registry.upsert(PathBuf::from("/project"), 42, 7);
        registry.save(&path).unwrap();
        let loaded = Registry::load(&path).unwrap();
        assert_eq!(loaded.projects.len(), 1);
        assert_eq!(loaded.projects[0].session_count, 7);
    }

    #[test]
    fn remove_drops_matching_entry() {
        let mut registry = Registry::default();
        registry.upsert(PathBuf::from("/a"), 1, 1);
        registry.upsert(PathBuf::from("/b"), 1, 1);
        registry.remove(&PathBuf::from("/a"));
        assert_eq!(registry.projects.len(), 1);
        assert_eq!(registry.projects[0].root, PathBuf::from("/b"));
    }
}
