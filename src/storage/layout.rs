//! Bit-exact on-disk layout of a store root.
//!
//! ```text
//! <root>/
//!   config.json
//!   hooks_state.json
//!   import_state.json
//!   sessions/<id>/
//!       meta.json
//!       events.jsonl          # present only if source = pty
//!       chunks.jsonl
//!   artifacts/
//!       chunks.jsonl
//!       plans/<slug>.md
//!       plans/<slug>.meta.json
//!       todos/<agent_session>.json
//!       tasks/<agent_session>/<task_id>.json
//!   index/
//!       vectors.bin
//!       metadata.jsonl
//!       dim
//!   state/state.json
//! ```

use std::path::{Path, PathBuf};

/// A store root and the paths derived from it.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// Wraps a store root path. Does not touch the filesystem.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store root itself.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/config.json`
    #[must_use]
    pub fn config(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// `<root>/hooks_state.json`
    #[must_use]
    pub fn hooks_state(&self) -> PathBuf {
        self.root.join("hooks_state.json")
    }

    /// `<root>/import_state.json`
    #[must_use]
    pub fn import_state(&self) -> PathBuf {
        self.root.join("import_state.json")
    }

    /// `<root>/.lock`
    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        self.root.join(".lock")
    }

    /// `<root>/sessions`
    #[must_use]
    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    /// `<root>/sessions/<id>`
    #[must_use]
    pub fn session_dir(&self, id: &str) -> PathBuf {
        self.sessions_dir().join(id)
    }

    /// `<root>/sessions/<id>/meta.json`
    #[must_use]
    pub fn session_meta(&self, id: &str) -> PathBuf {
        self.session_dir(id).join("meta.json")
    }

    /// `<root>/sessions/<id>/events.jsonl`
    #[must_use]
    pub fn session_events(&self, id: &str) -> PathBuf {
        self.session_dir(id).join("events.jsonl")
    }

    /// `<root>/sessions/<id>/chunks.jsonl`
    #[must_use]
    pub fn session_chunks(&self, id: &str) -> PathBuf {
        self.session_dir(id).join("chunks.jsonl")
    }

    /// `<root>/artifacts`
    #[must_use]
    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join("artifacts")
    }

    /// `<root>/artifacts/chunks.jsonl`
    #[must_use]
    pub fn artifact_chunks(&self) -> PathBuf {
        self.artifacts_dir().join("chunks.jsonl")
    }

    /// `<root>/artifacts/plans/<slug>.md`
    #[must_use]
    pub fn plan_doc(&self, slug: &str) -> PathBuf {
        self.artifacts_dir().join("plans").join(format!("{slug}.md"))
    }

    /// `<root>/artifacts/plans/<slug>.meta.json`
    #[must_use]
    pub fn plan_meta(&self, slug: &str) -> PathBuf {
        self.artifacts_dir()
            .join("plans")
            .join(format!("{slug}.meta.json"))
    }

    /// `<root>/artifacts/todos/<agent_session>.json`
    #[must_use]
    pub fn todo_doc(&self, agent_session: &str) -> PathBuf {
        self.artifacts_dir()
            .join("todos")
            .join(format!("{agent_session}.json"))
    }

    /// `<root>/artifacts/tasks/<agent_session>/<task_id>.json`
    #[must_use]
    pub fn task_doc(&self, agent_session: &str, task_id: &str) -> PathBuf {
        self.artifacts_dir()
            .join("tasks")
            .join(agent_session)
            .join(format!("{task_id}.json"))
    }

    /// `<root>/index`
    #[must_use]
    pub fn index_dir(&self) -> PathBuf {
        self.root.join("index")
    }

    /// `<root>/index/vectors.bin`
    #[must_use]
    pub fn index_vectors(&self) -> PathBuf {
        self.index_dir().join("vectors.bin")
    }

    /// `<root>/index/vectors.bin.new`, the rebuild staging file.
    #[must_use]
    pub fn index_vectors_new(&self) -> PathBuf {
        self.index_dir().join("vectors.bin.new")
    }

    /// `<root>/index/metadata.jsonl`
    #[must_use]
    pub fn index_metadata(&self) -> PathBuf {
        self.index_dir().join("metadata.jsonl")
    }

    /// `<root>/index/metadata.jsonl.new`, the rebuild staging file.
    #[must_use]
    pub fn index_metadata_new(&self) -> PathBuf {
        self.index_dir().join("metadata.jsonl.new")
    }

    /// `<root>/index/dim`
    #[must_use]
    pub fn index_dim(&self) -> PathBuf {
        self.index_dir().join("dim")
    }

    /// `<root>/state/state.json`
    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    /// `<root>/state/state.json`
    #[must_use]
    pub fn state_doc(&self) -> PathBuf {
        self.state_dir().join("state.json")
    }

    /// Creates every directory this layout defines, if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [
            self.root.clone(),
            self.sessions_dir(),
            self.artifacts_dir(),
            self.artifacts_dir().join("plans"),
            self.artifacts_dir().join("todos"),
            self.artifacts_dir().join("tasks"),
            self.index_dir(),
            self.state_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Returns the global per-user registry path: `<home>/.memory-bank/projects.json`.
#[must_use]
pub fn global_registry_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".memory-bank").join("projects.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_rooted_correctly() {
        let layout = Layout::new("/tmp/proj/.memory-bank");
        assert_eq!(
            layout.config(),
            PathBuf::from("/tmp/proj/.memory-bank/config.json")
        );
        assert_eq!(
            layout.session_meta("20260101-000000-abcd"),
            PathBuf::from("/tmp/proj/.memory-bank/sessions/20260101-000000-abcd/meta.json")
        );
        assert_eq!(
            layout.index_vectors(),
            PathBuf::from("/tmp/proj/.memory-bank/index/vectors.bin")
        );
    }

    #[test]
    fn ensure_dirs_creates_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::new(tmp.path().join(".memory-bank"));
        layout.ensure_dirs().unwrap();
        assert!(layout.sessions_dir().is_dir());
        assert!(layout.index_dir().is_dir());
        assert!(layout.artifacts_dir().join("plans").is_dir());
    }
}
