//! Artifact persistence: shared artifact chunk log, plan/todo/task
//! documents, and import-state deduplication.

use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::Write as _;

use serde::{Deserialize, Serialize};

use crate::core::{ArtifactKey, Chunk};
use crate::error::{Result, StorageError};
use crate::io;

use super::layout::Layout;

/// `import_state.json`: tracks already-imported structured transcripts
/// (by UUID) and already-imported artifacts (by dedup key).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportState {
    /// UUIDs of structured transcripts already imported as sessions.
    #[serde(default)]
    pub imported_uuids: BTreeSet<String>,
    /// Dedup keys of artifacts already imported, serialized as
    /// `"<kind>/<agent_session_id>/<artifact_id>"` strings for a stable
    /// on-disk representation.
    #[serde(default)]
    pub artifacts: BTreeSet<String>,
}

fn artifact_key_string(key: &ArtifactKey) -> String {
    format!(
        "{}/{}/{}",
        key.kind.dir_name(),
        key.agent_session_id,
        key.artifact_id
    )
}

impl ImportState {
    /// Loads import state from `<root>/import_state.json`, or an empty
    /// state if the file doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(layout: &Layout) -> Result<Self> {
        let path = layout.import_state();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = io::read_file(&path)?;
        serde_json::from_str(&content).map_err(|e| {
            StorageError::Corrupt {
                path: path.to_string_lossy().to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Persists import state to `<root>/import_state.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn save(&self, layout: &Layout) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(StorageError::from)?;
        io::write_file(layout.import_state(), &json)
    }

    /// Returns true if `uuid` has already been imported as a session.
    #[must_use]
    pub fn has_transcript(&self, uuid: &str) -> bool {
        self.imported_uuids.contains(uuid)
    }

    /// Records `uuid` as imported.
    pub fn mark_transcript(&mut self, uuid: String) {
        self.imported_uuids.insert(uuid);
    }

    /// Returns true if `key` has already been imported.
    #[must_use]
    pub fn has_artifact(&self, key: &ArtifactKey) -> bool {
        self.artifacts.contains(&artifact_key_string(key))
    }

    /// Records `key` as imported.
    pub fn mark_artifact(&mut self, key: &ArtifactKey) {
        self.artifacts.insert(artifact_key_string(key));
    }
}

/// `hooks_state.json`: maps the host agent's own session id to our
/// session id, so repeated Stop events for the same agent session
/// append to the same store session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HooksState {
    /// Map from `agent_session_id` to our `session_id`.
    #[serde(flatten)]
    pub mapping: std::collections::BTreeMap<String, String>,
}

impl HooksState {
    /// Loads hooks state from `<root>/hooks_state.json`, or empty if
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(layout: &Layout) -> Result<Self> {
        let path = layout.hooks_state();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = io::read_file(&path)?;
        serde_json::from_str(&content).map_err(|e| {
            StorageError::Corrupt {
                path: path.to_string_lossy().to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Persists hooks state to `<root>/hooks_state.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn save(&self, layout: &Layout) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(StorageError::from)?;
        io::write_file(layout.hooks_state(), &json)
    }
}

/// Appends chunks to the shared `artifacts/chunks.jsonl` log.
///
/// # Errors
///
/// Returns an error if the append fails.
pub fn append_artifact_chunks(layout: &Layout, chunks: &[Chunk]) -> Result<()> {
    let path = layout.artifact_chunks();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    for chunk in chunks {
        let line = serde_json::to_string(chunk).map_err(StorageError::from)?;
        writeln!(file, "{line}")?;
    }
    Ok(())
}

/// Reads every chunk from the shared artifacts chunk log.
///
/// # Errors
///
/// Returns an error if a line fails to parse.
pub fn read_artifact_chunks(layout: &Layout) -> Result<Vec<Chunk>> {
    let path = layout.artifact_chunks();
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = io::read_file(&path)?;
    let mut chunks = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let chunk = serde_json::from_str(line).map_err(|e| StorageError::Corrupt {
            path: path.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;
        chunks.push(chunk);
    }
    Ok(chunks)
}

/// Writes a plan document and its sidecar metadata.
///
/// # Errors
///
/// Returns an error if either file cannot be written.
pub fn write_plan(layout: &Layout, slug: &str, markdown: &str, meta_json: &str) -> Result<()> {
    io::write_file(layout.plan_doc(slug), markdown)?;
    io::write_file(layout.plan_meta(slug), meta_json)
}

/// Writes a todo-list document for one agent session.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_todo(layout: &Layout, agent_session: &str, json: &str) -> Result<()> {
    io::write_file(layout.todo_doc(agent_session), json)
}

/// Writes a single task document under an agent session's task tree.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_task(layout: &Layout, agent_session: &str, task_id: &str, json: &str) -> Result<()> {
    io::write_file(layout.task_doc(agent_session, task_id), json)
}
