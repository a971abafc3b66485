//! Externally produced documents imported alongside sessions.

use serde::{Deserialize, Serialize};

/// The kind of artifact tracked in `import_state.json` and the artifacts
/// store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// A plan document (`artifacts/plans/<slug>.md`).
    Plan,
    /// A todo list (`artifacts/todos/<agent_session>.json`).
    Todo,
    /// A task tree (`artifacts/tasks/<agent_session>/<task_id>.json`).
    Task,
}

impl ArtifactKind {
    /// Returns the directory name this kind of artifact is stored under.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Plan => "plans",
            Self::Todo => "todos",
            Self::Task => "tasks",
        }
    }
}

/// A deduplication key for imported artifacts.
///
/// The spec leaves the exact key unspecified; `(kind, agent_session_id,
/// artifact_id)` is the documented choice (see `DESIGN.md`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    /// Kind of artifact.
    pub kind: ArtifactKind,
    /// The host agent's session id that produced this artifact.
    pub agent_session_id: String,
    /// Artifact-local identifier (task id, or the plan slug).
    pub artifact_id: String,
}
