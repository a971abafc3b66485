//! Shared domain types used across every subsystem: sessions, chunks,
//! events, and artifacts.
//!
//! These are the tagged unions the rest of the crate matches on
//! exhaustively at render and classification sites.

pub mod artifact;
pub mod chunk;
pub mod event;
pub mod session;

pub use artifact::{ArtifactKey, ArtifactKind};
pub use chunk::{Chunk, SpeakerRole};
pub use event::{PtyEvent, Stream};
pub use session::{SessionMeta, SessionSource};

/// Returns the current time as seconds since the Unix epoch.
///
/// Single point of truth for "now" so decay, fingerprints, and meta
/// timestamps stay consistent with each other.
#[must_use]
pub fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

/// A chunk's identifying key: the triple that makes it unique within a
/// store, independent of its text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    /// Owning session id, or `"artifacts"` for shared artifact chunks.
    pub session_id: String,
    /// 0-based position within the owning chunk log.
    pub chunk_index: usize,
    /// Kind of content the chunk was drawn from.
    pub source_type: SourceType,
}

/// The kind of content a chunk was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Chunk drawn from a captured session transcript or PTY log.
    Session,
    /// Chunk drawn from an imported plan document.
    Plan,
    /// Chunk drawn from an imported todo list.
    Todo,
    /// Chunk drawn from an imported task tree.
    Task,
}

impl SourceType {
    /// Returns the lowercase name used in on-disk records and CLI flags.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Plan => "plan",
            Self::Todo => "todo",
            Self::Task => "task",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
