//! Output formatting: per-command text/JSON/NDJSON renderers and
//! structured error formatting.

use serde::Serialize;

use crate::core::{Chunk, SessionMeta};
use crate::episode::Episode;
use crate::pack::ContextPack;
use crate::retrieval::ScoredChunk;
use crate::storage::registry::ProjectEntry;

/// Output format requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text tables and messages.
    Text,
    /// A single pretty-printed JSON document.
    Json,
    /// Newline-delimited JSON, one record per line.
    Ndjson,
}

impl OutputFormat {
    /// Parses a format name, falling back to [`OutputFormat::Text`] for
    /// anything unrecognized.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "json" => Self::Json,
            "ndjson" => Self::Ndjson,
            _ => Self::Text,
        }
    }

    /// Returns true for formats that emit one record per line rather
    /// than a single document.
    #[must_use]
    pub const fn is_streaming(self) -> bool {
        matches!(self, Self::Ndjson)
    }
}

fn format_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Formats the result of `init`.
#[must_use]
pub fn format_init(root: &std::path::Path, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("initialized memory bank at {}\n", root.display()),
        OutputFormat::Json | OutputFormat::Ndjson => {
            format_json(&serde_json::json!({"success": true, "root": root}))
        }
    }
}

/// Formats the session list for `sessions`.
#[must_use]
pub fn format_sessions(sessions: &[(SessionMeta, Option<Episode>)], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            use std::fmt::Write as _;
            if sessions.is_empty() {
                return "no sessions recorded\n".to_string();
            }
            let mut out = String::new();
            for (meta, episode) in sessions {
                let status = if meta.is_finalized() { "closed" } else { "open" };
                let episode_label = episode.map_or("-", Episode::as_str);
                let command = meta.command.as_deref().unwrap_or("-");
                let _ = writeln!(
                    out,
                    "{}\t{}\t{:?}\t{status}\t{episode_label}\t{}",
                    meta.id, meta.started_at, meta.source, truncate(command, 40)
                );
            }
            out
        }
        OutputFormat::Ndjson => {
            let mut out = String::new();
            for (meta, episode) in sessions {
                out.push_str(&serde_json::to_string(&serde_json::json!({
                    "id": meta.id,
                    "source": meta.source,
                    "started_at": meta.started_at,
                    "ended_at": meta.ended_at,
                    "exit_code": meta.exit_code,
                    "episode": episode.map(Episode::as_str),
                })).unwrap_or_else(|_| "{}".to_string()));
                out.push('\n');
            }
            out
        }
        OutputFormat::Json => {
            let items: Vec<_> = sessions
                .iter()
                .map(|(meta, episode)| {
                    serde_json::json!({
                        "id": meta.id,
                        "source": meta.source,
                        "started_at": meta.started_at,
                        "ended_at": meta.ended_at,
                        "exit_code": meta.exit_code,
                        "episode": episode.map(Episode::as_str),
                    })
                })
                .collect();
            format_json(&items)
        }
    }
}

/// Formats the result of `import`: number of chunks written, and any
/// per-item warnings encountered along the way.
#[must_use]
pub fn format_import(session_id: &str, chunks_written: usize, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            format!("imported session {session_id}: {chunks_written} chunks\n")
        }
        OutputFormat::Json | OutputFormat::Ndjson => format_json(&serde_json::json!({
            "success": true,
            "session_id": session_id,
            "chunks_written": chunks_written,
        })),
    }
}

/// Formats the result of `delete`.
#[must_use]
pub fn format_delete(id: &str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("deleted session {id}\n"),
        OutputFormat::Json | OutputFormat::Ndjson => {
            format_json(&serde_json::json!({"success": true, "id": id}))
        }
    }
}

/// Formats search results for `search`.
#[must_use]
pub fn format_search_results(results: &[ScoredChunk], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            use std::fmt::Write as _;
            if results.is_empty() {
                return "no results\n".to_string();
            }
            let mut out = String::new();
            for (rank, scored) in results.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "{}. [{:.4}] {}/{} ({}): {}",
                    rank + 1,
                    scored.score,
                    scored.chunk.session_id,
                    scored.chunk.chunk_index,
                    scored.chunk.source_type,
                    truncate(&scored.chunk.preview(120), 120)
                );
            }
            out
        }
        OutputFormat::Ndjson => {
            let mut out = String::new();
            for scored in results {
                out.push_str(&search_result_json(scored).to_string());
                out.push('\n');
            }
            out
        }
        OutputFormat::Json => {
            let items: Vec<_> = results.iter().map(search_result_json).collect();
            format_json(&items)
        }
    }
}

fn search_result_json(scored: &ScoredChunk) -> serde_json::Value {
    serde_json::json!({
        "session_id": scored.chunk.session_id,
        "chunk_index": scored.chunk.chunk_index,
        "source_type": scored.chunk.source_type,
        "score": scored.score,
        "text": scored.chunk.text,
    })
}

/// Formats an assembled pack. The pack's own `--pack-format` flag
/// (xml/json/markdown) picks the payload rendering; `format` only
/// applies the `--format json` envelope for text vs. structured output.
#[must_use]
pub fn format_pack(rendered: &str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => rendered.to_string(),
        OutputFormat::Json | OutputFormat::Ndjson => {
            format_json(&serde_json::json!({"success": true, "pack": rendered}))
        }
    }
}

/// Formats the result of `reindex`.
#[must_use]
pub fn format_reindex(chunks_indexed: usize, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("reindexed {chunks_indexed} chunks\n"),
        OutputFormat::Json | OutputFormat::Ndjson => {
            format_json(&serde_json::json!({"success": true, "chunks_indexed": chunks_indexed}))
        }
    }
}

/// Formats the result of `migrate`.
#[must_use]
pub fn format_migrate(from_version: u32, to_version: u32, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            format!("migrated config from version {from_version} to {to_version}\n")
        }
        OutputFormat::Json | OutputFormat::Ndjson => format_json(&serde_json::json!({
            "success": true,
            "from_version": from_version,
            "to_version": to_version,
        })),
    }
}

/// Formats the registered project list for `projects`.
#[must_use]
pub fn format_projects(projects: &[ProjectEntry], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            use std::fmt::Write as _;
            if projects.is_empty() {
                return "no projects registered\n".to_string();
            }
            let mut out = String::new();
            for entry in projects {
                let _ = writeln!(
                    out,
                    "{}\t{} sessions\tlast import {}",
                    entry.root.display(),
                    entry.session_count,
                    entry.last_import_at
                );
            }
            out
        }
        OutputFormat::Ndjson => {
            let mut out = String::new();
            for entry in projects {
                out.push_str(&format_json(entry).replace('\n', " "));
                out.push('\n');
            }
            out
        }
        OutputFormat::Json => format_json(projects),
    }
}

/// Formats the result of `hooks install|uninstall|status`.
#[must_use]
pub fn format_hooks_status(installed: bool, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if installed {
                "hook installed\n".to_string()
            } else {
                "hook not installed\n".to_string()
            }
        }
        OutputFormat::Json | OutputFormat::Ndjson => {
            format_json(&serde_json::json!({"installed": installed}))
        }
    }
}

/// Formats chunks for debugging/listing contexts (e.g. a future `chunks`
/// command); kept small since the CLI is a thin pass-through.
#[must_use]
pub fn format_chunks(chunks: &[Chunk], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            use std::fmt::Write as _;
            let mut out = String::new();
            for chunk in chunks {
                let _ = writeln!(
                    out,
                    "{}/{} ({}, {} tok): {}",
                    chunk.session_id,
                    chunk.chunk_index,
                    chunk.source_type,
                    chunk.token_count,
                    truncate(&chunk.preview(80), 80)
                );
            }
            out
        }
        OutputFormat::Ndjson => {
            let mut out = String::new();
            for chunk in chunks {
                out.push_str(&format_json(chunk).replace('\n', " "));
                out.push('\n');
            }
            out
        }
        OutputFormat::Json => format_json(chunks),
    }
}

/// Renders `pack` as used by the `ContextPack` summary in `status`-like
/// output; exposed for reuse by tests that assemble a pack directly.
#[must_use]
pub fn format_pack_summary(pack: &ContextPack, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!(
            "pack: {} tokens, {} plans, {} recent items\n",
            pack.total_tokens,
            pack.plans.len(),
            pack.recent_context.len()
        ),
        OutputFormat::Json | OutputFormat::Ndjson => format_json(&serde_json::json!({
            "total_tokens": pack.total_tokens,
            "plans": pack.plans.len(),
            "recent_context": pack.recent_context.len(),
        })),
    }
}

/// Formats an error for output.
///
/// Text returns the error's `Display` message; JSON/NDJSON return a
/// structured object with a stable `type` tag and an optional recovery
/// suggestion.
#[must_use]
pub fn format_error(error: &crate::Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json | OutputFormat::Ndjson => {
            let (error_type, suggestion) = get_error_details(error);
            let json = serde_json::json!({
                "success": false,
                "error": {
                    "type": error_type,
                    "message": error.to_string(),
                    "suggestion": suggestion,
                }
            });
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_string())
        }
    }
}

/// Extracts a stable error type tag and recovery suggestion from an
/// error, exhaustively matching every sub-enum variant so a new error
/// kind fails to compile until it is classified here.
#[allow(clippy::too_many_lines)]
const fn get_error_details(error: &crate::Error) -> (&'static str, Option<&'static str>) {
    use crate::error::{ChunkingError, CommandError, IndexError, IoError, OracleError, StorageError};

    match error {
        crate::Error::Storage(e) => match e {
            StorageError::NotInitialized => (
                "NotInitialized",
                Some("Run 'memory-bank init' to create a store at this root"),
            ),
            StorageError::Corrupt { .. } => (
                "StoreCorrupt",
                Some("Run 'memory-bank reindex' or restore from a backup"),
            ),
            StorageError::SessionNotFound { .. } => (
                "SessionNotFound",
                Some("Run 'memory-bank sessions' to see available session ids"),
            ),
            StorageError::LockFailed { .. } => (
                "LockFailed",
                Some("Another memory-bank process may be using this store"),
            ),
            StorageError::Serialization(_) => ("SerializationError", None),
            StorageError::Registry(_) => ("RegistryError", None),
        },
        crate::Error::Chunking(e) => match e {
            ChunkingError::InvalidUtf8 { .. } => ("InvalidUtf8", None),
            ChunkingError::TranscriptMalformed { .. } => (
                "TranscriptMalformed",
                Some("Check the transcript file is well-formed line-delimited JSON"),
            ),
            ChunkingError::ChunkTooLarge { .. } => ("ChunkTooLarge", None),
            ChunkingError::InvalidConfig { .. } => ("InvalidChunkingConfig", None),
            ChunkingError::OverlapTooLarge { .. } => (
                "OverlapTooLarge",
                Some("Overlap must be smaller than the chunk size"),
            ),
            ChunkingError::Regex(_) => ("RegexError", None),
        },
        crate::Error::Io(e) => match e {
            IoError::FileNotFound { .. } => ("FileNotFound", Some("Verify the path exists")),
            IoError::ReadFailed { .. } => ("ReadError", None),
            IoError::WriteFailed { .. } => ("WriteError", None),
            IoError::MmapFailed { .. } => ("MemoryMapError", None),
            IoError::DirectoryFailed { .. } => ("DirectoryError", None),
            IoError::Generic(_) => ("IoError", None),
        },
        crate::Error::Index(e) => match e {
            IndexError::DimMismatch { .. } => (
                "IndexDimMismatch",
                Some("Run 'memory-bank reindex' to rebuild with the current embedding model"),
            ),
            IndexError::Stale { .. } => (
                "IndexStale",
                Some("Run 'memory-bank reindex' to rebuild the index"),
            ),
            IndexError::NotBuilt => (
                "IndexNotBuilt",
                Some("Run 'memory-bank reindex' to build the index"),
            ),
        },
        crate::Error::Oracle(e) => match e {
            OracleError::Unreachable(_) => (
                "OracleUnreachable",
                Some("Check that the configured oracle endpoint is running and reachable"),
            ),
            OracleError::ModelMissing(_) => (
                "OracleModelMissing",
                Some("Pull the configured model on the oracle endpoint"),
            ),
            OracleError::Timeout { .. } => ("OracleTimeout", Some("Retry, or increase the configured timeout")),
            OracleError::MalformedResponse(_) => ("OracleMalformedResponse", None),
        },
        crate::Error::Command(e) => match e {
            CommandError::UnknownCommand(_) => ("UnknownCommand", None),
            CommandError::InvalidArgument(_) => ("InvalidArgument", None),
            CommandError::InvalidBudget(_) => (
                "InvalidBudget",
                Some("Provide a positive token budget"),
            ),
            CommandError::InvalidMode(_) => (
                "InvalidMode",
                Some("Valid modes: auto, debug, build, explore"),
            ),
            CommandError::NotImplemented(_) => (
                "NotImplemented",
                Some("This command's collaborator is out of scope for this crate"),
            ),
            CommandError::ExecutionFailed(_) => ("ExecutionFailed", None),
        },
        crate::Error::InvalidState { .. } => ("InvalidState", None),
        crate::Error::Config { .. } => ("ConfigError", None),
    }
}

/// Returns true if `error` indicates the oracle collaborator is
/// unreachable or misconfigured, used by `main.rs` to select exit code
/// `2` per the documented exit code policy.
#[must_use]
pub const fn is_oracle_error(error: &crate::Error) -> bool {
    matches!(error, crate::Error::Oracle(_))
}

/// Truncates a string to `max_len` bytes with an ellipsis, at a
/// character boundary.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let truncated: String = s.chars().take(max_len.saturating_sub(1)).collect();
    format!("{truncated}…")
}
