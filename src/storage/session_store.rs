//! Session metadata, event, and chunk log persistence.

use std::fs::OpenOptions;
use std::io::Write as _;

use crate::core::{Chunk, PtyEvent, SessionMeta};
use crate::error::{Result, StorageError};
use crate::io;

use super::layout::Layout;

/// Creates a session directory and writes its initial, open meta record.
///
/// # Errors
///
/// Returns an error if the directory or meta file cannot be written.
pub fn create_session(layout: &Layout, meta: &SessionMeta) -> Result<()> {
    std::fs::create_dir_all(layout.session_dir(&meta.id))?;
    write_meta(layout, meta)
}

/// Overwrites a session's `meta.json`. Used for finalization; callers
/// must not call this on an already-finalized session without having
/// gone through [`crate::core::SessionMeta::finalize`] first.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_meta(layout: &Layout, meta: &SessionMeta) -> Result<()> {
    let json = serde_json::to_string_pretty(meta).map_err(StorageError::from)?;
    io::write_file(layout.session_meta(&meta.id), &json)
}

/// Loads a session's `meta.json`.
///
/// # Errors
///
/// Returns [`StorageError::SessionNotFound`] if the session does not
/// exist.
pub fn load_meta(layout: &Layout, id: &str) -> Result<SessionMeta> {
    let path = layout.session_meta(id);
    if !path.exists() {
        return Err(StorageError::SessionNotFound { id: id.to_string() }.into());
    }
    let content = io::read_file(&path)?;
    serde_json::from_str(&content)
        .map_err(|e| StorageError::Corrupt {
            path: path.to_string_lossy().to_string(),
            reason: e.to_string(),
        }
        .into())
}

/// Appends one event to a session's `events.jsonl`.
///
/// # Errors
///
/// Returns an error if the append fails.
pub fn append_event(layout: &Layout, id: &str, event: &PtyEvent) -> Result<()> {
    append_jsonl(&layout.session_events(id), event)
}

/// Reads all events from a session's `events.jsonl`, in order.
///
/// # Errors
///
/// Returns an error if a line fails to parse.
pub fn read_events(layout: &Layout, id: &str) -> Result<Vec<PtyEvent>> {
    read_jsonl(&layout.session_events(id))
}

/// Appends chunks to a session's `chunks.jsonl`, in index order.
///
/// # Errors
///
/// Returns an error if any append fails.
pub fn append_chunks(layout: &Layout, id: &str, chunks: &[Chunk]) -> Result<()> {
    let path = layout.session_chunks(id);
    for chunk in chunks {
        append_jsonl(&path, chunk)?;
    }
    Ok(())
}

/// Reads all chunks from a session's `chunks.jsonl`, in order.
///
/// # Errors
///
/// Returns an error if a line fails to parse.
pub fn read_chunks(layout: &Layout, id: &str) -> Result<Vec<Chunk>> {
    read_jsonl(&layout.session_chunks(id))
}

/// Returns true if chunking should run for this session: the chunk log
/// is empty (or missing), or the session was hook-created, lacks an
/// event log, and its source transcript is newer than the chunk log.
#[must_use]
pub fn needs_chunking(layout: &Layout, meta: &SessionMeta, transcript_mtime: Option<std::time::SystemTime>) -> bool {
    let chunks_path = layout.session_chunks(&meta.id);
    let existing_count = read_chunks(layout, &meta.id).map(|c| c.len()).unwrap_or(0);
    if existing_count == 0 {
        return true;
    }
    if meta.has_event_log() {
        return false;
    }
    let Some(transcript_mtime) = transcript_mtime else {
        return false;
    };
    let Ok(chunk_meta) = std::fs::metadata(&chunks_path) else {
        return true;
    };
    let Ok(chunk_mtime) = chunk_meta.modified() else {
        return false;
    };
    transcript_mtime > chunk_mtime
}

/// Lists every session id present under `<root>/sessions`.
///
/// # Errors
///
/// Returns an error if the sessions directory cannot be read.
pub fn list_session_ids(layout: &Layout) -> Result<Vec<String>> {
    let dir = layout.sessions_dir();
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut ids = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir()
            && let Some(name) = entry.file_name().to_str()
        {
            ids.push(name.to_string());
        }
    }
    ids.sort();
    Ok(ids)
}

/// Deletes a session's directory entirely.
///
/// # Errors
///
/// Returns an error if the session does not exist or cannot be removed.
pub fn delete_session(layout: &Layout, id: &str) -> Result<()> {
    let dir = layout.session_dir(id);
    if !dir.exists() {
        return Err(StorageError::SessionNotFound { id: id.to_string() }.into());
    }
    std::fs::remove_dir_all(dir)?;
    Ok(())
}

fn append_jsonl<T: serde::Serialize>(path: &std::path::Path, record: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let line = serde_json::to_string(record).map_err(StorageError::from)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}

fn read_jsonl<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = io::read_file(path)?;
    let mut records = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(line).map_err(|e| StorageError::Corrupt {
            path: path.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;
        records.push(record);
    }
    Ok(records)
}
