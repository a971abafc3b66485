//! Stop-event hook handler.
//!
//! Reads a single JSON document from stdin (`transcript_path`,
//! `session_id`, `cwd`), maps the host agent's session id to our own
//! via [`HooksState`], and ingests the named transcript into that
//! session. Per the hook contract, this always succeeds from the
//! caller's point of view: every internal error is caught and reported
//! on stderr, never propagated to `main`'s exit code.

use std::io::Read as _;
use std::path::PathBuf;

use serde::Deserialize;

use crate::chunking::turns::chunk_turns;
use crate::chunking::{DEFAULT_MAX_TOKENS, DEFAULT_OVERLAP_TOKENS};
use crate::core::{SessionSource, SourceType};
use crate::error::Result;
use crate::storage::{HooksState, Store};
use crate::transcript::extract_turns;

#[derive(Debug, Deserialize)]
struct HookPayload {
    transcript_path: PathBuf,
    session_id: String,
    #[serde(default)]
    #[allow(dead_code)]
    cwd: Option<PathBuf>,
}

/// Handles one Stop-event invocation against the store at `root`.
///
/// Always returns `Ok`; failures are reported as the returned string
/// (printed to stderr by the caller) rather than as an error, since the
/// hook contract requires exiting `0` regardless of internal outcome.
pub fn handle(root: &std::path::Path) -> String {
    match run(root) {
        Ok(message) => message,
        Err(e) => format!("hook: {e}"),
    }
}

fn run(root: &std::path::Path) -> Result<String> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    let payload: HookPayload =
        serde_json::from_str(&input).map_err(crate::error::StorageError::from)?;

    let mut store = match Store::open(root) {
        Ok(store) => store,
        Err(_) => Store::init(root)?,
    };
    let layout = store.layout().clone();
    let _guard = store.write_lock()?;

    let mut hooks_state = HooksState::load(&layout)?;
    let session_id = if let Some(existing) = hooks_state.mapping.get(&payload.session_id) {
        existing.clone()
    } else {
        let meta = store.create_session(SessionSource::Hook, None)?;
        hooks_state
            .mapping
            .insert(payload.session_id.clone(), meta.id.clone());
        hooks_state.save(&layout)?;
        meta.id
    };

    let turns = extract_turns(&payload.transcript_path, SessionSource::Hook)?;
    let chunks = chunk_turns(
        &turns,
        &session_id,
        SourceType::Session,
        DEFAULT_MAX_TOKENS,
        DEFAULT_OVERLAP_TOKENS,
    );
    let chunk_count = chunks.len();
    store.append_chunks(&session_id, SourceType::Session, &chunks)?;

    Ok(format!(
        "hook: ingested {chunk_count} chunks into session {session_id}"
    ))
}
