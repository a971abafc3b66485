//! Project state: a single, cached, oracle-generated summary of
//! "what is this project, and what's going on in it right now."
//!
//! Regenerating it costs one chat call, so it is fingerprinted against
//! the chunk corpus and only rebuilt when the fingerprint changes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::{now_unix, Chunk};
use crate::error::{Result, StorageError};
use crate::io;
use crate::oracle::Oracle;
use crate::storage::Layout;

/// Chunks beyond this count are never sampled into a single state call.
const MAX_SAMPLE_CHUNKS: usize = 120;

/// Added to a chunk's quality score so even zero-quality chunks retain a
/// nonzero chance of being sampled.
const SAMPLING_WEIGHT_FLOOR: f64 = 0.05;

/// How many of the most recent chunk keys are folded into the
/// fingerprint hash.
const FINGERPRINT_TAIL: usize = 32;

/// A generated project summary, persisted at `state/state.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectState {
    /// Fingerprint of the chunk corpus this state was generated from.
    pub fingerprint: String,
    /// Seconds since epoch when this state was generated.
    pub generated_at: i64,
    /// One-paragraph summary of the project's current state.
    pub summary: String,
    /// Notable decisions extracted from recent sessions.
    #[serde(default)]
    pub decisions: Vec<String>,
    /// Constraints the project currently operates under.
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Tasks that appear to be actively in progress.
    #[serde(default)]
    pub active_tasks: Vec<String>,
    /// Topics recently discussed, independent of task status.
    #[serde(default)]
    pub recent_topics: Vec<String>,
}

/// The shape of the oracle's chat reply, parsed directly into most of
/// [`ProjectState`]'s fields.
#[derive(Debug, Deserialize)]
struct OracleStateReply {
    summary: String,
    #[serde(default)]
    decisions: Vec<String>,
    #[serde(default)]
    constraints: Vec<String>,
    #[serde(default)]
    active_tasks: Vec<String>,
    #[serde(default)]
    recent_topics: Vec<String>,
}

/// Computes a fingerprint over `chunks`: the total count, the latest
/// start timestamp, and a hash of the most recent chunks' identities.
/// Two corpora with the same fingerprint are treated as unchanged.
#[must_use]
pub fn fingerprint(chunks: &[Chunk]) -> String {
    let count_total = chunks.len();
    let max_start_ts = chunks.iter().map(|c| c.start_ts).max().unwrap_or(0);

    let mut tail: Vec<&Chunk> = chunks.iter().collect();
    tail.sort_by_key(|c| (c.start_ts, c.chunk_index));
    let tail_start = tail.len().saturating_sub(FINGERPRINT_TAIL);

    let mut hasher = Sha256::new();
    for chunk in &tail[tail_start..] {
        hasher.update(chunk.session_id.as_bytes());
        hasher.update(chunk.chunk_index.to_le_bytes());
        hasher.update(chunk.source_type.as_str().as_bytes());
    }
    let digest = hasher.finalize();
    format!("{count_total}:{max_start_ts}:{}", hex_encode(&digest))
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        s.push_str(&format!("{byte:02x}"));
    }
    s
}

/// Loads the cached state at `layout.state_doc()`, if present.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be parsed.
pub fn load(layout: &Layout) -> Result<Option<ProjectState>> {
    let path = layout.state_doc();
    if !path.exists() {
        return Ok(None);
    }
    let content = io::read_file(&path)?;
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| {
            StorageError::Corrupt {
                path: path.to_string_lossy().to_string(),
                reason: e.to_string(),
            }
            .into()
        })
}

fn save(layout: &Layout, state: &ProjectState) -> Result<()> {
    let json = serde_json::to_string_pretty(state).map_err(StorageError::from)?;
    io::write_file(layout.state_doc(), &json)
}

/// Returns the current project state, regenerating it via `oracle` if
/// the chunk corpus has changed since the last generation.
///
/// On oracle failure, falls back to the existing cached state (if any)
/// rather than failing the whole operation; a project summary is a
/// convenience, not load-bearing for correctness elsewhere.
///
/// # Errors
///
/// Returns an error only if the cache cannot be read or (on successful
/// regeneration) written.
pub fn ensure_fresh(layout: &Layout, chunks: &[Chunk], oracle: &dyn Oracle) -> Result<ProjectState> {
    let current_fingerprint = fingerprint(chunks);
    let cached = load(layout)?;
    if let Some(state) = &cached
        && state.fingerprint == current_fingerprint
    {
        return Ok(state.clone());
    }

    let sample = sample_chunks(chunks, MAX_SAMPLE_CHUNKS);
    let prompt = build_prompt(&sample);
    match oracle.chat(&prompt) {
        Ok(reply) => match serde_json::from_str::<OracleStateReply>(&reply) {
            Ok(parsed) => {
                let state = ProjectState {
                    fingerprint: current_fingerprint,
                    generated_at: now_unix(),
                    summary: parsed.summary,
                    decisions: parsed.decisions,
                    constraints: parsed.constraints,
                    active_tasks: parsed.active_tasks,
                    recent_topics: parsed.recent_topics,
                };
                save(layout, &state)?;
                Ok(state)
            }
            Err(_) => Ok(cached.unwrap_or_default()),
        },
        Err(_) => Ok(cached.unwrap_or_default()),
    }
}

/// Weighted sampling without replacement (Efraimidis-Spirakis): each
/// chunk's key is `u^(1/weight)` for `u` uniform on `(0, 1]`, and the
/// `limit` chunks with the largest keys are kept. Heavier (higher
/// quality) chunks are more likely to survive; ties prefer the more
/// recent chunk.
fn sample_chunks(chunks: &[Chunk], limit: usize) -> Vec<&Chunk> {
    use rand::Rng;
    if chunks.len() <= limit {
        return chunks.iter().collect();
    }
    let mut rng = rand::rng();
    let mut keyed: Vec<(f64, &Chunk)> = chunks
        .iter()
        .map(|chunk| {
            let weight = chunk.quality + SAMPLING_WEIGHT_FLOOR;
            let u: f64 = rng.random_range(f64::MIN_POSITIVE..1.0);
            let key = u.powf(1.0 / weight);
            (key, chunk)
        })
        .collect();
    keyed.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| b.1.start_ts.cmp(&a.1.start_ts))
    });
    keyed.truncate(limit);
    keyed.into_iter().map(|(_, chunk)| chunk).collect()
}

fn build_prompt(sample: &[&Chunk]) -> String {
    let mut prompt = String::from(
        "Summarize this project's current state from the excerpts below. \
         Respond with a single JSON object with exactly these keys: \
         \"summary\" (string), \"decisions\" (array of strings), \
         \"constraints\" (array of strings), \"active_tasks\" (array of \
         strings), \"recent_topics\" (array of strings). Respond with \
         JSON only, no other text.\n\n",
    );
    for chunk in sample {
        prompt.push_str("---\n");
        prompt.push_str(&chunk.preview(400));
        prompt.push('\n');
    }
    prompt
}
