//! Retrieval: ranks chunks for a query by cosine similarity, temporal
//! decay, and source-type boost, with an optional LLM rerank pass.

use serde::Deserialize;

use crate::core::{now_unix, Chunk, SourceType};
use crate::error::Result;
use crate::index::VectorIndex;
use crate::oracle::Oracle;

/// Filters applied to candidates after scoring, before truncation to
/// `top_k`.
#[derive(Debug, Clone, Default)]
pub struct RetrievalFilters {
    /// Restrict to these source types, if set.
    pub source_types: Option<Vec<SourceType>>,
    /// Restrict to this session id, if set.
    pub session_id: Option<String>,
    /// Only chunks starting at or after this timestamp, if set.
    pub since: Option<i64>,
}

impl RetrievalFilters {
    fn matches(&self, chunk: &Chunk) -> bool {
        if let Some(types) = &self.source_types
            && !types.contains(&chunk.source_type)
        {
            return false;
        }
        if let Some(session_id) = &self.session_id
            && &chunk.session_id != session_id
        {
            return false;
        }
        if let Some(since) = self.since
            && chunk.start_ts < since
        {
            return false;
        }
        true
    }
}

/// Retrieval knobs independent of the query itself.
#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    /// Number of results to return.
    pub top_k: usize,
    /// Whether to apply temporal decay.
    pub decay_enabled: bool,
    /// Decay half-life, in days.
    pub half_life_days: f64,
    /// Whether to run an LLM rerank pass over the top candidates.
    pub rerank: bool,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            decay_enabled: true,
            half_life_days: crate::storage::config::DEFAULT_HALF_LIFE_DAYS,
            rerank: false,
        }
    }
}

/// A chunk with its final retrieval score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// The per-source-type multiplier applied after decay: curated
/// artifacts (plans, todos, tasks) rank slightly ahead of raw session
/// transcript at equal cosine similarity.
#[must_use]
pub fn source_type_boost(source_type: SourceType) -> f32 {
    match source_type {
        SourceType::Session => 1.0,
        SourceType::Plan => 1.15,
        SourceType::Todo | SourceType::Task => 1.1,
    }
}

/// `2^(-Δdays/half_life_days)`, where `Δdays = max(0, now -
/// chunk.start_ts)`. Chunks with `start_ts == 0` (imports lacking
/// timestamps) receive no decay multiplier.
#[must_use]
pub fn temporal_decay(chunk_start_ts: i64, now: i64, half_life_days: f64) -> f32 {
    if half_life_days <= 0.0 || chunk_start_ts == 0 {
        return 1.0;
    }
    let delta_days = f64::from(u32::try_from((now - chunk_start_ts).max(0)).unwrap_or(u32::MAX)) / 86400.0;
    2f64.powf(-delta_days / half_life_days) as f32
}

/// Ranks chunks for `query_vector`, applying decay, boost, and filters,
/// and optionally reranking the top candidates with `oracle`.
///
/// Each candidate's chunk is reconstructed directly from its index
/// entry (see [`crate::index::IndexEntry::to_chunk`]) rather than
/// loaded from the chunk log, so only the top-K winners of the scan
/// ever get hydrated.
///
/// # Errors
///
/// Returns an error if the underlying vector scan fails.
pub fn retrieve(
    index: &VectorIndex<'_>,
    query_text: &str,
    query_vector: &[f32],
    filters: &RetrievalFilters,
    options: &RetrievalOptions,
    oracle: Option<&dyn Oracle>,
) -> Result<Vec<ScoredChunk>> {
    let want_rerank = options.rerank && oracle.is_some();
    let fetch_k = if want_rerank {
        options.top_k.saturating_mul(3)
    } else {
        options.top_k
    };
    // Overfetch further since post-hoc filters can drop candidates the
    // raw vector scan had no way to exclude.
    let scan_k = fetch_k.saturating_mul(4).max(fetch_k);
    let now = now_unix();

    let mut scored: Vec<ScoredChunk> = index
        .search(query_vector, scan_k)?
        .into_iter()
        .filter_map(|(entry, cosine)| {
            let chunk = entry.to_chunk();
            if !filters.matches(&chunk) {
                return None;
            }
            let mut score = cosine;
            if options.decay_enabled {
                score *= temporal_decay(chunk.start_ts, now, options.half_life_days);
            }
            score *= source_type_boost(chunk.source_type);
            Some(ScoredChunk { chunk, score })
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(fetch_k);

    if want_rerank && let Some(oracle) = oracle {
        rerank(oracle, query_text, &mut scored);
    }

    scored.truncate(options.top_k);
    Ok(scored)
}

/// Asks `oracle` to reorder `candidates` by relevance to `query_text`.
/// Leaves the existing cosine-based order untouched on any failure:
/// unreachable oracle, malformed reply, or a reply that isn't a valid
/// permutation of the candidate indices.
fn rerank(oracle: &dyn Oracle, query_text: &str, candidates: &mut Vec<ScoredChunk>) {
    if candidates.is_empty() {
        return;
    }
    let prompt = build_rerank_prompt(query_text, candidates);
    let Ok(reply) = oracle.chat(&prompt) else {
        return;
    };
    let Ok(order) = serde_json::from_str::<RerankReply>(&reply) else {
        return;
    };
    let order = order.ranked_indices;
    if !is_permutation(&order, candidates.len()) {
        return;
    }
    let original = std::mem::take(candidates);
    *candidates = order.into_iter().map(|i| original[i].clone()).collect();
}

#[derive(Debug, Deserialize)]
struct RerankReply {
    ranked_indices: Vec<usize>,
}

fn is_permutation(order: &[usize], len: usize) -> bool {
    if order.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    for &i in order {
        if i >= len || seen[i] {
            return false;
        }
        seen[i] = true;
    }
    true
}

fn build_rerank_prompt(query_text: &str, candidates: &[ScoredChunk]) -> String {
    let mut prompt = format!(
        "Query: {query_text}\n\nRank the following excerpts from most to \
         least relevant to the query. Respond with a single JSON object \
         {{\"ranked_indices\": [...]}} containing every index exactly \
         once, most relevant first. JSON only, no other text.\n\n"
    );
    for (i, candidate) in candidates.iter().enumerate() {
        prompt.push_str(&format!("[{i}] {}\n", candidate.chunk.preview(300)));
    }
    prompt
}
