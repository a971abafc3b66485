//! Context pack assembly: pulls project state, curated artifacts, and
//! retrieved recent context into one token-budgeted bundle.

pub mod format;

use std::collections::BTreeMap;

use crate::chunking::token_count;
use crate::core::{Chunk, SourceType};
use crate::episode::Episode;
use crate::retrieval::ScoredChunk;
use crate::state::ProjectState;
use crate::storage::Config;

pub use format::{format_json, format_markdown, format_xml, render, Format};

/// Closing instructions section, appended to every pack regardless of
/// budget. Never truncated, same as `project_state`.
const INSTRUCTIONS_FOOTER: &str =
    "Use the context above to continue the user's work. Prefer the \
     project's existing conventions over introducing new ones.";

/// One plan, todo, task, or recent-context item in the assembled pack.
#[derive(Debug, Clone)]
pub struct PackItem {
    /// `"<session_id>/<chunk_index>"`, stable across rebuilds.
    pub id: String,
    pub source_type: SourceType,
    pub session_id: String,
    pub text: String,
    pub token_count: usize,
}

impl PackItem {
    fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            id: format!("{}/{}", chunk.session_id, chunk.chunk_index),
            source_type: chunk.source_type,
            session_id: chunk.session_id.clone(),
            text: chunk.text.clone(),
            token_count: chunk.token_count,
        }
    }
}

/// An assembled, token-budgeted context pack, before formatting.
#[derive(Debug, Clone, Default)]
pub struct ContextPack {
    /// The project state summary. Never truncated; omitted only if
    /// empty (state was never generated).
    pub project_state: Option<String>,
    pub decisions: Vec<String>,
    /// Drawn directly from project state, not budget-allocated: a
    /// pack's constraints are whatever the state says they are.
    pub constraints: Vec<String>,
    pub active_tasks: Vec<PackItem>,
    pub plans: Vec<PackItem>,
    pub recent_context: Vec<PackItem>,
    /// Never truncated.
    pub instructions: String,
    pub total_tokens: usize,
}

/// Infers a pack mode from the most recent session's episode
/// classification, for callers that pass `mode = "auto"` without an
/// explicit override.
#[must_use]
pub fn infer_mode(episode: Option<Episode>) -> &'static str {
    match episode {
        Some(Episode::Debug) => "debug",
        Some(Episode::Build | Episode::Test | Episode::Deploy) => "build",
        Some(Episode::Explore | Episode::Review | Episode::Docs) => "explore",
        _ => "auto",
    }
}

/// Assembles a context pack within `budget_tokens`, allocating the
/// weighted sections per `mode`'s table in `config`.
///
/// `project_state` and `instructions` are charged against the budget
/// but never truncated or dropped; every other section is truncated by
/// dropping whole items (never partial item text) once its weighted
/// share is spent, and omitted entirely if nothing fits.
#[must_use]
pub fn assemble(
    state: &ProjectState,
    artifact_chunks: &[Chunk],
    retrieved: &[ScoredChunk],
    mode: &str,
    budget_tokens: usize,
    config: &Config,
) -> ContextPack {
    let weights = config.weights_for_mode(mode);

    let project_state_text = state.summary.clone();
    let project_state_tokens = if project_state_text.is_empty() {
        0
    } else {
        token_count(&project_state_text)
    };
    let instructions_tokens = token_count(INSTRUCTIONS_FOOTER);

    let fixed_cost = project_state_tokens + instructions_tokens;
    let mut remaining = budget_tokens.saturating_sub(fixed_cost);

    let plans_budget = weighted_budget(&weights, "plans", budget_tokens).min(remaining);
    let plan_candidates = newest_first_items(artifact_chunks, |t| t == SourceType::Plan);
    let (plans, plans_cost) = fit_items(&plan_candidates, plans_budget);
    remaining = remaining.saturating_sub(plans_cost);

    let recent_budget = weighted_budget(&weights, "recent_context", budget_tokens).min(remaining);
    let recent_candidates: Vec<PackItem> = retrieved.iter().map(|r| PackItem::from_chunk(&r.chunk)).collect();
    let (recent_context, recent_cost) = fit_items(&recent_candidates, recent_budget);
    remaining = remaining.saturating_sub(recent_cost);

    let tasks_budget = weighted_budget(&weights, "active_tasks", budget_tokens).min(remaining);
    let task_candidates =
        newest_first_items(artifact_chunks, |t| matches!(t, SourceType::Todo | SourceType::Task));
    let (active_tasks, tasks_cost) = fit_items(&task_candidates, tasks_budget);
    remaining = remaining.saturating_sub(tasks_cost);

    let decisions_budget = weighted_budget(&weights, "decisions", budget_tokens).min(remaining);
    let (decisions, decisions_cost) = fit_strings(&state.decisions, decisions_budget);

    let total_tokens = fixed_cost
        + plans_cost
        + recent_cost
        + tasks_cost
        + decisions_cost;

    ContextPack {
        project_state: (!project_state_text.is_empty()).then_some(project_state_text),
        decisions,
        constraints: state.constraints.clone(),
        active_tasks,
        plans,
        recent_context,
        instructions: INSTRUCTIONS_FOOTER.to_string(),
        total_tokens,
    }
}

/// Collects artifact chunks whose source type matches `want`, newest
/// first by `start_ts`, per spec's "pull from the artifacts store,
/// newest-first" rule.
fn newest_first_items(artifact_chunks: &[Chunk], want: impl Fn(SourceType) -> bool) -> Vec<PackItem> {
    let mut candidates: Vec<&Chunk> = artifact_chunks.iter().filter(|c| want(c.source_type)).collect();
    candidates.sort_by_key(|c| std::cmp::Reverse(c.start_ts));
    candidates.into_iter().map(PackItem::from_chunk).collect()
}

fn weighted_budget(weights: &BTreeMap<String, f64>, section: &str, total_budget: usize) -> usize {
    let fraction = weights.get(section).copied().unwrap_or(0.0);
    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let budget = (total_budget as f64 * fraction).round() as usize;
    budget
}

/// Greedily keeps whole items while they fit within `budget`, stopping
/// at the first item that would overflow it (items are pre-ranked by
/// the caller, so later items are never preferred over earlier ones).
fn fit_items(items: &[PackItem], budget: usize) -> (Vec<PackItem>, usize) {
    let mut fitted = Vec::new();
    let mut used = 0;
    for item in items {
        if used + item.token_count > budget {
            break;
        }
        used += item.token_count;
        fitted.push(item.clone());
    }
    (fitted, used)
}

fn fit_strings(items: &[String], budget: usize) -> (Vec<String>, usize) {
    let mut fitted = Vec::new();
    let mut used = 0;
    for item in items {
        let cost = token_count(item);
        if used + cost > budget {
            break;
        }
        used += cost;
        fitted.push(item.clone());
    }
    (fitted, used)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Config;

    fn chunk(session_id: &str, index: usize, source_type: SourceType, text: &str) -> Chunk {
        Chunk {
            session_id: session_id.to_string(),
            chunk_index: index,
            source_type,
            text: text.to_string(),
            token_count: token_count(text),
            quality: 1.0,
            start_ts: 0,
            end_ts: 0,
            speaker_role: None,
        }
    }

    fn scored(chunk: Chunk) -> ScoredChunk {
        ScoredChunk { chunk, score: 1.0 }
    }

    #[test]
    fn single_session_no_artifacts_has_state_and_instructions_only() {
        let state = ProjectState {
            summary: "the project builds a CLI tool".to_string(),
            ..Default::default()
        };
        let config = Config::default();
        let pack = assemble(&state, &[], &[], "auto", 500, &config);
        assert!(pack.project_state.is_some());
        assert!(!pack.instructions.is_empty());
        assert!(pack.plans.is_empty());
        assert!(pack.recent_context.is_empty());
        assert!(pack.total_tokens <= 500);
    }

    #[test]
    fn empty_summary_omits_project_state_section() {
        let state = ProjectState::default();
        let config = Config::default();
        let pack = assemble(&state, &[], &[], "auto", 500, &config);
        assert!(pack.project_state.is_none());
    }

    #[test]
    fn recent_context_truncates_by_whole_item_when_over_budget() {
        let state = ProjectState {
            summary: "s".to_string(),
            ..Default::default()
        };
        let config = Config::default();
        let big_text = "word ".repeat(500);
        let retrieved = vec![
            scored(chunk("s1", 0, SourceType::Session, &big_text)),
            scored(chunk("s1", 1, SourceType::Session, &big_text)),
        ];
        let pack = assemble(&state, &[], &retrieved, "auto", 100, &config);
        assert!(pack.recent_context.len() <= 1);
        assert!(pack.total_tokens <= 100);
    }

    #[test]
    fn debug_mode_allocates_most_budget_to_recent_context() {
        let state = ProjectState {
            summary: "s".to_string(),
            ..Default::default()
        };
        let config = Config::default();
        let retrieved: Vec<ScoredChunk> = (0..20)
            .map(|i| scored(chunk("s1", i, SourceType::Session, "short text here")))
            .collect();
        let pack = assemble(&state, &[], &retrieved, "debug", 1000, &config);
        assert!(!pack.recent_context.is_empty());
    }

    #[test]
    fn infer_mode_maps_episodes() {
        assert_eq!(infer_mode(Some(Episode::Debug)), "debug");
        assert_eq!(infer_mode(Some(Episode::Build)), "build");
        assert_eq!(infer_mode(Some(Episode::Explore)), "explore");
        assert_eq!(infer_mode(None), "auto");
    }

    #[test]
    fn constraints_pass_through_unbudgeted() {
        let state = ProjectState {
            summary: "s".to_string(),
            constraints: vec!["must not break the public API".to_string()],
            ..Default::default()
        };
        let config = Config::default();
        let pack = assemble(&state, &[], &[], "auto", 500, &config);
        assert_eq!(pack.constraints.len(), 1);
    }

    #[test]
    fn active_tasks_pulled_from_artifacts_newest_first() {
        let state = ProjectState {
            summary: "s".to_string(),
            active_tasks: vec!["stale llm summary, should not surface".to_string()],
            ..Default::default()
        };
        let config = Config::default();
        let mut older = chunk("artifacts", 0, SourceType::Todo, "fix the flaky test");
        older.start_ts = 100;
        let mut newer = chunk("artifacts", 1, SourceType::Task, "ship the release");
        newer.start_ts = 200;
        let artifact_chunks = vec![older, newer];
        let pack = assemble(&state, &artifact_chunks, &[], "auto", 500, &config);
        assert_eq!(pack.active_tasks.len(), 2);
        assert_eq!(pack.active_tasks[0].text, "ship the release");
        assert_eq!(pack.active_tasks[1].text, "fix the flaky test");
    }
}
