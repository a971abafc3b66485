//! Command-regex and keyword-lexicon classifiers feeding
//! [`classify_session`].

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::{Chunk, SessionMeta};

/// The kind of work a session represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Episode {
    Build,
    Test,
    Deploy,
    Debug,
    Refactor,
    Explore,
    Config,
    Docs,
    Review,
}

impl Episode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Test => "test",
            Self::Deploy => "deploy",
            Self::Debug => "debug",
            Self::Refactor => "refactor",
            Self::Explore => "explore",
            Self::Config => "config",
            Self::Docs => "docs",
            Self::Review => "review",
        }
    }
}

impl std::fmt::Display for Episode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimum content-lexicon score required before falling back to
/// [`Episode::Explore`] as the default.
const MIN_CONTENT_SCORE: f64 = 2.0;

fn command_rules() -> &'static [(Episode, Regex)] {
    static RULES: OnceLock<Vec<(Episode, Regex)>> = OnceLock::new();
    RULES.get_or_init(|| {
        let pairs: &[(Episode, &str)] = &[
            (
                Episode::Test,
                r"(?i)\b(pytest|cargo\s+test|npm\s+(run\s+)?test|go\s+test|jest|rspec|mocha|vitest)\b",
            ),
            (
                Episode::Deploy,
                r"(?i)\b(kubectl\s+apply|docker\s+push|terraform\s+apply|helm\s+upgrade|deploy)\b",
            ),
            (
                Episode::Build,
                r"(?i)\b(cargo\s+build|make(\s|$)|npm\s+run\s+build|webpack|tsc|go\s+build|gradle\s+build)\b",
            ),
            (
                Episode::Debug,
                r"(?i)\b(gdb|lldb|strace|ltrace|rust-gdb|node\s+--inspect)\b",
            ),
            (
                Episode::Review,
                r"(?i)\b(git\s+diff|git\s+log|gh\s+pr\s+(view|diff|review))\b",
            ),
            (
                Episode::Docs,
                r"(?i)\b(mkdocs|sphinx-build|jekyll\s+build|cargo\s+doc)\b",
            ),
        ];
        pairs
            .iter()
            .map(|(episode, pattern)| {
                (
                    *episode,
                    Regex::new(pattern).expect("command rule patterns are valid regexes"),
                )
            })
            .collect()
    })
}

/// `(keyword, episode, weight)`. Scored by counting whole-word,
/// case-insensitive occurrences across a session's chunk text.
const CONTENT_LEXICON: &[(&str, Episode, f64)] = &[
    ("build", Episode::Build, 1.0),
    ("compile", Episode::Build, 1.0),
    ("bundler", Episode::Build, 1.0),
    ("test", Episode::Test, 1.0),
    ("assert", Episode::Test, 1.0),
    ("fixture", Episode::Test, 0.5),
    ("deploy", Episode::Deploy, 1.0),
    ("release", Episode::Deploy, 0.5),
    ("rollout", Episode::Deploy, 1.0),
    ("traceback", Episode::Debug, 1.5),
    ("stacktrace", Episode::Debug, 1.5),
    ("debug", Episode::Debug, 1.0),
    ("breakpoint", Episode::Debug, 1.0),
    ("refactor", Episode::Refactor, 1.5),
    ("rename", Episode::Refactor, 0.5),
    ("extract", Episode::Refactor, 0.5),
    ("explore", Episode::Explore, 1.0),
    ("investigate", Episode::Explore, 1.0),
    ("understand", Episode::Explore, 0.5),
    ("config", Episode::Config, 1.0),
    ("configuration", Episode::Config, 1.0),
    ("environment", Episode::Config, 0.5),
    ("readme", Episode::Docs, 1.0),
    ("documentation", Episode::Docs, 1.5),
    ("docstring", Episode::Docs, 1.0),
    ("review", Episode::Review, 1.5),
    ("pull request", Episode::Review, 1.0),
    ("diff", Episode::Review, 0.5),
];

/// Classifies a session: tries the command heuristic first, then the
/// content heuristic, returning `None` if neither clears its floor.
#[must_use]
pub fn classify_session(meta: &SessionMeta, chunks: &[Chunk]) -> Option<Episode> {
    if let Some(command) = &meta.command
        && let Some(episode) = classify_command(command)
    {
        return Some(episode);
    }
    classify_content(chunks)
}

fn classify_command(command: &str) -> Option<Episode> {
    command_rules()
        .iter()
        .find(|(_, pattern)| pattern.is_match(command))
        .map(|(episode, _)| *episode)
}

fn classify_content(chunks: &[Chunk]) -> Option<Episode> {
    let mut scores: std::collections::HashMap<&'static str, f64> = std::collections::HashMap::new();
    for chunk in chunks {
        let lower = chunk.text.to_lowercase();
        for (keyword, episode, weight) in CONTENT_LEXICON {
            let count = lower.matches(keyword).count();
            if count > 0 {
                *scores.entry(episode.as_str()).or_insert(0.0) += weight * count as f64;
            }
        }
    }
    scores
        .into_iter()
        .filter(|(_, score)| *score >= MIN_CONTENT_SCORE)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .and_then(|(name, _)| episode_from_str(name))
}

fn episode_from_str(name: &str) -> Option<Episode> {
    [
        Episode::Build,
        Episode::Test,
        Episode::Deploy,
        Episode::Debug,
        Episode::Refactor,
        Episode::Explore,
        Episode::Config,
        Episode::Docs,
        Episode::Review,
    ]
    .into_iter()
    .find(|e| e.as_str() == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SessionSource, SourceType};

    fn meta_with_command(command: &str) -> SessionMeta {
        let mut meta = SessionMeta::new("s".to_string(), SessionSource::Pty, 0);
        meta.command = Some(command.to_string());
        meta
    }

    fn chunk(text: &str) -> Chunk {
        Chunk {
            session_id: "s".to_string(),
            chunk_index: 0,
            source_type: SourceType::Session,
            text: text.to_string(),
            token_count: 1,
            quality: 1.0,
            start_ts: 0,
            end_ts: 0,
            speaker_role: None,
        }
    }

    #[test]
    fn pytest_command_classifies_as_test() {
        let meta = meta_with_command("pytest tests/");
        assert_eq!(classify_session(&meta, &[]), Some(Episode::Test));
    }

    #[test]
    fn cargo_build_classifies_as_build() {
        let meta = meta_with_command("cargo build --release");
        assert_eq!(classify_session(&meta, &[]), Some(Episode::Build));
    }

    #[test]
    fn two_traceback_mentions_classify_as_debug() {
        let meta = SessionMeta::new("s".to_string(), SessionSource::Import, 0);
        let chunks = vec![
            chunk("Traceback (most recent call last): something failed"),
            chunk("another traceback appeared here too"),
        ];
        assert_eq!(classify_session(&meta, &chunks), Some(Episode::Debug));
    }

    #[test]
    fn sparse_content_below_floor_classifies_as_none() {
        let meta = SessionMeta::new("s".to_string(), SessionSource::Import, 0);
        let chunks = vec![chunk("a single build mention")];
        assert_eq!(classify_session(&meta, &chunks), None);
    }

    #[test]
    fn command_heuristic_takes_precedence_over_content() {
        let mut meta = meta_with_command("pytest tests/");
        meta.command = Some("pytest tests/".to_string());
        let chunks = vec![chunk("deploy deploy deploy deploy")];
        assert_eq!(classify_session(&meta, &chunks), Some(Episode::Test));
    }

    #[test]
    fn no_command_and_no_content_match_is_none() {
        let meta = SessionMeta::new("s".to_string(), SessionSource::Import, 0);
        assert_eq!(classify_session(&meta, &[chunk("just chatting about nothing")]), None);
    }
}
