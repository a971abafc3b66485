//! Turn extraction from structured agent transcripts.
//!
//! Parses a line-delimited JSON transcript into an ordered sequence of
//! user/assistant turns, discarding tool-call and sidechannel records.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::SessionSource;
use crate::error::{ChunkingError, Result};
use crate::io;

/// Who authored a turn's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Authored by the human operator.
    User,
    /// Authored by the agent.
    Assistant,
}

/// One extracted conversational turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Who authored this turn.
    pub role: Role,
    /// The turn's text, with mixed-content parts joined by `\n\n`.
    pub text: String,
    /// Seconds since epoch, or the last known timestamp, or `0` for
    /// imports lacking any timestamp.
    pub timestamp: i64,
}

/// Record types that are always discarded, regardless of content.
const DISCARDED_TYPES: &[&str] = &["tool_use", "tool_result", "thinking"];

/// Parses a structured transcript file into an ordered sequence of turns.
///
/// # Errors
///
/// Returns [`ChunkingError::TranscriptMalformed`] when the file is
/// non-empty but fewer than one well-formed text record is found.
pub fn extract_turns(path: &Path, source: SessionSource) -> Result<Vec<Turn>> {
    let content = io::read_file(path)?;
    extract_turns_from_str(&content, source)
}

/// Parses transcript content already read into memory.
///
/// # Errors
///
/// Returns [`ChunkingError::TranscriptMalformed`] when the content is
/// non-empty but fewer than one well-formed text record is found.
pub fn extract_turns_from_str(content: &str, source: SessionSource) -> Result<Vec<Turn>> {
    let mut turns = Vec::new();
    let mut last_timestamp: Option<i64> = None;

    for (line_no, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(_) => continue,
        };
        if is_discarded(&record) {
            continue;
        }
        let Some(role) = record_role(&record) else {
            continue;
        };
        let Some(text) = record_text(&record) else {
            continue;
        };
        if text.is_empty() {
            continue;
        }

        let timestamp = record_timestamp(&record).or(last_timestamp).unwrap_or(0);
        if record_timestamp(&record).is_some() {
            last_timestamp = record_timestamp(&record);
        }
        if timestamp == 0 && !matches!(source, SessionSource::Import) {
            return Err(ChunkingError::TranscriptMalformed {
                line: line_no + 1,
                reason: "missing timestamp outside import source".to_string(),
            }
            .into());
        }

        turns.push(Turn {
            role,
            text,
            timestamp,
        });
    }

    if turns.is_empty() && !content.trim().is_empty() {
        return Err(ChunkingError::TranscriptMalformed {
            line: 1,
            reason: "no well-formed user/assistant text record found".to_string(),
        }
        .into());
    }

    Ok(turns)
}

fn is_discarded(record: &Value) -> bool {
    if let Some(t) = record.get("type").and_then(Value::as_str)
        && DISCARDED_TYPES.contains(&t)
    {
        return true;
    }
    record
        .get("isSidechain")
        .and_then(Value::as_bool)
        .unwrap_or(false)
        || record
            .get("sidechain")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        || record.get("meta").and_then(Value::as_bool).unwrap_or(false)
}

fn record_role(record: &Value) -> Option<Role> {
    let role = record.get("role").and_then(Value::as_str)?;
    match role {
        "user" => Some(Role::User),
        "assistant" => Some(Role::Assistant),
        _ => None,
    }
}

/// Extracts and joins text parts from either a plain string `content`
/// field or a mixed-content array, preserving order.
fn record_text(record: &Value) -> Option<String> {
    let content = record.get("content").or_else(|| record.get("message"))?;
    match content {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Array(parts) => {
            let joined: Vec<String> = parts
                .iter()
                .filter_map(|part| {
                    if part.get("type").and_then(Value::as_str) != Some("text") {
                        return None;
                    }
                    part.get("text")
                        .and_then(Value::as_str)
                        .map(|s| s.trim().to_string())
                })
                .filter(|s| !s.is_empty())
                .collect();
            if joined.is_empty() {
                None
            } else {
                Some(joined.join("\n\n"))
            }
        }
        Value::Object(_) => content
            .get("text")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string()),
        _ => None,
    }
}

fn record_timestamp(record: &Value) -> Option<i64> {
    record
        .get("timestamp")
        .and_then(Value::as_i64)
        .or_else(|| record.get("ts").and_then(Value::as_i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(json: &str) -> String {
        format!("{json}\n")
    }

    #[test]
    fn extracts_simple_user_and_assistant_turns() {
        let content = line(r#"{"role":"user","content":"hi","timestamp":1}"#)
            + &line(r#"{"role":"assistant","content":"hello","timestamp":2}"#);
        let turns = extract_turns_from_str(&content, SessionSource::Import).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Assistant);
    }

    #[test]
    fn discards_tool_records() {
        let content = line(r#"{"role":"assistant","type":"tool_use","content":"ignored","timestamp":1}"#)
            + &line(r#"{"role":"user","content":"kept","timestamp":2}"#);
        let turns = extract_turns_from_str(&content, SessionSource::Import).unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].text, "kept");
    }

    #[test]
    fn discards_sidechain_records() {
        let content = line(r#"{"role":"user","content":"hidden","isSidechain":true,"timestamp":1}"#)
            + &line(r#"{"role":"user","content":"visible","timestamp":2}"#);
        let turns = extract_turns_from_str(&content, SessionSource::Import).unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].text, "visible");
    }

    #[test]
    fn concatenates_mixed_content_parts_in_order() {
        let content = line(
            r#"{"role":"assistant","content":[{"type":"text","text":"first"},{"type":"tool_use","text":"skip"},{"type":"text","text":"second"}],"timestamp":1}"#,
        );
        let turns = extract_turns_from_str(&content, SessionSource::Import).unwrap();
        assert_eq!(turns[0].text, "first\n\nsecond");
    }

    #[test]
    fn missing_timestamp_uses_last_known() {
        let content = line(r#"{"role":"user","content":"a","timestamp":5}"#)
            + &line(r#"{"role":"assistant","content":"b"}"#);
        let turns = extract_turns_from_str(&content, SessionSource::Import).unwrap();
        assert_eq!(turns[1].timestamp, 5);
    }

    #[test]
    fn import_allows_zero_timestamp_when_none_seen() {
        let content = line(r#"{"role":"user","content":"a"}"#);
        let turns = extract_turns_from_str(&content, SessionSource::Import).unwrap();
        assert_eq!(turns[0].timestamp, 0);
    }

    #[test]
    fn non_import_source_rejects_missing_timestamp() {
        let content = line(r#"{"role":"user","content":"a"}"#);
        let result = extract_turns_from_str(&content, SessionSource::Hook);
        assert!(result.is_err());
    }

    #[test]
    fn empty_file_yields_empty_turns() {
        let turns = extract_turns_from_str("", SessionSource::Import).unwrap();
        assert!(turns.is_empty());
    }

    #[test]
    fn non_empty_file_with_no_valid_records_is_malformed() {
        let content = line(r#"{"type":"tool_use","content":"x","timestamp":1}"#);
        let result = extract_turns_from_str(&content, SessionSource::Import);
        assert!(result.is_err());
    }
}
