//! Turn-based chunking: the primary chunking path, used directly for
//! structured transcripts and as the sizing pass for PTY episodes.

use std::collections::VecDeque;

use crate::core::{Chunk, SourceType, SpeakerRole};
use crate::io;
use crate::transcript::{Role, Turn};

use super::{quality_score, token_count};

/// Below this many characters, splitting a fragment to fill a chunk's
/// remaining budget isn't worth it; the fragment is deferred whole to
/// the next chunk instead.
const MIN_SPLIT_CHARS: usize = 8;

/// One role-prefixed rendering of a turn (or a sub-split of an
/// oversized turn), the unit the accumulator works over.
struct Piece {
    role: Role,
    text: String,
    timestamp: i64,
}

/// Chunks a sequence of turns into token-bounded, overlap-carrying
/// chunks.
///
/// Mirrors §4.3: turns are concatenated with role prefixes separated by
/// blank lines, accumulated until the next piece would exceed
/// `max_tokens`, and each emitted chunk after the first carries an
/// overlap tail from the previous chunk split at the nearest paragraph,
/// then sentence, then hard character boundary.
#[must_use]
pub fn chunk_turns(
    turns: &[Turn],
    session_id: &str,
    source_type: SourceType,
    max_tokens: usize,
    overlap_tokens: usize,
) -> Vec<Chunk> {
    let pieces = render_pieces(turns, max_tokens);
    if pieces.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_start_ts = pieces[0].timestamp;
    let mut current_end_ts = pieces[0].timestamp;
    let mut current_roles: Vec<Role> = Vec::new();
    let mut chunk_index = 0usize;

    // Fragments still waiting to be placed. A fragment that doesn't fit
    // whole in the current chunk is split to fill the remaining budget,
    // and its remainder is pushed back to the front of the queue rather
    // than deferred wholesale to the next chunk.
    let mut queue: VecDeque<(Role, String, i64)> = pieces
        .into_iter()
        .map(|p| (p.role, p.text, p.timestamp))
        .collect();

    while let Some((role, text, timestamp)) = queue.pop_front() {
        let candidate = if current.is_empty() {
            text.clone()
        } else {
            format!("{current}\n\n{text}")
        };
        if current.is_empty() || token_count(&candidate) <= max_tokens {
            current = candidate;
            current_end_ts = timestamp;
            current_roles.push(role);
            continue;
        }

        let budget_chars = (max_tokens * 4).saturating_sub(current.len() + 2);
        if budget_chars >= MIN_SPLIT_CHARS {
            let (head, tail) = take_prefix_fitting(&text, budget_chars);
            if tail.is_empty() {
                current = format!("{current}\n\n{head}");
                current_end_ts = timestamp;
                current_roles.push(role);
                continue;
            }
            if !head.is_empty() {
                current = format!("{current}\n\n{head}");
                current_end_ts = timestamp;
                current_roles.push(role);
                queue.push_front((role, tail, timestamp));
                continue;
            }
        }

        chunks.push(finalize_chunk(
            session_id,
            chunk_index,
            source_type,
            std::mem::take(&mut current),
            current_start_ts,
            current_end_ts,
            &current_roles,
        ));
        chunk_index += 1;
        current_roles.clear();

        let tail = take_overlap_tail(&chunks[chunk_index - 1].text, overlap_tokens);
        current = tail;
        current_start_ts = timestamp;
        queue.push_front((role, text, timestamp));
    }

    if !current.is_empty() {
        chunks.push(finalize_chunk(
            session_id,
            chunk_index,
            source_type,
            current,
            current_start_ts,
            current_end_ts,
            &current_roles,
        ));
    }

    chunks
}

fn finalize_chunk(
    session_id: &str,
    chunk_index: usize,
    source_type: SourceType,
    text: String,
    start_ts: i64,
    end_ts: i64,
    roles: &[Role],
) -> Chunk {
    let token_count = token_count(&text);
    let quality = quality_score(&text);
    let speaker_role = speaker_role_of(roles);
    Chunk {
        session_id: session_id.to_string(),
        chunk_index,
        source_type,
        text,
        token_count,
        quality,
        start_ts,
        end_ts,
        speaker_role,
    }
}

fn speaker_role_of(roles: &[Role]) -> Option<SpeakerRole> {
    let has_user = roles.iter().any(|r| *r == Role::User);
    let has_assistant = roles.iter().any(|r| *r == Role::Assistant);
    match (has_user, has_assistant) {
        (true, true) => Some(SpeakerRole::Mixed),
        (true, false) => Some(SpeakerRole::User),
        (false, true) => Some(SpeakerRole::Assistant),
        (false, false) => None,
    }
}

fn role_prefix(role: Role) -> &'static str {
    match role {
        Role::User => "User:",
        Role::Assistant => "Assistant:",
    }
}

/// Renders each turn with its role prefix, splitting any turn whose
/// rendering would exceed `max_tokens` on its own into several pieces.
fn render_pieces(turns: &[Turn], max_tokens: usize) -> Vec<Piece> {
    let mut pieces = Vec::new();
    for turn in turns {
        let rendered = format!("{} {}", role_prefix(turn.role), turn.text);
        if token_count(&rendered) <= max_tokens {
            pieces.push(Piece {
                role: turn.role,
                text: rendered,
                timestamp: turn.timestamp,
            });
            continue;
        }
        for part in split_oversized(&turn.text, max_tokens, role_prefix(turn.role).len() + 1) {
            pieces.push(Piece {
                role: turn.role,
                text: format!("{} {part}", role_prefix(turn.role)),
                timestamp: turn.timestamp,
            });
        }
    }
    pieces
}

/// Splits oversized text on paragraph, then sentence, then hard
/// character boundaries so each part (plus `prefix_overhead` characters
/// for its role prefix) fits within `max_tokens`.
fn split_oversized(text: &str, max_tokens: usize, prefix_overhead: usize) -> Vec<String> {
    let budget_chars = (max_tokens * 4).saturating_sub(prefix_overhead).max(4);
    let paragraphs = io::split_paragraphs(text);
    let mut parts = Vec::new();
    let mut current = String::new();

    let mut flush = |current: &mut String, parts: &mut Vec<String>| {
        if !current.is_empty() {
            parts.push(std::mem::take(current));
        }
    };

    for paragraph in if paragraphs.is_empty() {
        vec![text]
    } else {
        paragraphs
    } {
        if paragraph.len() <= budget_chars {
            let candidate = if current.is_empty() {
                paragraph.to_string()
            } else {
                format!("{current}\n\n{paragraph}")
            };
            if candidate.len() <= budget_chars {
                current = candidate;
                continue;
            }
            flush(&mut current, &mut parts);
            current = paragraph.to_string();
            continue;
        }
        flush(&mut current, &mut parts);
        parts.extend(split_by_sentence_or_hard(paragraph, budget_chars));
    }
    flush(&mut current, &mut parts);
    if parts.is_empty() {
        parts.push(text.to_string());
    }
    parts
}

fn split_by_sentence_or_hard(text: &str, budget_chars: usize) -> Vec<String> {
    let sentences = io::split_sentences(text);
    let mut parts = Vec::new();
    let mut current = String::new();
    for sentence in sentences {
        if sentence.len() > budget_chars {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            parts.extend(hard_split(sentence, budget_chars));
            continue;
        }
        let candidate = if current.is_empty() {
            sentence.to_string()
        } else {
            format!("{current} {sentence}")
        };
        if candidate.len() <= budget_chars {
            current = candidate;
        } else {
            parts.push(std::mem::take(&mut current));
            current = sentence.to_string();
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn hard_split(text: &str, budget_chars: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut pos = 0;
    while pos < text.len() {
        let end = io::find_char_boundary(text, (pos + budget_chars).min(text.len()));
        let end = if end <= pos { text.len() } else { end };
        parts.push(text[pos..end].to_string());
        pos = end;
    }
    parts
}

/// Splits `text` into a `(head, tail)` pair where `head` fits within
/// `budget_chars`, preferring a paragraph boundary, then a sentence
/// boundary, then a hard character boundary. `tail` is empty if `text`
/// already fits whole.
fn take_prefix_fitting(text: &str, budget_chars: usize) -> (String, String) {
    if text.len() <= budget_chars {
        return (text.to_string(), String::new());
    }

    let paragraphs = io::split_paragraphs(text);
    if paragraphs.len() > 1 {
        if let Some((head, used)) = take_prefix_by_unit(&paragraphs, budget_chars, "\n\n") {
            return (head, paragraphs[used..].join("\n\n"));
        }
    }

    let sentences = io::split_sentences(text);
    if sentences.len() > 1 {
        if let Some((head, used)) = take_prefix_by_unit(&sentences, budget_chars, " ") {
            return (head, sentences[used..].join(" "));
        }
    }

    let boundary = io::find_char_boundary(text, budget_chars.min(text.len()));
    let boundary = if boundary == 0 { text.len() } else { boundary };
    let (head, tail) = text.split_at(boundary);
    (head.to_string(), tail.to_string())
}

/// Greedily accumulates leading `units` (joined by `sep`) while the
/// joined text stays within `budget_chars`. Returns the joined head and
/// the number of units consumed, or `None` if not even the first unit
/// fits.
fn take_prefix_by_unit(units: &[&str], budget_chars: usize, sep: &str) -> Option<(String, usize)> {
    let mut head = String::new();
    let mut used = 0;
    for unit in units {
        let candidate = if head.is_empty() {
            (*unit).to_string()
        } else {
            format!("{head}{sep}{unit}")
        };
        if candidate.len() > budget_chars {
            break;
        }
        head = candidate;
        used += 1;
    }
    if used == 0 {
        None
    } else {
        Some((head, used))
    }
}

/// Extracts the tail of `text` worth roughly `overlap_tokens`, split at
/// the nearest paragraph boundary within the tail window if one exists,
/// else the nearest sentence boundary, else the exact character count.
fn take_overlap_tail(text: &str, overlap_tokens: usize) -> String {
    if overlap_tokens == 0 || text.is_empty() {
        return String::new();
    }
    let target_chars = overlap_tokens * 4;
    if text.len() <= target_chars {
        return text.to_string();
    }
    let window_start = text.len() - target_chars;
    let window_start = io::find_char_boundary(text, window_start);
    let window = &text[window_start..];

    let paragraphs = io::split_paragraphs(window);
    if paragraphs.len() > 1 {
        return paragraphs[paragraphs.len() - 1].to_string();
    }

    let sentences = io::split_sentences(window);
    if sentences.len() > 1 {
        return sentences[sentences.len() - 1].to_string();
    }

    window.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: Role, text: &str, ts: i64) -> Turn {
        Turn {
            role,
            text: text.to_string(),
            timestamp: ts,
        }
    }

    #[test]
    fn single_small_turn_yields_one_chunk() {
        let turns = vec![turn(Role::User, "hello there", 1)];
        let chunks = chunk_turns(&turns, "sess", SourceType::Session, 512, 50);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert!(chunks[0].text.starts_with("User:"));
    }

    #[test]
    fn two_turns_exceeding_budget_split_into_two_chunks() {
        // ~200 and ~400 "tokens" (chars/4), max_tokens=512, overlap=50.
        let first = "a ".repeat(400); // ~200 tokens
        let second = "b ".repeat(800); // ~400 tokens
        let turns = vec![turn(Role::User, &first, 1), turn(Role::Assistant, &second, 2)];
        let chunks = chunk_turns(&turns, "sess", SourceType::Session, 512, 50);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].token_count <= 512);
        assert!(chunks[1].token_count <= 512);
    }

    #[test]
    fn second_chunk_carries_overlap_from_first() {
        let first = "alpha beta gamma. ".repeat(60);
        let second = "delta epsilon zeta. ".repeat(60);
        let turns = vec![turn(Role::User, &first, 1), turn(Role::Assistant, &second, 2)];
        let chunks = chunk_turns(&turns, "sess", SourceType::Session, 100, 20);
        assert!(chunks.len() >= 2);
        // The tail text of chunk 0 should reappear at the start of chunk 1's
        // body (after the role prefix of the first carried piece).
        let chunk0_tail_sample = &chunks[0].text[chunks[0].text.len() - 10..];
        assert!(chunks[1].text.contains(chunk0_tail_sample.trim()));
    }

    #[test]
    fn all_chunks_respect_max_tokens() {
        let text = "word ".repeat(5000);
        let turns = vec![turn(Role::User, &text, 1)];
        let chunks = chunk_turns(&turns, "sess", SourceType::Session, 512, 50);
        for chunk in &chunks {
            assert!(chunk.token_count <= 512, "chunk exceeded budget: {}", chunk.token_count);
        }
    }

    #[test]
    fn chunk_indices_are_contiguous_from_zero() {
        let text = "word ".repeat(5000);
        let turns = vec![turn(Role::User, &text, 1)];
        let chunks = chunk_turns(&turns, "sess", SourceType::Session, 512, 50);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
        }
    }

    #[test]
    fn speaker_role_mixed_when_chunk_spans_both() {
        let turns = vec![turn(Role::User, "hi", 1), turn(Role::Assistant, "hello", 2)];
        let chunks = chunk_turns(&turns, "sess", SourceType::Session, 512, 50);
        assert_eq!(chunks[0].speaker_role, Some(SpeakerRole::Mixed));
    }

    #[test]
    fn empty_turns_yield_no_chunks() {
        let chunks = chunk_turns(&[], "sess", SourceType::Session, 512, 50);
        assert!(chunks.is_empty());
    }

    #[test]
    fn take_overlap_tail_prefers_paragraph_boundary() {
        let text = format!("{}\n\n{}", "x".repeat(500), "y".repeat(50));
        let tail = take_overlap_tail(&text, 20);
        assert_eq!(tail, "y".repeat(50));
    }
}
