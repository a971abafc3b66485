//! Episode classification: labeling a session by the kind of work it
//! represents, and detecting whether it ended in an error state.
//!
//! Classification first tries the session's command line against a
//! small table of regexes; if there is no command (or none of the
//! rules match) it falls back to scoring the session's chunk text
//! against a weighted keyword lexicon.

pub mod classify;

pub use classify::{classify_session, Episode};

use crate::core::{Chunk, SessionMeta};

/// Case-sensitive, whole-word error markers. Any chunk containing one
/// of these, or a nonzero exit code, marks the session as errored.
const ERROR_MARKERS: &[&str] = &["Traceback", "panic:", "FAIL", "error:"];

/// Returns true if `meta` or any of `chunks` indicates the session
/// ended in an error state.
#[must_use]
pub fn session_has_error(meta: &SessionMeta, chunks: &[Chunk]) -> bool {
    if matches!(meta.exit_code, Some(code) if code != 0) {
        return true;
    }
    chunks.iter().any(|c| chunk_has_error_marker(&c.text))
}

fn chunk_has_error_marker(text: &str) -> bool {
    ERROR_MARKERS.iter().any(|marker| contains_whole_word(text, marker))
}

/// Whole-word, case-sensitive substring search: `needle` must appear in
/// `haystack` with non-alphanumeric (or string-boundary) characters on
/// both sides.
fn contains_whole_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let bytes = haystack.as_bytes();
    let needle_bytes = needle.as_bytes();
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let abs = start + pos;
        let before_ok = abs == 0 || !is_word_byte(bytes[abs - 1]);
        let after_idx = abs + needle_bytes.len();
        let after_ok = after_idx >= bytes.len() || !is_word_byte(bytes[after_idx]);
        if before_ok && after_ok {
            return true;
        }
        start = abs + needle.len().max(1);
        if start > haystack.len() {
            break;
        }
    }
    false
}

const fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SessionSource, SourceType};

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
    fn nonzero_exit_code_is_error() {
        let mut meta = SessionMeta::new("s".to_string(), SessionSource::Pty, 0);
        meta.exit_code = Some(1);
        assert!(session_has_error(&meta, &[]));
    }

    #[test]
    fn zero_exit_code_with_no_markers_is_not_error() {
        let mut meta = SessionMeta::new("s".to_string(), SessionSource::Pty, 0);
        meta.exit_code = Some(0);
        assert!(!session_has_error(&meta, &[chunk("all good")]));
    }

    #[test]
    fn traceback_marker_in_chunk_is_error() {
        let meta = SessionMeta::new("s".to_string(), SessionSource::Import, 0);
        assert!(session_has_error(&meta, &[chunk("Traceback (most recent call last):")]));
    }

    #[test]
    fn substring_without_word_boundary_is_not_error() {
        let meta = SessionMeta::new("s".to_string(), SessionSource::Import, 0);
        assert!(!session_has_error(&meta, &[chunk("errorless and FAILless code")]));
    }

    #[test]
    fn panic_marker_requires_colon() {
        let meta = SessionMeta::new("s".to_string(), SessionSource::Import, 0);
        assert!(!session_has_error(&meta, &[chunk("panicked at some point")]));
        assert!(session_has_error(&meta, &[chunk("thread main panic: boom")]));
    }
}
