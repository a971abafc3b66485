//! The [`Chunk`] type: the atomic unit of indexing and retrieval.

use serde::{Deserialize, Serialize};

use super::SourceType;

/// Which side(s) of a conversation a chunk's text was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerRole {
    /// Text drawn only from user turns.
    User,
    /// Text drawn only from assistant turns.
    Assistant,
    /// Text drawn from both sides (typical once a chunk spans a turn
    /// boundary).
    Mixed,
}

/// An immutable, token-bounded text unit with a quality score.
///
/// Once appended to a chunk log a `Chunk` is never rewritten; chunkers
/// only ever produce new chunks with the next free `chunk_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Owning session id, or `"artifacts"` for shared artifact chunks.
    pub session_id: String,
    /// 0-based position within the owning chunk log.
    pub chunk_index: usize,
    /// Kind of content this chunk was drawn from.
    pub source_type: SourceType,
    /// Cleaned UTF-8 text.
    pub text: String,
    /// Approximate token count, see [`crate::chunking::token_count`].
    pub token_count: usize,
    /// Quality score in `[0.0, 1.0]`, rounded to three decimals.
    pub quality: f64,
    /// Start timestamp, seconds since epoch. `0` only for imports lacking
    /// timestamps.
    pub start_ts: i64,
    /// End timestamp, seconds since epoch.
    pub end_ts: i64,
    /// Which side(s) of the conversation this chunk covers, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_role: Option<SpeakerRole>,
}

impl Chunk {
    /// The quality floor below which a chunk is flagged low-quality for
    /// sampling purposes. Chunks below this are still written.
    pub const LOW_QUALITY_THRESHOLD: f64 = 0.10;

    /// Returns true if this chunk scored below the low-quality threshold.
    #[must_use]
    pub fn is_low_quality(&self) -> bool {
        self.quality < Self::LOW_QUALITY_THRESHOLD
    }

    /// Returns the key that uniquely identifies this chunk within a store,
    /// independent of its text.
    #[must_use]
    pub fn key(&self) -> super::ChunkKey {
        super::ChunkKey {
            session_id: self.session_id.clone(),
            chunk_index: self.chunk_index,
            source_type: self.source_type,
        }
    }

    /// Returns a short preview of the chunk's text, truncated at a
    /// character boundary, for listings and logs.
    #[must_use]
    pub fn preview(&self, max_chars: usize) -> String {
        if self.text.chars().count() <= max_chars {
            return self.text.clone();
        }
        let truncated: String = self.text.chars().take(max_chars).collect();
        format!("{truncated}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Chunk {
        Chunk {
            session_id: "20260101-000000-abcd".to_string(),
            chunk_index: 0,
            source_type: SourceType::Session,
            text: "hello world".to_string(),
            token_count: 3,
            quality: 0.42,
            start_ts: 100,
            end_ts: 200,
            speaker_role: Some(SpeakerRole::User),
        }
    }

    #[test]
    fn low_quality_threshold() {
        let mut c = sample();
        c.quality = 0.05;
        assert!(c.is_low_quality());
        c.quality = 0.10;
        assert!(!c.is_low_quality());
    }

    #[test]
    fn key_round_trip() {
        let c = sample();
        let key = c.key();
        assert_eq!(key.session_id, c.session_id);
        assert_eq!(key.chunk_index, c.chunk_index);
        assert_eq!(key.source_type, c.source_type);
    }

    #[test]
    fn preview_truncates() {
        let mut c = sample();
        c.text = "a".repeat(100);
        let preview = c.preview(10);
        assert_eq!(preview.chars().count(), 11);
        assert!(preview.ends_with('…'));
    }

    #[test]
    fn preview_short_text_unchanged() {
        let c = sample();
        assert_eq!(c.preview(100), c.text);
    }

    #[test]
    fn serde_round_trip() {
        let c = sample();
        let json = serde_json::to_string(&c).unwrap();
        let back: Chunk = serde_json::from_str(&json).unwrap();
        assert_eq!(c, back);
    }
}
