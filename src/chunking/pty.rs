//! PTY-based chunking: groups a session's raw event log into episodes,
//! sanitizes and noise-filters each, then reuses turn-based sizing.

use crate::core::{Chunk, PtyEvent, SourceType, Stream};
use crate::sanitize::{noise, Sanitizer};
use crate::transcript::{Role, Turn};

use super::turns::chunk_turns;

/// Groups events into episodes, sanitizes and noise-filters each, then
/// sizes the result exactly as turn-based chunking does.
///
/// Input-stream events become `User` turns and output-stream events
/// become `Assistant` turns so the same accumulate-with-overlap
/// machinery in [`chunk_turns`] applies unchanged; this reuse is a
/// deliberate design choice (see `DESIGN.md`), not a claim that a PTY
/// session is a chat.
#[must_use]
pub fn chunk_pty_events(
    events: &[PtyEvent],
    session_id: &str,
    max_tokens: usize,
    overlap_tokens: usize,
) -> Vec<Chunk> {
    let episodes = group_episodes(events);
    let mut all_chunks = Vec::new();

    for episode in episodes {
        let turns = sanitize_episode(episode);
        if turns.is_empty() {
            continue;
        }
        let chunks = chunk_turns(
            &turns,
            session_id,
            SourceType::Session,
            max_tokens,
            overlap_tokens,
        );
        all_chunks.extend(chunks);
    }

    for (i, chunk) in all_chunks.iter_mut().enumerate() {
        chunk.chunk_index = i;
    }
    all_chunks
}

/// Splits events into episodes separated by an idle gap of at least
/// [`PtyEvent::EPISODE_IDLE_GAP_SECS`] or by a form-feed character.
fn group_episodes(events: &[PtyEvent]) -> Vec<Vec<&PtyEvent>> {
    let mut episodes: Vec<Vec<&PtyEvent>> = Vec::new();
    let mut current: Vec<&PtyEvent> = Vec::new();
    let mut last_ts: Option<i64> = None;

    for event in events {
        let starts_new = last_ts.is_some_and(|prev| {
            event.timestamp - prev >= PtyEvent::EPISODE_IDLE_GAP_SECS
        });
        if starts_new && !current.is_empty() {
            episodes.push(std::mem::take(&mut current));
        }
        let breaks_here = event.text.contains(PtyEvent::EPISODE_BREAK_CHAR);
        current.push(event);
        last_ts = Some(event.timestamp);
        if breaks_here {
            episodes.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        episodes.push(current);
    }
    episodes
}

/// Sanitizes and noise-filters one episode's events, turning each into a
/// [`Turn`] keyed by stream direction.
fn sanitize_episode(episode: Vec<&PtyEvent>) -> Vec<Turn> {
    let mut turns = Vec::new();
    let mut sanitizer = Sanitizer::new();
    for event in episode {
        let cleaned = sanitizer.push(event.text.as_bytes());
        let filtered = noise::filter(&cleaned);
        if filtered.trim().is_empty() {
            continue;
        }
        let role = match event.stream {
            Stream::In => Role::User,
            Stream::Out => Role::Assistant,
        };
        turns.push(Turn {
            role,
            text: filtered,
            timestamp: event.timestamp,
        });
    }
    turns
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(ts: i64, stream: Stream, text: &str) -> PtyEvent {
        PtyEvent {
            timestamp: ts,
            stream,
            text: text.to_string(),
        }
    }

    #[test]
    fn single_episode_produces_chunks() {
        let events = vec![
            event(0, Stream::In, "ls -la\n"),
            event(1, Stream::Out, "total 0\ndrwxr-xr-x\n"),
        ];
        let chunks = chunk_pty_events(&events, "sess", 512, 50);
        assert!(!chunks.is_empty());
    }

    #[test]
    fn idle_gap_splits_into_separate_episodes() {
        let events = vec![
            event(0, Stream::In, "first command output here"),
            event(1000, Stream::In, "second command after a long idle gap"),
        ];
        let episodes = group_episodes(&events);
        assert_eq!(episodes.len(), 2);
    }

    #[test]
    fn form_feed_forces_episode_boundary() {
        let events = vec![
            event(0, Stream::Out, "before\x0c"),
            event(1, Stream::Out, "after"),
        ];
        let episodes = group_episodes(&events);
        assert_eq!(episodes.len(), 2);
    }

    #[test]
    fn chunk_indices_continuous_across_episodes() {
        let events = vec![
            event(0, Stream::In, "alpha beta gamma command"),
            event(1000, Stream::Out, "delta epsilon zeta output"),
        ];
        let chunks = chunk_pty_events(&events, "sess", 512, 50);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
        }
    }

    #[test]
    fn ansi_noise_is_stripped_before_sizing() {
        let events = vec![event(0, Stream::Out, "\x1B[31mred text\x1B[0m")];
        let chunks = chunk_pty_events(&events, "sess", 512, 50);
        assert!(!chunks.iter().any(|c| c.text.contains('\x1B')));
    }

    #[test]
    fn blank_events_produce_no_turns() {
        let events = vec![event(0, Stream::Out, "   \n  \n")];
        let chunks = chunk_pty_events(&events, "sess", 512, 50);
        assert!(chunks.is_empty());
    }
}
