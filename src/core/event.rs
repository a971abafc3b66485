//! Raw PTY event records, as captured before sanitization and chunking.

use serde::{Deserialize, Serialize};

/// Which direction of a PTY session an event's bytes flowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    /// Bytes written to the child process's stdin.
    In,
    /// Bytes read from the child process's stdout/stderr.
    Out,
}

/// One append-only record in a session's `events.jsonl` log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PtyEvent {
    /// Seconds since epoch when this event was captured.
    pub timestamp: i64,
    /// Which direction the bytes flowed.
    pub stream: Stream,
    /// Raw captured text (pre-sanitization).
    pub text: String,
}

impl PtyEvent {
    /// The idle gap, in seconds, that starts a new episode when exceeded.
    pub const EPISODE_IDLE_GAP_SECS: i64 = 30;

    /// The form-feed byte that also forces an episode boundary.
    pub const EPISODE_BREAK_CHAR: char = '\x0c';
}
