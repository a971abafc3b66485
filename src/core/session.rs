//! Session metadata: [`SessionMeta`] and its [`SessionSource`].

use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};

/// Where a session's content originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionSource {
    /// Captured via the host agent's Stop hook.
    Hook,
    /// Imported from an existing structured transcript file.
    Import,
    /// Captured by wrapping a child process in a pseudo-terminal.
    Pty,
}

/// A session's metadata record.
///
/// Immutable after [`SessionMeta::finalize`]: the store layer enforces
/// this by treating `meta.json` as write-once past that point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    /// Session id, `<YYYYMMDD-HHMMSS>-<4-hex>`.
    pub id: String,
    /// Where this session's content originated.
    pub source: SessionSource,
    /// The command line that produced this session, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Seconds since epoch when the session began.
    pub started_at: i64,
    /// Seconds since epoch when the session ended, if finalized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<i64>,
    /// Exit code of the underlying process, if finalized and applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// The host agent's own session id, when this session was captured
    /// via a hook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originating_agent_session_id: Option<String>,
}

impl SessionMeta {
    /// Creates a fresh, open session record.
    #[must_use]
    pub fn new(id: String, source: SessionSource, started_at: i64) -> Self {
        Self {
            id,
            source,
            command: None,
            started_at,
            ended_at: None,
            exit_code: None,
            originating_agent_session_id: None,
        }
    }

    /// Returns true once `ended_at` has been written.
    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Writes `exit_code` and `ended_at`, closing the session.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupt`] if `ended_at < started_at`, or if
    /// the session was already finalized.
    pub fn finalize(&mut self, ended_at: i64, exit_code: Option<i32>) -> Result<()> {
        if self.is_finalized() {
            return Err(StorageError::Corrupt {
                path: format!("sessions/{}/meta.json", self.id),
                reason: "session already finalized".to_string(),
            }
            .into());
        }
        if ended_at < self.started_at {
            return Err(StorageError::Corrupt {
                path: format!("sessions/{}/meta.json", self.id),
                reason: format!(
                    "ended_at {ended_at} precedes started_at {}",
                    self.started_at
                ),
            }
            .into());
        }
        self.ended_at = Some(ended_at);
        self.exit_code = exit_code;
        Ok(())
    }

    /// Returns true if the session's chunk log requires an event log
    /// (PTY sources only).
    #[must_use]
    pub const fn has_event_log(&self) -> bool {
        matches!(self.source, SessionSource::Pty)
    }
}
