//! Storage: owns a project's on-disk layout, config, locking, and
//! append-only session/artifact logs.
//!
//! The store root is an explicit argument everywhere; there is no
//! process-wide singleton, so a long-running process may legitimately
//! hold many open store handles (e.g. during a global search).

pub mod artifact_store;
pub mod config;
pub mod layout;
pub mod lock;
pub mod registry;
pub mod session_store;

use std::path::PathBuf;

use crate::core::{now_unix, Chunk, SessionMeta, SessionSource, SourceType};
use crate::error::{Result, StorageError};

pub use artifact_store::{HooksState, ImportState};
pub use config::Config;
pub use layout::Layout;
pub use lock::StoreLock;

/// A handle to one project's store: its layout, config, and lock.
pub struct Store {
    layout: Layout,
    config: Config,
    lock: StoreLock,
}

impl Store {
    /// Initializes a fresh store at `root`, creating its directory tree
    /// and a default config if one doesn't already exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory tree or config cannot be
    /// written.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let layout = Layout::new(root.into());
        layout.ensure_dirs()?;
        let config_path = layout.config();
        if !config_path.exists() {
            Config::default().save(&config_path)?;
        }
        let lock = StoreLock::open(&layout.lock_file())?;
        let config = Config::load_or_default(&config_path)?;
        Ok(Self {
            layout,
            config,
            lock,
        })
    }

    /// Opens an existing store at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotInitialized`] if `root` has no
    /// `config.json`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let layout = Layout::new(root.into());
        if !layout.config().exists() {
            return Err(StorageError::NotInitialized.into());
        }
        let lock = StoreLock::open(&layout.lock_file())?;
        let config = Config::load_or_default(&layout.config())?;
        Ok(Self {
            layout,
            config,
            lock,
        })
    }

    /// The store's on-disk layout.
    #[must_use]
    pub const fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The store's loaded configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Replaces and persists this store's configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be written.
    pub fn set_config(&mut self, config: Config) -> Result<()> {
        config.save(&self.layout.config())?;
        self.config = config;
        Ok(())
    }

    /// Acquires a shared (reader) lock on the store.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockFailed`] if the OS call fails.
    pub fn read_lock(&mut self) -> Result<lock::StoreReadGuard<'_>> {
        self.lock.read()
    }

    /// Acquires an exclusive (writer) lock on the store.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockFailed`] if the OS call fails.
    pub fn write_lock(&mut self) -> Result<lock::StoreWriteGuard<'_>> {
        self.lock.write()
    }

    /// Creates a fresh, open session and persists its initial meta
    /// record. Caller must hold a write lock for the duration of the
    /// mutation.
    ///
    /// # Errors
    ///
    /// Returns an error if the session directory or meta file cannot be
    /// written.
    pub fn create_session(&self, source: SessionSource, command: Option<String>) -> Result<SessionMeta> {
        let id = generate_session_id();
        let mut meta = SessionMeta::new(id, source, now_unix());
        meta.command = command;
        session_store::create_session(&self.layout, &meta)?;
        Ok(meta)
    }

    /// Finalizes a session, writing `exit_code` and the end timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is unknown or already finalized.
    pub fn finalize_session(&self, id: &str, exit_code: Option<i32>) -> Result<SessionMeta> {
        let mut meta = session_store::load_meta(&self.layout, id)?;
        meta.finalize(now_unix(), exit_code)?;
        session_store::write_meta(&self.layout, &meta)?;
        Ok(meta)
    }

    /// Returns every chunk across every session and shared artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if any chunk log fails to parse.
    pub fn all_chunks(&self) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        for id in session_store::list_session_ids(&self.layout)? {
            chunks.extend(session_store::read_chunks(&self.layout, &id)?);
        }
        chunks.extend(artifact_store::read_artifact_chunks(&self.layout)?);
        Ok(chunks)
    }

    /// Appends chunks to the right log for their `source_type`: session
    /// logs for [`SourceType::Session`], the shared artifacts log
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the append fails.
    pub fn append_chunks(&self, session_id: &str, source_type: SourceType, chunks: &[Chunk]) -> Result<()> {
        if matches!(source_type, SourceType::Session) {
            session_store::append_chunks(&self.layout, session_id, chunks)
        } else {
            artifact_store::append_artifact_chunks(&self.layout, chunks)
        }
    }
}

/// Generates a session id of the form `<YYYYMMDD-HHMMSS>-<4-hex>`.
fn generate_session_id() -> String {
    use rand::Rng;
    let now = now_unix();
    let datetime = format_unix_as_compact(now);
    let suffix: u16 = rand::rng().random();
    format!("{datetime}-{suffix:04x}")
}

/// Formats a Unix timestamp as `YYYYMMDD-HHMMSS` in UTC, without pulling
/// in a full calendar dependency.
fn format_unix_as_compact(unix_secs: i64) -> String {
    let days_since_epoch = unix_secs.div_euclid(86400);
    let secs_of_day = unix_secs.rem_euclid(86400);
    let (year, month, day) = civil_from_days(days_since_epoch);
    let hour = secs_of_day / 3600;
    let minute = (secs_of_day % 3600) / 60;
    let second = secs_of_day % 60;
    format!("{year:04}{month:02}{day:02}-{hour:02}{minute:02}{second:02}")
}

/// Howard Hinnant's civil-from-days algorithm: converts a day count
/// since the Unix epoch into a proleptic-Gregorian (year, month, day).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_default_config() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join(".memory-bank");
        let store = Store::init(&root).unwrap();
        assert!(store.layout().config().exists());
        assert_eq!(store.config().version, config::CONFIG_VERSION);
    }

    #[test]
    fn open_nonexistent_store_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join(".memory-bank");
        assert!(Store::open(&root).is_err());
    }

    #[test]
    fn open_after_init_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join(".memory-bank");
        Store::init(&root).unwrap();
        assert!(Store::open(&root).is_ok());
    }

    #[test]
    fn create_and_finalize_session() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::init(tmp.path().join(".memory-bank")).unwrap();
        let meta = store
            .create_session(SessionSource::Pty, Some("ls".to_string()))
            .unwrap();
        assert!(!meta.is_finalized());
        let finalized = store.finalize_session(&meta.id, Some(0)).unwrap();
        assert!(finalized.is_finalized());
        assert_eq!(finalized.exit_code, Some(0));
    }

    #[test]
    fn session_id_has_expected_shape() {
        let id = generate_session_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2].len(), 4);
    }

    #[test]
    fn civil_from_days_matches_known_epoch_date() {
        // 2024-01-01 is 19723 days after the epoch.
        let (y, m, d) = civil_from_days(19723);
        assert_eq!((y, m, d), (2024, 1, 1));
    }

    #[test]
    fn append_chunks_routes_by_source_type() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::init(tmp.path().join(".memory-bank")).unwrap();
        let meta = store.create_session(SessionSource::Import, None).unwrap();
        let chunk = Chunk {
            session_id: meta.id.clone(),
            chunk_index: 0,
            source_type: SourceType::Session,
            text: "hi".to_string(),
            token_count: 1,
            quality: 1.0,
            start_ts: 0,
            end_ts: 0,
            speaker_role: None,
        };
        store
            .append_chunks(&meta.id, SourceType::Session, std::slice::from_ref(&chunk))
            .unwrap();
        let all = store.all_chunks().unwrap();
        assert_eq!(all.len(), 1);
    }
}
