//! Persistence port
//!
//! Preferences, final session metrics and game history are handed to a
//! [`Persistence`] implementation. Every call is fire-and-forget from the
//! core's point of view: failures are logged through [`log_failure`] and
//! never interrupt a session.
//!
//! [`JsonFilePersistence`] stores JSON documents in a directory, writing
//! each file to a temporary sibling first and renaming it into place.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::camera::{MetricsSnapshot, SessionConfig, SessionConfigPatch};
use crate::game::GameHistoryRecord;

/// Default number of game history records kept on disk.
pub const DEFAULT_HISTORY_LIMIT: usize = 200;

const PREFERENCES_FILE: &str = "preferences.json";
const METRICS_FILE: &str = "last_session_metrics.json";
const HISTORY_FILE: &str = "game_history.json";

/// Errors from a persistence backend.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed data in {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Storage for preferences, metrics and game history.
pub trait Persistence: Send + Sync {
    /// Stored preferences, or `None` if nothing was saved yet.
    fn load_preferences(&self) -> Result<Option<SessionConfigPatch>, PersistenceError>;

    fn save_preferences(&self, config: &SessionConfig) -> Result<(), PersistenceError>;

    fn save_metrics(&self, snapshot: &MetricsSnapshot) -> Result<(), PersistenceError>;

    fn save_game_history(&self, record: &GameHistoryRecord) -> Result<(), PersistenceError>;
}

/// Log a failed persistence call at warn level and carry on.
pub fn log_failure(operation: &str, result: Result<(), PersistenceError>) {
    if let Err(e) = result {
        tracing::warn!(operation, error = %e, "Persistence failed, continuing without it");
    }
}

/// JSON files in a directory.
#[derive(Debug)]
pub struct JsonFilePersistence {
    dir: PathBuf,
    history_limit: usize,
    /// Serializes read-modify-write of the history file.
    history_lock: Mutex<()>,
}

impl JsonFilePersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            history_lock: Mutex::new(()),
        }
    }

    /// Default location: `<data_dir>/roadsight`.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("roadsight"))
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stored game history, oldest first.
    pub fn load_game_history(&self) -> Result<Vec<GameHistoryRecord>, PersistenceError> {
        Ok(read_json(&self.dir.join(HISTORY_FILE))?.unwrap_or_default())
    }

    /// Metrics of the last stopped session.
    pub fn load_last_metrics(&self) -> Result<Option<MetricsSnapshot>, PersistenceError> {
        read_json(&self.dir.join(METRICS_FILE))
    }
}

impl Persistence for JsonFilePersistence {
    fn load_preferences(&self) -> Result<Option<SessionConfigPatch>, PersistenceError> {
        read_json(&self.dir.join(PREFERENCES_FILE))
    }

    fn save_preferences(&self, config: &SessionConfig) -> Result<(), PersistenceError> {
        write_json_atomic(&self.dir.join(PREFERENCES_FILE), &SessionConfigPatch::from(*config))
    }

    fn save_metrics(&self, snapshot: &MetricsSnapshot) -> Result<(), PersistenceError> {
        write_json_atomic(&self.dir.join(METRICS_FILE), snapshot)
    }

    fn save_game_history(&self, record: &GameHistoryRecord) -> Result<(), PersistenceError> {
        let _guard = self.history_lock.lock();
        let path = self.dir.join(HISTORY_FILE);

        let mut history: Vec<GameHistoryRecord> = read_json(&path)?.unwrap_or_default();
        history.push(record.clone());
        if history.len() > self.history_limit {
            let excess = history.len() - self.history_limit;
            history.drain(..excess);
        }
        write_json_atomic(&path, &history)
    }
}

/// Discards everything; loads find nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPersistence;

impl Persistence for NullPersistence {
    fn load_preferences(&self) -> Result<Option<SessionConfigPatch>, PersistenceError> {
        Ok(None)
    }

    fn save_preferences(&self, _config: &SessionConfig) -> Result<(), PersistenceError> {
        Ok(())
    }

    fn save_metrics(&self, _snapshot: &MetricsSnapshot) -> Result<(), PersistenceError> {
        Ok(())
    }

    fn save_game_history(&self, _record: &GameHistoryRecord) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// Keeps everything in memory. Handy for hosts without storage and tests.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    preferences: Mutex<Option<SessionConfigPatch>>,
    metrics: Mutex<Vec<MetricsSnapshot>>,
    history: Mutex<Vec<GameHistoryRecord>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed stored preferences.
    pub fn with_preferences(patch: SessionConfigPatch) -> Self {
        let persistence = Self::default();
        *persistence.preferences.lock() = Some(patch);
        persistence
    }

    pub fn preferences(&self) -> Option<SessionConfigPatch> {
        *self.preferences.lock()
    }

    pub fn metrics(&self) -> Vec<MetricsSnapshot> {
        self.metrics.lock().clone()
    }

    pub fn history(&self) -> Vec<GameHistoryRecord> {
        self.history.lock().clone()
    }
}

impl Persistence for MemoryPersistence {
    fn load_preferences(&self) -> Result<Option<SessionConfigPatch>, PersistenceError> {
        Ok(*self.preferences.lock())
    }

    fn save_preferences(&self, config: &SessionConfig) -> Result<(), PersistenceError> {
        *self.preferences.lock() = Some(SessionConfigPatch::from(*config));
        Ok(())
    }

    fn save_metrics(&self, snapshot: &MetricsSnapshot) -> Result<(), PersistenceError> {
        self.metrics.lock().push(snapshot.clone());
        Ok(())
    }

    fn save_game_history(&self, record: &GameHistoryRecord) -> Result<(), PersistenceError> {
        self.history.lock().push(record.clone());
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistenceError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistenceError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| PersistenceError::Format {
            path: path.to_path_buf(),
            source,
        })
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let io_err = |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    // Write to temp file first, then rename into place
    let temp_path = path.with_extension("tmp");
    let file = fs::File::create(&temp_path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| PersistenceError::Format {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(io_err)?;
    drop(writer);

    fs::rename(&temp_path, path).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{MetricsTracker, Quality};
    use crate::game::{GameHistoryRecord, GameType};
    use chrono::Utc;
    use std::time::Instant;
    use tempfile::TempDir;

    fn record(id: &str) -> GameHistoryRecord {
        GameHistoryRecord {
            game_id: id.to_string(),
            game_type: GameType::Scavenger,
            started_at: Utc::now(),
            ended_at: Utc::now(),
            score: 10,
            progress: 20.0,
            completed: false,
            objectives_completed: 1,
            objectives_total: 5,
            achievements: vec![],
        }
    }

    #[test]
    fn test_preferences_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = JsonFilePersistence::new(temp.path().join("nested"));

        assert_eq!(store.load_preferences().unwrap(), None);

        let config = SessionConfig {
            quality: Quality::Medium,
            ..Default::default()
        };
        store.save_preferences(&config).unwrap();

        let loaded = store.load_preferences().unwrap().unwrap();
        assert_eq!(loaded.apply(SessionConfig::default()), config);
        assert!(!temp.path().join("nested").join("preferences.tmp").exists());
    }

    #[test]
    fn test_malformed_preferences_is_format_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(PREFERENCES_FILE), "{ not json").unwrap();

        let store = JsonFilePersistence::new(temp.path());
        assert!(matches!(
            store.load_preferences(),
            Err(PersistenceError::Format { .. })
        ));
    }

    #[test]
    fn test_history_appends_and_caps() {
        let temp = TempDir::new().unwrap();
        let store = JsonFilePersistence::new(temp.path()).with_history_limit(3);

        for i in 0..5 {
            store.save_game_history(&record(&format!("g{}", i))).unwrap();
        }

        let ids: Vec<String> = store
            .load_game_history()
            .unwrap()
            .into_iter()
            .map(|r| r.game_id)
            .collect();
        assert_eq!(ids, vec!["g2", "g3", "g4"]);
    }

    #[test]
    fn test_metrics_saved() {
        let temp = TempDir::new().unwrap();
        let store = JsonFilePersistence::new(temp.path());
        let snapshot = MetricsTracker::new().snapshot(Instant::now(), SessionConfig::default());

        store.save_metrics(&snapshot).unwrap();
        assert_eq!(store.load_last_metrics().unwrap(), Some(snapshot));
    }

    #[test]
    fn test_unwritable_dir_reports_io_error() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("file");
        fs::write(&blocker, "x").unwrap();

        let store = JsonFilePersistence::new(blocker.join("sub"));
        let result = store.save_preferences(&SessionConfig::default());
        assert!(matches!(result, Err(PersistenceError::Io { .. })));

        // Logging a failure never panics
        log_failure("save_preferences", result);
    }

    #[test]
    fn test_memory_persistence() {
        let store = MemoryPersistence::with_preferences(SessionConfigPatch {
            quality: Some(Quality::Low),
            ..Default::default()
        });
        assert_eq!(store.load_preferences().unwrap().unwrap().quality, Some(Quality::Low));

        store.save_game_history(&record("g")).unwrap();
        assert_eq!(store.history().len(), 1);
    }
}
