//! Logging setup
//!
//! Installs a global `tracing` subscriber: an `EnvFilter` (`RUST_LOG`
//! wins over the configured filter), a console layer with local RFC 3339
//! timestamps and, when a directory is configured, a daily-rolling file
//! written from a background thread.
//!
//! Hosts call [`init_logging`] once at startup and keep the returned
//! [`LoggingGuard`] alive; dropping it flushes the file writer.

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Default filter directive.
pub const DEFAULT_LOG_FILTER: &str = "roadsight=info";

/// Default log file name prefix; the date is appended by the roller.
pub const DEFAULT_LOG_FILE_PREFIX: &str = "roadsight.log";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Write to stderr.
    pub console: bool,
    /// Directory for rolling log files. `None` disables file logging.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            console: true,
            directory: None,
            file_prefix: DEFAULT_LOG_FILE_PREFIX.to_string(),
        }
    }
}

/// `<data_dir>/roadsight/logs`, if the platform has a data directory.
pub fn default_log_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("roadsight").join("logs"))
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("A global tracing subscriber is already installed")]
    AlreadyInitialized,

    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("Cannot create log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Keeps the background file writer alive.
#[derive(Debug)]
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    worker: Option<WorkerGuard>,
}

impl LoggingGuard {
    /// Whether file logging is active.
    pub fn writes_file(&self) -> bool {
        self.worker.is_some()
    }
}

/// Install the global subscriber.
///
/// Fails with [`LoggingError::AlreadyInitialized`] if any global
/// subscriber is already set, including one from an earlier call.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| LoggingError::InvalidFilter(e.to_string()))?;

    let console = config
        .console
        .then(|| fmt::layer().with_timer(LocalTime::rfc_3339()));

    let (file, worker) = match &config.directory {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|source| LoggingError::Directory {
                path: dir.clone(),
                source,
            })?;
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_timer(LocalTime::rfc_3339())
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    Ok(LoggingGuard { worker })
}
