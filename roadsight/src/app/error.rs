//! Application error types.

use std::fmt;

use crate::camera::SessionError;
use crate::config::ConfigError;
use crate::game::GameError;
use crate::logging::LoggingError;
use crate::persistence::PersistenceError;

/// Errors surfaced by the composition root.
#[derive(Debug)]
pub enum AppError {
    /// Configuration could not be loaded.
    Config(ConfigError),

    /// Logging could not be installed.
    Logging(LoggingError),

    /// A camera session call was made in the wrong state.
    Session(SessionError),

    /// A game call was made in the wrong state.
    Game(GameError),

    /// The persistence backend could not be set up.
    Persistence(PersistenceError),

    /// No persistence directory was configured and the platform has none.
    NoDataDirectory,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(e) => write!(f, "Configuration error: {}", e),
            AppError::Logging(e) => write!(f, "Logging setup failed: {}", e),
            AppError::Session(e) => write!(f, "Camera session error: {}", e),
            AppError::Game(e) => write!(f, "Game error: {}", e),
            AppError::Persistence(e) => write!(f, "Persistence error: {}", e),
            AppError::NoDataDirectory => write!(f, "No data directory available for persistence"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(e) => Some(e),
            AppError::Logging(e) => Some(e),
            AppError::Session(e) => Some(e),
            AppError::Game(e) => Some(e),
            AppError::Persistence(e) => Some(e),
            AppError::NoDataDirectory => None,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e)
    }
}

impl From<LoggingError> for AppError {
    fn from(e: LoggingError) -> Self {
        AppError::Logging(e)
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::Session(e)
    }
}

impl From<GameError> for AppError {
    fn from(e: GameError) -> Self {
        AppError::Game(e)
    }
}

impl From<PersistenceError> for AppError {
    fn from(e: PersistenceError) -> Self {
        AppError::Persistence(e)
    }
}
