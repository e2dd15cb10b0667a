//! Session controller errors.

use std::fmt;

use thiserror::Error;

/// Contract violations reported by the session controller.
///
/// Environment problems (no AR, no permission, no camera) are not errors;
/// see [`InitializationFailure`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Camera session controller is not initialized")]
    NotInitialized,

    #[error("No camera session is active")]
    NotActive,

    #[error("Camera session was stopped while starting")]
    StoppedWhileStarting,

    #[error("Photo capture is disabled for this session")]
    PhotoCaptureDisabled,

    #[error("Photo capture failed: {0}")]
    CaptureFailed(String),
}

/// Why `initialize()` returned `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializationFailure {
    /// The platform lacks AR support or runs an OS that is too old.
    UnsupportedPlatform,
    /// The user denied camera access.
    PermissionDenied,
    /// No back-facing camera is available.
    NoSuitableCamera,
}

impl fmt::Display for InitializationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            InitializationFailure::UnsupportedPlatform => "AR is not supported on this device",
            InitializationFailure::PermissionDenied => "camera permission denied",
            InitializationFailure::NoSuitableCamera => "no back-facing camera available",
        };
        f.write_str(text)
    }
}
