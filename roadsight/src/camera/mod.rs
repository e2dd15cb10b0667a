//! Camera session controller
//!
//! Owns the AR session lifecycle, decides per frame whether to process or
//! skip, adapts to battery and thermal conditions, and hands surviving
//! frames to landmark detection on a worker task.
//!
//! # Example
//!
//! ```ignore
//! use roadsight::camera::{CameraSessionController, ControllerConfig};
//!
//! let controller = CameraSessionController::new(
//!     ControllerConfig::default(),
//!     platform,
//!     detector,
//!     persistence,
//! );
//! if !controller.initialize().await {
//!     show_fallback(controller.initialization_failure());
//!     return;
//! }
//! controller.start_session(None)?;
//! // ... frames flow through the attached FrameProcessor ...
//! controller.stop_session();
//! ```

mod config;
mod controller;
mod error;
mod metrics;
mod platform;
mod skip;

pub use config::{
    BatteryMode, ControllerConfig, Quality, SessionConfig, SessionConfigPatch, TargetFps, ThermalConfig,
    DEFAULT_BATTERY_THRESHOLD_PERCENT, DEFAULT_DETECTION_QUEUE, DEFAULT_METRICS_INTERVAL,
    DEFAULT_MIN_OS_MAJOR_VERSION, DEFAULT_THERMAL_THRESHOLD_CELSIUS,
};
pub use controller::{ArPhoto, CameraSessionController, LandmarkDetector, PhotoContext, SessionState};
pub use error::{InitializationFailure, SessionError};
pub use metrics::{MetricsSnapshot, MetricsTracker, PerformanceMetrics, EMA_PREVIOUS_WEIGHT, EMA_SAMPLE_WEIGHT};
pub use platform::{
    select_camera, CameraDevice, CameraFrame, CameraLens, CameraPlatform, CameraPosition, CapturedImage,
    FrameProcessor, FrameSubscription, PlatformInfo,
};
pub use skip::{
    FrameDecision, FrameSkipConfig, FrameSkipPolicy, DEFAULT_MIN_FRAME_INTERVAL, DEFAULT_PROCESSING_BUDGET,
};
