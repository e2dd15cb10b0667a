//! Application configuration for `RoadsightApp`.

use std::path::PathBuf;

use crate::camera::ControllerConfig;
use crate::config::ConfigFile;
use crate::game::GameConfig;
use crate::logging::LoggingConfig;
use crate::narration::DEFAULT_NARRATION_QUEUE;
use crate::overlay::OverlayConfig;
use crate::pipeline::DEFAULT_EVENT_CAPACITY;
use crate::poi::PoiCacheConfig;
use crate::pose::PoseTrackerConfig;
use crate::visibility::{Viewport, VisibilityConfig};

/// Viewport assumed until the host reports its real size.
pub const DEFAULT_VIEWPORT: Viewport = Viewport {
    width: 390.0,
    height: 844.0,
};

/// Everything needed to assemble the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub visibility: VisibilityConfig,
    pub pose: PoseTrackerConfig,
    pub poi: PoiCacheConfig,
    pub overlay: OverlayConfig,
    pub controller: ControllerConfig,
    pub game: GameConfig,
    pub logging: LoggingConfig,
    pub viewport: Viewport,
    /// Directory for the JSON persistence backend. `None` uses the
    /// platform data directory.
    pub data_dir: Option<PathBuf>,
    pub narration_queue: usize,
    pub event_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            visibility: VisibilityConfig::default(),
            pose: PoseTrackerConfig::default(),
            poi: PoiCacheConfig::default(),
            overlay: OverlayConfig::default(),
            controller: ControllerConfig::default(),
            game: GameConfig::default(),
            logging: LoggingConfig::default(),
            viewport: DEFAULT_VIEWPORT,
            data_dir: None,
            narration_queue: DEFAULT_NARRATION_QUEUE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl AppConfig {
    /// Build from a loaded configuration file. Settings the file does not
    /// cover keep their defaults.
    pub fn from_config_file(config: &ConfigFile) -> Self {
        Self {
            visibility: config.visibility.clone(),
            pose: config.pose.clone(),
            poi: config.poi.clone(),
            overlay: config.overlay.clone(),
            controller: config.controller.clone(),
            logging: config.logging.clone(),
            data_dir: config.data_dir.clone(),
            ..Default::default()
        }
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.data_dir = Some(dir);
        self
    }
}
