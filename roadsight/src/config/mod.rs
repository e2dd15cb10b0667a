//! Configuration file
//!
//! Reads `roadsight.ini` into the typed configs of every component.
//! Missing files, sections and keys fall back to the built-in defaults;
//! a present but malformed value is an error naming the section and key.
//!
//! ```ini
//! [visibility]
//! horizontal_fov = 60
//! vertical_fov = 45
//! cluster_radius_m = 50
//! max_landmarks = 10
//! update_interval_ms = 1000
//! historical_mode = false
//! min_confidence = 0.0
//! max_distance_m = 5000
//! stale_pose_ms = 5000
//!
//! [poi]
//! ttl_secs = 3600
//! max_entries = 256
//! radius_m = 2000
//! categories = landmark, historical
//! fetch_timeout_secs = 10
//!
//! [overlay]
//! performance_mode = high
//! fps_floor = 30
//!
//! [session]
//! quality = high
//! target_fps = 60
//! battery_mode = normal
//! landmark_detection = true
//! photo_capture = true
//! battery_threshold_percent = 20
//! processing_budget_ms = 33
//! min_frame_interval_ms = 16
//! data_dir = /var/lib/roadsight
//!
//! [thermal]
//! throttle_celsius = 45
//!
//! [logging]
//! filter = roadsight=info
//! console = true
//! directory = /var/log/roadsight
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;

use crate::app::AppConfig;
use crate::camera::{BatteryMode, ControllerConfig, Quality, TargetFps};
use crate::landmark::LandmarkCategory;
use crate::logging::LoggingConfig;
use crate::overlay::{OverlayConfig, PerformanceMode};
use crate::poi::PoiCacheConfig;
use crate::pose::PoseTrackerConfig;
use crate::visibility::VisibilityConfig;

/// Configuration file name inside the config directory.
pub const CONFIG_FILE_NAME: &str = "roadsight.ini";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot parse config file: {0}")]
    Parse(String),

    #[error("Invalid value '{value}' for [{section}] {key}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },
}

/// `<config_dir>/roadsight/roadsight.ini`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("roadsight").join(CONFIG_FILE_NAME))
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub visibility: VisibilityConfig,
    pub pose: PoseTrackerConfig,
    pub poi: PoiCacheConfig,
    pub overlay: OverlayConfig,
    /// Session defaults, battery threshold, skip budget and thermal limit.
    pub controller: ControllerConfig,
    pub logging: LoggingConfig,
    /// Persistence directory; `None` uses the platform data directory.
    pub data_dir: Option<PathBuf>,
}

impl ConfigFile {
    /// Load from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(e) => ConfigError::Parse(format!("{}: {}", path.display(), e)),
        })?;
        Self::from_ini(&ini)
    }

    /// Load from the default path, or return defaults if there is no file.
    pub fn load_default() -> Result<Self, ConfigError> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Parse INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_ini(&ini)
    }

    /// Configuration consumed by [`crate::app::RoadsightApp`].
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig::from_config_file(self)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.read_visibility(&Section::new(ini, "visibility"))?;
        config.read_poi(&Section::new(ini, "poi"))?;
        config.read_overlay(&Section::new(ini, "overlay"))?;
        config.read_session(&Section::new(ini, "session"))?;
        config.read_thermal(&Section::new(ini, "thermal"))?;
        config.read_logging(&Section::new(ini, "logging"))?;
        Ok(config)
    }

    fn read_visibility(&mut self, s: &Section<'_>) -> Result<(), ConfigError> {
        let v = &mut self.visibility;
        s.set(&mut v.horizontal_fov, "horizontal_fov", |x| parse_in_range(x, 1.0, 179.0))?;
        s.set(&mut v.vertical_fov, "vertical_fov", |x| parse_in_range(x, 1.0, 179.0))?;
        s.set(&mut v.cluster_radius_meters, "cluster_radius_m", parse_non_negative)?;
        s.set(&mut v.max_landmarks_visible, "max_landmarks", parse_positive_usize)?;
        s.set(&mut v.update_interval, "update_interval_ms", parse_millis)?;
        s.set(&mut v.historical_mode, "historical_mode", parse_bool)?;
        s.set(&mut v.rating_tolerance, "rating_tolerance", parse_non_negative)?;
        s.set(&mut v.min_confidence, "min_confidence", |x| parse_in_range(x, 0.0, 1.0))?;
        s.set(&mut v.max_distance_meters, "max_distance_m", parse_non_negative)?;
        s.set(&mut self.pose.stale_after, "stale_pose_ms", parse_millis)?;
        Ok(())
    }

    fn read_poi(&mut self, s: &Section<'_>) -> Result<(), ConfigError> {
        let p = &mut self.poi;
        s.set(&mut p.ttl, "ttl_secs", parse_secs)?;
        s.set(&mut p.max_entries, "max_entries", |x| x.parse().ok().filter(|n| *n > 0))?;
        s.set(&mut p.fetch_radius_meters, "radius_m", parse_non_negative)?;
        s.set(&mut p.categories, "categories", parse_categories)?;
        s.set(&mut p.fetch_timeout, "fetch_timeout_secs", parse_secs)?;
        Ok(())
    }

    fn read_overlay(&mut self, s: &Section<'_>) -> Result<(), ConfigError> {
        let o = &mut self.overlay;
        s.set(&mut o.performance_mode, "performance_mode", PerformanceMode::parse)?;
        s.set(&mut o.fps_floor, "fps_floor", parse_non_negative)?;
        s.set(&mut o.enter_duration, "enter_ms", parse_millis)?;
        s.set(&mut o.exit_duration, "exit_ms", parse_millis)?;
        s.set(&mut o.position_smoothing, "smoothing_ms", parse_millis)?;
        Ok(())
    }

    fn read_session(&mut self, s: &Section<'_>) -> Result<(), ConfigError> {
        let c = &mut self.controller;
        s.set(&mut c.defaults.quality, "quality", Quality::parse)?;
        s.set(&mut c.defaults.target_fps, "target_fps", |x| {
            x.parse::<u32>().ok().and_then(|n| TargetFps::try_from(n).ok())
        })?;
        s.set(&mut c.defaults.battery_mode, "battery_mode", BatteryMode::parse)?;
        s.set(&mut c.defaults.enable_landmark_detection, "landmark_detection", parse_bool)?;
        s.set(&mut c.defaults.enable_photo_capture, "photo_capture", parse_bool)?;
        s.set(&mut c.battery_threshold_percent, "battery_threshold_percent", |x| {
            parse_in_range(x, 0.0, 100.0)
        })?;
        s.set(&mut c.frame_skip.processing_budget, "processing_budget_ms", parse_millis)?;
        s.set(&mut c.frame_skip.min_frame_interval, "min_frame_interval_ms", parse_millis)?;
        s.set(&mut c.metrics_interval, "metrics_interval_secs", parse_secs)?;
        s.set(&mut c.detection_queue, "detection_queue", parse_positive_usize)?;
        if let Some(dir) = s.get("data_dir") {
            self.data_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    fn read_thermal(&mut self, s: &Section<'_>) -> Result<(), ConfigError> {
        s.set(
            &mut self.controller.thermal.throttle_celsius,
            "throttle_celsius",
            parse_f64,
        )
    }

    fn read_logging(&mut self, s: &Section<'_>) -> Result<(), ConfigError> {
        let l = &mut self.logging;
        if let Some(filter) = s.get("filter") {
            l.filter = filter.to_string();
        }
        s.set(&mut l.console, "console", parse_bool)?;
        if let Some(dir) = s.get("directory") {
            l.directory = Some(PathBuf::from(dir));
        }
        if let Some(prefix) = s.get("file_prefix") {
            l.file_prefix = prefix.to_string();
        }
        Ok(())
    }
}

/// One INI section; absent sections behave as empty.
struct Section<'a> {
    name: &'static str,
    properties: Option<&'a Properties>,
}

impl<'a> Section<'a> {
    fn new(ini: &'a Ini, name: &'static str) -> Self {
        Self {
            name,
            properties: ini.section(Some(name)),
        }
    }

    /// Trimmed non-empty value of a key.
    fn get(&self, key: &str) -> Option<&'a str> {
        self.properties
            .and_then(|p| p.get(key))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Overwrite `target` if the key is present.
    fn set<T>(
        &self,
        target: &mut T,
        key: &str,
        parse: impl FnOnce(&str) -> Option<T>,
    ) -> Result<(), ConfigError> {
        if let Some(raw) = self.get(key) {
            *target = parse(raw).ok_or_else(|| ConfigError::InvalidValue {
                section: self.name.to_string(),
                key: key.to_string(),
                value: raw.to_string(),
            })?;
        }
        Ok(())
    }
}

fn parse_f64(value: &str) -> Option<f64> {
    f64::from_str(value).ok().filter(|v| v.is_finite())
}

fn parse_non_negative(value: &str) -> Option<f64> {
    parse_f64(value).filter(|v| *v >= 0.0)
}

fn parse_in_range(value: &str, min: f64, max: f64) -> Option<f64> {
    parse_f64(value).filter(|v| (min..=max).contains(v))
}

fn parse_positive_usize(value: &str) -> Option<usize> {
    value.parse().ok().filter(|n| *n > 0)
}

fn parse_millis(value: &str) -> Option<Duration> {
    value.parse().ok().map(Duration::from_millis)
}

fn parse_secs(value: &str) -> Option<Duration> {
    value.parse().ok().map(Duration::from_secs)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn parse_categories(value: &str) -> Option<Vec<LandmarkCategory>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(LandmarkCategory::parse)
        .collect()
}
