//! Session configuration and controller thresholds.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::skip::FrameSkipConfig;

/// Default battery level (percent) below which sessions start in saving mode.
pub const DEFAULT_BATTERY_THRESHOLD_PERCENT: f64 = 20.0;

/// Default device temperature (°C) above which the session is throttled.
pub const DEFAULT_THERMAL_THRESHOLD_CELSIUS: f64 = 45.0;

/// Default interval between performance metric emissions.
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(5);

/// Default capacity of the frame queue feeding the detection worker.
pub const DEFAULT_DETECTION_QUEUE: usize = 2;

/// Minimum OS major version with AR support.
pub const DEFAULT_MIN_OS_MAJOR_VERSION: u32 = 11;

/// Rendering quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    High,
}

impl Quality {
    /// One step lower, saturating at `Low`.
    pub fn lower(&self) -> Self {
        match self {
            Quality::High => Quality::Medium,
            Quality::Medium | Quality::Low => Quality::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Quality::Low),
            "medium" => Some(Quality::Medium),
            "high" => Some(Quality::High),
            _ => None,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target camera frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum TargetFps {
    Fps30,
    Fps60,
}

impl TargetFps {
    pub fn as_u32(&self) -> u32 {
        match self {
            TargetFps::Fps30 => 30,
            TargetFps::Fps60 => 60,
        }
    }

    /// Frame period, truncated to whole milliseconds (16 ms / 33 ms).
    pub fn frame_period(&self) -> Duration {
        Duration::from_millis(1_000 / self.as_u32() as u64)
    }
}

impl TryFrom<u32> for TargetFps {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            30 => Ok(TargetFps::Fps30),
            60 => Ok(TargetFps::Fps60),
            other => Err(format!("unsupported target fps {}", other)),
        }
    }
}

impl From<TargetFps> for u32 {
    fn from(value: TargetFps) -> Self {
        value.as_u32()
    }
}

impl fmt::Display for TargetFps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

/// Battery mode of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatteryMode {
    Normal,
    Saving,
}

impl BatteryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatteryMode::Normal => "normal",
            BatteryMode::Saving => "saving",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "normal" => Some(BatteryMode::Normal),
            "saving" => Some(BatteryMode::Saving),
            _ => None,
        }
    }
}

impl fmt::Display for BatteryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effective configuration of a camera session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub quality: Quality,
    pub target_fps: TargetFps,
    pub battery_mode: BatteryMode,
    pub enable_landmark_detection: bool,
    pub enable_photo_capture: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            quality: Quality::High,
            target_fps: TargetFps::Fps60,
            battery_mode: BatteryMode::Normal,
            enable_landmark_detection: true,
            enable_photo_capture: true,
        }
    }
}

impl SessionConfig {
    /// Battery saving: one quality step down and 30 FPS.
    pub fn with_battery_saving(self) -> Self {
        Self {
            quality: self.quality.lower(),
            target_fps: TargetFps::Fps30,
            battery_mode: BatteryMode::Saving,
            ..self
        }
    }

    /// Thermal throttle: low quality and 30 FPS, battery mode untouched.
    pub fn with_thermal_throttle(self) -> Self {
        Self {
            quality: Quality::Low,
            target_fps: TargetFps::Fps30,
            ..self
        }
    }
}

/// Partial session configuration; unset fields keep the base value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfigPatch {
    pub quality: Option<Quality>,
    pub target_fps: Option<TargetFps>,
    pub battery_mode: Option<BatteryMode>,
    pub enable_landmark_detection: Option<bool>,
    pub enable_photo_capture: Option<bool>,
}

impl SessionConfigPatch {
    /// Apply this patch over `base`.
    pub fn apply(&self, base: SessionConfig) -> SessionConfig {
        SessionConfig {
            quality: self.quality.unwrap_or(base.quality),
            target_fps: self.target_fps.unwrap_or(base.target_fps),
            battery_mode: self.battery_mode.unwrap_or(base.battery_mode),
            enable_landmark_detection: self
                .enable_landmark_detection
                .unwrap_or(base.enable_landmark_detection),
            enable_photo_capture: self.enable_photo_capture.unwrap_or(base.enable_photo_capture),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<SessionConfig> for SessionConfigPatch {
    fn from(config: SessionConfig) -> Self {
        Self {
            quality: Some(config.quality),
            target_fps: Some(config.target_fps),
            battery_mode: Some(config.battery_mode),
            enable_landmark_detection: Some(config.enable_landmark_detection),
            enable_photo_capture: Some(config.enable_photo_capture),
        }
    }
}

/// Thermal throttling settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalConfig {
    /// Temperature (°C) above which quality and FPS are forced down.
    pub throttle_celsius: f64,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            throttle_celsius: DEFAULT_THERMAL_THRESHOLD_CELSIUS,
        }
    }
}

/// Configuration for the camera session controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Session defaults before preferences and start-time overrides.
    pub defaults: SessionConfig,
    /// Battery percentage below which sessions start in saving mode.
    pub battery_threshold_percent: f64,
    pub thermal: ThermalConfig,
    pub frame_skip: FrameSkipConfig,
    /// Interval of the periodic metrics emission.
    pub metrics_interval: Duration,
    /// Frames buffered for the detection worker before new ones are dropped.
    pub detection_queue: usize,
    /// Minimum OS major version accepted as AR capable.
    pub min_os_major_version: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            defaults: SessionConfig::default(),
            battery_threshold_percent: DEFAULT_BATTERY_THRESHOLD_PERCENT,
            thermal: ThermalConfig::default(),
            frame_skip: FrameSkipConfig::default(),
            metrics_interval: DEFAULT_METRICS_INTERVAL,
            detection_queue: DEFAULT_DETECTION_QUEUE,
            min_os_major_version: DEFAULT_MIN_OS_MAJOR_VERSION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_applies_only_set_fields() {
        let patch = SessionConfigPatch {
            quality: Some(Quality::Medium),
            enable_photo_capture: Some(false),
            ..Default::default()
        };
        let merged = patch.apply(SessionConfig::default());

        assert_eq!(merged.quality, Quality::Medium);
        assert_eq!(merged.target_fps, TargetFps::Fps60);
        assert!(merged.enable_landmark_detection);
        assert!(!merged.enable_photo_capture);
        assert!(SessionConfigPatch::default().is_empty());
    }

    #[test]
    fn test_battery_saving_and_thermal() {
        let saving = SessionConfig::default().with_battery_saving();
        assert_eq!(saving.quality, Quality::Medium);
        assert_eq!(saving.target_fps, TargetFps::Fps30);
        assert_eq!(saving.battery_mode, BatteryMode::Saving);

        let hot = SessionConfig::default().with_thermal_throttle();
        assert_eq!(hot.quality, Quality::Low);
        assert_eq!(hot.target_fps, TargetFps::Fps30);
        assert_eq!(hot.battery_mode, BatteryMode::Normal);
    }

    #[test]
    fn test_frame_periods() {
        assert_eq!(TargetFps::Fps60.frame_period(), Duration::from_millis(16));
        assert_eq!(TargetFps::Fps30.frame_period(), Duration::from_millis(33));
    }

    #[test]
    fn test_patch_json_shape() {
        let patch: SessionConfigPatch =
            serde_json::from_str(r#"{"quality":"low","target_fps":30}"#).unwrap();
        assert_eq!(patch.quality, Some(Quality::Low));
        assert_eq!(patch.target_fps, Some(TargetFps::Fps30));
        assert_eq!(patch.battery_mode, None);

        assert!(serde_json::from_str::<SessionConfigPatch>(r#"{"target_fps":24}"#).is_err());
    }
}
