//! Performance modes and the FPS monitor that downgrades them.
//!
//! ```text
//! High ──(fps < floor)──► Balanced ──(fps < floor)──► Battery
//!   ▲                                                   │
//!   └──────────── explicit set_performance_mode ────────┘
//! ```
//!
//! Modes only ever step down automatically. Raising the mode again is a
//! host decision.

use std::fmt;
use std::time::{Duration, Instant};

/// Default frame-rate floor below which the mode is downgraded.
pub const DEFAULT_FPS_FLOOR: f64 = 30.0;

/// Default FPS measurement window.
pub const DEFAULT_FPS_WINDOW: Duration = Duration::from_secs(1);

/// Named bundle of overlay quality settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PerformanceMode {
    #[default]
    High,
    Balanced,
    Battery,
}

impl PerformanceMode {
    /// Maximum number of overlays kept in the pool.
    pub fn max_overlays(&self) -> usize {
        match self {
            PerformanceMode::High => 10,
            PerformanceMode::Balanced => 8,
            PerformanceMode::Battery => 5,
        }
    }

    /// Background blur behind overlay cards (most expensive effect).
    pub fn blur_enabled(&self) -> bool {
        matches!(self, PerformanceMode::High)
    }

    /// Enter/exit/position animations. Without them values snap.
    pub fn animations_enabled(&self) -> bool {
        !matches!(self, PerformanceMode::Battery)
    }

    /// Drop shadows under overlay cards.
    pub fn shadows_enabled(&self) -> bool {
        !matches!(self, PerformanceMode::Battery)
    }

    /// The next cheaper mode, or `None` at the bottom.
    pub fn downgrade(&self) -> Option<Self> {
        match self {
            PerformanceMode::High => Some(PerformanceMode::Balanced),
            PerformanceMode::Balanced => Some(PerformanceMode::Battery),
            PerformanceMode::Battery => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceMode::High => "high",
            PerformanceMode::Balanced => "balanced",
            PerformanceMode::Battery => "battery",
        }
    }

    /// Parse a mode name (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Some(PerformanceMode::High),
            "balanced" => Some(PerformanceMode::Balanced),
            "battery" => Some(PerformanceMode::Battery),
            _ => None,
        }
    }
}

impl fmt::Display for PerformanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts rendered frames and reports FPS once per window.
#[derive(Debug, Clone)]
pub struct FpsMonitor {
    window: Duration,
    floor: f64,
    frames: u32,
    window_start: Option<Instant>,
    last_fps: Option<f64>,
}

impl FpsMonitor {
    pub fn new(window: Duration, floor: f64) -> Self {
        Self {
            window,
            floor,
            frames: 0,
            window_start: None,
            last_fps: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_FPS_WINDOW, DEFAULT_FPS_FLOOR)
    }

    /// Record a rendered frame.
    ///
    /// Returns the measured FPS when a window closes, `None` otherwise.
    pub fn record_frame(&mut self, now: Instant) -> Option<f64> {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;

        let elapsed = now.saturating_duration_since(start);
        if elapsed < self.window {
            return None;
        }

        let fps = self.frames as f64 / elapsed.as_secs_f64();
        self.frames = 0;
        self.window_start = Some(now);
        self.last_fps = Some(fps);
        Some(fps)
    }

    /// Whether a measured FPS is below the floor.
    pub fn is_below_floor(&self, fps: f64) -> bool {
        fps < self.floor
    }

    /// FPS of the last completed window.
    pub fn last_fps(&self) -> Option<f64> {
        self.last_fps
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    /// Restart measurement from scratch.
    pub fn reset(&mut self) {
        self.frames = 0;
        self.window_start = None;
    }
}
