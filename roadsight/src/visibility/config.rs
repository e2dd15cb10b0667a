//! Configuration for the landmark visibility engine.

use std::time::Duration;

/// Default horizontal camera field of view in degrees.
pub const DEFAULT_HORIZONTAL_FOV: f64 = 60.0;

/// Default vertical camera field of view in degrees.
pub const DEFAULT_VERTICAL_FOV: f64 = 45.0;

/// Default radius within which landmarks merge into one cluster.
pub const DEFAULT_CLUSTER_RADIUS_METERS: f64 = 50.0;

/// Default cap on entries returned per update.
pub const DEFAULT_MAX_LANDMARKS_VISIBLE: usize = 10;

/// Default minimum time between two visibility computations.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(1000);

/// Rating difference at or below which two landmarks rank as equal.
pub const DEFAULT_RATING_TOLERANCE: f64 = 0.5;

/// Landmarks beyond this range are not projected.
pub const DEFAULT_MAX_DISTANCE_METERS: f64 = 5_000.0;

/// Screen size the projection maps into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl Viewport {
    /// Create a viewport.
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Center point `(x, y)`.
    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(390.0, 844.0)
    }
}

/// Tuning parameters for visibility computation.
#[derive(Debug, Clone)]
pub struct VisibilityConfig {
    /// Horizontal field of view (degrees).
    pub horizontal_fov: f64,

    /// Vertical field of view (degrees).
    pub vertical_fov: f64,

    /// Cluster radius (meters, geodesic).
    pub cluster_radius_meters: f64,

    /// Maximum entries (singles + clusters) returned per update.
    pub max_landmarks_visible: usize,

    /// Minimum interval between computations; calls inside it return
    /// the previous result.
    pub update_interval: Duration,

    /// Rank historical landmarks ahead of everything else.
    pub historical_mode: bool,

    /// Ratings within this band are treated as equal before falling
    /// through to distance.
    pub rating_tolerance: f64,

    /// Landmarks below this confidence are dropped (0 disables the filter).
    pub min_confidence: f64,

    /// Landmarks further than this are dropped.
    pub max_distance_meters: f64,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            horizontal_fov: DEFAULT_HORIZONTAL_FOV,
            vertical_fov: DEFAULT_VERTICAL_FOV,
            cluster_radius_meters: DEFAULT_CLUSTER_RADIUS_METERS,
            max_landmarks_visible: DEFAULT_MAX_LANDMARKS_VISIBLE,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            historical_mode: false,
            rating_tolerance: DEFAULT_RATING_TOLERANCE,
            min_confidence: 0.0,
            max_distance_meters: DEFAULT_MAX_DISTANCE_METERS,
        }
    }
}

impl VisibilityConfig {
    /// Half of the horizontal field of view.
    pub fn half_horizontal_fov(&self) -> f64 {
        self.horizontal_fov / 2.0
    }

    /// Half of the vertical field of view.
    pub fn half_vertical_fov(&self) -> f64 {
        self.vertical_fov / 2.0
    }
}
