//! Device pose tracking.
//!
//! Keeps the last known good pose from the pose provider so the overlay
//! pipeline can keep working across gaps in the stream.
//!
//! # Design
//!
//! - A missing or stale pose never resets state; the last sample is reused
//! - Samples with non-finite values are rejected and counted
//! - Staleness is reported so the pipeline can log it at low severity

use std::time::{Duration, Instant};

use crate::geo::GeoPoint;

/// Default age after which a pose is reported as stale.
const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(5);

/// Camera orientation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraOrientation {
    /// Compass heading, 0 = North.
    pub heading: f64,
    /// Pitch above the horizon (positive = looking up).
    pub pitch: f64,
    /// Roll around the view axis.
    pub roll: f64,
}

/// A single sample from the pose provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DevicePose {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude in meters, when the provider reports one.
    pub altitude: Option<f64>,
    /// Compass heading in degrees.
    pub heading_degrees: f64,
    /// Pitch in degrees.
    pub pitch_degrees: f64,
    /// Roll in degrees.
    pub roll_degrees: f64,
    /// When this sample was taken.
    pub timestamp: Instant,
}

impl DevicePose {
    /// Create a pose sample stamped now.
    pub fn new(latitude: f64, longitude: f64, heading_degrees: f64, pitch_degrees: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            heading_degrees,
            pitch_degrees,
            roll_degrees: 0.0,
            timestamp: Instant::now(),
        }
    }

    /// Set the altitude.
    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    /// Set the roll.
    pub fn with_roll(mut self, roll: f64) -> Self {
        self.roll_degrees = roll;
        self
    }

    /// Override the timestamp.
    pub fn with_timestamp(mut self, timestamp: Instant) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// User position as a geographic point.
    pub fn location(&self) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: self.altitude,
        }
    }

    /// Camera orientation part of the pose.
    pub fn orientation(&self) -> CameraOrientation {
        CameraOrientation {
            heading: self.heading_degrees,
            pitch: self.pitch_degrees,
            roll: self.roll_degrees,
        }
    }

    /// Whether every field is usable.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && self.heading_degrees.is_finite()
            && self.pitch_degrees.is_finite()
            && self.roll_degrees.is_finite()
            && self.altitude.map_or(true, f64::is_finite)
    }
}

/// Configuration for pose tracking.
#[derive(Debug, Clone)]
pub struct PoseTrackerConfig {
    /// Age after which the last pose counts as stale.
    pub stale_after: Duration,
}

impl Default for PoseTrackerConfig {
    fn default() -> Self {
        Self {
            stale_after: DEFAULT_STALE_AFTER,
        }
    }
}

/// Last-known-good pose store.
#[derive(Debug, Default)]
pub struct PoseTracker {
    latest: Option<DevicePose>,
    config: PoseTrackerConfig,
    accepted: u64,
    rejected: u64,
}

impl PoseTracker {
    /// Create a tracker with default configuration.
    pub fn new() -> Self {
        Self::with_config(PoseTrackerConfig::default())
    }

    /// Create with custom configuration.
    pub fn with_config(config: PoseTrackerConfig) -> Self {
        Self {
            latest: None,
            config,
            accepted: 0,
            rejected: 0,
        }
    }

    /// Record a new pose sample.
    ///
    /// Returns false if the sample was rejected; the previous pose stays current.
    pub fn update(&mut self, pose: DevicePose) -> bool {
        if !pose.is_valid() {
            self.rejected += 1;
            tracing::debug!(
                latitude = pose.latitude,
                longitude = pose.longitude,
                "Rejected invalid pose sample, keeping last known pose"
            );
            return false;
        }

        self.latest = Some(pose);
        self.accepted += 1;
        true
    }

    /// The last accepted pose, however old.
    pub fn latest(&self) -> Option<&DevicePose> {
        self.latest.as_ref()
    }

    /// Age of the last accepted pose.
    pub fn age(&self, now: Instant) -> Option<Duration> {
        self.latest
            .map(|p| now.saturating_duration_since(p.timestamp))
    }

    /// Whether the last pose is older than the staleness threshold.
    ///
    /// With no pose at all this reports stale.
    pub fn is_stale(&self, now: Instant) -> bool {
        self.age(now)
            .map_or(true, |age| age > self.config.stale_after)
    }

    /// Number of accepted samples.
    pub fn accepted_count(&self) -> u64 {
        self.accepted
    }

    /// Number of rejected samples.
    pub fn rejected_count(&self) -> u64 {
        self.rejected
    }
}
