//! Rolling session performance metrics.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::SessionConfig;

/// Weight of the previous average in the processing-time EMA.
pub const EMA_PREVIOUS_WEIGHT: f64 = 0.9;

/// Weight of the new sample in the processing-time EMA.
pub const EMA_SAMPLE_WEIGHT: f64 = 0.1;

/// Window over which processed-frame FPS is measured.
const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Live metrics, published on the metrics watch channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Processed frames per second over the last full window.
    pub fps: f64,
    /// Exponential moving average of detection time, in milliseconds.
    pub processing_time_ms: f64,
    /// Frames skipped or dropped since the session started.
    pub frame_drops: u64,
    /// Frames handed to processing since the session started.
    pub processed_frames: u64,
    /// Last reported device temperature, in °C.
    pub temperature: Option<f64>,
}

impl PerformanceMetrics {
    /// The processing-time average as a `Duration`.
    pub fn average_processing(&self) -> Duration {
        Duration::from_secs_f64((self.processing_time_ms / 1_000.0).max(0.0))
    }
}

/// Metrics persisted when a session stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub captured_at: DateTime<Utc>,
    pub session_duration_secs: f64,
    pub fps: f64,
    pub average_processing_ms: f64,
    pub frame_drops: u64,
    pub processed_frames: u64,
    pub temperature: Option<f64>,
    pub session: SessionConfig,
}

/// Accumulates metrics for one session.
#[derive(Debug, Clone)]
pub struct MetricsTracker {
    metrics: PerformanceMetrics,
    session_start: Option<Instant>,
    window_start: Option<Instant>,
    window_frames: u32,
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self {
            metrics: PerformanceMetrics::default(),
            session_start: None,
            window_start: None,
            window_frames: 0,
        }
    }

    /// Reset for a new session starting at `now`. Temperature is kept.
    pub fn start_session(&mut self, now: Instant) {
        let temperature = self.metrics.temperature;
        *self = Self::new();
        self.metrics.temperature = temperature;
        self.session_start = Some(now);
    }

    /// Feed a measured processing time into the moving average.
    pub fn record_processing_time(&mut self, elapsed: Duration) {
        let sample_ms = elapsed.as_secs_f64() * 1_000.0;
        self.metrics.processing_time_ms =
            EMA_PREVIOUS_WEIGHT * self.metrics.processing_time_ms + EMA_SAMPLE_WEIGHT * sample_ms;
    }

    /// Count a frame handed to processing and update FPS.
    pub fn record_processed(&mut self, now: Instant) {
        self.metrics.processed_frames += 1;

        let start = *self.window_start.get_or_insert(now);
        self.window_frames += 1;
        let elapsed = now.saturating_duration_since(start);
        if elapsed >= FPS_WINDOW {
            self.metrics.fps = self.window_frames as f64 / elapsed.as_secs_f64();
            self.window_frames = 0;
            self.window_start = Some(now);
        }
    }

    /// Count a skipped or dropped frame.
    pub fn record_drop(&mut self) {
        self.metrics.frame_drops += 1;
    }

    pub fn set_temperature(&mut self, celsius: f64) {
        self.metrics.temperature = Some(celsius);
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        self.metrics
    }

    /// Snapshot for persistence.
    pub fn snapshot(&self, now: Instant, session: SessionConfig) -> MetricsSnapshot {
        let duration = self
            .session_start
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default();

        MetricsSnapshot {
            captured_at: Utc::now(),
            session_duration_secs: duration.as_secs_f64(),
            fps: self.metrics.fps,
            average_processing_ms: self.metrics.processing_time_ms,
            frame_drops: self.metrics.frame_drops,
            processed_frames: self.metrics.processed_frames,
            temperature: self.metrics.temperature,
            session,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_weights() {
        let mut tracker = MetricsTracker::new();
        tracker.record_processing_time(Duration::from_millis(100));
        assert!((tracker.metrics().processing_time_ms - 10.0).abs() < 1e-9);

        tracker.record_processing_time(Duration::from_millis(100));
        assert!((tracker.metrics().processing_time_ms - 19.0).abs() < 1e-9);
    }

    #[test]
    fn test_ema_converges_to_steady_input() {
        let mut tracker = MetricsTracker::new();
        for _ in 0..200 {
            tracker.record_processing_time(Duration::from_millis(40));
        }
        let avg = tracker.metrics().average_processing();
        assert!((avg.as_secs_f64() - 0.040).abs() < 1e-4);
    }

    #[test]
    fn test_fps_and_counts() {
        let mut tracker = MetricsTracker::new();
        let t0 = Instant::now();
        tracker.start_session(t0);

        for i in 0..=30u64 {
            tracker.record_processed(t0 + Duration::from_micros(i * 33_334));
        }
        tracker.record_drop();

        let metrics = tracker.metrics();
        assert!((metrics.fps - 31.0).abs() < 0.1, "fps = {}", metrics.fps);
        assert_eq!(metrics.processed_frames, 31);
        assert_eq!(metrics.frame_drops, 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut tracker = MetricsTracker::new();
        let t0 = Instant::now();
        tracker.start_session(t0);
        tracker.set_temperature(38.5);

        let snapshot = tracker.snapshot(t0 + Duration::from_secs(90), SessionConfig::default());
        assert_eq!(snapshot.session_duration_secs, 90.0);

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: MetricsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_new_session_keeps_temperature() {
        let mut tracker = MetricsTracker::new();
        tracker.set_temperature(41.0);
        tracker.record_drop();
        tracker.start_session(Instant::now());

        assert_eq!(tracker.metrics().temperature, Some(41.0));
        assert_eq!(tracker.metrics().frame_drops, 0);
    }
}
