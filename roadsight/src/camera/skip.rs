//! Adaptive frame-skip policy.
//!
//! Runs on the camera callback thread, so it only compares timestamps and
//! counters. Checks, in order:
//!
//! 1. Frames closer than the 60 FPS period (16 ms) to the last processed
//!    frame are dropped, whatever the session's target frame rate.
//! 2. Every remaining frame bumps the skip counter.
//! 3. While the processing-time average is over budget, only every third
//!    frame is processed (`counter % 3 == 0`).
//! 4. Otherwise, in battery-saving mode only every other frame is processed
//!    (`counter % 2 == 0`).

use std::time::{Duration, Instant};

use tracing::info;

use super::config::{BatteryMode, SessionConfig};

/// Default processing budget (30 FPS frame time).
pub const DEFAULT_PROCESSING_BUDGET: Duration = Duration::from_millis(33);

/// Default minimum spacing between processed frames (60 FPS).
pub const DEFAULT_MIN_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Frame-skip settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSkipConfig {
    /// Average processing time above which 2 of 3 frames are skipped.
    pub processing_budget: Duration,
    /// Frames arriving sooner than this after the last processed frame are
    /// dropped.
    pub min_frame_interval: Duration,
}

impl Default for FrameSkipConfig {
    fn default() -> Self {
        Self {
            processing_budget: DEFAULT_PROCESSING_BUDGET,
            min_frame_interval: DEFAULT_MIN_FRAME_INTERVAL,
        }
    }
}

/// Outcome of the skip policy for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDecision {
    /// Hand the frame to detection.
    Process,
    /// Arrived sooner than the minimum frame interval.
    TooSoon,
    /// Dropped by the battery-saving cadence.
    BatterySkip,
    /// Dropped by the over-budget cadence.
    OverBudgetSkip,
    /// No session is running.
    Inactive,
}

impl FrameDecision {
    pub fn is_process(&self) -> bool {
        matches!(self, FrameDecision::Process)
    }
}

/// Stateful skip decision maker.
#[derive(Debug, Clone)]
pub struct FrameSkipPolicy {
    config: FrameSkipConfig,
    counter: u64,
    last_processed: Option<Instant>,
    over_budget: bool,
}

impl FrameSkipPolicy {
    pub fn new(config: FrameSkipConfig) -> Self {
        Self {
            config,
            counter: 0,
            last_processed: None,
            over_budget: false,
        }
    }

    /// Decide whether the frame at `now` is processed.
    pub fn decide(&mut self, now: Instant, session: &SessionConfig, average_processing: Duration) -> FrameDecision {
        if let Some(last) = self.last_processed {
            if now.saturating_duration_since(last) < self.config.min_frame_interval {
                return FrameDecision::TooSoon;
            }
        }

        self.counter = self.counter.wrapping_add(1);

        let over_budget = average_processing > self.config.processing_budget;
        if over_budget != self.over_budget {
            self.over_budget = over_budget;
            info!(
                average_ms = average_processing.as_secs_f64() * 1_000.0,
                budget_ms = self.config.processing_budget.as_millis() as u64,
                skipping = over_budget,
                "Frame processing budget {}",
                if over_budget { "exceeded, skipping 2 of 3 frames" } else { "recovered" }
            );
        }

        let decision = if over_budget {
            if self.counter % 3 == 0 {
                FrameDecision::Process
            } else {
                FrameDecision::OverBudgetSkip
            }
        } else if session.battery_mode == BatteryMode::Saving && self.counter % 2 != 0 {
            FrameDecision::BatterySkip
        } else {
            FrameDecision::Process
        };

        if decision.is_process() {
            self.last_processed = Some(now);
        }
        decision
    }

    /// Frames that passed the interval check so far.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn is_over_budget(&self) -> bool {
        self.over_budget
    }

    /// Forget all history (new session).
    pub fn reset(&mut self) {
        self.counter = 0;
        self.last_processed = None;
        self.over_budget = false;
    }
}
