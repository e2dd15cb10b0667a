//! Explicit animation values advanced by a per-frame tick.
//!
//! An [`AnimatedValue`] interpolates from the value it had when
//! [`AnimatedValue::animate_to`] was called towards a target over a fixed
//! duration, shaped by an [`Easing`] curve. The overlay model ticks every
//! value once per rendered frame.

use std::f64::consts::PI;
use std::time::Duration;

/// Interpolation curve mapping normalized time `t` to progress.
///
/// Every curve satisfies `f(0) = 0` and `f(1) = 1`. `Spring` overshoots
/// slightly before settling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Easing {
    Linear,
    #[default]
    EaseOutCubic,
    EaseInCubic,
    Spring,
}

impl Easing {
    /// Evaluate the curve at `t` (clamped to `[0, 1]`).
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseOutCubic => 1.0 - (1.0 - t).powi(3),
            Easing::EaseInCubic => t * t * t,
            Easing::Spring => {
                if t >= 1.0 {
                    1.0
                } else {
                    // Under-damped response, decays to ~0.25% by t = 1
                    1.0 - (-6.0 * t).exp() * (2.5 * PI * t).cos()
                }
            }
        }
    }
}

/// A scalar that animates towards a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimatedValue {
    current: f64,
    start: f64,
    target: f64,
    /// Units per second, measured over the last tick.
    velocity: f64,
    duration: Duration,
    elapsed: Duration,
    easing: Easing,
}

impl AnimatedValue {
    /// A value at rest.
    pub fn fixed(value: f64) -> Self {
        Self {
            current: value,
            start: value,
            target: value,
            velocity: 0.0,
            duration: Duration::ZERO,
            elapsed: Duration::ZERO,
            easing: Easing::Linear,
        }
    }

    /// Start animating from the current value to `target`.
    ///
    /// A zero duration snaps immediately. Retargeting mid-flight restarts
    /// the curve from wherever the value currently is.
    pub fn animate_to(&mut self, target: f64, duration: Duration, easing: Easing) {
        if duration.is_zero() {
            self.snap_to(target);
            return;
        }
        self.start = self.current;
        self.target = target;
        self.duration = duration;
        self.elapsed = Duration::ZERO;
        self.easing = easing;
    }

    /// Jump to `value` and stop animating.
    pub fn snap_to(&mut self, value: f64) {
        *self = Self::fixed(value);
    }

    /// Jump to the current target.
    pub fn finish(&mut self) {
        self.snap_to(self.target);
    }

    /// Advance the animation by `dt`.
    pub fn tick(&mut self, dt: Duration) {
        if !self.is_animating() {
            self.velocity = 0.0;
            return;
        }

        self.elapsed = (self.elapsed + dt).min(self.duration);
        let previous = self.current;

        if self.elapsed >= self.duration {
            self.current = self.target;
        } else {
            let t = self.elapsed.as_secs_f64() / self.duration.as_secs_f64();
            self.current = self.start + (self.target - self.start) * self.easing.apply(t);
        }

        let secs = dt.as_secs_f64();
        self.velocity = if secs > 0.0 {
            (self.current - previous) / secs
        } else {
            0.0
        };

        if self.elapsed >= self.duration {
            self.start = self.target;
            self.duration = Duration::ZERO;
            self.elapsed = Duration::ZERO;
        }
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn easing(&self) -> Easing {
        self.easing
    }

    /// Whether the value is still moving towards its target.
    pub fn is_animating(&self) -> bool {
        !self.duration.is_zero() && self.elapsed < self.duration
    }
}
