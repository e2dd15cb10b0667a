//! The live overlay pool.
//!
//! # Design
//!
//! The pool is a plain `Vec<Overlay>` capped at the current performance
//! mode's `max_overlays`. Exiting overlays still count against the cap
//! until they are gone, so the pool never grows past the budget while
//! fade-outs run.
//!
//! When a new overlay needs a slot in a full pool:
//!
//! 1. An exiting overlay (lowest priority first) is dropped immediately.
//! 2. Otherwise the lowest-priority overlay is evicted immediately, but
//!    only if it ranks below the newcomer.
//! 3. Otherwise the newcomer is not created.
//!
//! # Thread Safety
//!
//! `OverlayModel` is not internally synchronized. Share it as
//! [`SharedOverlayModel`]; visibility sync, ticking and rendering each take
//! the lock for their whole pass so they never mutate the pool
//! concurrently.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::landmark::VisibleItem;

use super::model::{landmark_priority, Overlay, OverlayContent, OverlayKind, OverlaySize};
use super::performance::{FpsMonitor, PerformanceMode, DEFAULT_FPS_FLOOR, DEFAULT_FPS_WINDOW};

/// Default enter animation duration.
pub const DEFAULT_ENTER_DURATION: Duration = Duration::from_millis(300);

/// Default exit animation duration.
pub const DEFAULT_EXIT_DURATION: Duration = Duration::from_millis(200);

/// Default smoothing duration for position updates.
pub const DEFAULT_POSITION_SMOOTHING: Duration = Duration::from_millis(150);

/// Overlay pool shared between the visibility path and the render path.
pub type SharedOverlayModel = Arc<Mutex<OverlayModel>>;

/// Configuration for the overlay model.
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Mode the model starts in.
    pub performance_mode: PerformanceMode,
    pub enter_duration: Duration,
    pub exit_duration: Duration,
    pub position_smoothing: Duration,
    /// FPS below which the mode is downgraded.
    pub fps_floor: f64,
    /// FPS measurement window.
    pub fps_window: Duration,
    /// Size given to new landmark overlays.
    pub overlay_size: OverlaySize,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            performance_mode: PerformanceMode::High,
            enter_duration: DEFAULT_ENTER_DURATION,
            exit_duration: DEFAULT_EXIT_DURATION,
            position_smoothing: DEFAULT_POSITION_SMOOTHING,
            fps_floor: DEFAULT_FPS_FLOOR,
            fps_window: DEFAULT_FPS_WINDOW,
            overlay_size: OverlaySize::default(),
        }
    }
}

/// What a sync pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Overlays created this pass.
    pub created: Vec<String>,
    /// Overlays that started their exit animation.
    pub exiting: Vec<String>,
    /// Overlays removed immediately to make room.
    pub evicted: Vec<String>,
    /// Entries that did not get an overlay because the pool was full of
    /// higher-priority overlays.
    pub skipped: Vec<String>,
}

/// Owns the renderable overlays.
#[derive(Debug)]
pub struct OverlayModel {
    config: OverlayConfig,
    mode: PerformanceMode,
    overlays: Vec<Overlay>,
    fps: FpsMonitor,
    total_evictions: u64,
}

impl OverlayModel {
    pub fn new(config: OverlayConfig) -> Self {
        Self {
            mode: config.performance_mode,
            fps: FpsMonitor::new(config.fps_window, config.fps_floor),
            config,
            overlays: Vec::new(),
            total_evictions: 0,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(OverlayConfig::default())
    }

    /// Wrap into the shared handle used by the pipeline and renderer.
    pub fn into_shared(self) -> SharedOverlayModel {
        Arc::new(Mutex::new(self))
    }

    pub fn performance_mode(&self) -> PerformanceMode {
        self.mode
    }

    /// Cap for the current performance mode.
    pub fn max_overlays(&self) -> usize {
        self.mode.max_overlays()
    }

    /// Every overlay in the pool, exiting ones included.
    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn get(&self, id: &str) -> Option<&Overlay> {
        self.overlays.iter().find(|o| o.id == id)
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    pub fn total_evictions(&self) -> u64 {
        self.total_evictions
    }

    /// Reconcile landmark overlays with the latest visibility result.
    ///
    /// Entries are expected in rank order. Non-landmark overlays are left
    /// alone except when evicted for capacity.
    pub fn sync_with_visibility(&mut self, items: &[VisibleItem]) -> SyncReport {
        let mut report = SyncReport::default();
        report.evicted.extend(self.enforce_cap());

        let visible_ids: HashSet<&str> = items.iter().map(|i| i.id()).collect();
        let exit_duration = self.animation_duration(self.config.exit_duration);

        let mut finished = Vec::new();
        for overlay in &mut self.overlays {
            if overlay.kind() == OverlayKind::Landmark
                && !overlay.is_exiting()
                && !visible_ids.contains(overlay.id.as_str())
            {
                overlay.begin_exit(exit_duration);
                report.exiting.push(overlay.id.clone());
                if exit_duration.is_zero() {
                    finished.push(overlay.id.clone());
                }
            }
        }
        self.overlays.retain(|o| !finished.contains(&o.id));

        for item in items {
            let projection = item.projection();
            let position = (projection.x, projection.y);
            let priority = landmark_priority(item.representative());
            let content = OverlayContent::for_item(item);

            match self.place(item.id(), content, position, priority, &mut report.evicted) {
                Placement::Created => report.created.push(item.id().to_string()),
                Placement::Updated => {}
                Placement::Skipped => report.skipped.push(item.id().to_string()),
            }
        }

        if !report.evicted.is_empty() || !report.skipped.is_empty() {
            debug!(
                evicted = report.evicted.len(),
                skipped = report.skipped.len(),
                max = self.max_overlays(),
                "Overlay pool at capacity"
            );
        }

        report
    }

    /// Insert or update a host-managed overlay (navigation, game, photo).
    ///
    /// Returns `false` if the pool is full of higher-priority overlays.
    pub fn upsert_overlay(
        &mut self,
        id: &str,
        content: OverlayContent,
        position: (f64, f64),
        priority: i32,
    ) -> bool {
        let mut evicted = Vec::new();
        let placement = self.place(id, content, position, priority, &mut evicted);
        placement != Placement::Skipped
    }

    /// Start the exit animation of an overlay. Returns `false` if unknown.
    pub fn remove_overlay(&mut self, id: &str) -> bool {
        let duration = self.animation_duration(self.config.exit_duration);
        let Some(index) = self.overlays.iter().position(|o| o.id == id) else {
            return false;
        };
        if duration.is_zero() {
            self.overlays.remove(index);
        } else {
            self.overlays[index].begin_exit(duration);
        }
        true
    }

    /// Advance animations by `dt` and drop overlays whose exit finished.
    pub fn tick(&mut self, dt: Duration) {
        let mut done = Vec::new();
        for overlay in &mut self.overlays {
            if overlay.tick(dt) {
                done.push(overlay.id.clone());
            }
        }
        if !done.is_empty() {
            self.overlays.retain(|o| !done.contains(&o.id));
        }
    }

    /// Record a rendered frame; downgrades the mode when FPS falls below
    /// the floor. Returns the new mode on a downgrade.
    pub fn record_frame(&mut self, now: Instant) -> Option<PerformanceMode> {
        let fps = self.fps.record_frame(now)?;
        if !self.fps.is_below_floor(fps) {
            return None;
        }

        let next = self.mode.downgrade()?;
        info!(
            from = %self.mode,
            to = %next,
            fps = format!("{:.1}", fps),
            "Performance mode downgraded"
        );
        self.apply_mode(next);
        Some(next)
    }

    /// Explicitly set the performance mode (the only way to raise it).
    pub fn set_performance_mode(&mut self, mode: PerformanceMode) {
        if mode == self.mode {
            return;
        }
        info!(from = %self.mode, to = %mode, "Performance mode set");
        self.apply_mode(mode);
        self.fps.reset();
    }

    /// Highest-priority interactive overlay under a screen point.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<&Overlay> {
        self.overlays
            .iter()
            .filter(|o| o.interactive && o.is_visible() && !o.is_exiting())
            .filter(|o| o.contains(x, y))
            .max_by_key(|o| o.priority)
    }

    /// Overlays to draw this frame: visible, priority descending, capped.
    pub fn render_order(&self) -> Vec<&Overlay> {
        let mut visible: Vec<&Overlay> = self.overlays.iter().filter(|o| o.is_visible()).collect();
        visible.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        visible.truncate(self.max_overlays());
        visible
    }

    /// Drop every overlay.
    pub fn clear(&mut self) {
        self.overlays.clear();
    }

    fn apply_mode(&mut self, mode: PerformanceMode) {
        self.mode = mode;
        let evicted = self.enforce_cap();
        if !mode.animations_enabled() {
            self.overlays.retain(|o| !o.is_exiting());
            for overlay in &mut self.overlays {
                overlay.finish_animations();
            }
        }
        if !evicted.is_empty() {
            info!(count = evicted.len(), max = mode.max_overlays(), "Evicted overlays after mode change");
        }
    }

    fn animation_duration(&self, duration: Duration) -> Duration {
        if self.mode.animations_enabled() {
            duration
        } else {
            Duration::ZERO
        }
    }

    fn place(
        &mut self,
        id: &str,
        content: OverlayContent,
        position: (f64, f64),
        priority: i32,
        evicted: &mut Vec<String>,
    ) -> Placement {
        let enter = self.animation_duration(self.config.enter_duration);
        let smoothing = self.animation_duration(self.config.position_smoothing);

        if let Some(overlay) = self.overlays.iter_mut().find(|o| o.id == id) {
            overlay.content = content;
            overlay.priority = priority;
            overlay.move_to(position, smoothing);
            if overlay.is_exiting() {
                overlay.begin_enter(enter);
            }
            return Placement::Updated;
        }

        if !self.make_room(priority, evicted) {
            return Placement::Skipped;
        }

        let mut overlay = Overlay::new(id.to_string(), content, position, self.config.overlay_size, priority);
        overlay.begin_enter(enter);
        self.overlays.push(overlay);
        Placement::Created
    }

    fn make_room(&mut self, priority: i32, evicted: &mut Vec<String>) -> bool {
        while self.overlays.len() >= self.max_overlays() {
            let victim = lowest_priority(self.overlays.iter().enumerate().filter(|(_, o)| o.is_exiting()))
                .or_else(|| {
                    lowest_priority(self.overlays.iter().enumerate())
                        .filter(|&i| self.overlays[i].priority < priority)
                });

            match victim {
                Some(index) => {
                    let removed = self.overlays.remove(index);
                    if !removed.is_exiting() {
                        self.total_evictions += 1;
                        evicted.push(removed.id);
                    }
                }
                None => return false,
            }
        }
        true
    }

    fn enforce_cap(&mut self) -> Vec<String> {
        let mut evicted = Vec::new();
        while self.overlays.len() > self.max_overlays() {
            let index = lowest_priority(self.overlays.iter().enumerate().filter(|(_, o)| o.is_exiting()))
                .or_else(|| lowest_priority(self.overlays.iter().enumerate()));
            let Some(index) = index else { break };
            let removed = self.overlays.remove(index);
            if !removed.is_exiting() {
                self.total_evictions += 1;
                evicted.push(removed.id);
            }
        }
        evicted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Created,
    Updated,
    Skipped,
}

/// Index of the lowest-priority overlay; later entries lose ties.
fn lowest_priority<'a>(candidates: impl Iterator<Item = (usize, &'a Overlay)>) -> Option<usize> {
    let mut best: Option<(usize, i32)> = None;
    for (index, overlay) in candidates {
        match best {
            Some((_, p)) if overlay.priority > p => {}
            _ => best = Some((index, overlay.priority)),
        }
    }
    best.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::landmark::{Landmark, LandmarkCategory, ScreenProjection, VisibleLandmark};
    use crate::overlay::model::{NavigationContent, OverlayPhase};

    fn item(id: &str, category: LandmarkCategory, distance: f64, x: f64) -> VisibleItem {
        let mut landmark = Landmark::new(id, id, category, GeoPoint::new(0.0, 0.0));
        landmark.distance_meters = distance;
        VisibleItem::Single(VisibleLandmark {
            landmark,
            projection: ScreenProjection {
                x,
                y: 400.0,
                visible: true,
                elevation_angle: 0.0,
                relative_bearing: 0.0,
            },
        })
    }

    fn items(n: usize) -> Vec<VisibleItem> {
        (0..n)
            .map(|i| item(&format!("l{}", i), LandmarkCategory::Nature, 100.0 * i as f64, 10.0 * i as f64))
            .collect()
    }

    #[test]
    fn test_sync_creates_and_animates_in() {
        let mut model = OverlayModel::with_defaults();
        let report = model.sync_with_visibility(&items(2));

        assert_eq!(report.created, vec!["l0", "l1"]);
        let overlay = model.get("l0").unwrap();
        assert_eq!(overlay.phase(), OverlayPhase::Entering);
        assert_eq!(overlay.opacity(), 0.0);
        assert_eq!(overlay.scale(), 0.8);

        model.tick(Duration::from_millis(300));
        let overlay = model.get("l0").unwrap();
        assert_eq!(overlay.phase(), OverlayPhase::Visible);
        assert_eq!(overlay.opacity(), 1.0);
        assert_eq!(overlay.scale(), 1.0);
    }

    #[test]
    fn test_departed_landmarks_fade_out_then_vanish() {
        let mut model = OverlayModel::with_defaults();
        model.sync_with_visibility(&items(2));
        model.tick(Duration::from_millis(300));

        let report = model.sync_with_visibility(&items(1));
        assert_eq!(report.exiting, vec!["l1"]);
        assert!(model.get("l1").unwrap().is_exiting());

        model.tick(Duration::from_millis(100));
        assert!(model.get("l1").is_some());
        model.tick(Duration::from_millis(100));
        assert!(model.get("l1").is_none());
        assert_eq!(model.len(), 1);
    }

    #[test]
    fn test_returning_landmark_reenters() {
        let mut model = OverlayModel::with_defaults();
        model.sync_with_visibility(&items(2));
        model.tick(Duration::from_millis(300));
        model.sync_with_visibility(&items(1));
        model.tick(Duration::from_millis(50));

        let report = model.sync_with_visibility(&items(2));
        assert!(report.created.is_empty());
        assert_eq!(model.get("l1").unwrap().phase(), OverlayPhase::Entering);
    }

    #[test]
    fn test_position_updates_are_smoothed() {
        let mut model = OverlayModel::with_defaults();
        model.sync_with_visibility(&[item("a", LandmarkCategory::Nature, 100.0, 100.0)]);
        model.tick(Duration::from_millis(300));

        model.sync_with_visibility(&[item("a", LandmarkCategory::Nature, 100.0, 200.0)]);
        let overlay = model.get("a").unwrap();
        assert_eq!(overlay.position().0, 100.0);
        assert_eq!(overlay.target_position().0, 200.0);

        model.tick(Duration::from_millis(75));
        let x = model.get("a").unwrap().position().0;
        assert!(x > 100.0 && x < 200.0);

        model.tick(Duration::from_millis(75));
        assert_eq!(model.get("a").unwrap().position().0, 200.0);
    }

    #[test]
    fn test_count_never_exceeds_cap() {
        let mut model = OverlayModel::with_defaults();
        for round in 0..5 {
            let batch: Vec<VisibleItem> = (0..15)
                .map(|i| {
                    item(
                        &format!("r{}-{}", round, i),
                        LandmarkCategory::Landmark,
                        50.0 * i as f64,
                        0.0,
                    )
                })
                .collect();
            model.sync_with_visibility(&batch);
            assert!(model.len() <= model.max_overlays());
            model.tick(Duration::from_millis(50));
        }
    }

    #[test]
    fn test_full_pool_evicts_lower_priority_immediately() {
        let mut model = OverlayModel::new(OverlayConfig {
            performance_mode: PerformanceMode::Battery,
            ..Default::default()
        });
        // Five low-priority nature overlays far away
        let mut batch: Vec<VisibleItem> = (0..5)
            .map(|i| item(&format!("n{}", i), LandmarkCategory::Nature, 2_000.0 + i as f64, 0.0))
            .collect();
        model.sync_with_visibility(&batch);
        assert_eq!(model.len(), 5);

        // A close historical landmark outranks them all
        batch.insert(0, item("fort", LandmarkCategory::Historical, 10.0, 0.0));
        let report = model.sync_with_visibility(&batch);

        assert_eq!(report.created, vec!["fort"]);
        assert_eq!(report.evicted.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(model.len(), 5);
        assert!(model.get("fort").is_some());
        assert_eq!(model.total_evictions(), 1);
    }

    #[test]
    fn test_full_pool_skips_lower_priority_newcomer() {
        let mut model = OverlayModel::new(OverlayConfig {
            performance_mode: PerformanceMode::Battery,
            ..Default::default()
        });
        let strong: Vec<VisibleItem> = (0..5)
            .map(|i| item(&format!("h{}", i), LandmarkCategory::Historical, 10.0, 0.0))
            .collect();
        model.sync_with_visibility(&strong);

        assert!(!model.upsert_overlay(
            "nav",
            OverlayContent::Navigation(NavigationContent {
                direction_degrees: 0.0,
                distance_meters: 0.0,
                instruction: "Continue".into(),
            }),
            (0.0, 0.0),
            1,
        ));
        assert!(model.get("nav").is_none());
    }

    #[test]
    fn test_exiting_overlays_make_room_first() {
        let mut model = OverlayModel::new(OverlayConfig {
            performance_mode: PerformanceMode::Balanced,
            ..Default::default()
        });
        model.sync_with_visibility(&items(8));
        model.tick(Duration::from_millis(300));

        // l7 leaves, a newcomer takes its slot without evicting live overlays
        let mut next = items(7);
        next.push(item("new", LandmarkCategory::Nature, 5_000.0, 0.0));
        let report = model.sync_with_visibility(&next);

        assert_eq!(report.exiting, vec!["l7"]);
        assert!(report.evicted.is_empty());
        assert_eq!(report.created, vec!["new"]);
        assert!(model.get("l7").is_none());
        assert_eq!(model.len(), 8);
    }

    #[test]
    fn test_low_fps_downgrades_once_per_window_and_never_upgrades() {
        let mut model = OverlayModel::with_defaults();
        model.sync_with_visibility(&items(10));
        let t0 = Instant::now();

        // 10 frames per second: well below the floor
        let mut downgrades = Vec::new();
        for i in 0..=20u64 {
            if let Some(mode) = model.record_frame(t0 + Duration::from_millis(i * 100)) {
                downgrades.push(mode);
            }
        }
        assert_eq!(downgrades, vec![PerformanceMode::Balanced, PerformanceMode::Battery]);
        assert_eq!(model.len(), 5);
        assert_eq!(model.total_evictions(), 5);

        // Fast frames afterwards do not raise the mode
        let t1 = t0 + Duration::from_secs(3);
        for i in 0..=120u64 {
            assert!(model.record_frame(t1 + Duration::from_millis(i * 10)).is_none());
        }
        assert_eq!(model.performance_mode(), PerformanceMode::Battery);

        model.set_performance_mode(PerformanceMode::High);
        assert_eq!(model.max_overlays(), 10);
    }

    #[test]
    fn test_battery_mode_snaps_instead_of_animating() {
        let mut model = OverlayModel::new(OverlayConfig {
            performance_mode: PerformanceMode::Battery,
            ..Default::default()
        });
        model.sync_with_visibility(&items(1));
        let overlay = model.get("l0").unwrap();
        assert_eq!(overlay.opacity(), 1.0);
        assert_eq!(overlay.phase(), OverlayPhase::Visible);

        model.sync_with_visibility(&[]);
        assert!(model.is_empty());
    }

    #[test]
    fn test_hit_test_prefers_highest_priority() {
        let mut model = OverlayModel::new(OverlayConfig {
            performance_mode: PerformanceMode::Battery,
            ..Default::default()
        });
        model.sync_with_visibility(&[
            item("cafe", LandmarkCategory::Restaurant, 900.0, 100.0),
            item("fort", LandmarkCategory::Historical, 900.0, 120.0),
        ]);

        assert_eq!(model.hit_test(110.0, 400.0).unwrap().id, "fort");
        assert_eq!(model.hit_test(20.0, 400.0).unwrap().id, "cafe");
        assert!(model.hit_test(100.0, 10.0).is_none());
    }

    #[test]
    fn test_render_order_is_priority_descending() {
        let mut model = OverlayModel::new(OverlayConfig {
            performance_mode: PerformanceMode::Battery,
            ..Default::default()
        });
        model.sync_with_visibility(&[
            item("near", LandmarkCategory::Nature, 0.0, 0.0),
            item("far", LandmarkCategory::Nature, 900.0, 0.0),
            item("fort", LandmarkCategory::Historical, 0.0, 0.0),
        ]);
        let order: Vec<&str> = model.render_order().iter().map(|o| o.id.as_str()).collect();
        assert_eq!(order, vec!["fort", "near", "far"]);
    }
}
