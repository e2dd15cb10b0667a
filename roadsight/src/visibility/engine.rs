//! Throttled, reentrancy-guarded visibility computation.
//!
//! # Update contract
//!
//! - At most one computation runs at a time. A call arriving while another
//!   is in flight gets the last result back unchanged; nothing is queued.
//! - Computations are throttled to one per `update_interval`; calls inside
//!   the interval also get the last result.
//! - Landmarks entering the visible set are queued for announcement; at
//!   most one is announced per computation, oldest first.
//!
//! # Thread Safety
//!
//! The engine is `Send + Sync` and meant to be shared through `Arc`. The
//! in-flight flag is an `AtomicBool`; the cached result and announcement
//! queue live behind a `parking_lot::Mutex` that is never held while
//! computing.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::landmark::{Landmark, VisibleItem, VisibleLandmark};
use crate::pose::DevicePose;

use super::cluster::cluster_landmarks;
use super::config::{Viewport, VisibilityConfig};
use super::projection::{project_landmark, project_point};
use super::ranking::rank_and_truncate;

/// Output of one visibility computation.
#[derive(Debug, Clone, Default)]
pub struct VisibilityResult {
    /// Ranked entries, capped at `max_landmarks_visible`.
    pub items: Vec<VisibleItem>,
    /// Landmarks that were not visible in the previous computation.
    pub newly_visible: Vec<Landmark>,
    /// The one landmark to announce this cycle, if any.
    pub announcement: Option<Landmark>,
}

impl VisibilityResult {
    /// Identifiers of every landmark in the result, cluster members included.
    pub fn landmark_ids(&self) -> HashSet<String> {
        self.items
            .iter()
            .flat_map(|i| i.landmark_ids())
            .map(String::from)
            .collect()
    }

    /// Every landmark in the result, cluster members included.
    pub fn landmarks(&self) -> Vec<Landmark> {
        self.items
            .iter()
            .flat_map(|i| i.landmarks())
            .cloned()
            .collect()
    }
}

/// Result handed back from [`LandmarkVisibilityEngine::update`].
#[derive(Debug, Clone)]
pub struct VisibilityUpdate {
    /// The current (possibly cached) result.
    pub result: Arc<VisibilityResult>,
    /// Whether this call computed a new result.
    pub fresh: bool,
}

/// Mutable state shared between calls.
#[derive(Debug, Default)]
struct EngineState {
    last_result: Arc<VisibilityResult>,
    last_update: Option<Instant>,
    previous_ids: HashSet<String>,
    pending_announcements: VecDeque<Landmark>,
}

/// Clears the in-flight flag when dropped.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Turns user pose plus nearby POIs into ranked screen-space entries.
#[derive(Debug)]
pub struct LandmarkVisibilityEngine {
    config: VisibilityConfig,
    in_flight: AtomicBool,
    state: Mutex<EngineState>,
    computations: AtomicU64,
    dropped_calls: AtomicU64,
}

impl LandmarkVisibilityEngine {
    /// Create an engine with the given configuration.
    pub fn new(config: VisibilityConfig) -> Self {
        Self {
            config,
            in_flight: AtomicBool::new(false),
            state: Mutex::new(EngineState::default()),
            computations: AtomicU64::new(0),
            dropped_calls: AtomicU64::new(0),
        }
    }

    /// Create an engine with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(VisibilityConfig::default())
    }

    /// The configuration in use.
    pub fn config(&self) -> &VisibilityConfig {
        &self.config
    }

    /// Compute visibility for the given pose and landmarks.
    ///
    /// Returns the cached result (with `fresh == false`) when throttled or
    /// when another computation is in flight.
    pub fn update(
        &self,
        pose: &DevicePose,
        viewport: Viewport,
        landmarks: &[Landmark],
        now: Instant,
    ) -> VisibilityUpdate {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.dropped_calls.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("Visibility computation in flight, returning last result");
            return self.cached();
        }
        let _guard = InFlightGuard(&self.in_flight);

        {
            let state = self.state.lock();
            if let Some(last) = state.last_update {
                if now.saturating_duration_since(last) < self.config.update_interval {
                    return VisibilityUpdate {
                        result: Arc::clone(&state.last_result),
                        fresh: false,
                    };
                }
            }
        }

        let items = self.compute(pose, viewport, landmarks);
        let result = self.commit(items, now);
        self.computations.fetch_add(1, Ordering::Relaxed);

        VisibilityUpdate {
            result,
            fresh: true,
        }
    }

    /// The last computed result.
    pub fn last_result(&self) -> Arc<VisibilityResult> {
        Arc::clone(&self.state.lock().last_result)
    }

    /// Number of completed computations.
    pub fn computation_count(&self) -> u64 {
        self.computations.load(Ordering::Relaxed)
    }

    /// Number of calls dropped because a computation was in flight.
    pub fn dropped_call_count(&self) -> u64 {
        self.dropped_calls.load(Ordering::Relaxed)
    }

    /// Forget the previous result so the next call computes immediately.
    pub fn reset(&self) {
        *self.state.lock() = EngineState::default();
    }

    fn cached(&self) -> VisibilityUpdate {
        VisibilityUpdate {
            result: self.last_result(),
            fresh: false,
        }
    }

    /// Steps 1-5: refresh, cull, project, cluster, rank.
    fn compute(
        &self,
        pose: &DevicePose,
        viewport: Viewport,
        landmarks: &[Landmark],
    ) -> Vec<VisibleItem> {
        let user = pose.location();
        let user_altitude = pose.altitude.unwrap_or(0.0);
        let orientation = pose.orientation();

        let visible: Vec<VisibleLandmark> = landmarks
            .iter()
            .filter(|l| l.confidence >= self.config.min_confidence)
            .filter_map(|l| {
                let mut landmark = l.clone();
                landmark.refresh_relative_to(&user);
                if landmark.distance_meters > self.config.max_distance_meters {
                    return None;
                }
                let projection = project_landmark(
                    &landmark,
                    user_altitude,
                    &orientation,
                    &viewport,
                    &self.config,
                )?;
                Some(VisibleLandmark {
                    landmark,
                    projection,
                })
            })
            .collect();

        let clustered = cluster_landmarks(visible, self.config.cluster_radius_meters, |centroid| {
            project_point(centroid, &user, user_altitude, &orientation, &viewport, &self.config)
        });
        rank_and_truncate(clustered, &self.config)
    }

    /// Diff against the previous set and pick this cycle's announcement.
    fn commit(&self, items: Vec<VisibleItem>, now: Instant) -> Arc<VisibilityResult> {
        let mut state = self.state.lock();

        let mut current_ids = HashSet::new();
        let mut newly_visible = Vec::new();
        for item in &items {
            for landmark in item.landmarks() {
                current_ids.insert(landmark.id.clone());
                if !state.previous_ids.contains(&landmark.id) {
                    newly_visible.push(landmark.clone());
                }
            }
        }

        state
            .pending_announcements
            .extend(newly_visible.iter().cloned());

        // Skip queued landmarks that left the view before their turn
        let mut announcement = None;
        while let Some(candidate) = state.pending_announcements.pop_front() {
            if current_ids.contains(&candidate.id) {
                announcement = Some(candidate);
                break;
            }
        }

        if !newly_visible.is_empty() {
            tracing::debug!(
                visible = items.len(),
                newly_visible = newly_visible.len(),
                "Visibility set changed"
            );
        }

        let result = Arc::new(VisibilityResult {
            items,
            newly_visible,
            announcement,
        });

        state.previous_ids = current_ids;
        state.last_update = Some(now);
        state.last_result = Arc::clone(&result);
        result
    }
}

impl Default for LandmarkVisibilityEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{destination_point, GeoPoint};
    use crate::landmark::LandmarkCategory;
    use std::time::Duration;

    fn unthrottled() -> LandmarkVisibilityEngine {
        LandmarkVisibilityEngine::new(VisibilityConfig {
            update_interval: Duration::ZERO,
            ..Default::default()
        })
    }

    fn landmark(id: &str, bearing: f64, distance: f64) -> Landmark {
        let location = destination_point(&GeoPoint::new(0.0, 0.0), bearing, distance);
        Landmark::new(id, id, LandmarkCategory::Landmark, location)
    }

    fn pose(heading: f64) -> DevicePose {
        DevicePose::new(0.0, 0.0, heading, 0.0)
    }

    #[test]
    fn test_landmark_at_bearing_10_is_visible_right_of_center() {
        let engine = unthrottled();
        let viewport = Viewport::new(400.0, 800.0);
        let update = engine.update(&pose(0.0), viewport, &[landmark("a", 10.0, 200.0)], Instant::now());

        assert!(update.fresh);
        assert_eq!(update.result.items.len(), 1);
        let p = update.result.items[0].projection();
        assert!(p.visible);
        assert!(p.x > 200.0, "x = {}", p.x);
    }

    #[test]
    fn test_landmark_at_bearing_40_is_excluded() {
        let engine = unthrottled();
        let update = engine.update(
            &pose(0.0),
            Viewport::default(),
            &[landmark("a", 40.0, 200.0)],
            Instant::now(),
        );
        assert!(update.result.items.is_empty());
    }

    #[test]
    fn test_distance_and_bearing_are_derived() {
        let engine = unthrottled();
        let update = engine.update(
            &pose(0.0),
            Viewport::default(),
            &[landmark("a", 10.0, 200.0)],
            Instant::now(),
        );
        let l = update.result.items[0].representative();
        assert!((l.distance_meters - 200.0).abs() < 0.01);
        assert!((l.bearing_degrees - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_throttle_returns_cached_result() {
        let engine = LandmarkVisibilityEngine::with_defaults();
        let base = Instant::now();

        let first = engine.update(&pose(0.0), Viewport::default(), &[landmark("a", 0.0, 200.0)], base);
        assert!(first.fresh);

        // Inside the 1 s interval: new input is ignored
        let second = engine.update(
            &pose(0.0),
            Viewport::default(),
            &[],
            base + Duration::from_millis(500),
        );
        assert!(!second.fresh);
        assert_eq!(second.result.items.len(), 1);

        let third = engine.update(&pose(0.0), Viewport::default(), &[], base + Duration::from_millis(1000));
        assert!(third.fresh);
        assert!(third.result.items.is_empty());
        assert_eq!(engine.computation_count(), 2);
    }

    #[test]
    fn test_reentrant_call_returns_last_result() {
        let engine = unthrottled();
        let landmarks = [landmark("a", 0.0, 200.0)];
        engine.update(&pose(0.0), Viewport::default(), &landmarks, Instant::now());

        // Simulate a computation in flight on another thread
        engine.in_flight.store(true, Ordering::Release);
        let update = engine.update(&pose(0.0), Viewport::default(), &[], Instant::now());

        assert!(!update.fresh);
        assert_eq!(update.result.items.len(), 1);
        assert_eq!(engine.dropped_call_count(), 1);

        engine.in_flight.store(false, Ordering::Release);
        let update = engine.update(&pose(0.0), Viewport::default(), &[], Instant::now());
        assert!(update.fresh);
    }

    #[test]
    fn test_newly_visible_and_single_announcement_per_cycle() {
        let engine = unthrottled();
        let landmarks = [
            landmark("a", -10.0, 200.0),
            landmark("b", 0.0, 400.0),
            landmark("c", 10.0, 600.0),
        ];

        let first = engine.update(&pose(0.0), Viewport::default(), &landmarks, Instant::now());
        assert_eq!(first.result.newly_visible.len(), 3);
        let first_announced = first.result.announcement.clone().unwrap();
        assert_eq!(first_announced.id, "a");

        let second = engine.update(&pose(0.0), Viewport::default(), &landmarks, Instant::now());
        assert!(second.result.newly_visible.is_empty());
        assert_eq!(second.result.announcement.as_ref().unwrap().id, "b");

        let third = engine.update(&pose(0.0), Viewport::default(), &landmarks, Instant::now());
        assert_eq!(third.result.announcement.as_ref().unwrap().id, "c");

        let fourth = engine.update(&pose(0.0), Viewport::default(), &landmarks, Instant::now());
        assert!(fourth.result.announcement.is_none());
    }

    #[test]
    fn test_queued_announcement_skipped_when_no_longer_visible() {
        let engine = unthrottled();
        let landmarks = [landmark("a", -10.0, 200.0), landmark("b", 10.0, 400.0)];

        engine.update(&pose(0.0), Viewport::default(), &landmarks, Instant::now());
        // Turn away from "b" before it gets announced
        let update = engine.update(&pose(-25.0), Viewport::default(), &landmarks, Instant::now());
        assert!(update.result.announcement.is_none());
    }

    #[test]
    fn test_clustered_members_are_reported_visible() {
        let engine = unthrottled();
        let a = landmark("a", 0.0, 200.0);
        let b_loc = destination_point(&a.location, 90.0, 20.0);
        let b = Landmark::new("b", "b", LandmarkCategory::Nature, b_loc);

        let update = engine.update(&pose(0.0), Viewport::default(), &[a, b], Instant::now());

        assert_eq!(update.result.items.len(), 1);
        assert_eq!(update.result.items[0].member_count(), 2);
        assert_eq!(update.result.landmark_ids().len(), 2);

        // Placed at the centroid, between the two members
        let VisibleItem::Cluster(cluster) = &update.result.items[0] else {
            panic!("expected a cluster");
        };
        let members = cluster.members();
        let (left, right) = (members[0].projection.x, members[1].projection.x);
        assert!(cluster.projection.x > left && cluster.projection.x < right);
        assert!(cluster.projection.relative_bearing > 0.0);
        assert_eq!(update.result.newly_visible.len(), 2);
    }

    #[test]
    fn test_confidence_and_range_filters() {
        let engine = LandmarkVisibilityEngine::new(VisibilityConfig {
            update_interval: Duration::ZERO,
            min_confidence: 0.5,
            max_distance_meters: 1_000.0,
            ..Default::default()
        });
        let landmarks = [
            landmark("shaky", 0.0, 200.0).with_confidence(0.2),
            landmark("far", 5.0, 2_000.0),
            landmark("ok", -5.0, 300.0),
        ];

        let update = engine.update(&pose(0.0), Viewport::default(), &landmarks, Instant::now());
        let ids: Vec<&str> = update.result.items.iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec!["ok"]);
    }
}
