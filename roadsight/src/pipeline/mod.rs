//! Frame-to-overlay pipeline
//!
//! Each processed camera frame runs one cycle:
//!
//! ```text
//! PoseTracker ──► PoiService::landmarks_near ──► LandmarkVisibilityEngine::update
//!                                                      │ fresh result
//!                         ┌────────────────────────────┼────────────────────────┐
//!                         ▼                            ▼                        ▼
//!          OverlayModel::sync_with_visibility   LandmarkEvent::BecameVisible   Narrator
//!                                                  (broadcast)              (one per cycle)
//! ```
//!
//! Cycles that hit the visibility throttle change nothing downstream. A
//! stale pose is still used; it is only logged.
//!
//! # Thread Safety
//!
//! The pipeline runs on the camera controller's detection worker, so at
//! most one cycle is in flight. Pose updates and viewport changes may come
//! from any thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::camera::{CameraFrame, LandmarkDetector};
use crate::landmark::LandmarkEvent;
use crate::narration::Narrator;
use crate::overlay::SharedOverlayModel;
use crate::poi::{BoxFuture, PoiService};
use crate::pose::{DevicePose, PoseTracker};
use crate::visibility::{LandmarkVisibilityEngine, Viewport, VisibilityResult};

/// Default capacity of the landmark event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Outcome of one pipeline cycle.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub result: Arc<VisibilityResult>,
    /// False when the visibility engine returned its cached result.
    pub fresh: bool,
    pub stale_pose: bool,
}

/// Connects pose, POI, visibility, overlays and notifications.
pub struct LandmarkPipeline {
    pose: Mutex<PoseTracker>,
    viewport: Mutex<Viewport>,
    poi: Arc<PoiService>,
    visibility: LandmarkVisibilityEngine,
    overlays: SharedOverlayModel,
    events: broadcast::Sender<LandmarkEvent>,
    narrator: Option<Arc<Narrator>>,
    cycles: AtomicU64,
}

impl std::fmt::Debug for LandmarkPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LandmarkPipeline")
            .field("viewport", &*self.viewport.lock())
            .field("cycles", &self.cycles.load(Ordering::Relaxed))
            .finish()
    }
}

impl LandmarkPipeline {
    pub fn new(
        pose: PoseTracker,
        viewport: Viewport,
        poi: Arc<PoiService>,
        visibility: LandmarkVisibilityEngine,
        overlays: SharedOverlayModel,
        events: broadcast::Sender<LandmarkEvent>,
        narrator: Option<Arc<Narrator>>,
    ) -> Self {
        Self {
            pose: Mutex::new(pose),
            viewport: Mutex::new(viewport),
            poi,
            visibility,
            overlays,
            events,
            narrator,
            cycles: AtomicU64::new(0),
        }
    }

    /// Record a pose sample. Invalid samples are rejected.
    pub fn update_pose(&self, pose: DevicePose) -> bool {
        self.pose.lock().update(pose)
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        *self.viewport.lock() = viewport;
    }

    pub fn viewport(&self) -> Viewport {
        *self.viewport.lock()
    }

    pub fn latest_pose(&self) -> Option<DevicePose> {
        self.pose.lock().latest().copied()
    }

    pub fn overlays(&self) -> &SharedOverlayModel {
        &self.overlays
    }

    pub fn visibility(&self) -> &LandmarkVisibilityEngine {
        &self.visibility
    }

    pub fn poi(&self) -> &Arc<PoiService> {
        &self.poi
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LandmarkEvent> {
        self.events.subscribe()
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Run one cycle. Returns `None` until a pose has been recorded.
    pub async fn run_cycle(&self, now: Instant) -> Option<CycleOutcome> {
        let (pose, stale_pose) = {
            let tracker = self.pose.lock();
            let pose = *tracker.latest()?;
            (pose, tracker.is_stale(now))
        };
        if stale_pose {
            debug!(
                latitude = pose.latitude,
                longitude = pose.longitude,
                "Pose is stale, using last known pose"
            );
        }

        let landmarks = self.poi.landmarks_near(pose.latitude, pose.longitude).await;
        let update = self.visibility.update(&pose, self.viewport(), &landmarks, now);
        self.cycles.fetch_add(1, Ordering::Relaxed);

        if update.fresh {
            self.publish(&update.result);
        }

        Some(CycleOutcome {
            result: update.result,
            fresh: update.fresh,
            stale_pose,
        })
    }

    fn publish(&self, result: &VisibilityResult) {
        let report = self.overlays.lock().sync_with_visibility(&result.items);
        trace!(
            items = result.items.len(),
            created = report.created.len(),
            exiting = report.exiting.len(),
            evicted = report.evicted.len(),
            "Overlays synced"
        );

        for landmark in &result.newly_visible {
            // No receivers is fine; nobody is playing.
            let _ = self.events.send(LandmarkEvent::BecameVisible {
                landmark_id: landmark.id.clone(),
                name: landmark.name.clone(),
            });
        }

        if let (Some(narrator), Some(landmark)) = (&self.narrator, &result.announcement) {
            narrator.announce_landmark(landmark);
        }
    }
}

impl LandmarkDetector for LandmarkPipeline {
    fn detect(&self, frame: CameraFrame) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            trace!(sequence = frame.sequence, "Running landmark pipeline");
            self.run_cycle(frame.timestamp).await;
        })
    }
}
