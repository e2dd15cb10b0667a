//! Camera/AR session lifecycle.
//!
//! # State Machine
//!
//! ```text
//! Uninitialized --initialize() ok--> Initialized --start_session()--> SessionActive
//!                                         ▲                              │
//!                                         │                       stop_session()
//!                                         │                              ▼
//!                                         └──── start_session() ─── SessionStopped
//! ```
//!
//! # Frame path
//!
//! ```text
//! platform callback ──► FrameGate::on_frame ──► process_frame (skip policy, timestamps only)
//!                                                     │ Process
//!                                                     ▼
//!                                          bounded mpsc ──► detection worker (tokio task)
//!                                                                 │ timed
//!                                                                 ▼
//!                                                    record_processing_time (EMA)
//! ```
//!
//! # Thread Safety
//!
//! All methods take `&self`. The "is active" flag is an `AtomicBool`;
//! `start_session` and `stop_session` race on it with compare-exchange, so
//! `stop_session` may be called from any thread and any number of times.
//! A stop that lands while `start_session` is still running wins: the start
//! tears down whatever it already set up and returns
//! [`SessionError::StoppedWhileStarting`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::{BatteryMode, ControllerConfig, SessionConfig, SessionConfigPatch};
use super::error::{InitializationFailure, SessionError};
use super::metrics::{MetricsTracker, PerformanceMetrics};
use super::platform::{
    select_camera, CameraDevice, CameraFrame, CameraPlatform, CapturedImage, FrameProcessor,
    FrameSubscription,
};
use super::skip::{FrameDecision, FrameSkipPolicy};
use crate::landmark::Landmark;
use crate::persistence::{log_failure, Persistence};
use crate::poi::BoxFuture;

/// Consumer of frames that survived the skip policy.
///
/// Runs on the detection worker, never on the camera callback thread.
pub trait LandmarkDetector: Send + Sync {
    fn detect(&self, frame: CameraFrame) -> BoxFuture<'_, ()>;
}

/// Lifecycle state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initialized,
    SessionActive,
    SessionStopped,
}

/// What the photo composer receives at capture time.
#[derive(Debug, Clone, Default)]
pub struct PhotoContext {
    /// Landmarks visible when the shutter was pressed.
    pub landmarks: Vec<Landmark>,
    /// Overlays on screen when the shutter was pressed.
    pub overlay_ids: Vec<String>,
}

/// A captured still plus the AR context it was taken in.
#[derive(Debug, Clone)]
pub struct ArPhoto {
    pub image: CapturedImage,
    pub landmarks: Vec<Landmark>,
    pub overlay_ids: Vec<String>,
    pub captured_at: DateTime<Utc>,
}

struct ControllerState {
    lifecycle: SessionState,
    failure: Option<InitializationFailure>,
    device: Option<CameraDevice>,
    /// Defaults merged with stored preferences.
    preferences: SessionConfig,
    /// Effective configuration of the running (or last) session.
    session: SessionConfig,
    thermal_throttled: bool,
    subscription: Option<FrameSubscription>,
    worker_token: Option<CancellationToken>,
    detection_tx: Option<mpsc::Sender<CameraFrame>>,
    /// Bumped by every session start that publishes its state.
    generation: u64,
}

struct ControllerInner {
    config: ControllerConfig,
    platform: Arc<dyn CameraPlatform>,
    detector: Arc<dyn LandmarkDetector>,
    persistence: Arc<dyn Persistence>,
    active: AtomicBool,
    state: Mutex<ControllerState>,
    skip: Mutex<FrameSkipPolicy>,
    metrics: Mutex<MetricsTracker>,
    metrics_tx: watch::Sender<PerformanceMetrics>,
    /// Stops the periodic metrics emitter.
    shutdown: CancellationToken,
}

/// Owns the camera session and feeds frames into detection.
pub struct CameraSessionController {
    inner: Arc<ControllerInner>,
}

impl std::fmt::Debug for CameraSessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSessionController")
            .field("state", &self.state())
            .field("active", &self.is_active())
            .finish()
    }
}

impl CameraSessionController {
    pub fn new(
        config: ControllerConfig,
        platform: Arc<dyn CameraPlatform>,
        detector: Arc<dyn LandmarkDetector>,
        persistence: Arc<dyn Persistence>,
    ) -> Self {
        let (metrics_tx, _) = watch::channel(PerformanceMetrics::default());
        let skip = FrameSkipPolicy::new(config.frame_skip);
        let defaults = config.defaults;

        Self {
            inner: Arc::new(ControllerInner {
                config,
                platform,
                detector,
                persistence,
                active: AtomicBool::new(false),
                state: Mutex::new(ControllerState {
                    lifecycle: SessionState::Uninitialized,
                    failure: None,
                    device: None,
                    preferences: defaults,
                    session: defaults,
                    thermal_throttled: false,
                    subscription: None,
                    worker_token: None,
                    detection_tx: None,
                    generation: 0,
                }),
                skip: Mutex::new(skip),
                metrics: Mutex::new(MetricsTracker::new()),
                metrics_tx,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Check AR support, obtain camera permission, pick a camera, load
    /// preferences and start the metrics emitter.
    ///
    /// Returns `false` (with the reason in [`Self::initialization_failure`])
    /// when the environment cannot run AR. Calling it again after success
    /// is a no-op returning `true`.
    pub async fn initialize(&self) -> bool {
        if self.state() != SessionState::Uninitialized {
            debug!("Camera session controller already initialized");
            return true;
        }

        let inner = &self.inner;
        let info = inner.platform.platform_info();
        if !info.ar_supported || info.os_major_version < inner.config.min_os_major_version {
            return self.fail_initialization(InitializationFailure::UnsupportedPlatform);
        }

        if !inner.platform.request_camera_permission().await {
            return self.fail_initialization(InitializationFailure::PermissionDenied);
        }

        let devices = inner.platform.available_devices();
        let Some(device) = select_camera(&devices).cloned() else {
            return self.fail_initialization(InitializationFailure::NoSuitableCamera);
        };

        let preferences = match inner.persistence.load_preferences() {
            Ok(Some(patch)) => patch.apply(inner.config.defaults),
            Ok(None) => inner.config.defaults,
            Err(e) => {
                warn!(error = %e, "Could not load preferences, using defaults");
                inner.config.defaults
            }
        };

        {
            let mut state = inner.state.lock();
            state.lifecycle = SessionState::Initialized;
            state.failure = None;
            state.device = Some(device.clone());
            state.preferences = preferences;
            state.session = preferences;
        }

        spawn_metrics_emitter(Arc::downgrade(inner), inner.config.metrics_interval, inner.shutdown.clone());

        info!(
            platform = %info.name,
            os_version = info.os_major_version,
            camera = %device.id,
            quality = %preferences.quality,
            target_fps = %preferences.target_fps,
            "Camera session controller initialized"
        );
        true
    }

    /// Start an AR session.
    ///
    /// `overrides` are merged over the stored preferences. A low battery
    /// forces battery-saving mode; a hot device forces the thermal
    /// throttle. Calling this while a session is active logs a warning and
    /// returns the running configuration. A concurrent `stop_session` that
    /// lands before the start finishes makes it fail with
    /// [`SessionError::StoppedWhileStarting`].
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_session(&self, overrides: Option<SessionConfigPatch>) -> Result<SessionConfig, SessionError> {
        let inner = &self.inner;

        let (device, preferences) = {
            let state = inner.state.lock();
            match (state.lifecycle, state.device.clone()) {
                (SessionState::Uninitialized, _) | (_, None) => return Err(SessionError::NotInitialized),
                (_, Some(device)) => (device, state.preferences),
            }
        };

        if inner
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("start_session called while a session is already active");
            return Ok(inner.state.lock().session);
        }

        let mut config = overrides.map(|p| p.apply(preferences)).unwrap_or(preferences);

        if let Some(battery) = inner.platform.battery_level() {
            if battery < inner.config.battery_threshold_percent && config.battery_mode == BatteryMode::Normal {
                info!(
                    battery_percent = battery,
                    threshold = inner.config.battery_threshold_percent,
                    "Low battery, starting session in saving mode"
                );
                config = config.with_battery_saving();
            }
        }

        let mut thermal_throttled = false;
        if let Some(temperature) = inner.platform.device_temperature() {
            inner.metrics.lock().set_temperature(temperature);
            if temperature > inner.config.thermal.throttle_celsius {
                info!(temperature, "Device hot at session start, throttling");
                config = config.with_thermal_throttle();
                thermal_throttled = true;
            }
        }

        let now = Instant::now();
        inner.skip.lock().reset();
        inner.metrics.lock().start_session(now);

        let worker_token = CancellationToken::new();
        let subscription = FrameSubscription::new();
        let (detection_tx, detection_rx) = mpsc::channel(inner.config.detection_queue.max(1));

        let generation = {
            let mut state = inner.state.lock();
            // A stop that cleared the flag before this point had nothing to tear down
            if !inner.active.load(Ordering::Acquire) {
                warn!("Camera session stopped while starting");
                return Err(SessionError::StoppedWhileStarting);
            }
            state.lifecycle = SessionState::SessionActive;
            state.session = config;
            state.thermal_throttled = thermal_throttled;
            state.subscription = Some(subscription.clone());
            state.worker_token = Some(worker_token.clone());
            state.detection_tx = Some(detection_tx);
            state.generation += 1;
            state.generation
        };

        tokio::spawn(run_detection_worker(Arc::clone(inner), detection_rx, worker_token));

        inner.platform.start_tracking(&device, &config);

        let gate: Arc<dyn FrameProcessor> = Arc::new(FrameGate {
            inner: Arc::downgrade(inner),
        });
        inner.platform.attach_frame_processor(gate, subscription.clone());

        // A stop after the state was published cancelled it, possibly before
        // tracking started
        if subscription.is_cancelled() {
            if inner.state.lock().generation == generation {
                inner.platform.stop_tracking();
            }
            warn!("Camera session stopped while starting");
            return Err(SessionError::StoppedWhileStarting);
        }

        log_failure("save_preferences", inner.persistence.save_preferences(&config));

        info!(
            camera = %device.id,
            quality = %config.quality,
            target_fps = %config.target_fps,
            battery_mode = %config.battery_mode,
            detection = config.enable_landmark_detection,
            "Camera session started"
        );
        Ok(config)
    }

    /// Run the skip policy for a frame and dispatch it to detection.
    ///
    /// Called on the camera delivery thread; never blocks beyond short
    /// lock sections.
    pub fn process_frame(&self, frame: CameraFrame) -> FrameDecision {
        self.inner.process_frame(frame)
    }

    /// Feed an externally measured processing time into the average.
    pub fn record_processing_time(&self, elapsed: Duration) {
        self.inner.metrics.lock().record_processing_time(elapsed);
    }

    /// React to a device temperature report.
    ///
    /// Returns `true` if this report switched the session to the thermal
    /// throttle.
    pub fn on_thermal_update(&self, celsius: f64) -> bool {
        self.inner.on_thermal_update(celsius)
    }

    /// React to a battery level report while a session runs.
    ///
    /// Returns `true` if this report switched the session to saving mode.
    pub fn on_battery_update(&self, percent: f64) -> bool {
        let inner = &self.inner;
        if !inner.active.load(Ordering::Acquire) || percent >= inner.config.battery_threshold_percent {
            return false;
        }

        let mut state = inner.state.lock();
        if state.session.battery_mode == BatteryMode::Saving {
            return false;
        }
        state.session = state.session.with_battery_saving();
        if state.thermal_throttled {
            state.session = state.session.with_thermal_throttle();
        }
        info!(battery_percent = percent, "Low battery, switching session to saving mode");
        true
    }

    /// Stop the session: detach the frame processor, stop tracking and
    /// persist final metrics. Returns `false` if no session was active.
    pub fn stop_session(&self) -> bool {
        self.inner.stop_session()
    }

    /// Capture an AR photo with the overlays and landmarks in `context`.
    pub async fn capture_ar_photo(&self, context: PhotoContext) -> Result<ArPhoto, SessionError> {
        if !self.is_active() {
            return Err(SessionError::NotActive);
        }
        if !self.session_config().enable_photo_capture {
            return Err(SessionError::PhotoCaptureDisabled);
        }

        let image = self
            .inner
            .platform
            .capture_photo()
            .await
            .map_err(SessionError::CaptureFailed)?;

        info!(
            landmarks = context.landmarks.len(),
            overlays = context.overlay_ids.len(),
            "Captured AR photo"
        );
        Ok(ArPhoto {
            image,
            landmarks: context.landmarks,
            overlay_ids: context.overlay_ids,
            captured_at: Utc::now(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.lock().lifecycle
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Effective configuration of the current (or last) session.
    pub fn session_config(&self) -> SessionConfig {
        self.inner.state.lock().session
    }

    pub fn initialization_failure(&self) -> Option<InitializationFailure> {
        self.inner.state.lock().failure
    }

    pub fn selected_device(&self) -> Option<CameraDevice> {
        self.inner.state.lock().device.clone()
    }

    /// Current metrics.
    pub fn metrics(&self) -> PerformanceMetrics {
        self.inner.metrics.lock().metrics()
    }

    /// Receiver for the periodic metrics emission.
    pub fn subscribe_metrics(&self) -> watch::Receiver<PerformanceMetrics> {
        self.inner.metrics_tx.subscribe()
    }

    fn fail_initialization(&self, reason: InitializationFailure) -> bool {
        warn!(reason = %reason, "AR camera unavailable");
        self.inner.state.lock().failure = Some(reason);
        false
    }
}

impl Drop for CameraSessionController {
    fn drop(&mut self) {
        self.inner.stop_session();
        self.inner.shutdown.cancel();
    }
}

impl ControllerInner {
    fn process_frame(&self, frame: CameraFrame) -> FrameDecision {
        if !self.active.load(Ordering::Acquire) {
            return FrameDecision::Inactive;
        }

        let (session, detection_tx) = {
            let state = self.state.lock();
            (state.session, state.detection_tx.clone())
        };
        let average = self.metrics.lock().metrics().average_processing();
        let decision = self.skip.lock().decide(frame.timestamp, &session, average);

        let mut metrics = self.metrics.lock();
        match decision {
            FrameDecision::Process => {
                metrics.record_processed(frame.timestamp);
                if session.enable_landmark_detection {
                    let queued = detection_tx.map(|tx| tx.try_send(frame).is_ok()).unwrap_or(false);
                    if !queued {
                        metrics.record_drop();
                    }
                }
            }
            FrameDecision::TooSoon | FrameDecision::BatterySkip | FrameDecision::OverBudgetSkip => {
                metrics.record_drop();
            }
            FrameDecision::Inactive => {}
        }
        decision
    }

    fn on_thermal_update(&self, celsius: f64) -> bool {
        self.metrics.lock().set_temperature(celsius);
        if celsius <= self.config.thermal.throttle_celsius || !self.active.load(Ordering::Acquire) {
            return false;
        }

        let mut state = self.state.lock();
        if state.thermal_throttled {
            return false;
        }
        state.thermal_throttled = true;
        state.session = state.session.with_thermal_throttle();
        info!(
            temperature = celsius,
            threshold = self.config.thermal.throttle_celsius,
            "Thermal throttle engaged, quality low at 30 FPS"
        );
        true
    }

    fn stop_session(&self) -> bool {
        if self
            .active
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let session = {
            let mut state = self.state.lock();
            if let Some(subscription) = state.subscription.take() {
                subscription.cancel();
            }
            if let Some(token) = state.worker_token.take() {
                token.cancel();
            }
            state.detection_tx = None;
            state.lifecycle = SessionState::SessionStopped;
            state.session
        };

        self.platform.stop_tracking();

        let snapshot = self.metrics.lock().snapshot(Instant::now(), session);
        log_failure("save_metrics", self.persistence.save_metrics(&snapshot));

        info!(
            duration_secs = format!("{:.1}", snapshot.session_duration_secs),
            processed = snapshot.processed_frames,
            dropped = snapshot.frame_drops,
            avg_processing_ms = format!("{:.1}", snapshot.average_processing_ms),
            "Camera session stopped"
        );
        true
    }

    fn publish_metrics(&self) {
        if let Some(temperature) = self.platform.device_temperature() {
            self.on_thermal_update(temperature);
        }

        let metrics = self.metrics.lock().metrics();
        self.metrics_tx.send_replace(metrics);
        debug!(
            fps = format!("{:.1}", metrics.fps),
            processing_ms = format!("{:.1}", metrics.processing_time_ms),
            frame_drops = metrics.frame_drops,
            temperature = ?metrics.temperature,
            "Performance metrics"
        );
    }
}

/// Frame processor handed to the platform for one session.
struct FrameGate {
    inner: Weak<ControllerInner>,
}

impl FrameProcessor for FrameGate {
    fn on_frame(&self, frame: CameraFrame) {
        if let Some(inner) = self.inner.upgrade() {
            inner.process_frame(frame);
        }
    }
}

async fn run_detection_worker(
    inner: Arc<ControllerInner>,
    mut frames: mpsc::Receiver<CameraFrame>,
    cancellation_token: CancellationToken,
) {
    debug!("Detection worker started");

    loop {
        tokio::select! {
            biased;

            _ = cancellation_token.cancelled() => break,

            frame = frames.recv() => {
                let Some(frame) = frame else { break };
                let started = Instant::now();
                inner.detector.detect(frame).await;
                inner.metrics.lock().record_processing_time(started.elapsed());
            }
        }
    }

    debug!("Detection worker stopped");
}

fn spawn_metrics_emitter(inner: Weak<ControllerInner>, period: Duration, cancellation_token: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = cancellation_token.cancelled() => break,

                _ = ticker.tick() => {
                    let Some(inner) = inner.upgrade() else { break };
                    inner.publish_metrics();
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::config::{BatteryMode, Quality, TargetFps};
    use crate::camera::platform::{CameraLens, CameraPosition, PlatformInfo};
    use crate::persistence::MemoryPersistence;
    use std::sync::atomic::AtomicU64;

    struct MockPlatform {
        ar_supported: bool,
        permission: bool,
        devices: Vec<CameraDevice>,
        battery: Mutex<Option<f64>>,
        temperature: Mutex<Option<f64>>,
        tracking: AtomicBool,
        processor: Mutex<Option<(Arc<dyn FrameProcessor>, FrameSubscription)>>,
        /// Runs inside `start_tracking`, before tracking is switched on.
        on_start_tracking: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    }

    impl MockPlatform {
        fn new() -> Self {
            Self {
                ar_supported: true,
                permission: true,
                devices: vec![CameraDevice::new("back", CameraPosition::Back, CameraLens::WideAngle)],
                battery: Mutex::new(Some(80.0)),
                temperature: Mutex::new(None),
                tracking: AtomicBool::new(false),
                processor: Mutex::new(None),
                on_start_tracking: Mutex::new(None),
            }
        }

        /// Deliver a frame the way a native callback would.
        fn deliver(&self, frame: CameraFrame) -> bool {
            let guard = self.processor.lock();
            match guard.as_ref() {
                Some((processor, subscription)) if !subscription.is_cancelled() => {
                    processor.on_frame(frame);
                    true
                }
                _ => false,
            }
        }
    }

    impl CameraPlatform for MockPlatform {
        fn platform_info(&self) -> PlatformInfo {
            PlatformInfo {
                name: "mock".into(),
                os_major_version: 17,
                ar_supported: self.ar_supported,
            }
        }

        fn request_camera_permission(&self) -> BoxFuture<'_, bool> {
            let granted = self.permission;
            Box::pin(async move { granted })
        }

        fn available_devices(&self) -> Vec<CameraDevice> {
            self.devices.clone()
        }

        fn battery_level(&self) -> Option<f64> {
            *self.battery.lock()
        }

        fn device_temperature(&self) -> Option<f64> {
            *self.temperature.lock()
        }

        fn start_tracking(&self, _device: &CameraDevice, _config: &SessionConfig) {
            let hook = self.on_start_tracking.lock().take();
            if let Some(hook) = hook {
                hook();
            }
            self.tracking.store(true, Ordering::SeqCst);
        }

        fn stop_tracking(&self) {
            self.tracking.store(false, Ordering::SeqCst);
        }

        fn attach_frame_processor(&self, processor: Arc<dyn FrameProcessor>, subscription: FrameSubscription) {
            *self.processor.lock() = Some((processor, subscription));
        }

        fn capture_photo(&self) -> BoxFuture<'_, Result<CapturedImage, String>> {
            Box::pin(async {
                Ok(CapturedImage {
                    width: 4,
                    height: 3,
                    data: vec![0; 12],
                })
            })
        }
    }

    #[derive(Default)]
    struct CountingDetector {
        frames: AtomicU64,
    }

    impl LandmarkDetector for CountingDetector {
        fn detect(&self, _frame: CameraFrame) -> BoxFuture<'_, ()> {
            self.frames.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {})
        }
    }

    struct Harness {
        platform: Arc<MockPlatform>,
        detector: Arc<CountingDetector>,
        persistence: Arc<MemoryPersistence>,
        controller: CameraSessionController,
    }

    fn harness_with(platform: MockPlatform, persistence: MemoryPersistence) -> Harness {
        let platform = Arc::new(platform);
        let detector = Arc::new(CountingDetector::default());
        let persistence = Arc::new(persistence);
        let controller = CameraSessionController::new(
            ControllerConfig::default(),
            platform.clone(),
            detector.clone(),
            persistence.clone(),
        );
        Harness {
            platform,
            detector,
            persistence,
            controller,
        }
    }

    fn harness() -> Harness {
        harness_with(MockPlatform::new(), MemoryPersistence::new())
    }

    fn frame(sequence: u64, at: Instant) -> CameraFrame {
        CameraFrame {
            sequence,
            timestamp: at,
            width: 1920,
            height: 1080,
        }
    }

    fn no_detection() -> Option<SessionConfigPatch> {
        Some(SessionConfigPatch {
            enable_landmark_detection: Some(false),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_initialize_success_selects_camera() {
        let h = harness();
        assert!(h.controller.initialize().await);
        assert_eq!(h.controller.state(), SessionState::Initialized);
        assert_eq!(h.controller.selected_device().unwrap().id, "back");
        assert!(h.controller.initialize().await);
    }

    #[tokio::test]
    async fn test_initialize_failures_are_reported_not_thrown() {
        let mut unsupported = MockPlatform::new();
        unsupported.ar_supported = false;
        let h = harness_with(unsupported, MemoryPersistence::new());
        assert!(!h.controller.initialize().await);
        assert_eq!(
            h.controller.initialization_failure(),
            Some(InitializationFailure::UnsupportedPlatform)
        );

        let mut denied = MockPlatform::new();
        denied.permission = false;
        let h = harness_with(denied, MemoryPersistence::new());
        assert!(!h.controller.initialize().await);
        assert_eq!(
            h.controller.initialization_failure(),
            Some(InitializationFailure::PermissionDenied)
        );

        let mut front_only = MockPlatform::new();
        front_only.devices = vec![CameraDevice::new("selfie", CameraPosition::Front, CameraLens::WideAngle)];
        let h = harness_with(front_only, MemoryPersistence::new());
        assert!(!h.controller.initialize().await);
        assert_eq!(
            h.controller.initialization_failure(),
            Some(InitializationFailure::NoSuitableCamera)
        );
        assert_eq!(h.controller.state(), SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_start_requires_initialize() {
        let h = harness();
        assert_eq!(h.controller.start_session(None), Err(SessionError::NotInitialized));
    }

    #[tokio::test]
    async fn test_preferences_and_overrides_merge() {
        let stored = SessionConfigPatch {
            quality: Some(Quality::Medium),
            ..Default::default()
        };
        let h = harness_with(MockPlatform::new(), MemoryPersistence::with_preferences(stored));
        h.controller.initialize().await;

        let config = h
            .controller
            .start_session(Some(SessionConfigPatch {
                enable_photo_capture: Some(false),
                ..Default::default()
            }))
            .unwrap();

        assert_eq!(config.quality, Quality::Medium);
        assert!(!config.enable_photo_capture);
        assert_eq!(h.persistence.preferences().unwrap().enable_photo_capture, Some(false));
    }

    #[tokio::test]
    async fn test_low_battery_forces_saving_mode() {
        let platform = MockPlatform::new();
        *platform.battery.lock() = Some(12.0);
        let h = harness_with(platform, MemoryPersistence::new());
        h.controller.initialize().await;

        let config = h.controller.start_session(None).unwrap();
        assert_eq!(config.battery_mode, BatteryMode::Saving);
        assert_eq!(config.target_fps, TargetFps::Fps30);
        assert_eq!(config.quality, Quality::Medium);
    }

    #[tokio::test]
    async fn test_reentrant_start_is_noop() {
        let h = harness();
        h.controller.initialize().await;
        let first = h.controller.start_session(None).unwrap();
        let second = h
            .controller
            .start_session(Some(SessionConfigPatch {
                quality: Some(Quality::Low),
                ..Default::default()
            }))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(h.controller.session_config().quality, Quality::High);
    }

    #[tokio::test]
    async fn test_over_budget_skips_two_of_three() {
        let h = harness();
        h.controller.initialize().await;
        h.controller.start_session(no_detection()).unwrap();

        for _ in 0..20 {
            h.controller.record_processing_time(Duration::from_millis(50));
        }
        assert!(h.controller.metrics().processing_time_ms > 33.0);

        let t0 = Instant::now();
        let decisions: Vec<FrameDecision> = (0..9)
            .map(|i| h.controller.process_frame(frame(i, t0 + Duration::from_millis(20 * i))))
            .collect();
        let processed = decisions.iter().filter(|d| d.is_process()).count();

        assert_eq!(processed, 3);
        assert_eq!(decisions[2], FrameDecision::Process);
        assert_eq!(decisions[0], FrameDecision::OverBudgetSkip);
        assert_eq!(h.controller.metrics().frame_drops, 6);
    }

    #[tokio::test]
    async fn test_processed_frames_reach_detector_off_thread() {
        let h = harness();
        h.controller.initialize().await;
        h.controller.start_session(None).unwrap();

        let t0 = Instant::now();
        for i in 0..3 {
            assert!(h.platform.deliver(frame(i, t0 + Duration::from_millis(20 * i))));
            tokio::task::yield_now().await;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(h.detector.frames.load(Ordering::SeqCst), 3);
        assert_eq!(h.controller.metrics().processed_frames, 3);
    }

    #[tokio::test]
    async fn test_thermal_throttle_is_independent_of_battery() {
        let h = harness();
        h.controller.initialize().await;
        h.controller.start_session(None).unwrap();

        assert!(!h.controller.on_thermal_update(40.0));
        assert!(h.controller.on_thermal_update(47.0));
        assert!(!h.controller.on_thermal_update(48.0));

        let config = h.controller.session_config();
        assert_eq!(config.quality, Quality::Low);
        assert_eq!(config.target_fps, TargetFps::Fps30);
        assert_eq!(config.battery_mode, BatteryMode::Normal);
        assert_eq!(h.controller.metrics().temperature, Some(48.0));

        assert!(h.controller.on_battery_update(10.0));
        assert_eq!(h.controller.session_config().quality, Quality::Low);
    }

    #[tokio::test]
    async fn test_stop_detaches_persists_and_is_idempotent() {
        let h = harness();
        h.controller.initialize().await;
        h.controller.start_session(None).unwrap();
        assert!(h.platform.tracking.load(Ordering::SeqCst));

        assert!(h.controller.stop_session());
        assert!(!h.controller.stop_session());

        assert_eq!(h.controller.state(), SessionState::SessionStopped);
        assert!(!h.platform.tracking.load(Ordering::SeqCst));
        assert!(!h.platform.deliver(frame(0, Instant::now())));
        assert_eq!(h.persistence.metrics().len(), 1);
        assert_eq!(h.controller.process_frame(frame(1, Instant::now())), FrameDecision::Inactive);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_from_another_thread() {
        let h = harness();
        h.controller.initialize().await;
        h.controller.start_session(None).unwrap();

        let controller = Arc::new(h.controller);
        let stopper = Arc::clone(&controller);
        let stopped = std::thread::spawn(move || stopper.stop_session()).join().unwrap();

        assert!(stopped);
        assert!(!controller.is_active());
        assert_eq!(h.persistence.metrics().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_while_starting_leaves_nothing_running() {
        let platform = Arc::new(MockPlatform::new());
        let persistence = Arc::new(MemoryPersistence::new());
        let controller = Arc::new(CameraSessionController::new(
            ControllerConfig::default(),
            platform.clone(),
            Arc::new(CountingDetector::default()),
            persistence.clone(),
        ));
        controller.initialize().await;

        // Stop from another thread while the platform is starting tracking
        let stopped = Arc::new(AtomicBool::new(false));
        {
            let controller = Arc::downgrade(&controller);
            let stopped = Arc::clone(&stopped);
            *platform.on_start_tracking.lock() = Some(Box::new(move || {
                let result = std::thread::spawn(move || controller.upgrade().map_or(false, |c| c.stop_session()))
                    .join()
                    .unwrap_or(false);
                stopped.store(result, Ordering::SeqCst);
            }));
        }

        assert_eq!(controller.start_session(None), Err(SessionError::StoppedWhileStarting));
        assert!(stopped.load(Ordering::SeqCst));
        assert_eq!(controller.state(), SessionState::SessionStopped);
        assert!(!controller.is_active());
        assert!(!platform.tracking.load(Ordering::SeqCst));
        assert!(!platform.deliver(frame(0, Instant::now())));
        assert!(!controller.stop_session());
        assert_eq!(persistence.metrics().len(), 1);

        // Nothing is left half-started, so the next session runs normally
        controller.start_session(None).unwrap();
        assert!(platform.tracking.load(Ordering::SeqCst));
        assert!(controller.stop_session());
        assert!(!platform.tracking.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_session_can_restart_after_stop() {
        let h = harness();
        h.controller.initialize().await;
        h.controller.start_session(None).unwrap();
        h.controller.stop_session();

        h.controller.start_session(None).unwrap();
        assert_eq!(h.controller.state(), SessionState::SessionActive);
        assert!(h.platform.deliver(frame(0, Instant::now())));
    }

    #[tokio::test]
    async fn test_capture_photo_rules() {
        let h = harness();
        h.controller.initialize().await;
        assert_eq!(
            h.controller.capture_ar_photo(PhotoContext::default()).await.unwrap_err(),
            SessionError::NotActive
        );

        h.controller
            .start_session(Some(SessionConfigPatch {
                enable_photo_capture: Some(false),
                ..Default::default()
            }))
            .unwrap();
        assert_eq!(
            h.controller.capture_ar_photo(PhotoContext::default()).await.unwrap_err(),
            SessionError::PhotoCaptureDisabled
        );
        h.controller.stop_session();

        h.controller
            .start_session(Some(SessionConfigPatch {
                enable_photo_capture: Some(true),
                ..Default::default()
            }))
            .unwrap();
        let photo = h
            .controller
            .capture_ar_photo(PhotoContext {
                landmarks: vec![],
                overlay_ids: vec!["a".into()],
            })
            .await
            .unwrap();
        assert_eq!(photo.overlay_ids, vec!["a"]);
        assert_eq!(photo.image.width, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_metrics_emitted_periodically() {
        let platform = MockPlatform::new();
        *platform.temperature.lock() = Some(50.0);
        let h = harness_with(platform, MemoryPersistence::new());
        h.controller.initialize().await;
        h.controller.start_session(no_detection()).unwrap();
        h.controller.record_processing_time(Duration::from_millis(10));

        let mut rx = h.controller.subscribe_metrics();
        tokio::time::sleep(Duration::from_secs(6)).await;
        rx.changed().await.unwrap();

        assert!((rx.borrow().processing_time_ms - 1.0).abs() < 1e-9);
        assert_eq!(rx.borrow().temperature, Some(50.0));
        assert_eq!(h.controller.session_config().quality, Quality::Low);
    }
}
