//! Application composition root.
//!
//! `RoadsightApp` builds every component from an [`AppConfig`] and the
//! host's ports, wires them together and owns their background tasks.

use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::AppConfig;
use super::error::AppError;
use crate::camera::{
    ArPhoto, CameraPlatform, CameraSessionController, InitializationFailure, PhotoContext, SessionConfig,
    SessionConfigPatch, SessionState,
};
use crate::game::{ArGameEngine, GameAction, GameEvent, GameTemplate};
use crate::landmark::{Landmark, LandmarkEvent};
use crate::narration::{Narrator, VoiceSink};
use crate::overlay::{
    DrawSurface, GameContent, OverlayContent, OverlayModel, OverlayRenderer, PerformanceMode, PhotoContent,
    SharedOverlayModel,
};
use crate::persistence::{JsonFilePersistence, Persistence, PersistenceError};
use crate::pipeline::LandmarkPipeline;
use crate::poi::{PoiProvider, PoiService};
use crate::pose::{DevicePose, PoseTracker};
use crate::visibility::{LandmarkVisibilityEngine, Viewport};

/// Overlay id of the active-game status card.
pub const GAME_OVERLAY_ID: &str = "game-status";

/// Overlay id of the photo badge.
pub const PHOTO_OVERLAY_ID: &str = "photo-badge";

/// Game and photo cards outrank every landmark label.
const HUD_PRIORITY: i32 = 100;

const HUD_MARGIN: f64 = 16.0;

/// External collaborators supplied by the host.
pub struct AppPorts {
    pub platform: Arc<dyn CameraPlatform>,
    pub poi_provider: Arc<dyn PoiProvider>,
    pub voice: Arc<dyn VoiceSink>,
    /// Storage backend. `None` uses JSON files under the configured data
    /// directory.
    pub persistence: Option<Arc<dyn Persistence>>,
}

/// The assembled overlay engine.
///
/// ```text
/// CameraPlatform ──frames──► CameraSessionController ──► LandmarkPipeline
///                                                          │        │
///                                            SharedOverlayModel   LandmarkEvent broadcast
///                                                   │                 │          │
///                              render_frame ◄───────┘          game task    (host)
///                                                                 │
///                                                         GameEvent broadcast
/// ```
///
/// # Example
///
/// ```ignore
/// use roadsight::app::{AppConfig, AppPorts, RoadsightApp};
///
/// let app = RoadsightApp::start(AppConfig::default(), ports)?;
/// if app.initialize().await {
///     app.start_session(None)?;
/// }
/// app.update_pose(pose);
/// app.render_frame(frame_dt, Instant::now(), &mut surface);
/// app.shutdown().await;
/// ```
pub struct RoadsightApp {
    config: AppConfig,
    pipeline: Arc<LandmarkPipeline>,
    controller: CameraSessionController,
    games: Arc<Mutex<ArGameEngine>>,
    landmark_events: broadcast::Sender<LandmarkEvent>,
    game_events: broadcast::Sender<GameEvent>,
    narrator: Arc<Narrator>,
    renderer: OverlayRenderer,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for RoadsightApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoadsightApp")
            .field("controller", &self.controller)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

impl RoadsightApp {
    /// Build and wire all components. Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails only when the JSON persistence directory cannot be resolved or
    /// created.
    pub fn start(config: AppConfig, ports: AppPorts) -> Result<Self, AppError> {
        let persistence: Arc<dyn Persistence> = match ports.persistence {
            Some(persistence) => persistence,
            None => Arc::new(json_persistence(&config)?),
        };

        let (landmark_events, _) = broadcast::channel(config.event_capacity.max(1));
        let (game_events, _) = broadcast::channel(config.event_capacity.max(1));

        let (narrator, narration_task) = Narrator::spawn(ports.voice, config.narration_queue);

        let overlays: SharedOverlayModel = OverlayModel::new(config.overlay.clone()).into_shared();
        let pipeline = Arc::new(LandmarkPipeline::new(
            PoseTracker::with_config(config.pose.clone()),
            config.viewport,
            PoiService::new(ports.poi_provider, config.poi.clone()),
            LandmarkVisibilityEngine::new(config.visibility.clone()),
            overlays,
            landmark_events.clone(),
            Some(Arc::clone(&narrator)),
        ));

        let controller = CameraSessionController::new(
            config.controller.clone(),
            ports.platform,
            pipeline.clone(),
            Arc::clone(&persistence),
        );

        let games = Arc::new(Mutex::new(ArGameEngine::new(config.game.clone(), persistence)));
        let shutdown = CancellationToken::new();

        let game_task = tokio::spawn(run_game_events(
            landmark_events.subscribe(),
            Arc::clone(&games),
            pipeline.overlays().clone(),
            game_events.clone(),
            shutdown.clone(),
        ));

        info!(
            performance_mode = %config.overlay.performance_mode,
            poi_radius_m = config.poi.fetch_radius_meters,
            "Roadsight started"
        );

        Ok(Self {
            config,
            pipeline,
            controller,
            games,
            landmark_events,
            game_events,
            narrator,
            renderer: OverlayRenderer::default(),
            shutdown,
            tasks: vec![narration_task, game_task],
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // Camera session
    // ---------------------------------------------------------------------

    /// See [`CameraSessionController::initialize`].
    pub async fn initialize(&self) -> bool {
        self.controller.initialize().await
    }

    pub fn initialization_failure(&self) -> Option<InitializationFailure> {
        self.controller.initialization_failure()
    }

    pub fn start_session(&self, overrides: Option<SessionConfigPatch>) -> Result<SessionConfig, AppError> {
        Ok(self.controller.start_session(overrides)?)
    }

    pub fn stop_session(&self) -> bool {
        self.controller.stop_session()
    }

    pub fn session_state(&self) -> SessionState {
        self.controller.state()
    }

    pub fn controller(&self) -> &CameraSessionController {
        &self.controller
    }

    pub fn on_battery_update(&self, percent: f64) -> bool {
        self.controller.on_battery_update(percent)
    }

    pub fn on_thermal_update(&self, celsius: f64) -> bool {
        self.controller.on_thermal_update(celsius)
    }

    // ---------------------------------------------------------------------
    // Pose and overlays
    // ---------------------------------------------------------------------

    pub fn update_pose(&self, pose: DevicePose) -> bool {
        self.pipeline.update_pose(pose)
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        self.pipeline.set_viewport(viewport);
    }

    pub fn pipeline(&self) -> &Arc<LandmarkPipeline> {
        &self.pipeline
    }

    pub fn overlays(&self) -> &SharedOverlayModel {
        self.pipeline.overlays()
    }

    /// Advance animations, feed the FPS monitor and draw one frame.
    ///
    /// Returns the number of overlays drawn.
    pub fn render_frame(&self, dt: Duration, now: Instant, surface: &mut dyn DrawSurface) -> usize {
        let mut model = self.pipeline.overlays().lock();
        model.tick(dt);
        if let Some(mode) = model.record_frame(now) {
            debug!(mode = %mode, "Render path running in degraded mode");
        }
        self.renderer.render(&model, surface)
    }

    /// Raise or lower the overlay performance mode explicitly.
    pub fn set_performance_mode(&self, mode: PerformanceMode) {
        self.pipeline.overlays().lock().set_performance_mode(mode);
    }

    /// Id of the top-most interactive overlay at a screen point.
    pub fn overlay_at(&self, x: f64, y: f64) -> Option<String> {
        self.pipeline
            .overlays()
            .lock()
            .hit_test(x, y)
            .map(|o| o.id.clone())
    }

    /// Landmarks in the last visibility result, cluster members included.
    pub fn visible_landmarks(&self) -> Vec<Landmark> {
        self.pipeline.visibility().last_result().landmarks()
    }

    // ---------------------------------------------------------------------
    // Photos and visits
    // ---------------------------------------------------------------------

    /// Capture an AR photo of what is on screen.
    ///
    /// Every landmark in the photo is reported as photographed, and a
    /// photo badge is shown.
    pub async fn capture_photo(&self) -> Result<ArPhoto, AppError> {
        let context = {
            let model = self.pipeline.overlays().lock();
            PhotoContext {
                landmarks: self.visible_landmarks(),
                overlay_ids: model.render_order().iter().map(|o| o.id.clone()).collect(),
            }
        };

        let photo = self.controller.capture_ar_photo(context).await?;

        for landmark in &photo.landmarks {
            self.publish(LandmarkEvent::Photographed {
                landmark_id: landmark.id.clone(),
            });
        }

        let viewport = self.pipeline.viewport();
        self.pipeline.overlays().lock().upsert_overlay(
            PHOTO_OVERLAY_ID,
            OverlayContent::Photo(PhotoContent {
                caption: format!("Photo saved at {}", photo.captured_at.format("%H:%M")),
                landmark_count: photo.landmarks.len(),
            }),
            (viewport.width / 2.0, viewport.height - 2.0 * HUD_MARGIN),
            HUD_PRIORITY,
        );

        Ok(photo)
    }

    /// Report that the user reached a landmark.
    pub fn mark_visited(&self, landmark_id: &str) {
        self.publish(LandmarkEvent::Visited {
            landmark_id: landmark_id.to_string(),
        });
    }

    fn publish(&self, event: LandmarkEvent) {
        if self.landmark_events.send(event).is_err() {
            debug!("No landmark event subscribers");
        }
    }

    pub fn subscribe_landmark_events(&self) -> broadcast::Receiver<LandmarkEvent> {
        self.landmark_events.subscribe()
    }

    // ---------------------------------------------------------------------
    // Games
    // ---------------------------------------------------------------------

    /// Games playable with the currently visible landmarks.
    pub fn available_games(&self) -> Vec<GameTemplate> {
        let landmarks = self.visible_landmarks();
        self.games
            .lock()
            .get_available_games(&landmarks)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Start a game over the currently visible landmarks.
    pub fn start_game(&self, game_id: &str) -> Result<Vec<GameEvent>, AppError> {
        let landmarks = self.visible_landmarks();
        let events = self.games.lock().start_game(game_id, &landmarks)?;
        self.after_game_events(&events);
        Ok(events)
    }

    /// Answer a quiz question about a landmark.
    pub fn answer(&self, landmark_id: &str) -> Result<Vec<GameEvent>, AppError> {
        let events = self.games.lock().check_objective(&GameAction::Answered {
            landmark_id: landmark_id.to_string(),
        })?;
        self.after_game_events(&events);
        Ok(events)
    }

    pub fn end_game(&self) -> Result<Vec<GameEvent>, AppError> {
        let events = self.games.lock().end_game()?;
        self.after_game_events(&events);
        Ok(events)
    }

    pub fn games(&self) -> &Arc<Mutex<ArGameEngine>> {
        &self.games
    }

    pub fn subscribe_game_events(&self) -> broadcast::Receiver<GameEvent> {
        self.game_events.subscribe()
    }

    fn after_game_events(&self, events: &[GameEvent]) {
        sync_game_overlay(&self.games, self.pipeline.overlays());
        for event in events {
            let _ = self.game_events.send(event.clone());
        }
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Stop the session, end background tasks and wait for them.
    pub async fn shutdown(mut self) {
        self.controller.stop_session();
        self.shutdown.cancel();
        self.narrator.shutdown();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
        info!("Roadsight stopped");
    }
}

impl Drop for RoadsightApp {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn json_persistence(config: &AppConfig) -> Result<JsonFilePersistence, AppError> {
    let dir = config
        .data_dir
        .clone()
        .or_else(JsonFilePersistence::default_dir)
        .ok_or(AppError::NoDataDirectory)?;
    fs::create_dir_all(&dir).map_err(|source| PersistenceError::Io {
        path: dir.clone(),
        source,
    })?;
    Ok(JsonFilePersistence::new(dir))
}

/// Show, update or remove the game status card.
fn sync_game_overlay(games: &Mutex<ArGameEngine>, overlays: &SharedOverlayModel) {
    let content = games.lock().current_session().map(|s| GameContent {
        title: s.game_id.clone(),
        score: s.score,
        progress: s.progress,
    });
    let mut model = overlays.lock();
    match content {
        Some(content) => {
            model.upsert_overlay(
                GAME_OVERLAY_ID,
                OverlayContent::Game(content),
                (HUD_MARGIN + 90.0, HUD_MARGIN + 28.0),
                HUD_PRIORITY,
            );
        }
        None => {
            model.remove_overlay(GAME_OVERLAY_ID);
        }
    }
}

/// Feed landmark events to the game engine and republish its events.
async fn run_game_events(
    mut events: broadcast::Receiver<LandmarkEvent>,
    games: Arc<Mutex<ArGameEngine>>,
    overlays: SharedOverlayModel,
    game_events: broadcast::Sender<GameEvent>,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            received = events.recv() => match received {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Game engine lagged behind landmark events");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
        };

        let produced = games.lock().on_landmark_event(&event);
        if produced.is_empty() {
            continue;
        }
        sync_game_overlay(&games, &overlays);
        for game_event in produced {
            let _ = game_events.send(game_event);
        }
    }
    debug!("Game event task stopped");
}
