//! Overlay model and renderer
//!
//! Owns the on-screen overlay pool, animates overlays in and out, keeps the
//! pool within the performance budget and turns it into draw commands.
//!
//! ```text
//! VisibilityResult ──► OverlayModel::sync_with_visibility
//!                            │   (create / smooth / exit / evict)
//!                            ▼
//!   frame tick ──────► OverlayModel::tick ──► OverlayRenderer::render ──► DrawSurface
//!                            │
//!                            └── record_frame ──► FpsMonitor ──► mode downgrade
//! ```
//!
//! # Example
//!
//! ```ignore
//! use roadsight::overlay::{OverlayModel, OverlayRenderer, RecordingSurface};
//!
//! let mut model = OverlayModel::with_defaults();
//! model.sync_with_visibility(&result.items);
//! model.tick(Duration::from_millis(16));
//!
//! let mut surface = RecordingSurface::new();
//! OverlayRenderer::default().render(&model, &mut surface);
//! ```

mod animation;
mod model;
mod performance;
mod pool;
mod raster;
mod renderer;

pub use animation::{AnimatedValue, Easing};
pub use model::{
    landmark_priority, GameContent, LandmarkContent, NavigationContent, Overlay, OverlayContent,
    OverlayKind, OverlayPhase, OverlaySize, PhotoContent,
};
pub use performance::{FpsMonitor, PerformanceMode, DEFAULT_FPS_FLOOR, DEFAULT_FPS_WINDOW};
pub use pool::{
    OverlayConfig, OverlayModel, SharedOverlayModel, SyncReport, DEFAULT_ENTER_DURATION,
    DEFAULT_EXIT_DURATION, DEFAULT_POSITION_SMOOTHING,
};
pub use raster::PixmapSurface;
pub use renderer::{
    format_distance, DrawCommand, DrawSurface, OverlayRenderer, RecordingSurface, RendererStyle, Rgba,
};
