//! Roadsight - augmented-reality landmark overlays for road trips
//!
//! Turns a live camera feed, the device pose and a list of nearby points
//! of interest into positioned, prioritized and animated screen overlays,
//! within the device's frame, battery and thermal budget. A small game
//! engine runs on top of the landmarks the user sees, photographs and
//! visits.
//!
//! The crate never touches pixels or the network directly: camera, POI
//! source, voice, storage and drawing surface are ports supplied by the
//! host (see [`app::AppPorts`]).

pub mod app;
pub mod camera;
pub mod config;
pub mod game;
pub mod geo;
pub mod landmark;
pub mod logging;
pub mod narration;
pub mod overlay;
pub mod persistence;
pub mod pipeline;
pub mod poi;
pub mod pose;
pub mod visibility;

pub use app::{AppConfig, AppError, AppPorts, RoadsightApp};
pub use landmark::{Landmark, LandmarkCategory, LandmarkEvent};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
