//! Landmark visibility engine
//!
//! Converts raw POIs plus the user pose into ranked, clustered screen-space
//! entries for the overlay model.
//!
//! # Pipeline
//!
//! ```text
//! POIs ──► refresh distance/bearing ──► FOV cull + project ──► cluster ──► rank + cap
//!                                                                             │
//!                                          newly visible / announcement ◄─────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use roadsight::visibility::{LandmarkVisibilityEngine, Viewport};
//!
//! let engine = LandmarkVisibilityEngine::with_defaults();
//! let update = engine.update(&pose, Viewport::new(390.0, 844.0), &landmarks, Instant::now());
//! for item in &update.result.items {
//!     println!("{} at ({:.0}, {:.0})", item.id(), item.projection().x, item.projection().y);
//! }
//! ```

mod cluster;
mod config;
mod engine;
mod projection;
mod ranking;

pub use cluster::cluster_landmarks;
pub use config::{
    Viewport, VisibilityConfig, DEFAULT_CLUSTER_RADIUS_METERS, DEFAULT_HORIZONTAL_FOV,
    DEFAULT_MAX_LANDMARKS_VISIBLE, DEFAULT_UPDATE_INTERVAL, DEFAULT_VERTICAL_FOV,
};
pub use engine::{LandmarkVisibilityEngine, VisibilityResult, VisibilityUpdate};
pub use projection::{project_landmark, project_point};
pub use ranking::{compare_priority, rank_and_truncate};
