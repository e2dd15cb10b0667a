//! Application composition root.
//!
//! The host constructs one [`RoadsightApp`] with its platform ports and
//! owns it; nothing in the crate is a process-wide singleton. The
//! one-session and one-game rules are enforced by the camera controller
//! and the game engine themselves.
//!
//! # Example
//!
//! ```ignore
//! use roadsight::app::{AppPorts, RoadsightApp};
//! use roadsight::config::ConfigFile;
//!
//! let config = ConfigFile::load_default()?.to_app_config();
//! let app = RoadsightApp::start(config, AppPorts {
//!     platform,
//!     poi_provider,
//!     voice,
//!     persistence: None,
//! })?;
//! ```

mod bootstrap;
mod config;
mod error;

pub use bootstrap::{AppPorts, RoadsightApp, GAME_OVERLAY_ID, PHOTO_OVERLAY_ID};
pub use config::{AppConfig, DEFAULT_VIEWPORT};
pub use error::AppError;
