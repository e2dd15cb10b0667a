//! Location-based games
//!
//! A small catalog of games played over whatever landmarks are nearby.
//! The engine runs one game at a time, turns landmark events (seen,
//! photographed, visited) into objective completions, scores them, and
//! writes a history record when the game ends.
//!
//! # Scoring
//!
//! | Objective   | Points |
//! |-------------|--------|
//! | Find        | 10     |
//! | Photograph  | 15     |
//! | Answer      | 20     |
//! | Visit       | 25     |
//!
//! Finishing in under half the target duration adds 50, under three
//! quarters adds 25.
//!
//! # Example
//!
//! ```ignore
//! use roadsight::game::{ArGameEngine, GameConfig};
//!
//! let mut engine = ArGameEngine::new(GameConfig::default(), persistence);
//! let games = engine.get_available_games(&nearby);
//! engine.start_game(&games[0].id.clone(), &nearby)?;
//!
//! for event in engine.on_landmark_event(&landmark_event) {
//!     ui.show(event);
//! }
//! ```

mod catalog;
mod engine;
mod objectives;

pub use catalog::{default_catalog, GameRequirements, GameTemplate, GameType};
pub use engine::{Achievement, ArGameEngine, GameConfig, GameError, GameEvent, GameHistoryRecord, GameSession};
pub use objectives::{generate_objectives, GameAction, GameObjective, ObjectiveType, PHOTO_HUNT_CATEGORIES};
