//! Game templates and availability rules.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::landmark::{Landmark, LandmarkCategory};

/// Kind of game, which drives objective generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    Scavenger,
    LandmarkQuiz,
    PhotoHunt,
    TimeTravel,
}

impl GameType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::Scavenger => "scavenger",
            GameType::LandmarkQuiz => "landmark_quiz",
            GameType::PhotoHunt => "photo_hunt",
            GameType::TimeTravel => "time_travel",
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the visible landmarks must offer for a game to be offered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRequirements {
    pub min_landmarks: usize,
    /// At least one visible landmark must have one of these categories.
    /// Empty means no category requirement.
    pub any_of_categories: Vec<LandmarkCategory>,
}

impl GameRequirements {
    pub fn is_satisfied_by(&self, landmarks: &[Landmark]) -> bool {
        landmarks.len() >= self.min_landmarks
            && (self.any_of_categories.is_empty()
                || landmarks
                    .iter()
                    .any(|l| self.any_of_categories.contains(&l.category)))
    }
}

/// A game the user can start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
    pub game_type: GameType,
    pub requirements: GameRequirements,
    /// Intended play time; drives the completion time bonus.
    pub target_duration: Duration,
}

impl GameTemplate {
    fn new(
        id: &str,
        name: &str,
        description: &str,
        game_type: GameType,
        min_landmarks: usize,
        any_of_categories: Vec<LandmarkCategory>,
        target_minutes: u64,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            game_type,
            requirements: GameRequirements {
                min_landmarks,
                any_of_categories,
            },
            target_duration: Duration::from_secs(target_minutes * 60),
        }
    }
}

/// The built-in game catalog.
pub fn default_catalog() -> Vec<GameTemplate> {
    vec![
        GameTemplate::new(
            "landmark_hunter",
            "Landmark Hunter",
            "Spot the landmarks around you",
            GameType::Scavenger,
            3,
            vec![],
            15,
        ),
        GameTemplate::new(
            "history_quiz",
            "History Quiz",
            "Answer questions about nearby landmarks",
            GameType::LandmarkQuiz,
            3,
            vec![],
            10,
        ),
        GameTemplate::new(
            "photo_safari",
            "Photo Safari",
            "Photograph landmarks, nature and history",
            GameType::PhotoHunt,
            2,
            vec![LandmarkCategory::Nature, LandmarkCategory::Landmark],
            20,
        ),
        GameTemplate::new(
            "time_traveler",
            "Time Traveler",
            "Visit the historical sites along the way",
            GameType::TimeTravel,
            1,
            vec![LandmarkCategory::Historical],
            30,
        ),
    ]
}
