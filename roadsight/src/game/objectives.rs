//! Objective generation and action matching.

use serde::{Deserialize, Serialize};

use crate::landmark::{Landmark, LandmarkCategory};

use super::catalog::GameType;

/// Landmarks turned into "find" objectives by a scavenger hunt.
const SCAVENGER_OBJECTIVES: usize = 5;

/// Landmarks turned into questions by a quiz.
const QUIZ_OBJECTIVES: usize = 3;

/// Historical landmarks turned into "visit" objectives by time travel.
const TIME_TRAVEL_OBJECTIVES: usize = 3;

/// Categories a photo hunt asks for, one objective each.
pub const PHOTO_HUNT_CATEGORIES: [LandmarkCategory; 3] = [
    LandmarkCategory::Landmark,
    LandmarkCategory::Nature,
    LandmarkCategory::Historical,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveType {
    Find,
    Photograph,
    Answer,
    Visit,
}

impl ObjectiveType {
    /// Points awarded on completion.
    pub fn points(&self) -> u32 {
        match self {
            ObjectiveType::Find => 10,
            ObjectiveType::Photograph => 15,
            ObjectiveType::Answer => 20,
            ObjectiveType::Visit => 25,
        }
    }
}

/// One thing to do in a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameObjective {
    pub id: String,
    pub objective_type: ObjectiveType,
    /// Landmark id, or a category name for photo objectives.
    pub target: String,
    pub description: String,
    pub completed: bool,
    pub points: u32,
}

impl GameObjective {
    fn new(index: usize, objective_type: ObjectiveType, target: &str, description: String) -> Self {
        Self {
            id: format!("objective-{}", index + 1),
            objective_type,
            target: target.to_string(),
            description,
            completed: false,
            points: objective_type.points(),
        }
    }
}

/// Something the user did that may complete an objective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameAction {
    Found { landmark_id: String },
    Photographed { landmark_id: String },
    Answered { landmark_id: String },
    Visited { landmark_id: String },
}

impl GameAction {
    /// Whether this action completes `objective` (ignoring completion state).
    ///
    /// Photos satisfy any photograph objective; everything else needs the
    /// same target.
    pub fn satisfies(&self, objective: &GameObjective) -> bool {
        match (self, objective.objective_type) {
            (GameAction::Found { landmark_id }, ObjectiveType::Find)
            | (GameAction::Answered { landmark_id }, ObjectiveType::Answer)
            | (GameAction::Visited { landmark_id }, ObjectiveType::Visit) => *landmark_id == objective.target,
            (GameAction::Photographed { .. }, ObjectiveType::Photograph) => true,
            _ => false,
        }
    }
}

/// Objectives for a game type, in a deterministic order.
pub fn generate_objectives(game_type: GameType, landmarks: &[Landmark]) -> Vec<GameObjective> {
    match game_type {
        GameType::Scavenger => landmarks
            .iter()
            .take(SCAVENGER_OBJECTIVES)
            .enumerate()
            .map(|(i, l)| GameObjective::new(i, ObjectiveType::Find, &l.id, format!("Find {}", l.name)))
            .collect(),
        GameType::LandmarkQuiz => landmarks
            .iter()
            .take(QUIZ_OBJECTIVES)
            .enumerate()
            .map(|(i, l)| {
                GameObjective::new(
                    i,
                    ObjectiveType::Answer,
                    &l.id,
                    format!("Answer a question about {}", l.name),
                )
            })
            .collect(),
        GameType::PhotoHunt => PHOTO_HUNT_CATEGORIES
            .iter()
            .enumerate()
            .map(|(i, c)| {
                GameObjective::new(
                    i,
                    ObjectiveType::Photograph,
                    c.as_str(),
                    format!("Photograph a {} spot", c.as_str()),
                )
            })
            .collect(),
        GameType::TimeTravel => landmarks
            .iter()
            .filter(|l| l.category == LandmarkCategory::Historical)
            .take(TIME_TRAVEL_OBJECTIVES)
            .enumerate()
            .map(|(i, l)| GameObjective::new(i, ObjectiveType::Visit, &l.id, format!("Visit {}", l.name)))
            .collect(),
    }
}
