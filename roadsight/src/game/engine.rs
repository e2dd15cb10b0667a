//! Game session state machine.
//!
//! ```text
//!            start_game                 all objectives done
//! Idle ───────────────────► Playing ───────────────────────► (time bonus) ──► Idle
//!   ▲                          │
//!   └──────── end_game ────────┘   start_game while Playing ends the old game first
//! ```
//!
//! Every call returns the [`GameEvent`]s it produced so hosts can mirror
//! state without polling. Only two conditions are errors: acting without
//! an active game, and starting a game id the catalog does not know.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::landmark::{Landmark, LandmarkEvent};
use crate::persistence::{log_failure, Persistence};

use super::catalog::{default_catalog, GameTemplate, GameType};
use super::objectives::{generate_objectives, GameAction, GameObjective};

/// Contract violations reported by the game engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("No game is active")]
    NoActiveSession,

    #[error("Unknown game: {0}")]
    UnknownGame(String),
}

/// Achievements, each earned at most once per game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Achievement {
    /// Half the objectives done within the speed window.
    SpeedDemon,
    /// Every objective done with a high score.
    Perfectionist,
}

impl Achievement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Achievement::SpeedDemon => "speed_demon",
            Achievement::Perfectionist => "perfectionist",
        }
    }
}

/// Observable game state changes.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Started {
        game_id: String,
        objectives: usize,
    },
    ObjectiveCompleted {
        objective_id: String,
        points: u32,
        score: u32,
        progress: f64,
    },
    AchievementUnlocked {
        achievement: Achievement,
    },
    Completed {
        game_id: String,
        score: u32,
        time_bonus: u32,
    },
    Ended {
        game_id: String,
        score: u32,
        completed: bool,
    },
}

/// What is stored when a game ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameHistoryRecord {
    pub game_id: String,
    pub game_type: GameType,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub score: u32,
    pub progress: f64,
    pub completed: bool,
    pub objectives_completed: usize,
    pub objectives_total: usize,
    pub achievements: Vec<Achievement>,
}

/// The active game.
#[derive(Debug, Clone)]
pub struct GameSession {
    pub game_id: String,
    pub game_type: GameType,
    pub started_at: DateTime<Utc>,
    pub score: u32,
    /// Percentage of objectives completed, 0-100.
    pub progress: f64,
    pub objectives: Vec<GameObjective>,
    /// Append-only, in unlock order.
    pub achievements: Vec<Achievement>,
    pub completed: bool,
    target_duration: Duration,
    started: Instant,
    /// Added to the measured elapsed time.
    elapsed_offset: Duration,
}

impl GameSession {
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed() + self.elapsed_offset
    }

    pub fn completed_count(&self) -> usize {
        self.objectives.iter().filter(|o| o.completed).count()
    }

    pub fn all_completed(&self) -> bool {
        !self.objectives.is_empty() && self.objectives.iter().all(|o| o.completed)
    }

    fn recompute_progress(&mut self) {
        let total = self.objectives.len();
        if total > 0 {
            self.progress = self.completed_count() as f64 / total as f64 * 100.0;
        }
    }

    fn has(&self, achievement: Achievement) -> bool {
        self.achievements.contains(&achievement)
    }

    fn to_record(&self, ended_at: DateTime<Utc>) -> GameHistoryRecord {
        GameHistoryRecord {
            game_id: self.game_id.clone(),
            game_type: self.game_type,
            started_at: self.started_at,
            ended_at,
            score: self.score,
            progress: self.progress,
            completed: self.completed,
            objectives_completed: self.completed_count(),
            objectives_total: self.objectives.len(),
            achievements: self.achievements.clone(),
        }
    }
}

/// Scoring and achievement rules.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub catalog: Vec<GameTemplate>,
    /// Elapsed time under which `speed_demon` can unlock.
    pub speed_demon_window: Duration,
    /// Progress needed for `speed_demon`.
    pub speed_demon_progress: f64,
    /// Score needed for `perfectionist`.
    pub perfectionist_score: u32,
    /// Bonus when finished within half the target duration.
    pub fast_finish_bonus: u32,
    /// Bonus when finished within three quarters of the target duration.
    pub steady_finish_bonus: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            catalog: default_catalog(),
            speed_demon_window: Duration::from_secs(5 * 60),
            speed_demon_progress: 50.0,
            perfectionist_score: 150,
            fast_finish_bonus: 50,
            steady_finish_bonus: 25,
        }
    }
}

/// Runs at most one game at a time over landmark identities.
pub struct ArGameEngine {
    config: GameConfig,
    session: Option<GameSession>,
    persistence: Arc<dyn Persistence>,
}

impl std::fmt::Debug for ArGameEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArGameEngine")
            .field("games", &self.config.catalog.len())
            .field("session", &self.session.as_ref().map(|s| s.game_id.as_str()))
            .finish()
    }
}

impl ArGameEngine {
    pub fn new(config: GameConfig, persistence: Arc<dyn Persistence>) -> Self {
        Self {
            config,
            session: None,
            persistence,
        }
    }

    /// Templates whose requirements the visible landmarks satisfy.
    pub fn get_available_games(&self, landmarks: &[Landmark]) -> Vec<&GameTemplate> {
        self.config
            .catalog
            .iter()
            .filter(|t| t.requirements.is_satisfied_by(landmarks))
            .collect()
    }

    /// Start a game, ending the current one first.
    ///
    /// Requirements are not re-checked; a game with no matching landmarks
    /// simply has no objectives.
    pub fn start_game(&mut self, game_id: &str, landmarks: &[Landmark]) -> Result<Vec<GameEvent>, GameError> {
        let template = self
            .config
            .catalog
            .iter()
            .find(|t| t.id == game_id)
            .cloned()
            .ok_or_else(|| GameError::UnknownGame(game_id.to_string()))?;

        let mut events = Vec::new();
        if self.session.is_some() {
            events.extend(self.end_game()?);
        }

        let objectives = generate_objectives(template.game_type, landmarks);
        info!(
            game = %template.id,
            game_type = %template.game_type,
            objectives = objectives.len(),
            "Game started"
        );
        events.push(GameEvent::Started {
            game_id: template.id.clone(),
            objectives: objectives.len(),
        });

        self.session = Some(GameSession {
            game_id: template.id,
            game_type: template.game_type,
            started_at: Utc::now(),
            score: 0,
            progress: 0.0,
            objectives,
            achievements: Vec::new(),
            completed: false,
            target_duration: template.target_duration,
            started: Instant::now(),
            elapsed_offset: Duration::ZERO,
        });
        Ok(events)
    }

    /// Apply an action to the first matching incomplete objective.
    ///
    /// Returns no events when nothing matched. Completing the last
    /// objective adds the time bonus and ends the game.
    pub fn check_objective(&mut self, action: &GameAction) -> Result<Vec<GameEvent>, GameError> {
        let session = self.session.as_mut().ok_or(GameError::NoActiveSession)?;

        let Some(objective) = session
            .objectives
            .iter_mut()
            .find(|o| !o.completed && action.satisfies(o))
        else {
            debug!(?action, "Action matched no open objective");
            return Ok(Vec::new());
        };

        objective.completed = true;
        let objective_id = objective.id.clone();
        let points = objective.points;
        session.score += points;
        session.recompute_progress();

        let mut events = vec![GameEvent::ObjectiveCompleted {
            objective_id,
            points,
            score: session.score,
            progress: session.progress,
        }];
        evaluate_achievements(&self.config, session, &mut events);

        if session.all_completed() {
            let time_bonus = time_bonus(&self.config, session.elapsed(), session.target_duration);
            session.score += time_bonus;
            session.completed = true;
            evaluate_achievements(&self.config, session, &mut events);

            info!(
                game = %session.game_id,
                score = session.score,
                time_bonus,
                "Game completed"
            );
            events.push(GameEvent::Completed {
                game_id: session.game_id.clone(),
                score: session.score,
                time_bonus,
            });
            events.extend(self.end_game()?);
        }

        Ok(events)
    }

    /// Translate a landmark event into a game action, if a game runs.
    pub fn on_landmark_event(&mut self, event: &LandmarkEvent) -> Vec<GameEvent> {
        if self.session.is_none() {
            return Vec::new();
        }
        let landmark_id = event.landmark_id().to_string();
        let action = match event {
            LandmarkEvent::BecameVisible { .. } => GameAction::Found { landmark_id },
            LandmarkEvent::Photographed { .. } => GameAction::Photographed { landmark_id },
            LandmarkEvent::Visited { .. } => GameAction::Visited { landmark_id },
        };
        self.check_objective(&action).unwrap_or_default()
    }

    /// End the current game and store it in history.
    pub fn end_game(&mut self) -> Result<Vec<GameEvent>, GameError> {
        let session = self.session.take().ok_or(GameError::NoActiveSession)?;

        let record = session.to_record(Utc::now());
        log_failure("save_game_history", self.persistence.save_game_history(&record));

        info!(
            game = %session.game_id,
            score = session.score,
            progress = session.progress,
            completed = session.completed,
            "Game ended"
        );
        Ok(vec![GameEvent::Ended {
            game_id: session.game_id,
            score: session.score,
            completed: session.completed,
        }])
    }

    pub fn current_session(&self) -> Option<&GameSession> {
        self.session.as_ref()
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Pretend the current game started `by` earlier (for timing tests).
    #[cfg(test)]
    pub(crate) fn backdate_session(&mut self, by: Duration) {
        if let Some(session) = self.session.as_mut() {
            session.elapsed_offset += by;
        }
    }
}

fn evaluate_achievements(config: &GameConfig, session: &mut GameSession, events: &mut Vec<GameEvent>) {
    let mut unlock = |session: &mut GameSession, achievement: Achievement| {
        if !session.has(achievement) {
            session.achievements.push(achievement);
            info!(achievement = achievement.as_str(), game = %session.game_id, "Achievement unlocked");
            events.push(GameEvent::AchievementUnlocked { achievement });
        }
    };

    if session.elapsed() < config.speed_demon_window && session.progress >= config.speed_demon_progress {
        unlock(session, Achievement::SpeedDemon);
    }
    if session.score >= config.perfectionist_score && session.all_completed() {
        unlock(session, Achievement::Perfectionist);
    }
}

fn time_bonus(config: &GameConfig, elapsed: Duration, target: Duration) -> u32 {
    let ratio = elapsed.as_secs_f64() / target.as_secs_f64().max(f64::EPSILON);
    if ratio < 0.5 {
        config.fast_finish_bonus
    } else if ratio < 0.75 {
        config.steady_finish_bonus
    } else {
        0
    }
}
