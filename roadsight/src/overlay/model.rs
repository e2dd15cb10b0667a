//! Overlay entities and their typed content.

use std::time::Duration;

use crate::landmark::{Landmark, LandmarkCategory, VisibleItem};

use super::animation::{AnimatedValue, Easing};

/// Distance inside which landmarks earn a proximity bonus.
const PROXIMITY_BONUS_RANGE_METERS: f64 = 1_000.0;

/// Maximum proximity bonus, reached at zero distance.
const PROXIMITY_BONUS_MAX: f64 = 20.0;

/// Overlay type, used for styling and priority defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayKind {
    Landmark,
    Navigation,
    Game,
    Photo,
}

/// Content of a landmark (or landmark cluster) overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkContent {
    /// Identifier of the representative landmark.
    pub landmark_id: String,
    pub name: String,
    pub category: LandmarkCategory,
    pub distance_meters: f64,
    pub rating: Option<f64>,
    /// 1 for a lone landmark, more for a cluster.
    pub member_count: usize,
}

/// Content of a navigation hint overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationContent {
    /// Direction to turn, relative to the camera heading.
    pub direction_degrees: f64,
    pub distance_meters: f64,
    pub instruction: String,
}

/// Content of the active-game overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct GameContent {
    pub title: String,
    pub score: u32,
    pub progress: f64,
}

/// Content of a photo badge overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoContent {
    pub caption: String,
    pub landmark_count: usize,
}

/// Type-specific overlay payload.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayContent {
    Landmark(LandmarkContent),
    Navigation(NavigationContent),
    Game(GameContent),
    Photo(PhotoContent),
}

impl OverlayContent {
    pub fn kind(&self) -> OverlayKind {
        match self {
            OverlayContent::Landmark(_) => OverlayKind::Landmark,
            OverlayContent::Navigation(_) => OverlayKind::Navigation,
            OverlayContent::Game(_) => OverlayKind::Game,
            OverlayContent::Photo(_) => OverlayKind::Photo,
        }
    }

    /// Landmark content for a visibility entry.
    pub fn for_item(item: &VisibleItem) -> Self {
        let landmark = item.representative();
        let name = match item {
            VisibleItem::Single(_) => landmark.name.clone(),
            VisibleItem::Cluster(c) => format!("{} +{}", landmark.name, c.members().len() - 1),
        };
        OverlayContent::Landmark(LandmarkContent {
            landmark_id: landmark.id.clone(),
            name,
            category: landmark.category,
            distance_meters: landmark.distance_meters,
            rating: landmark.rating,
            member_count: item.member_count(),
        })
    }
}

/// Overlay size in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlaySize {
    pub width: f64,
    pub height: f64,
}

impl Default for OverlaySize {
    fn default() -> Self {
        Self {
            width: 180.0,
            height: 56.0,
        }
    }
}

/// Lifecycle phase of an overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayPhase {
    /// Fading/scaling in.
    Entering,
    /// Fully shown.
    Visible,
    /// Fading out; removed when the fade completes.
    Exiting,
}

/// A render entity owned by the overlay model.
#[derive(Debug, Clone)]
pub struct Overlay {
    pub id: String,
    pub content: OverlayContent,
    pub size: OverlaySize,
    /// Higher is drawn and kept preferentially.
    pub priority: i32,
    pub interactive: bool,
    pub(crate) x: AnimatedValue,
    pub(crate) y: AnimatedValue,
    pub(crate) opacity: AnimatedValue,
    pub(crate) scale: AnimatedValue,
    pub(crate) phase: OverlayPhase,
}

impl Overlay {
    /// Create an overlay at its initial (transparent, shrunken) state.
    pub(crate) fn new(
        id: String,
        content: OverlayContent,
        position: (f64, f64),
        size: OverlaySize,
        priority: i32,
    ) -> Self {
        Self {
            id,
            content,
            size,
            priority,
            interactive: true,
            x: AnimatedValue::fixed(position.0),
            y: AnimatedValue::fixed(position.1),
            opacity: AnimatedValue::fixed(0.0),
            scale: AnimatedValue::fixed(0.8),
            phase: OverlayPhase::Entering,
        }
    }

    pub fn kind(&self) -> OverlayKind {
        self.content.kind()
    }

    /// Current anchor position (center of the card).
    pub fn position(&self) -> (f64, f64) {
        (self.x.current(), self.y.current())
    }

    /// Position the overlay is moving towards.
    pub fn target_position(&self) -> (f64, f64) {
        (self.x.target(), self.y.target())
    }

    /// Current opacity in `[0, 1]`.
    pub fn opacity(&self) -> f64 {
        self.opacity.current().clamp(0.0, 1.0)
    }

    /// Current scale. May briefly exceed 1 during a spring entry.
    pub fn scale(&self) -> f64 {
        self.scale.current()
    }

    pub fn phase(&self) -> OverlayPhase {
        self.phase
    }

    /// Whether the overlay contributes anything to the frame.
    pub fn is_visible(&self) -> bool {
        self.opacity() > 0.0
    }

    pub fn is_exiting(&self) -> bool {
        self.phase == OverlayPhase::Exiting
    }

    /// Whether a screen point falls inside the scaled card.
    pub fn contains(&self, px: f64, py: f64) -> bool {
        let (x, y) = self.position();
        let half_w = self.size.width * self.scale() / 2.0;
        let half_h = self.size.height * self.scale() / 2.0;
        (px - x).abs() <= half_w && (py - y).abs() <= half_h
    }

    pub(crate) fn begin_enter(&mut self, duration: Duration) {
        self.phase = OverlayPhase::Entering;
        self.opacity.animate_to(1.0, duration, Easing::Spring);
        self.scale.animate_to(1.0, duration, Easing::Spring);
        if duration.is_zero() {
            self.phase = OverlayPhase::Visible;
        }
    }

    pub(crate) fn begin_exit(&mut self, duration: Duration) {
        self.phase = OverlayPhase::Exiting;
        self.opacity.animate_to(0.0, duration, Easing::EaseInCubic);
        self.scale.animate_to(0.8, duration, Easing::EaseInCubic);
    }

    pub(crate) fn move_to(&mut self, position: (f64, f64), duration: Duration) {
        self.x.animate_to(position.0, duration, Easing::EaseOutCubic);
        self.y.animate_to(position.1, duration, Easing::EaseOutCubic);
    }

    /// Advance every animated property. Returns `true` once an exiting
    /// overlay has fully faded.
    pub(crate) fn tick(&mut self, dt: Duration) -> bool {
        self.x.tick(dt);
        self.y.tick(dt);
        self.opacity.tick(dt);
        self.scale.tick(dt);

        match self.phase {
            OverlayPhase::Entering if !self.opacity.is_animating() => {
                self.phase = OverlayPhase::Visible;
                false
            }
            OverlayPhase::Exiting => !self.opacity.is_animating(),
            _ => false,
        }
    }

    /// Jump every animated property to its target.
    pub(crate) fn finish_animations(&mut self) {
        self.x.finish();
        self.y.finish();
        self.opacity.finish();
        self.scale.finish();
        if self.phase == OverlayPhase::Entering {
            self.phase = OverlayPhase::Visible;
        }
    }
}

/// Overlay priority for a landmark.
///
/// Historical +20, landmark +10, up to +20 for proximity (linear inside
/// 1 km), plus twice the rating.
pub fn landmark_priority(landmark: &Landmark) -> i32 {
    let mut priority = 0.0;

    match landmark.category {
        LandmarkCategory::Historical => priority += 20.0,
        LandmarkCategory::Landmark => priority += 10.0,
        _ => {}
    }

    let distance = landmark.distance_meters;
    if distance.is_finite() && distance < PROXIMITY_BONUS_RANGE_METERS {
        priority += PROXIMITY_BONUS_MAX * (1.0 - distance.max(0.0) / PROXIMITY_BONUS_RANGE_METERS);
    }

    priority += landmark.rating_or_zero() * 2.0;
    priority.round() as i32
}
