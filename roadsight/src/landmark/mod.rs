//! Landmark data model
//!
//! Points of interest as delivered by the POI provider, plus the per-frame
//! derived values the visibility engine attaches to them.
//!
//! # Ownership
//!
//! - Identity fields (`id`, `name`, `category`, `location`) are immutable
//!   once the POI provider delivers a landmark.
//! - Derived fields (`distance_meters`, `bearing_degrees`) are recomputed on
//!   every pose update and only the visibility engine writes them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geo::{self, GeoPoint};

/// Kind of point of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkCategory {
    Landmark,
    Historical,
    Restaurant,
    Nature,
    Entertainment,
}

impl LandmarkCategory {
    /// All categories, in declaration order.
    pub const ALL: [LandmarkCategory; 5] = [
        LandmarkCategory::Landmark,
        LandmarkCategory::Historical,
        LandmarkCategory::Restaurant,
        LandmarkCategory::Nature,
        LandmarkCategory::Entertainment,
    ];

    /// Stable identifier used in config files and objective targets.
    pub fn as_str(&self) -> &'static str {
        match self {
            LandmarkCategory::Landmark => "landmark",
            LandmarkCategory::Historical => "historical",
            LandmarkCategory::Restaurant => "restaurant",
            LandmarkCategory::Nature => "nature",
            LandmarkCategory::Entertainment => "entertainment",
        }
    }

    /// Parse a category identifier (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(value.trim()))
    }

    /// Icon glyph name drawn next to the landmark label.
    pub fn icon(&self) -> &'static str {
        match self {
            LandmarkCategory::Landmark => "pin",
            LandmarkCategory::Historical => "columns",
            LandmarkCategory::Restaurant => "fork-knife",
            LandmarkCategory::Nature => "tree",
            LandmarkCategory::Entertainment => "ticket",
        }
    }
}

impl fmt::Display for LandmarkCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point of interest near the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Stable identifier from the POI provider.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Category used for icons, ranking and game objectives.
    pub category: LandmarkCategory,
    /// Geographic position.
    pub location: GeoPoint,
    /// Distance from the user in meters (derived).
    #[serde(default)]
    pub distance_meters: f64,
    /// Bearing from the user in degrees `[0, 360)` (derived).
    #[serde(default)]
    pub bearing_degrees: f64,
    /// Provider confidence in the POI (0-1).
    pub confidence: f64,
    /// User rating (0-5), when the provider has one.
    #[serde(default)]
    pub rating: Option<f64>,
    /// Optional historical blurb used by narration and quiz games.
    #[serde(default)]
    pub historical_info: Option<String>,
}

impl Landmark {
    /// Create a landmark with full confidence and no derived data yet.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: LandmarkCategory,
        location: GeoPoint,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            location,
            distance_meters: 0.0,
            bearing_degrees: 0.0,
            confidence: 1.0,
            rating: None,
            historical_info: None,
        }
    }

    /// Set the rating (clamped to 0-5).
    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating.clamp(0.0, 5.0));
        self
    }

    /// Set the provider confidence (clamped to 0-1).
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Attach historical information.
    pub fn with_historical_info(mut self, info: impl Into<String>) -> Self {
        self.historical_info = Some(info.into());
        self
    }

    /// Rating used for ranking; unrated landmarks rank as 0.
    pub fn rating_or_zero(&self) -> f64 {
        self.rating.unwrap_or(0.0)
    }

    /// Recompute distance and bearing relative to the user position.
    pub(crate) fn refresh_relative_to(&mut self, user: &GeoPoint) {
        self.distance_meters = user.distance_to(&self.location);
        self.bearing_degrees = user.bearing_to(&self.location);
    }
}

/// Where a landmark lands on screen for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenProjection {
    /// Horizontal position in viewport pixels (0 = left edge).
    pub x: f64,
    /// Vertical position in viewport pixels (0 = top edge).
    pub y: f64,
    /// Whether the point is inside the camera field of view.
    pub visible: bool,
    /// Elevation angle from the user in degrees.
    pub elevation_angle: f64,
    /// Bearing relative to the camera heading, `(-180, 180]`.
    pub relative_bearing: f64,
}

/// A landmark that survived field-of-view culling.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleLandmark {
    pub landmark: Landmark,
    pub projection: ScreenProjection,
}

/// Landmarks close enough together to share one overlay.
///
/// Always has at least one member; build it with [`Self::from_members`].
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkCluster {
    /// Synthesized identifier, derived from the seed member.
    pub id: String,
    /// Geometric centroid of the members.
    pub centroid: GeoPoint,
    /// Shared screen position (projection of the centroid).
    pub projection: ScreenProjection,
    members: Vec<VisibleLandmark>,
    representative: usize,
}

impl LandmarkCluster {
    /// Build a cluster placed where `project` puts its centroid.
    ///
    /// When the centroid projects outside the view, the cluster sits at the
    /// mean of its member projections instead. Returns `None` when empty.
    pub fn from_members(
        members: Vec<VisibleLandmark>,
        project: impl FnOnce(&GeoPoint) -> Option<ScreenProjection>,
    ) -> Option<Self> {
        let seed = members.first()?;
        let id = format!("cluster:{}", seed.landmark.id);

        let points: Vec<GeoPoint> = members.iter().map(|m| m.landmark.location).collect();
        let centroid = geo::centroid(&points)?;
        let projection = project(&centroid).unwrap_or_else(|| mean_projection(&members));
        let representative = best_member(&members);

        Some(Self {
            id,
            centroid,
            projection,
            members,
            representative,
        })
    }

    /// Members in input order; the first one seeded the cluster.
    pub fn members(&self) -> &[VisibleLandmark] {
        &self.members
    }

    /// The member that speaks for the cluster: best rated, then nearest.
    pub fn representative(&self) -> &VisibleLandmark {
        &self.members[self.representative]
    }
}

fn mean_projection(members: &[VisibleLandmark]) -> ScreenProjection {
    let n = members.len().max(1) as f64;
    let (mut x, mut y, mut elevation, mut bearing) = (0.0, 0.0, 0.0, 0.0);
    for member in members {
        x += member.projection.x;
        y += member.projection.y;
        elevation += member.projection.elevation_angle;
        bearing += member.projection.relative_bearing;
    }
    ScreenProjection {
        x: x / n,
        y: y / n,
        visible: true,
        elevation_angle: elevation / n,
        relative_bearing: bearing / n,
    }
}

fn best_member(members: &[VisibleLandmark]) -> usize {
    let mut best = 0;
    for (index, member) in members.iter().enumerate().skip(1) {
        let candidate = &member.landmark;
        let current = &members[best].landmark;
        let (rating_a, rating_b) = (candidate.rating_or_zero(), current.rating_or_zero());
        if rating_a > rating_b || (rating_a == rating_b && candidate.distance_meters < current.distance_meters) {
            best = index;
        }
    }
    best
}

/// One entry of the visibility result: either a lone landmark or a cluster.
#[derive(Debug, Clone, PartialEq)]
pub enum VisibleItem {
    Single(VisibleLandmark),
    Cluster(LandmarkCluster),
}

impl VisibleItem {
    /// Identifier used to key overlays.
    pub fn id(&self) -> &str {
        match self {
            VisibleItem::Single(v) => &v.landmark.id,
            VisibleItem::Cluster(c) => &c.id,
        }
    }

    /// The landmark whose attributes drive ranking and labels.
    pub fn representative(&self) -> &Landmark {
        match self {
            VisibleItem::Single(v) => &v.landmark,
            VisibleItem::Cluster(c) => &c.representative().landmark,
        }
    }

    /// Screen projection for the overlay anchor.
    pub fn projection(&self) -> &ScreenProjection {
        match self {
            VisibleItem::Single(v) => &v.projection,
            VisibleItem::Cluster(c) => &c.projection,
        }
    }

    /// Number of landmarks behind this entry.
    pub fn member_count(&self) -> usize {
        match self {
            VisibleItem::Single(_) => 1,
            VisibleItem::Cluster(c) => c.members().len(),
        }
    }

    /// Identifiers of every landmark behind this entry.
    pub fn landmark_ids(&self) -> Vec<&str> {
        match self {
            VisibleItem::Single(v) => vec![v.landmark.id.as_str()],
            VisibleItem::Cluster(c) => c.members().iter().map(|m| m.landmark.id.as_str()).collect(),
        }
    }

    /// Every landmark behind this entry.
    pub fn landmarks(&self) -> Vec<&Landmark> {
        match self {
            VisibleItem::Single(v) => vec![&v.landmark],
            VisibleItem::Cluster(c) => c.members().iter().map(|m| &m.landmark).collect(),
        }
    }
}

/// Landmark lifecycle notifications consumed by the game engine and narration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LandmarkEvent {
    /// The landmark entered the visible set this update cycle.
    BecameVisible { landmark_id: String, name: String },
    /// The user took an AR photo containing the landmark.
    Photographed { landmark_id: String },
    /// The user reached the landmark.
    Visited { landmark_id: String },
}

impl LandmarkEvent {
    /// Identifier of the landmark the event is about.
    pub fn landmark_id(&self) -> &str {
        match self {
            LandmarkEvent::BecameVisible { landmark_id, .. }
            | LandmarkEvent::Photographed { landmark_id }
            | LandmarkEvent::Visited { landmark_id } => landmark_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visible(id: &str, rating: Option<f64>, distance: f64, x: f64) -> VisibleLandmark {
        let mut landmark = Landmark::new(id, id, LandmarkCategory::Landmark, GeoPoint::new(0.0, 0.0));
        landmark.rating = rating;
        landmark.distance_meters = distance;
        VisibleLandmark {
            landmark,
            projection: ScreenProjection {
                x,
                y: 100.0,
                visible: true,
                elevation_angle: 0.0,
                relative_bearing: 0.0,
            },
        }
    }

    #[test]
    fn test_category_parse_roundtrip() {
        for category in LandmarkCategory::ALL {
            assert_eq!(LandmarkCategory::parse(category.as_str()), Some(category));
        }
        assert_eq!(LandmarkCategory::parse(" Nature "), Some(LandmarkCategory::Nature));
        assert_eq!(LandmarkCategory::parse("castle"), None);
    }

    #[test]
    fn test_builders_clamp() {
        let l = Landmark::new("a", "A", LandmarkCategory::Nature, GeoPoint::new(0.0, 0.0))
            .with_rating(7.0)
            .with_confidence(-1.0);
        assert_eq!(l.rating, Some(5.0));
        assert_eq!(l.confidence, 0.0);
    }

    #[test]
    fn test_refresh_relative_to() {
        let mut l = Landmark::new("a", "A", LandmarkCategory::Nature, GeoPoint::new(0.001, 0.0));
        l.refresh_relative_to(&GeoPoint::new(0.0, 0.0));
        assert!((l.distance_meters - 111.19).abs() < 0.1);
        assert!(l.bearing_degrees.abs() < 1e-9);
    }

    fn at_x(x: f64) -> impl FnOnce(&GeoPoint) -> Option<ScreenProjection> {
        move |_| {
            Some(ScreenProjection {
                x,
                y: 50.0,
                visible: true,
                elevation_angle: 0.0,
                relative_bearing: 0.0,
            })
        }
    }

    #[test]
    fn test_cluster_is_placed_at_projected_centroid() {
        let mut a = visible("a", None, 10.0, 100.0);
        a.landmark.location = GeoPoint::new(0.0, 0.0);
        let mut b = visible("b", None, 20.0, 200.0);
        b.landmark.location = GeoPoint::new(0.002, 0.004);

        let mut projected = None;
        let cluster = LandmarkCluster::from_members(vec![a, b], |centroid| {
            projected = Some(*centroid);
            at_x(321.0)(centroid)
        })
        .unwrap();

        assert_eq!(cluster.id, "cluster:a");
        assert_eq!(projected, Some(GeoPoint::new(0.001, 0.002)));
        assert_eq!(cluster.centroid, GeoPoint::new(0.001, 0.002));
        assert_eq!(cluster.projection.x, 321.0);
        assert!(LandmarkCluster::from_members(Vec::new(), at_x(0.0)).is_none());
    }

    #[test]
    fn test_cluster_off_screen_centroid_falls_back_to_member_mean() {
        let cluster = LandmarkCluster::from_members(
            vec![visible("a", None, 10.0, 100.0), visible("b", None, 20.0, 200.0)],
            |_| None,
        )
        .unwrap();

        assert_eq!(cluster.projection.x, 150.0);
        assert_eq!(cluster.projection.y, 100.0);
    }

    #[test]
    fn test_cluster_representative_prefers_rating_then_distance() {
        let cluster = LandmarkCluster::from_members(
            vec![
                visible("a", Some(3.0), 10.0, 0.0),
                visible("b", Some(4.5), 30.0, 0.0),
                visible("c", Some(4.5), 20.0, 0.0),
            ],
            at_x(0.0),
        )
        .unwrap();

        assert_eq!(cluster.representative().landmark.id, "c");
    }

    #[test]
    fn test_visible_item_accessors() {
        let single = VisibleItem::Single(visible("a", None, 10.0, 5.0));
        assert_eq!(single.id(), "a");
        assert_eq!(single.member_count(), 1);

        let cluster = VisibleItem::Cluster(
            LandmarkCluster::from_members(
                vec![visible("a", None, 10.0, 0.0), visible("b", None, 20.0, 0.0)],
                at_x(0.0),
            )
            .unwrap(),
        );
        assert_eq!(cluster.member_count(), 2);
        assert_eq!(cluster.landmark_ids(), vec!["a", "b"]);
    }
}
