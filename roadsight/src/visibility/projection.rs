//! Field-of-view culling and screen projection.
//!
//! Angles are mapped linearly onto the viewport: the horizontal half-FOV
//! spans half the viewport width, the vertical half-FOV half its height.
//! Points exactly on the FOV edge are kept, in both directions.

use crate::geo::{elevation_angle, normalize_angle, GeoPoint};
use crate::landmark::{Landmark, ScreenProjection};
use crate::pose::CameraOrientation;

use super::config::{Viewport, VisibilityConfig};

/// Project a landmark whose distance and bearing are already up to date.
///
/// # Arguments
///
/// * `landmark` - Landmark with fresh `distance_meters`/`bearing_degrees`
/// * `user_altitude` - User altitude in meters (0 when unknown)
/// * `orientation` - Camera heading and pitch
/// * `viewport` - Target screen size
/// * `config` - Field-of-view configuration
///
/// # Returns
///
/// `Some(projection)` if the landmark is inside the field of view.
pub fn project_landmark(
    landmark: &Landmark,
    user_altitude: f64,
    orientation: &CameraOrientation,
    viewport: &Viewport,
    config: &VisibilityConfig,
) -> Option<ScreenProjection> {
    project(
        landmark.bearing_degrees,
        landmark.distance_meters,
        landmark.location.altitude,
        user_altitude,
        orientation,
        viewport,
        config,
    )
}

/// Project an arbitrary point (a cluster centroid) seen from `user`.
pub fn project_point(
    point: &GeoPoint,
    user: &GeoPoint,
    user_altitude: f64,
    orientation: &CameraOrientation,
    viewport: &Viewport,
    config: &VisibilityConfig,
) -> Option<ScreenProjection> {
    project(
        user.bearing_to(point),
        user.distance_to(point),
        point.altitude,
        user_altitude,
        orientation,
        viewport,
        config,
    )
}

fn project(
    bearing: f64,
    distance: f64,
    altitude: Option<f64>,
    user_altitude: f64,
    orientation: &CameraOrientation,
    viewport: &Viewport,
    config: &VisibilityConfig,
) -> Option<ScreenProjection> {
    let half_h = config.half_horizontal_fov();
    let half_v = config.half_vertical_fov();

    let relative_bearing = normalize_angle(bearing - orientation.heading);
    // NaN comparisons are false, so NaN must be rejected explicitly
    if !relative_bearing.is_finite() || relative_bearing.abs() > half_h {
        return None;
    }

    // Points without altitude are assumed level with the user
    let target_altitude = altitude.unwrap_or(user_altitude);
    let elevation = elevation_angle(user_altitude, target_altitude, distance);
    let relative_elevation = elevation - orientation.pitch;
    if !relative_elevation.is_finite() || relative_elevation.abs() > half_v {
        return None;
    }

    let (cx, cy) = viewport.center();
    let x = cx + (relative_bearing / half_h) * cx;
    let y = cy - (relative_elevation / half_v) * cy;

    Some(ScreenProjection {
        x,
        y,
        visible: true,
        elevation_angle: elevation,
        relative_bearing,
    })
}
