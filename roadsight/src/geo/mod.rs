//! Geodesic math helpers
//!
//! Pure functions for the distances and angles the overlay engine needs:
//! great-circle distance, initial bearing, angle wrapping and elevation.
//!
//! None of these functions validate their inputs. Non-finite coordinates
//! propagate as `NaN`; callers are expected to reject bad pose or POI data
//! upstream.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters used by the haversine formula.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A geographic position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude in meters above mean sea level, when known.
    pub altitude: Option<f64>,
}

impl GeoPoint {
    /// Create a point without altitude.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
        }
    }

    /// Create a point with a known altitude.
    pub fn with_altitude(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: Some(altitude),
        }
    }

    /// Great-circle distance to another point in meters.
    #[inline]
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        distance_meters(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }

    /// Initial bearing to another point in degrees `[0, 360)`.
    #[inline]
    pub fn bearing_to(&self, other: &GeoPoint) -> f64 {
        bearing_degrees(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }

    /// Whether both coordinates are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

/// Haversine great-circle distance between two points in meters.
///
/// # Arguments
///
/// * `lat1`, `lon1` - Origin in degrees
/// * `lat2`, `lon2` - Destination in degrees
#[inline]
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Initial great-circle bearing from the first point to the second.
///
/// Returns degrees in `[0, 360)`, where 0 = North and 90 = East.
#[inline]
pub fn bearing_degrees(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let y = d_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();

    wrap_360(y.atan2(x).to_degrees())
}

/// Wrap an angle into `(-180, 180]`.
#[inline]
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle % 360.0;
    if a <= -180.0 {
        a + 360.0
    } else if a > 180.0 {
        a - 360.0
    } else {
        a
    }
}

/// Elevation angle in degrees from the user to a target.
///
/// Flat-earth approximation (`atan2(Δalt, distance)`); good enough for the
/// sub-10 km ranges landmarks are shown at.
#[inline]
pub fn elevation_angle(user_altitude: f64, target_altitude: f64, distance_meters: f64) -> f64 {
    (target_altitude - user_altitude)
        .atan2(distance_meters)
        .to_degrees()
}

/// Arithmetic mean of a set of points.
///
/// Adequate for clusters spanning tens of meters. Altitude is averaged over
/// the points that have one. Returns `None` for an empty slice.
pub fn centroid(points: &[GeoPoint]) -> Option<GeoPoint> {
    if points.is_empty() {
        return None;
    }

    let n = points.len() as f64;
    let latitude = points.iter().map(|p| p.latitude).sum::<f64>() / n;
    let longitude = points.iter().map(|p| p.longitude).sum::<f64>() / n;

    let altitudes: Vec<f64> = points.iter().filter_map(|p| p.altitude).collect();
    let altitude = if altitudes.is_empty() {
        None
    } else {
        Some(altitudes.iter().sum::<f64>() / altitudes.len() as f64)
    };

    Some(GeoPoint {
        latitude,
        longitude,
        altitude,
    })
}

/// Wrap an angle into `[0, 360)`.
///
/// `rem_euclid` can return exactly 360.0 for tiny negative inputs, so the
/// upper bound is clamped explicitly.
#[inline]
fn wrap_360(angle: f64) -> f64 {
    let wrapped = ((angle % 360.0) + 360.0) % 360.0;
    if wrapped >= 360.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Destination point given a start, bearing and distance (spherical model).
///
/// Used to place synthetic landmarks in tests and simulations.
pub fn destination_point(origin: &GeoPoint, bearing: f64, distance: f64) -> GeoPoint {
    let delta = distance / EARTH_RADIUS_METERS;
    let theta = bearing.to_radians();
    let phi1 = origin.latitude.to_radians();
    let lambda1 = origin.longitude.to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    GeoPoint {
        latitude: phi2.to_degrees(),
        longitude: normalize_angle(lambda2.to_degrees()),
        altitude: origin.altitude,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_one_degree_latitude() {
        // One degree of latitude is ~111.2 km on a 6371 km sphere
        let d = distance_meters(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_195.0).abs() < 1.0, "got {}", d);
    }

    #[test]
    fn test_distance_is_zero_for_same_point() {
        assert_eq!(distance_meters(48.8584, 2.2945, 48.8584, 2.2945), 0.0);
    }

    #[test]
    fn test_distance_paris_london() {
        // Eiffel Tower to Big Ben, ~340 km
        let d = distance_meters(48.8584, 2.2945, 51.5007, -0.1246);
        assert!((d - 340_000.0).abs() < 5_000.0, "got {}", d);
    }

    #[test]
    fn test_bearing_cardinals() {
        assert!((bearing_degrees(0.0, 0.0, 1.0, 0.0) - 0.0).abs() < 1e-9);
        assert!((bearing_degrees(0.0, 0.0, 0.0, 1.0) - 90.0).abs() < 1e-9);
        assert!((bearing_degrees(0.0, 0.0, -1.0, 0.0) - 180.0).abs() < 1e-9);
        assert!((bearing_degrees(0.0, 0.0, 0.0, -1.0) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_angle_boundaries() {
        assert_eq!(normalize_angle(180.0), 180.0);
        assert_eq!(normalize_angle(-180.0), 180.0);
        assert_eq!(normalize_angle(540.0), 180.0);
        assert_eq!(normalize_angle(190.0), -170.0);
        assert_eq!(normalize_angle(-190.0), 170.0);
        assert_eq!(normalize_angle(0.0), 0.0);
        assert_eq!(normalize_angle(360.0), 0.0);
    }

    #[test]
    fn test_nan_propagates() {
        assert!(distance_meters(f64::NAN, 0.0, 1.0, 1.0).is_nan());
        assert!(bearing_degrees(0.0, f64::NAN, 1.0, 1.0).is_nan());
        assert!(normalize_angle(f64::NAN).is_nan());
    }

    #[test]
    fn test_elevation_angle() {
        assert!((elevation_angle(0.0, 100.0, 100.0) - 45.0).abs() < 1e-9);
        assert_eq!(elevation_angle(50.0, 50.0, 1000.0), 0.0);
        assert!(elevation_angle(100.0, 0.0, 100.0) < 0.0);
    }

    #[test]
    fn test_centroid() {
        assert!(centroid(&[]).is_none());

        let c = centroid(&[
            GeoPoint::with_altitude(10.0, 20.0, 100.0),
            GeoPoint::new(12.0, 22.0),
        ])
        .unwrap();
        assert!((c.latitude - 11.0).abs() < 1e-12);
        assert!((c.longitude - 21.0).abs() < 1e-12);
        assert_eq!(c.altitude, Some(100.0));
    }

    #[test]
    fn test_destination_point_matches_distance_and_bearing() {
        let origin = GeoPoint::new(0.0, 0.0);
        let dest = destination_point(&origin, 10.0, 200.0);

        assert!((origin.distance_to(&dest) - 200.0).abs() < 0.01);
        assert!((origin.bearing_to(&dest) - 10.0).abs() < 0.01);
    }

    // Property-based tests using proptest
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Bearing is always in [0, 360)
            #[test]
            fn prop_bearing_range(
                lat1 in -89.0f64..89.0,
                lon1 in -180.0f64..180.0,
                lat2 in -89.0f64..89.0,
                lon2 in -180.0f64..180.0,
            ) {
                let b = bearing_degrees(lat1, lon1, lat2, lon2);
                prop_assert!((0.0..360.0).contains(&b), "bearing {} out of range", b);
            }

            /// Normalized angles are always in (-180, 180]
            #[test]
            fn prop_normalize_range(angle in -10_000.0f64..10_000.0) {
                let a = normalize_angle(angle);
                prop_assert!(a > -180.0 && a <= 180.0, "angle {} -> {}", angle, a);
            }

            /// Distance is symmetric and non-negative
            #[test]
            fn prop_distance_symmetric(
                lat1 in -89.0f64..89.0,
                lon1 in -180.0f64..180.0,
                lat2 in -89.0f64..89.0,
                lon2 in -180.0f64..180.0,
            ) {
                let d1 = distance_meters(lat1, lon1, lat2, lon2);
                let d2 = distance_meters(lat2, lon2, lat1, lon1);
                prop_assert!(d1 >= 0.0);
                prop_assert!((d1 - d2).abs() < 1e-6);
            }
        }
    }
}
