//! Point-of-interest access
//!
//! The POI provider is an external, unreliable collaborator. This module
//! defines its port and wraps it in a non-blocking cached service:
//!
//! ```text
//! frame worker ──► PoiService::landmarks_near ──► moka cache (1 h TTL)
//!                        │ miss                        ▲
//!                        ▼                             │ insert on success
//!                  background fetch ──► PoiProvider ───┘
//! ```
//!
//! A cache miss never waits on the network: the caller gets the last known
//! good landmark set (possibly empty) while the fetch runs.

mod cache;

pub use cache::{PoiCacheConfig, PoiCacheKey, PoiService, PoiStats};

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::landmark::{Landmark, LandmarkCategory};

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors reported by a POI provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoiError {
    /// The provider could not be reached.
    #[error("POI provider unavailable: {0}")]
    Unavailable(String),

    /// The provider took too long to answer.
    #[error("POI request timed out")]
    Timeout,

    /// The provider answered with data that could not be used.
    #[error("Invalid POI response: {0}")]
    InvalidResponse(String),
}

/// A nearby-POI query.
#[derive(Debug, Clone, PartialEq)]
pub struct PoiRequest {
    /// Query center latitude in degrees.
    pub latitude: f64,
    /// Query center longitude in degrees.
    pub longitude: f64,
    /// Search radius in meters.
    pub radius_meters: f64,
    /// Categories to include; empty means all.
    pub categories: Vec<LandmarkCategory>,
}

/// Source of nearby points of interest.
///
/// Implementations may fail or answer late; callers always degrade to
/// cached or empty results.
pub trait PoiProvider: Send + Sync {
    /// Fetch landmarks near a position.
    fn fetch_nearby(&self, request: PoiRequest) -> BoxFuture<'_, Result<Vec<Landmark>, PoiError>>;

    /// Human-readable provider name for logging.
    fn name(&self) -> &str;
}

/// Provider serving a fixed landmark list, filtered by radius and category.
///
/// Useful for demos, replays and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticPoiProvider {
    landmarks: Vec<Landmark>,
}

impl StaticPoiProvider {
    /// Create a provider over a fixed set of landmarks.
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }
}

impl PoiProvider for StaticPoiProvider {
    fn fetch_nearby(&self, request: PoiRequest) -> BoxFuture<'_, Result<Vec<Landmark>, PoiError>> {
        Box::pin(async move {
            let center = crate::geo::GeoPoint::new(request.latitude, request.longitude);
            Ok(self
                .landmarks
                .iter()
                .filter(|l| center.distance_to(&l.location) <= request.radius_meters)
                .filter(|l| request.categories.is_empty() || request.categories.contains(&l.category))
                .cloned()
                .collect())
        })
    }

    fn name(&self) -> &str {
        "static"
    }
}
