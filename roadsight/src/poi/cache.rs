//! Quantized, TTL-bounded POI cache with background refresh.
//!
//! Keys are the query position rounded to three decimal places (~110 m),
//! so nearby poses share one fetch. Entries expire after an hour.
//!
//! # Why moka?
//!
//! Lookups happen on the frame worker while fetch completions insert from
//! spawned tasks. `moka::future::Cache` handles concurrent access and TTL
//! expiry without an external lock.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::{PoiError, PoiProvider, PoiRequest};
use crate::landmark::{Landmark, LandmarkCategory};

/// Default time-to-live for cached POI sets.
pub const DEFAULT_POI_TTL: Duration = Duration::from_secs(60 * 60);

/// Default search radius for POI fetches.
pub const DEFAULT_FETCH_RADIUS_METERS: f64 = 2_000.0;

/// Default upper bound on a single provider call.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Cache key: position quantized to 10⁻³ degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoiCacheKey {
    lat_milli: i64,
    lon_milli: i64,
}

impl PoiCacheKey {
    /// Quantize a position into a cache key.
    pub fn from_coordinates(latitude: f64, longitude: f64) -> Self {
        Self {
            lat_milli: (latitude * 1_000.0).round() as i64,
            lon_milli: (longitude * 1_000.0).round() as i64,
        }
    }

    /// Center of the quantization cell `(lat, lon)`.
    pub fn center(&self) -> (f64, f64) {
        (
            self.lat_milli as f64 / 1_000.0,
            self.lon_milli as f64 / 1_000.0,
        )
    }
}

/// Configuration for the POI service.
#[derive(Debug, Clone)]
pub struct PoiCacheConfig {
    /// How long a fetched set stays valid.
    pub ttl: Duration,
    /// Maximum number of cached cells.
    pub max_entries: u64,
    /// Search radius passed to the provider.
    pub fetch_radius_meters: f64,
    /// Categories passed to the provider; empty means all.
    pub categories: Vec<LandmarkCategory>,
    /// Upper bound on a single provider call.
    pub fetch_timeout: Duration,
}

impl Default for PoiCacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_POI_TTL,
            max_entries: 256,
            fetch_radius_meters: DEFAULT_FETCH_RADIUS_METERS,
            categories: Vec::new(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// Point-in-time counters for the POI service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoiStats {
    pub hits: u64,
    pub misses: u64,
    pub fetches: u64,
    pub fetch_failures: u64,
}

/// Non-blocking cached access to the POI provider.
pub struct PoiService {
    provider: Arc<dyn PoiProvider>,
    cache: Cache<PoiCacheKey, Arc<Vec<Landmark>>>,
    config: PoiCacheConfig,
    /// Result of the most recent successful lookup or fetch.
    last_known_good: Mutex<Arc<Vec<Landmark>>>,
    /// Cells with a fetch currently running.
    in_flight: Mutex<HashSet<PoiCacheKey>>,
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    fetch_failures: AtomicU64,
}

impl std::fmt::Debug for PoiService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoiService")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .field("entries", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl PoiService {
    /// Create a service around a provider.
    pub fn new(provider: Arc<dyn PoiProvider>, config: PoiCacheConfig) -> Arc<Self> {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .build();

        Arc::new(Self {
            provider,
            cache,
            config,
            last_known_good: Mutex::new(Arc::new(Vec::new())),
            in_flight: Mutex::new(HashSet::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
        })
    }

    /// Landmarks near a position, without waiting on the network.
    ///
    /// On a cache hit the cached set is returned. On a miss a background
    /// fetch is started (unless one is already running for the cell) and
    /// the last known good set is returned immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn landmarks_near(self: &Arc<Self>, latitude: f64, longitude: f64) -> Arc<Vec<Landmark>> {
        if !latitude.is_finite() || !longitude.is_finite() {
            debug!("Non-finite POI query position, serving last known landmarks");
            return self.last_known_good();
        }

        let key = PoiCacheKey::from_coordinates(latitude, longitude);
        if let Some(landmarks) = self.cache.get(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            *self.last_known_good.lock() = Arc::clone(&landmarks);
            return landmarks;
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.spawn_fetch(key, latitude, longitude);
        self.last_known_good()
    }

    /// Fetch and cache a position, waiting for the provider.
    ///
    /// Used to warm the cache at session start. Failures leave the cache
    /// untouched.
    pub async fn fetch_now(&self, latitude: f64, longitude: f64) -> Result<Arc<Vec<Landmark>>, PoiError> {
        let key = PoiCacheKey::from_coordinates(latitude, longitude);
        self.fetch_and_store(key, self.request_for(latitude, longitude)).await
    }

    /// The most recent successfully obtained landmark set.
    pub fn last_known_good(&self) -> Arc<Vec<Landmark>> {
        Arc::clone(&self.last_known_good.lock())
    }

    /// Whether any background fetch is running.
    pub fn is_fetching(&self) -> bool {
        !self.in_flight.lock().is_empty()
    }

    /// Snapshot of the service counters.
    pub fn stats(&self) -> PoiStats {
        PoiStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
        }
    }

    /// Drop every cached cell.
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    fn request_for(&self, latitude: f64, longitude: f64) -> PoiRequest {
        PoiRequest {
            latitude,
            longitude,
            radius_meters: self.config.fetch_radius_meters,
            categories: self.config.categories.clone(),
        }
    }

    fn spawn_fetch(self: &Arc<Self>, key: PoiCacheKey, latitude: f64, longitude: f64) {
        if !self.in_flight.lock().insert(key) {
            return;
        }

        let service = Arc::clone(self);
        let request = self.request_for(latitude, longitude);
        tokio::spawn(async move {
            // Errors are already logged and counted
            let _ = service.fetch_and_store(key, request).await;
            service.in_flight.lock().remove(&key);
        });
    }

    async fn fetch_and_store(
        &self,
        key: PoiCacheKey,
        request: PoiRequest,
    ) -> Result<Arc<Vec<Landmark>>, PoiError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);

        let outcome = tokio::time::timeout(
            self.config.fetch_timeout,
            self.provider.fetch_nearby(request),
        )
        .await
        .unwrap_or(Err(PoiError::Timeout));

        match outcome {
            Ok(landmarks) => {
                let landmarks = Arc::new(landmarks);
                self.cache.insert(key, Arc::clone(&landmarks)).await;
                *self.last_known_good.lock() = Arc::clone(&landmarks);
                info!(
                    provider = self.provider.name(),
                    count = landmarks.len(),
                    cell = ?key.center(),
                    "Fetched nearby landmarks"
                );
                Ok(landmarks)
            }
            Err(e) => {
                self.fetch_failures.fetch_add(1, Ordering::Relaxed);
                debug!(
                    provider = self.provider.name(),
                    error = %e,
                    "POI fetch failed, keeping previous landmarks"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::poi::BoxFuture;

    struct CountingProvider {
        calls: AtomicU64,
        fail: bool,
    }

    impl CountingProvider {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU64::new(0),
                fail,
            })
        }
    }

    impl PoiProvider for CountingProvider {
        fn fetch_nearby(&self, request: PoiRequest) -> BoxFuture<'_, Result<Vec<Landmark>, PoiError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    return Err(PoiError::Unavailable("offline".into()));
                }
                Ok(vec![Landmark::new(
                    "tower",
                    "Tower",
                    LandmarkCategory::Landmark,
                    GeoPoint::new(request.latitude + 0.001, request.longitude),
                )])
            })
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    async fn wait_idle(service: &PoiService) {
        for _ in 0..200 {
            if !service.is_fetching() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("background fetch did not finish");
    }

    #[test]
    fn test_key_quantization() {
        let a = PoiCacheKey::from_coordinates(48.85841, 2.29441);
        let b = PoiCacheKey::from_coordinates(48.85849, 2.29449);
        let c = PoiCacheKey::from_coordinates(48.8600, 2.2944);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.center(), (48.858, 2.294));
    }

    #[tokio::test]
    async fn test_miss_returns_previous_then_background_fill() {
        let provider = CountingProvider::new(false);
        let service = PoiService::new(provider.clone(), PoiCacheConfig::default());

        let first = service.landmarks_near(10.0, 20.0).await;
        assert!(first.is_empty(), "miss must not wait for the fetch");

        wait_idle(&service).await;

        let second = service.landmarks_near(10.0, 20.0).await;
        assert_eq!(second.len(), 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        let stats = service.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_last_known_good() {
        let good = CountingProvider::new(false);
        let service = PoiService::new(good, PoiCacheConfig::default());
        service.fetch_now(10.0, 20.0).await.unwrap();

        let failing = CountingProvider::new(true);
        let failing_service = PoiService::new(failing, PoiCacheConfig::default());
        assert!(failing_service.fetch_now(10.0, 20.0).await.is_err());
        assert!(failing_service.last_known_good().is_empty());
        assert_eq!(failing_service.stats().fetch_failures, 1);

        // Moving to an uncached cell serves the previous set
        let elsewhere = service.landmarks_near(11.0, 21.0).await;
        assert_eq!(elsewhere.len(), 1);
    }

    #[tokio::test]
    async fn test_non_finite_position_serves_last_known() {
        let service = PoiService::new(CountingProvider::new(false), PoiCacheConfig::default());
        service.fetch_now(1.0, 1.0).await.unwrap();

        let result = service.landmarks_near(f64::NAN, 1.0).await;
        assert_eq!(result.len(), 1);
        assert_eq!(service.stats().misses, 0);
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() {
        let provider = CountingProvider::new(false);
        let service = PoiService::new(
            provider.clone(),
            PoiCacheConfig {
                ttl: Duration::from_millis(20),
                ..Default::default()
            },
        );

        service.fetch_now(5.0, 5.0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        // Expired: served from last known good while refetching
        let served = service.landmarks_near(5.0, 5.0).await;
        assert_eq!(served.len(), 1);
        wait_idle(&service).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}
