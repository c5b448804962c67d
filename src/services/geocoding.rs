//! Geocoding abstraction layer with safety features
//!
//! This module provides a safe geocoding architecture that:
//! - Never risks getting blocked by external services
//! - Uses MockGeocoder for tests (deterministic, no network)
//! - Uses RateLimitedNominatimGeocoder for production (strict rate limiting)
//!
//! Configuration via GEOCODER_BACKEND env variable:
//! - "mock" → MockGeocoder (tests, development)
//! - "nominatim" → RateLimitedNominatimGeocoder (production)

use anyhow::Result;
use async_trait::async_trait;
use crate::types::Coordinates;

/// Geocoder trait - abstraction for all geocoding implementations
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Geocode a free-form address to coordinates
    /// Returns None if address cannot be geocoded
    async fn geocode(&self, address: &str) -> Result<Option<GeocodingResult>>;

    /// Short place label ("City, ST") for a point, None when nothing is known
    async fn reverse_geocode(&self, coordinates: &Coordinates) -> Result<Option<String>>;

    /// Get the name of this geocoder implementation
    fn name(&self) -> &'static str;
}

/// Result of geocoding operation
#[derive(Debug, Clone)]
pub struct GeocodingResult {
    /// Latitude and longitude
    pub coordinates: Coordinates,
    /// Confidence score 0.0-1.0
    pub confidence: f64,
    /// Display name returned by geocoder
    pub display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // MockGeocoder Tests
    // ==========================================================================

    #[tokio::test]
    async fn mock_geocoder_returns_coordinates_for_any_address() {
        let geocoder = MockGeocoder::new();

        let result = geocoder.geocode("Chicago, IL").await.unwrap();

        assert!(result.is_some(), "MockGeocoder should return coordinates");
    }

    #[tokio::test]
    async fn mock_geocoder_returns_none_for_blank_address() {
        let geocoder = MockGeocoder::new();

        assert!(geocoder.geocode("   ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mock_geocoder_returns_deterministic_coordinates() {
        let geocoder = MockGeocoder::new();

        let result1 = geocoder.geocode("Dallas, TX").await.unwrap().unwrap();
        let result2 = geocoder.geocode("Dallas, TX").await.unwrap().unwrap();

        assert_eq!(result1.coordinates, result2.coordinates);
    }

    #[tokio::test]
    async fn mock_geocoder_returns_different_coordinates_for_different_addresses() {
        let geocoder = MockGeocoder::new();

        let dallas = geocoder.geocode("Dallas, TX").await.unwrap().unwrap();
        let denver = geocoder.geocode("Denver, CO").await.unwrap().unwrap();

        assert_ne!(dallas.coordinates, denver.coordinates);
    }

    #[tokio::test]
    async fn mock_geocoder_returns_coordinates_within_continental_us() {
        let geocoder = MockGeocoder::new();

        for address in ["Chicago, IL", "Phoenix, AZ", "Atlanta, GA", "Boise, ID"] {
            let result = geocoder.geocode(address).await.unwrap().unwrap();

            // Continental US bounds: lat 24.5-49.4, lng -124.8 to -66.9
            assert!(result.coordinates.lat >= 24.5 && result.coordinates.lat <= 49.4,
                "Latitude {} out of US bounds for {}", result.coordinates.lat, address);
            assert!(result.coordinates.lng >= -124.8 && result.coordinates.lng <= -66.9,
                "Longitude {} out of US bounds for {}", result.coordinates.lng, address);
        }
    }

    #[tokio::test]
    async fn mock_geocoder_has_no_place_names() {
        let geocoder = MockGeocoder::new();
        let label = geocoder
            .reverse_geocode(&Coordinates { lat: 35.0, lng: -100.0 })
            .await
            .unwrap();
        assert!(label.is_none());
    }

    #[tokio::test]
    async fn mock_geocoder_name_is_mock() {
        let geocoder = MockGeocoder::new();
        assert_eq!(geocoder.name(), "mock");
    }

    // ==========================================================================
    // RateLimiter Tests
    // ==========================================================================

    #[tokio::test]
    async fn rate_limiter_enforces_minimum_interval() {
        let limiter = RateLimiter::new(std::time::Duration::from_millis(100));

        let start = std::time::Instant::now();

        // First call should be immediate
        limiter.wait().await;
        let after_first = start.elapsed();
        assert!(after_first < std::time::Duration::from_millis(50), "First call should be immediate");

        // Second call should wait
        limiter.wait().await;
        let after_second = start.elapsed();
        assert!(after_second >= std::time::Duration::from_millis(100),
            "Second call should wait at least 100ms, took {:?}", after_second);
    }

    // ==========================================================================
    // CircuitBreaker Tests
    // ==========================================================================

    #[test]
    fn circuit_breaker_opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(3, std::time::Duration::from_secs(60));
        assert!(!breaker.is_open());

        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open(), "Should not open after 2 failures");

        breaker.record_failure();
        assert!(breaker.is_open(), "Should open after 3 failures");
    }

    #[test]
    fn circuit_breaker_resets_on_success() {
        let breaker = CircuitBreaker::new(3, std::time::Duration::from_secs(60));

        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();

        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open(), "Should not be open, count was reset");
    }

    #[tokio::test]
    async fn circuit_breaker_closes_after_recovery_time() {
        let breaker = CircuitBreaker::new(1, std::time::Duration::from_millis(50));

        breaker.record_failure();
        assert!(breaker.is_open());

        tokio::time::sleep(std::time::Duration::from_millis(60)).await;

        // Half-open: one retry allowed
        assert!(!breaker.is_open(), "Circuit breaker should close after recovery time");
    }

    // ==========================================================================
    // Factory / RateLimitedNominatimGeocoder Tests
    // ==========================================================================

    #[test]
    fn geocoder_factory_creates_requested_backend() {
        assert_eq!(create_geocoder("mock", "http://localhost:8080").name(), "mock");
        assert_eq!(create_geocoder("nominatim", "http://localhost:8080").name(), "nominatim");
        assert_eq!(create_geocoder("photon", "http://localhost:8080").name(), "mock");
    }

    #[tokio::test]
    async fn rate_limited_nominatim_geocoder_rejects_when_circuit_breaker_open() {
        let geocoder = RateLimitedNominatimGeocoder::with_config(
            "https://nominatim.openstreetmap.org",
            std::time::Duration::from_millis(100),
            1, // Open after 1 failure
            std::time::Duration::from_secs(300),
        );

        geocoder.circuit_breaker.record_failure();
        assert!(geocoder.circuit_breaker.is_open());

        let result = geocoder.geocode("Chicago, IL").await;
        assert!(result.unwrap_err().to_string().contains("circuit breaker"));

        let reverse = geocoder
            .reverse_geocode(&Coordinates { lat: 41.88, lng: -87.63 })
            .await;
        assert!(reverse.is_err());
    }
}

// ==========================================================================
// MockGeocoder Implementation
// ==========================================================================

/// Mock geocoder for testing - returns deterministic fake coordinates
pub struct MockGeocoder;

impl MockGeocoder {
    pub fn new() -> Self {
        Self
    }

    /// Generate deterministic coordinates from address hash
    /// Coordinates are guaranteed to be inside the continental US, away from coasts
    fn hash_to_coordinates(address: &str) -> Coordinates {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        address.trim().to_lowercase().hash(&mut hasher);
        let hash = hasher.finish();

        const LAT_MIN: f64 = 32.0;
        const LAT_MAX: f64 = 45.0;
        const LNG_MIN: f64 = -115.0;
        const LNG_MAX: f64 = -80.0;

        let lat_normalized = ((hash >> 32) as f64) / (u32::MAX as f64);
        let lng_normalized = ((hash & 0xFFFFFFFF) as f64) / (u32::MAX as f64);

        Coordinates {
            lat: LAT_MIN + (lat_normalized * (LAT_MAX - LAT_MIN)),
            lng: LNG_MIN + (lng_normalized * (LNG_MAX - LNG_MIN)),
        }
    }
}

impl Default for MockGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodingResult>> {
        if address.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(GeocodingResult {
            coordinates: Self::hash_to_coordinates(address),
            confidence: 0.95,
            display_name: address.trim().to_string(),
        }))
    }

    async fn reverse_geocode(&self, _coordinates: &Coordinates) -> Result<Option<String>> {
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ==========================================================================
// RateLimiter Implementation
// ==========================================================================

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Rate limiter that enforces minimum interval between calls
pub struct RateLimiter {
    last_call: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_call: Mutex::new(None),
            min_interval,
        }
    }

    /// Wait until it's safe to make another call
    pub async fn wait(&self) {
        let mut last = self.last_call.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                // Holding the lock while sleeping keeps callers in line
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }

        *last = Some(Instant::now());
    }
}

// ==========================================================================
// CircuitBreaker Implementation
// ==========================================================================

use std::sync::atomic::{AtomicU32, Ordering};

/// Circuit breaker to prevent hammering a failing service
pub struct CircuitBreaker {
    failure_count: AtomicU32,
    threshold: u32,
    last_failure: parking_lot::Mutex<Option<Instant>>,
    recovery_time: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, recovery_time: Duration) -> Self {
        Self {
            failure_count: AtomicU32::new(0),
            threshold,
            last_failure: parking_lot::Mutex::new(None),
            recovery_time,
        }
    }

    /// Check if circuit is open (blocking calls)
    pub fn is_open(&self) -> bool {
        if self.failure_count.load(Ordering::Relaxed) < self.threshold {
            return false;
        }
        match *self.last_failure.lock() {
            Some(last_time) => last_time.elapsed() < self.recovery_time,
            None => true,
        }
    }

    /// Record a failure
    pub fn record_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        *self.last_failure.lock() = Some(Instant::now());
    }

    /// Record a success (resets failure count)
    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
    }
}

// ==========================================================================
// RateLimitedNominatimGeocoder Implementation
// ==========================================================================

use crate::services::nominatim::NominatimClient;

/// Default rate limit interval (1.5 seconds - Nominatim allows 1 req/s)
const DEFAULT_RATE_LIMIT_MS: u64 = 1500;

/// Default circuit breaker threshold (3 failures)
const DEFAULT_CIRCUIT_BREAKER_THRESHOLD: u32 = 3;

/// Default circuit breaker recovery time (5 minutes)
const DEFAULT_CIRCUIT_BREAKER_RECOVERY_SECS: u64 = 300;

/// Rate-limited Nominatim geocoder with circuit breaker protection
///
/// Forward and reverse lookups share one rate limiter and one breaker.
pub struct RateLimitedNominatimGeocoder {
    client: NominatimClient,
    rate_limiter: RateLimiter,
    pub(crate) circuit_breaker: CircuitBreaker,
}

impl RateLimitedNominatimGeocoder {
    /// Create with custom configuration
    pub fn with_config(
        base_url: &str,
        rate_limit_interval: Duration,
        circuit_breaker_threshold: u32,
        circuit_breaker_recovery: Duration,
    ) -> Self {
        Self {
            client: NominatimClient::new(base_url),
            rate_limiter: RateLimiter::new(rate_limit_interval),
            circuit_breaker: CircuitBreaker::new(circuit_breaker_threshold, circuit_breaker_recovery),
        }
    }

    /// Create for `base_url`, tuning limits from environment variables
    pub fn from_env(base_url: &str) -> Self {
        let rate_limit_ms = std::env::var("NOMINATIM_RATE_LIMIT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RATE_LIMIT_MS);

        let cb_threshold = std::env::var("NOMINATIM_CB_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CIRCUIT_BREAKER_THRESHOLD);

        let cb_recovery_secs = std::env::var("NOMINATIM_CB_RECOVERY_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CIRCUIT_BREAKER_RECOVERY_SECS);

        Self::with_config(
            base_url,
            Duration::from_millis(rate_limit_ms),
            cb_threshold,
            Duration::from_secs(cb_recovery_secs),
        )
    }

    async fn guard(&self) -> Result<()> {
        if self.circuit_breaker.is_open() {
            tracing::warn!("Circuit breaker is open, rejecting geocoding request");
            anyhow::bail!("Geocoding service temporarily unavailable (circuit breaker open)");
        }
        self.rate_limiter.wait().await;
        Ok(())
    }

    fn track<T>(&self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.circuit_breaker.record_success(),
            Err(e) => {
                self.circuit_breaker.record_failure();
                tracing::error!("Geocoding failed: {:#}", e);
            }
        }
        result
    }
}

#[async_trait]
impl Geocoder for RateLimitedNominatimGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodingResult>> {
        self.guard().await?;

        // No result found is not a failure
        let found = self.track(self.client.geocode(address).await)?;

        match found {
            Some(result) => Ok(Some(GeocodingResult {
                coordinates: result.coordinates()?,
                confidence: 0.8, // Nominatim doesn't provide confidence, use default
                display_name: result.display_name,
            })),
            None => Ok(None),
        }
    }

    async fn reverse_geocode(&self, coordinates: &Coordinates) -> Result<Option<String>> {
        self.guard().await?;
        self.track(self.client.reverse_geocode(coordinates).await)
    }

    fn name(&self) -> &'static str {
        "nominatim"
    }
}

// ==========================================================================
// Factory function
// ==========================================================================

/// Create geocoder for the configured backend
///
/// - `"mock"`: deterministic, no network
/// - `"nominatim"`: `nominatim_url` with `NOMINATIM_RATE_LIMIT_MS` (default 1500),
///   `NOMINATIM_CB_THRESHOLD` (default 3), `NOMINATIM_CB_RECOVERY_SECS` (default 300)
pub fn create_geocoder(backend: &str, nominatim_url: &str) -> Box<dyn Geocoder> {
    match backend {
        "mock" => {
            tracing::info!("Using MockGeocoder");
            Box::new(MockGeocoder::new())
        }
        "nominatim" => {
            tracing::info!("Using RateLimitedNominatimGeocoder at {}", nominatim_url);
            Box::new(RateLimitedNominatimGeocoder::from_env(nominatim_url))
        }
        _ => {
            tracing::warn!("Unknown GEOCODER_BACKEND '{}', using mock", backend);
            Box::new(MockGeocoder::new())
        }
    }
}
