//! Routing service for trip distances and geometry
//!
//! Uses Valhalla for production, mock for tests.

mod valhalla;

pub use valhalla::{ValhallaClient, ValhallaConfig};

use async_trait::async_trait;
use anyhow::Result;
use serde::Serialize;
use crate::types::Coordinates;

/// Route geometry as GeoJSON coordinates
/// Coordinates are in [longitude, latitude] order (GeoJSON standard)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteGeometry {
    /// Array of [lng, lat] coordinates forming the route polyline
    pub coordinates: Vec<[f64; 2]>,
}

impl RouteGeometry {
    /// Create empty geometry (for fallback when no route available)
    pub fn empty() -> Self {
        Self { coordinates: vec![] }
    }

    /// Create geometry from a list of coordinates (straight lines)
    pub fn from_coordinates(coords: &[Coordinates]) -> Self {
        Self {
            coordinates: coords
                .iter()
                .map(|c| [c.lng, c.lat])
                .collect(),
        }
    }

    /// Polyline as lat/lng points
    pub fn to_coordinates(&self) -> Vec<Coordinates> {
        self.coordinates
            .iter()
            .map(|[lng, lat]| Coordinates { lat: *lat, lng: *lng })
            .collect()
    }

    /// Append another leg, dropping its first point when it repeats our last one
    pub fn extend_leg(&mut self, leg: &RouteGeometry) {
        let skip = match (self.coordinates.last(), leg.coordinates.first()) {
            (Some(last), Some(first)) if last == first => 1,
            _ => 0,
        };
        self.coordinates.extend(leg.coordinates.iter().skip(skip).copied());
    }
}

/// One routed leg between consecutive waypoints
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedLeg {
    pub distance_miles: f64,
    pub geometry: RouteGeometry,
}

/// Route through all waypoints in order
#[derive(Debug, Clone, PartialEq)]
pub struct RouteResult {
    /// `waypoints.len() - 1` legs
    pub legs: Vec<RoutedLeg>,
    pub total_distance_miles: f64,
    pub geometry: RouteGeometry,
}

impl RouteResult {
    /// Assemble from legs, summing distances and joining geometry
    pub fn from_legs(legs: Vec<RoutedLeg>) -> Self {
        let mut geometry = RouteGeometry::empty();
        for leg in &legs {
            geometry.extend_leg(&leg.geometry);
        }

        Self {
            total_distance_miles: legs.iter().map(|leg| leg.distance_miles).sum(),
            legs,
            geometry,
        }
    }
}

/// Routing service trait for abstraction (Valhalla, mock, etc.)
#[async_trait]
pub trait RoutingService: Send + Sync {
    /// Route through `waypoints` in order. Needs at least two waypoints.
    async fn route(&self, waypoints: &[Coordinates]) -> Result<RouteResult>;

    /// Get service name for logging
    fn name(&self) -> &str;
}

/// Mock routing service for tests
/// Uses Haversine distance × coefficient for estimation
pub struct MockRoutingService {
    /// Coefficient for converting straight-line to road distance (default: 1.3)
    road_coefficient: f64,
}

impl Default for MockRoutingService {
    fn default() -> Self {
        Self {
            road_coefficient: crate::services::geo::ROAD_COEFFICIENT,
        }
    }
}

impl MockRoutingService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoutingService for MockRoutingService {
    async fn route(&self, waypoints: &[Coordinates]) -> Result<RouteResult> {
        use crate::services::geo::haversine_miles;

        if waypoints.len() < 2 {
            anyhow::bail!("At least two waypoints are required, got {}", waypoints.len());
        }

        let legs = waypoints
            .windows(2)
            .map(|pair| RoutedLeg {
                distance_miles: haversine_miles(&pair[0], &pair[1]) * self.road_coefficient,
                geometry: RouteGeometry::from_coordinates(pair),
            })
            .collect();

        Ok(RouteResult::from_legs(legs))
    }

    fn name(&self) -> &str {
        "MockRouting"
    }
}

/// Create routing service with automatic Valhalla detection and fallback
///
/// Tries to connect to Valhalla if URL is provided. Falls back to mock
/// routing service if Valhalla is unavailable or URL is not configured.
pub async fn create_routing_service_with_fallback(
    valhalla_url: Option<String>,
) -> Box<dyn RoutingService> {
    use tracing::{info, warn};

    if let Some(url) = valhalla_url {
        match check_valhalla_health(&url).await {
            Ok(()) => {
                info!("Valhalla routing service available at {}", url);
                return Box::new(ValhallaClient::new(ValhallaConfig::new(&url)));
            }
            Err(e) => {
                warn!("Valhalla not available at {}: {}. Falling back to mock routing.", url, e);
            }
        }
    }

    info!("Using mock routing service (Valhalla not configured or unavailable)");
    Box::new(MockRoutingService::new())
}

/// Check if Valhalla is healthy by making a simple status request
async fn check_valhalla_health(base_url: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()?;

    let url = format!("{}/status", base_url.trim_end_matches('/'));
    let response = client.get(&url).send().await?;

    if response.status().is_success() {
        Ok(())
    } else {
        anyhow::bail!("Valhalla returned status {}", response.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chicago() -> Coordinates {
        Coordinates { lat: 41.8781, lng: -87.6298 }
    }

    fn st_louis() -> Coordinates {
        Coordinates { lat: 38.6270, lng: -90.1994 }
    }

    fn kansas_city() -> Coordinates {
        Coordinates { lat: 39.0997, lng: -94.5786 }
    }

    #[tokio::test]
    async fn test_mock_routing_needs_two_waypoints() {
        let service = MockRoutingService::new();
        assert!(service.route(&[]).await.is_err());
        assert!(service.route(&[chicago()]).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_routing_two_waypoints() {
        let service = MockRoutingService::new();
        let route = service.route(&[chicago(), st_louis()]).await.unwrap();

        assert_eq!(route.legs.len(), 1);
        // ~260 mi straight line, ~340 mi with the road coefficient
        assert!(route.total_distance_miles > 310.0 && route.total_distance_miles < 370.0,
            "Expected ~340 mi, got {} mi", route.total_distance_miles);
        assert_eq!(route.geometry.coordinates.len(), 2);
    }

    #[tokio::test]
    async fn test_mock_routing_three_waypoints() {
        let service = MockRoutingService::new();
        let route = service
            .route(&[chicago(), st_louis(), kansas_city()])
            .await
            .unwrap();

        assert_eq!(route.legs.len(), 2);
        let sum: f64 = route.legs.iter().map(|leg| leg.distance_miles).sum();
        assert!((route.total_distance_miles - sum).abs() < 1e-9);

        // Shared St. Louis point appears once
        assert_eq!(route.geometry.coordinates.len(), 3);
        assert_eq!(route.geometry.coordinates[1], [st_louis().lng, st_louis().lat]);
    }

    #[test]
    fn test_geometry_round_trips_lat_lng_order() {
        let geometry = RouteGeometry::from_coordinates(&[chicago()]);
        assert_eq!(geometry.coordinates[0], [-87.6298, 41.8781]);
        assert_eq!(geometry.to_coordinates(), vec![chicago()]);
    }

    #[test]
    fn test_routing_service_name() {
        let mock = MockRoutingService::new();
        assert_eq!(mock.name(), "MockRouting");
    }

    #[tokio::test]
    async fn test_create_routing_service_with_fallback_no_url() {
        let service = create_routing_service_with_fallback(None).await;
        assert_eq!(service.name(), "MockRouting");
    }

    #[tokio::test]
    async fn test_create_routing_service_with_fallback_invalid_url() {
        // Should fall back to mock when URL is invalid/unreachable
        let service = create_routing_service_with_fallback(
            Some("http://localhost:99999".to_string())
        ).await;
        assert_eq!(service.name(), "MockRouting");
    }

    #[tokio::test]
    #[ignore = "Requires running Valhalla server"]
    async fn test_create_routing_service_with_fallback_valhalla_available() {
        let service = create_routing_service_with_fallback(
            Some("http://localhost:8002".to_string())
        ).await;
        assert_eq!(service.name(), "Valhalla");
    }
}
