//! Valhalla routing engine client
//!
//! Valhalla API documentation:
//! https://valhalla.github.io/valhalla/api/turn-by-turn/api-reference/

use async_trait::async_trait;
use anyhow::{Result, Context};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::Coordinates;
use super::{RouteGeometry, RouteResult, RoutedLeg, RoutingService};

/// Valhalla client configuration
#[derive(Debug, Clone)]
pub struct ValhallaConfig {
    /// Base URL of Valhalla server (e.g., "http://localhost:8002")
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for ValhallaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl ValhallaConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }
}

/// Valhalla routing client
pub struct ValhallaClient {
    client: Client,
    config: ValhallaConfig,
}

impl ValhallaClient {
    pub fn new(config: ValhallaConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, config }
    }

    /// Build the route request; truck costing, distances in miles
    fn build_route_request(&self, locations: &[Coordinates]) -> RouteRequest {
        let locs: Vec<ValhallaLocation> = locations
            .iter()
            .map(|c| ValhallaLocation {
                lat: c.lat,
                lon: c.lng,
                // Geocoded city centroids may sit well off the road network
                radius: Some(500),
            })
            .collect();

        RouteRequest {
            locations: locs,
            costing: "truck".to_string(),
            units: "miles".to_string(),
            directions_type: "none".to_string(),
        }
    }
}

#[async_trait]
impl RoutingService for ValhallaClient {
    async fn route(&self, waypoints: &[Coordinates]) -> Result<RouteResult> {
        if waypoints.len() < 2 {
            anyhow::bail!("At least two waypoints are required, got {}", waypoints.len());
        }

        let request = self.build_route_request(waypoints);
        let url = format!("{}/route", self.config.base_url);

        debug!("Requesting route from Valhalla for {} waypoints", waypoints.len());

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send route request to Valhalla")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Valhalla route returned error {}: {}", status, body);
        }

        let route_response: RouteResponse = response
            .json()
            .await
            .context("Failed to parse Valhalla route response")?;

        let result = to_route_result(route_response)?;

        if result.legs.len() != waypoints.len() - 1 {
            anyhow::bail!(
                "Valhalla returned {} legs for {} waypoints",
                result.legs.len(),
                waypoints.len()
            );
        }

        debug!(
            "Received route of {:.1} mi with {} points from {} legs",
            result.total_distance_miles,
            result.geometry.coordinates.len(),
            result.legs.len()
        );

        Ok(result)
    }

    fn name(&self) -> &str {
        "Valhalla"
    }
}

fn to_route_result(response: RouteResponse) -> Result<RouteResult> {
    let legs = response
        .trip
        .legs
        .into_iter()
        .enumerate()
        .map(|(i, leg)| {
            let coordinates = decode_polyline(&leg.shape, 6)
                .with_context(|| format!("Invalid shape for leg {}", i))?;
            Ok(RoutedLeg {
                distance_miles: leg.summary.length,
                geometry: RouteGeometry { coordinates },
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RouteResult::from_legs(legs))
}

// Valhalla API types

#[derive(Debug, Serialize, Clone)]
struct ValhallaLocation {
    lat: f64,
    lon: f64,
    /// Radius in meters for snapping to roads
    #[serde(skip_serializing_if = "Option::is_none")]
    radius: Option<u32>,
}

#[derive(Debug, Serialize)]
struct RouteRequest {
    locations: Vec<ValhallaLocation>,
    costing: String,
    units: String,
    directions_type: String,
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    trip: Trip,
}

#[derive(Debug, Deserialize)]
struct Trip {
    legs: Vec<Leg>,
}

#[derive(Debug, Deserialize)]
struct Leg {
    summary: LegSummary,
    /// Encoded polyline shape
    shape: String,
}

#[derive(Debug, Deserialize)]
struct LegSummary {
    /// Distance in the requested units (miles)
    length: f64,
}

/// Decode Valhalla's encoded polyline format
/// Precision is 6 decimal places for Valhalla (vs 5 for Google)
fn decode_polyline(encoded: &str, precision: u32) -> Result<Vec<[f64; 2]>> {
    fn next_value(bytes: &[u8], i: &mut usize) -> Result<i64> {
        let mut shift = 0;
        let mut result = 0i64;
        loop {
            let Some(&raw) = bytes.get(*i) else {
                anyhow::bail!("Invalid polyline encoding");
            };
            let byte = i64::from(raw) - 63;
            *i += 1;
            result |= (byte & 0x1f) << shift;
            shift += 5;
            if byte < 0x20 {
                break;
            }
        }
        Ok(if result & 1 != 0 { !(result >> 1) } else { result >> 1 })
    }

    let factor = 10_f64.powi(precision as i32);
    let bytes = encoded.as_bytes();
    let mut coordinates = Vec::new();
    let (mut lat, mut lng) = (0i64, 0i64);
    let mut i = 0;

    while i < bytes.len() {
        lat += next_value(bytes, &mut i)?;
        lng += next_value(bytes, &mut i)?;

        // GeoJSON uses [lng, lat] order
        coordinates.push([lng as f64 / factor, lat as f64 / factor]);
    }

    Ok(coordinates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valhalla_config_default() {
        let config = ValhallaConfig::default();
        assert_eq!(config.base_url, "http://localhost:8002");
        assert_eq!(config.timeout_seconds, 30);
    }

    #[test]
    fn test_valhalla_config_strips_trailing_slash() {
        let config = ValhallaConfig::new("http://valhalla:8002/");
        assert_eq!(config.base_url, "http://valhalla:8002");
    }

    #[test]
    fn test_build_route_request() {
        let client = ValhallaClient::new(ValhallaConfig::default());

        let locations = vec![
            Coordinates { lat: 41.8781, lng: -87.6298 }, // Chicago
            Coordinates { lat: 38.6270, lng: -90.1994 }, // St. Louis
            Coordinates { lat: 39.0997, lng: -94.5786 }, // Kansas City
        ];

        let request = client.build_route_request(&locations);

        assert_eq!(request.locations.len(), 3);
        assert_eq!(request.costing, "truck");
        assert_eq!(request.units, "miles");
        assert_eq!(request.directions_type, "none");
        assert!((request.locations[1].lat - 38.6270).abs() < 0.0001);
        assert!((request.locations[1].lon - -90.1994).abs() < 0.0001);
    }

    #[test]
    fn test_decode_polyline6() {
        // (38.5, -120.2), (40.7, -120.95), (43.252, -126.453) at precision 6
        let decoded = decode_polyline("_izlhA~rlgdF_{geC~ywl@_kwzCn`{nI", 6).unwrap();

        assert_eq!(decoded.len(), 3);
        assert!((decoded[0][0] - -120.2).abs() < 1e-6);
        assert!((decoded[0][1] - 38.5).abs() < 1e-6);
        assert!((decoded[2][0] - -126.453).abs() < 1e-6);
        assert!((decoded[2][1] - 43.252).abs() < 1e-6);
    }

    #[test]
    fn test_decode_polyline_rejects_truncated_input() {
        assert!(decode_polyline("_izlhA~rlgd", 6).is_err());
    }

    #[test]
    fn test_route_response_to_result() {
        let json = r#"{
            "trip": {
                "legs": [
                    {"summary": {"length": 296.4}, "shape": "_izlhA~rlgdF_{geC~ywl@"},
                    {"summary": {"length": 248.1}, "shape": "_ecslA~meueF_kwzCn`{nI"}
                ]
            }
        }"#;
        let response: RouteResponse = serde_json::from_str(json).unwrap();

        let result = to_route_result(response).unwrap();

        assert_eq!(result.legs.len(), 2);
        assert!((result.total_distance_miles - 544.5).abs() < 1e-9);
        // Second leg's first point repeats the first leg's last point
        assert_eq!(result.geometry.coordinates.len(), 3);
    }

    #[test]
    fn test_valhalla_client_name() {
        let client = ValhallaClient::new(ValhallaConfig::default());
        assert_eq!(client.name(), "Valhalla");
    }

    #[tokio::test]
    #[ignore = "Requires running Valhalla server"]
    async fn test_valhalla_route_chicago_st_louis() {
        let client = ValhallaClient::new(ValhallaConfig::new("http://localhost:8002"));

        let route = client
            .route(&[
                Coordinates { lat: 41.8781, lng: -87.6298 },
                Coordinates { lat: 38.6270, lng: -90.1994 },
            ])
            .await
            .unwrap();

        // Chicago to St. Louis is ~300 miles by road
        assert!(route.total_distance_miles > 270.0 && route.total_distance_miles < 330.0,
            "Expected ~300 mi, got {} mi", route.total_distance_miles);
        assert!(route.geometry.coordinates.len() > 10);
    }
}
