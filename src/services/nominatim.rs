//! Nominatim geocoding client

use std::collections::HashMap;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;
use crate::types::Coordinates;

/// Nominatim API response
#[derive(Debug, Deserialize)]
pub struct NominatimResult {
    pub lat: String,
    pub lon: String,
    pub display_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NominatimReverseAddress {
    pub city: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
    pub hamlet: Option<String>,
    pub county: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NominatimReverseResult {
    pub display_name: String,
    pub address: Option<NominatimReverseAddress>,
}

/// US state names to postal abbreviations
static STATE_ABBREVIATIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("Alabama", "AL"), ("Alaska", "AK"), ("Arizona", "AZ"), ("Arkansas", "AR"),
        ("California", "CA"), ("Colorado", "CO"), ("Connecticut", "CT"), ("Delaware", "DE"),
        ("District of Columbia", "DC"), ("Florida", "FL"), ("Georgia", "GA"), ("Hawaii", "HI"),
        ("Idaho", "ID"), ("Illinois", "IL"), ("Indiana", "IN"), ("Iowa", "IA"),
        ("Kansas", "KS"), ("Kentucky", "KY"), ("Louisiana", "LA"), ("Maine", "ME"),
        ("Maryland", "MD"), ("Massachusetts", "MA"), ("Michigan", "MI"), ("Minnesota", "MN"),
        ("Mississippi", "MS"), ("Missouri", "MO"), ("Montana", "MT"), ("Nebraska", "NE"),
        ("Nevada", "NV"), ("New Hampshire", "NH"), ("New Jersey", "NJ"), ("New Mexico", "NM"),
        ("New York", "NY"), ("North Carolina", "NC"), ("North Dakota", "ND"), ("Ohio", "OH"),
        ("Oklahoma", "OK"), ("Oregon", "OR"), ("Pennsylvania", "PA"), ("Rhode Island", "RI"),
        ("South Carolina", "SC"), ("South Dakota", "SD"), ("Tennessee", "TN"), ("Texas", "TX"),
        ("Utah", "UT"), ("Vermont", "VT"), ("Virginia", "VA"), ("Washington", "WA"),
        ("West Virginia", "WV"), ("Wisconsin", "WI"), ("Wyoming", "WY"),
    ])
});

/// Postal abbreviation for a US state name, if known
pub fn state_abbreviation(state: &str) -> Option<&'static str> {
    STATE_ABBREVIATIONS.get(state.trim()).copied()
}

/// Concise "City, ST" label from a reverse geocoding address.
/// Falls back to the county, then to the first two parts of `display_name`.
pub fn format_location(address: &NominatimReverseAddress, display_name: &str) -> String {
    let place = address
        .city
        .as_deref()
        .or(address.town.as_deref())
        .or(address.village.as_deref())
        .or(address.hamlet.as_deref())
        .or(address.county.as_deref());

    let state = address
        .state
        .as_deref()
        .map(|name| state_abbreviation(name).unwrap_or(name));

    match (place, state) {
        (Some(place), Some(state)) => format!("{}, {}", place, state),
        (Some(place), None) => place.to_string(),
        (None, Some(state)) => state.to_string(),
        (None, None) => display_name
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .take(2)
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Nominatim geocoding client
pub struct NominatimClient {
    base_url: String,
    client: reqwest::Client,
}

impl NominatimClient {
    /// Create a new client
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("eld-planner-worker/0.1")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Geocode a free-form US address
    pub async fn geocode(&self, address: &str) -> Result<Option<NominatimResult>> {
        let url = format!(
            "{}/search?q={}&format=json&countrycodes=us&limit=1",
            self.base_url,
            urlencoding::encode(address)
        );

        let response = self.client
            .get(&url)
            .send()
            .await
            .context("Failed to send geocoding request")?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let mut results: Vec<NominatimResult> = response
            .json()
            .await
            .context("Failed to parse geocoding response")?;

        if results.is_empty() {
            Ok(None)
        } else {
            Ok(Some(results.swap_remove(0)))
        }
    }

    /// Reverse geocode coordinates to a "City, ST" label
    pub async fn reverse_geocode(&self, coordinates: &Coordinates) -> Result<Option<String>> {
        let url = format!(
            "{}/reverse?lat={}&lon={}&format=json&addressdetails=1&zoom=10",
            self.base_url,
            coordinates.lat,
            coordinates.lng
        );

        let response = self.client
            .get(&url)
            .send()
            .await
            .context("Failed to send reverse geocoding request")?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let result: NominatimReverseResult = response
            .json()
            .await
            .context("Failed to parse reverse geocoding response")?;

        let address = result.address.unwrap_or_default();
        let label = format_location(&address, &result.display_name);

        Ok(if label.is_empty() { None } else { Some(label) })
    }
}

impl NominatimResult {
    pub fn coordinates(&self) -> Result<Coordinates> {
        let lat: f64 = self.lat.parse().context("Invalid latitude")?;
        let lng: f64 = self.lon.parse().context("Invalid longitude")?;
        Ok(Coordinates { lat, lng })
    }
}
