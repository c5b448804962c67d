//! Configuration management

use anyhow::{Context, Result};

use crate::services::hos::HosSettings;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// Geocoder backend: "mock" or "nominatim"
    pub geocoder_backend: String,

    /// Nominatim API URL (for geocoding)
    pub nominatim_url: String,

    /// Valhalla routing engine URL (optional, falls back to mock if unavailable)
    pub valhalla_url: Option<String>,

    /// Planning speed override
    pub average_speed_mph: Option<f64>,

    /// Fuel interval override
    pub fuel_interval_miles: Option<f64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let nats_url = std::env::var("NATS_URL")
            .unwrap_or_else(|_| "nats://localhost:4222".to_string());

        let geocoder_backend = std::env::var("GEOCODER_BACKEND")
            .unwrap_or_else(|_| "mock".to_string());

        let nominatim_url = std::env::var("NOMINATIM_URL")
            .unwrap_or_else(|_| "https://nominatim.openstreetmap.org".to_string());

        let valhalla_url = std::env::var("VALHALLA_URL").ok().filter(|url| !url.is_empty());

        let average_speed_mph = positive_env("HOS_AVERAGE_SPEED_MPH")?;
        let fuel_interval_miles = positive_env("HOS_FUEL_INTERVAL_MILES")?;

        Ok(Self {
            nats_url,
            geocoder_backend,
            nominatim_url,
            valhalla_url,
            average_speed_mph,
            fuel_interval_miles,
        })
    }

    /// Regulatory limits with the configured planning overrides applied
    pub fn hos_settings(&self) -> HosSettings {
        let defaults = HosSettings::default();
        HosSettings {
            average_speed_mph: self.average_speed_mph.unwrap_or(defaults.average_speed_mph),
            fuel_interval_miles: self.fuel_interval_miles.unwrap_or(defaults.fuel_interval_miles),
            ..defaults
        }
    }
}

fn positive_env(name: &str) -> Result<Option<f64>> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(None);
    };

    let value: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{} must be a number, got '{}'", name, raw))?;

    if !value.is_finite() || value <= 0.0 {
        anyhow::bail!("{} must be positive, got {}", name, value);
    }

    Ok(Some(value))
}
