//! Place-name geocoding

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::tools::ToolError;

/// Default Nominatim search endpoint
pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";

/// A resolved location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
}

/// Resolves free-text locations to coordinates
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Return the provider's best match for `location`
    async fn geocode(&self, location: &str) -> Result<Place, ToolError>;
}

/// Parse a literal `"lat, lon"` pair, skipping the provider entirely
pub fn parse_coordinates(location: &str) -> Option<Place> {
    let (lat, lon) = location.split_once(',')?;
    let latitude: f64 = lat.trim().parse().ok()?;
    let longitude: f64 = lon.trim().parse().ok()?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return None;
    }
    Some(Place {
        latitude,
        longitude,
        display_name: format!("{:.4}, {:.4}", latitude, longitude),
    })
}

/// Nominatim candidate; coordinates arrive as strings
#[derive(Debug, Deserialize)]
struct Candidate {
    lat: String,
    lon: String,
    display_name: String,
}

/// OpenStreetMap Nominatim client
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: Client,
    url: String,
}

impl NominatimGeocoder {
    pub fn new(url: impl Into<String>, user_agent: &str, timeout: Duration) -> Result<Self, ToolError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| ToolError::UpstreamUnavailable(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, location: &str) -> Result<Place, ToolError> {
        debug!("Geocoding '{}'", location);
        let response = self
            .client
            .get(&self.url)
            .query(&[("q", location), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| ToolError::UpstreamUnavailable(format!("Geocoding request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::UpstreamUnavailable(format!(
                "Geocoding service returned {}",
                status
            )));
        }

        let candidates: Vec<Candidate> = response
            .json()
            .await
            .map_err(|e| ToolError::UpstreamUnavailable(format!("Unexpected geocoding response: {}", e)))?;

        first_place(location, candidates)
    }
}

/// Take the highest-ranked candidate
fn first_place(location: &str, candidates: Vec<Candidate>) -> Result<Place, ToolError> {
    let first = candidates
        .into_iter()
        .next()
        .ok_or_else(|| ToolError::NotFound(location.to_string()))?;

    let parse = |s: &str, what: &str| {
        s.trim()
            .parse::<f64>()
            .map_err(|_| ToolError::UpstreamUnavailable(format!("Geocoding returned invalid {} '{}'", what, s)))
    };

    Ok(Place {
        latitude: parse(&first.lat, "latitude")?,
        longitude: parse(&first.lon, "longitude")?,
        display_name: first.display_name,
    })
}
