//! Open-Meteo forecast client

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::Value;

use super::forecast::{ForecastProvider, ModelForecast};
use super::model::{ForecastModel, ForecastRequest, Resolution, Variable};
use crate::tools::ToolError;

/// Default Open-Meteo API root; model endpoints hang off it
pub const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1";

/// Client for the per-model Open-Meteo endpoints, imperial units
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: Client,
    base_url: String,
}

impl OpenMeteoClient {
    pub fn new(base_url: impl Into<String>, user_agent: &str, timeout: Duration) -> Result<Self, ToolError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| ToolError::UpstreamUnavailable(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn model_url(&self, model: ForecastModel) -> String {
        format!("{}/{}", self.base_url, model.endpoint())
    }
}

/// Query parameters for one model request
fn query_params(request: &ForecastRequest) -> Vec<(&'static str, String)> {
    let resolution = request.resolution;
    let fields = Variable::for_resolution(resolution)
        .iter()
        .map(|v| v.api_name_for(resolution))
        .collect::<Vec<_>>()
        .join(",");

    vec![
        ("latitude", request.latitude.to_string()),
        ("longitude", request.longitude.to_string()),
        (resolution.as_str(), fields),
        ("temperature_unit", "fahrenheit".to_string()),
        ("wind_speed_unit", "mph".to_string()),
        ("precipitation_unit", "inch".to_string()),
        ("forecast_days", request.days.to_string()),
        ("timezone", "auto".to_string()),
    ]
}

/// Pull the time axis and known variables out of a response body
fn parse_body(body: &Value, resolution: Resolution) -> Result<ModelForecast, ToolError> {
    let malformed = |what: &str| ToolError::UpstreamUnavailable(format!("Failed to parse response: {}", what));

    let section = body
        .get(resolution.as_str())
        .and_then(|s| s.as_object())
        .ok_or_else(|| malformed(&format!("missing '{}' section", resolution.as_str())))?;

    let times = section
        .get("time")
        .and_then(|t| t.as_array())
        .ok_or_else(|| malformed("missing time axis"))?
        .iter()
        .map(|t| t.as_str().map(String::from).ok_or_else(|| malformed("non-string timestamp")))
        .collect::<Result<Vec<_>, _>>()?;

    let mut series = BTreeMap::new();
    for &variable in Variable::for_resolution(resolution) {
        if let Some(values) = section.get(variable.api_name_for(resolution)).and_then(|v| v.as_array()) {
            series.insert(variable, values.iter().map(Value::as_f64).collect());
        }
    }

    Ok(ModelForecast {
        latitude: body.get("latitude").and_then(Value::as_f64).unwrap_or_default(),
        longitude: body.get("longitude").and_then(Value::as_f64).unwrap_or_default(),
        timezone: body
            .get("timezone")
            .and_then(Value::as_str)
            .unwrap_or("UTC")
            .to_string(),
        times,
        series,
    })
}

#[async_trait]
impl ForecastProvider for OpenMeteoClient {
    async fn fetch_model(&self, request: &ForecastRequest, model: ForecastModel) -> Result<ModelForecast, ToolError> {
        let url = self.model_url(model);
        debug!("GET {} ({} days, {})", url, request.days, request.resolution.as_str());

        let response = self
            .client
            .get(&url)
            .query(&query_params(request))
            .send()
            .await
            .map_err(|e| ToolError::UpstreamUnavailable(format!("API request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let reason = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|b| b.get("reason").and_then(Value::as_str).map(String::from))
                .unwrap_or_else(|| status.to_string());
            return Err(ToolError::UpstreamUnavailable(format!("API request failed: {}", reason)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ToolError::UpstreamUnavailable(format!("Failed to parse response: {}", e)))?;

        parse_body(&body, request.resolution)
    }
}
