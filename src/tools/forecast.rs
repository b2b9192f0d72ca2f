//! fetch_forecast and list_models tools

use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use serde_json::{Value, json};

use super::{ParamSpec, ParamType, Tool, ToolError, ToolOutput, ToolSpec};
use crate::weather::{
    DEFAULT_FORECAST_DAYS, ForecastModel, ForecastProvider, ForecastRequest, MAX_FORECAST_DAYS, Resolution,
    fetch_ensemble,
};

pub struct FetchForecastTool {
    provider: Arc<dyn ForecastProvider>,
}

impl FetchForecastTool {
    pub fn new(provider: Arc<dyn ForecastProvider>) -> Self {
        Self { provider }
    }
}

/// Turn tool arguments into a validated request; no I/O
fn parse_request(input: &Value) -> Result<ForecastRequest, ToolError> {
    let coordinate = |name: &str| {
        input
            .get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| ToolError::InvalidInput(format!("'{}' must be a number", name)))
    };
    let latitude = coordinate("latitude")?;
    let longitude = coordinate("longitude")?;

    let days = match input.get("days").filter(|v| !v.is_null()) {
        None => DEFAULT_FORECAST_DAYS as i64,
        Some(v) => v
            .as_i64()
            .or_else(|| v.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(|| ToolError::InvalidInput(format!("'days' must be an integer, got {}", v)))?,
    };

    let models = match input.get("models").and_then(Value::as_array) {
        None => Vec::new(),
        Some(items) => items
            .iter()
            .map(|m| {
                m.as_str()
                    .ok_or_else(|| ToolError::InvalidInput(format!("model ids must be strings, got {}", m)))?
                    .parse::<ForecastModel>()
            })
            .collect::<Result<Vec<_>, _>>()?,
    };

    let resolution = if input.get("hourly").and_then(Value::as_bool).unwrap_or(false) {
        Resolution::Hourly
    } else {
        Resolution::Daily
    };

    ForecastRequest::new(latitude, longitude, days, models, resolution)
}

#[async_trait]
impl Tool for FetchForecastTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "fetch_forecast",
            "Fetch forecasts from several numerical weather models on a shared time axis. \
             Daily summaries (temperature max/min in F, precipitation sum in inches, max wind in mph) by default; \
             set hourly=true only when hourly detail is needed. Timestamps are in the location's local timezone. \
             If some models fail the rest are returned with a partial_data note.",
        )
        .param("latitude", ParamSpec::new(ParamType::Number, "Latitude coordinate").required().range(-90.0, 90.0))
        .param(
            "longitude",
            ParamSpec::new(ParamType::Number, "Longitude coordinate").required().range(-180.0, 180.0),
        )
        .param(
            "days",
            ParamSpec::new(ParamType::Integer, format!("Number of forecast days (1-{})", MAX_FORECAST_DAYS))
                .range(1.0, MAX_FORECAST_DAYS as f64)
                .with_default(json!(DEFAULT_FORECAST_DAYS)),
        )
        .param(
            "models",
            ParamSpec::new(ParamType::Array, "Weather models to query; defaults to ['gfs']")
                .items(ParamType::String)
                .allowed(ForecastModel::ALL.iter().map(|m| m.id())),
        )
        .param(
            "hourly",
            ParamSpec::new(ParamType::Boolean, "Return hourly data instead of daily summaries")
                .with_default(json!(false)),
        )
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput, ToolError> {
        let request = parse_request(&input)?;
        let forecast = fetch_ensemble(self.provider.as_ref(), &request).await?;
        info!(
            "Fetched {} of {} model(s), {} timesteps",
            forecast.models.len(),
            request.models.len(),
            forecast.num_timesteps()
        );

        let mut payload = serde_json::to_value(&forecast)
            .map_err(|e| ToolError::InvalidInput(format!("Forecast is not representable as JSON: {}", e)))?;

        if !forecast.failed_models.is_empty()
            && let Some(obj) = payload.as_object_mut()
        {
            let failed: Vec<&str> = forecast.failed_models.keys().map(|m| m.id()).collect();
            let note = ToolError::PartialData(format!(
                "{} of {} models returned no data ({}); results use the remaining models",
                failed.len(),
                request.models.len(),
                failed.join(", ")
            ));
            obj.insert("partial_data".to_string(), note.descriptor());
        }

        Ok(ToolOutput::new(payload))
    }
}

/// list_models - the forecast models fetch_forecast understands
pub struct ListModelsTool;

#[async_trait]
impl Tool for ListModelsTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new("list_models", "Get the list of weather models that can be queried.")
    }

    async fn execute(&self, _input: Value) -> Result<ToolOutput, ToolError> {
        let models: Vec<Value> = ForecastModel::ALL
            .iter()
            .map(|m| json!({"id": m.id(), "description": m.description()}))
            .collect();
        Ok(ToolOutput::new(json!({
            "models": models,
            "default": [ForecastModel::Gfs.id()],
        })))
    }
}
