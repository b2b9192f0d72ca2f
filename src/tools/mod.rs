//! Tool system: specs, the registry, and the weather tool handlers
//!
//! Every tool the reasoning service can call implements [`Tool`]. Calls go
//! through [`ToolRegistry`], which resolves the name, validates arguments
//! against the advertised [`ToolSpec`], runs the handler and always hands
//! back a `ToolResult`.

mod analysis;
mod definition;
mod error;
mod forecast;
mod geocode;
mod plot;
mod registry;

pub use analysis::{AgreementTool, StatisticsTool, TemperatureRangeTool, UncertaintyTool};
pub use definition::{ParamSpec, ParamType, ToolSpec};
pub use error::{RegistryError, ToolError};
pub use forecast::{FetchForecastTool, ListModelsTool};
pub use geocode::GeocodeTool;
pub use plot::{DEFAULT_PLOT_PATH, RenderPlotTool};
pub use registry::{ToolRegistry, ToolRun};

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::weather::{EnsembleForecast, Variable};

/// A tool the reasoning service can call
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and input schema
    fn spec(&self) -> ToolSpec;

    /// Run with arguments already validated against [`Tool::spec`]
    async fn execute(&self, input: Value) -> Result<ToolOutput, ToolError>;
}

/// Successful tool output
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub payload: Value,
    /// File written by the tool, if any
    pub artifact: Option<PathBuf>,
}

impl ToolOutput {
    pub fn new(payload: Value) -> Self {
        Self { payload, artifact: None }
    }

    /// Serialize any result type into a payload
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ToolError> {
        serde_json::to_value(value)
            .map(Self::new)
            .map_err(|e| ToolError::InvalidInput(format!("Result is not representable as JSON: {}", e)))
    }

    pub fn with_artifact(mut self, path: PathBuf) -> Self {
        self.artifact = Some(path);
        self
    }
}

/// Decode the forecast payload a previous `fetch_forecast` call returned
pub(crate) fn forecast_arg(input: &Value, name: &str) -> Result<EnsembleForecast, ToolError> {
    let raw = input
        .get(name)
        .ok_or_else(|| ToolError::InvalidInput(format!("'{}' is required", name)))?;
    let forecast: EnsembleForecast = serde_json::from_value(raw.clone()).map_err(|e| {
        ToolError::InvalidInput(format!(
            "'{}' must be the object returned by fetch_forecast: {}",
            name, e
        ))
    })?;
    forecast.check_shape()?;
    Ok(forecast)
}

/// Optional variable argument, defaulting to temperature
pub(crate) fn variable_arg(input: &Value) -> Result<Variable, ToolError> {
    match input.get("variable").and_then(Value::as_str) {
        Some(s) => s.parse(),
        None => Ok(Variable::Temperature),
    }
}

/// Variables a tool may be asked about
pub(crate) fn variable_param() -> ParamSpec {
    ParamSpec::new(
        ParamType::String,
        "Which variable to analyze; temperature maps to the daily high (or low with use_max=false) on daily data",
    )
    .allowed(Variable::KEYS)
    .with_default(Value::from("temperature"))
}

pub(crate) fn forecast_param() -> ParamSpec {
    ParamSpec::new(ParamType::Object, "The forecast object returned by fetch_forecast").required()
}
