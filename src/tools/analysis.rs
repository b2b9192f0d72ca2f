//! Statistics tools over a fetched forecast

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{ParamSpec, ParamType, Tool, ToolError, ToolOutput, ToolSpec, forecast_arg, forecast_param, variable_arg, variable_param};
use crate::weather::{ensemble_statistics, model_agreement, summarize_uncertainty, temperature_range};

fn use_max_arg(input: &Value) -> bool {
    input.get("use_max").and_then(Value::as_bool).unwrap_or(true)
}

fn use_max_param() -> ParamSpec {
    ParamSpec::new(
        ParamType::Boolean,
        "On daily data, analyze daily highs (true) or lows (false) for temperature",
    )
    .with_default(json!(true))
}

/// compute_statistics - pointwise ensemble statistics for one variable
pub struct StatisticsTool;

#[async_trait]
impl Tool for StatisticsTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "compute_statistics",
            "Calculate ensemble statistics (mean, median, std dev, min, max, 25th/75th percentiles, spread) \
             for a weather variable across models at each timestep. Use this to quantify forecast uncertainty \
             rather than reading raw arrays.",
        )
        .param("forecast", forecast_param())
        .param("variable", variable_param())
        .param("use_max", use_max_param())
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput, ToolError> {
        let forecast = forecast_arg(&input, "forecast")?;
        let stats = ensemble_statistics(&forecast, variable_arg(&input)?, use_max_arg(&input))?;
        ToolOutput::json(&stats)
    }
}

/// compute_agreement - how closely the models track each other
pub struct AgreementTool;

#[async_trait]
impl Tool for AgreementTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "compute_agreement",
            "Calculate how much the models agree for a variable. Returns an agreement score in [0, 1], \
             an uncertainty level (low, moderate, high) and periods of high and low agreement.",
        )
        .param("forecast", forecast_param())
        .param("variable", variable_param())
        .param(
            "threshold",
            ParamSpec::new(
                ParamType::Number,
                "Models agree if within this value; defaults to 5 F, 0.1 in or 5 mph by variable",
            ),
        )
        .param("use_max", use_max_param())
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput, ToolError> {
        let forecast = forecast_arg(&input, "forecast")?;
        let threshold = input.get("threshold").and_then(Value::as_f64);
        let report = model_agreement(&forecast, variable_arg(&input)?, threshold, use_max_arg(&input))?;
        ToolOutput::json(&report)
    }
}

/// summarize_uncertainty - spread summary across every variable
pub struct UncertaintyTool;

#[async_trait]
impl Tool for UncertaintyTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "summarize_uncertainty",
            "High-level summary of forecast uncertainty across temperature, precipitation and wind. \
             Good for an overall sense of forecast confidence.",
        )
        .param("forecast", forecast_param())
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput, ToolError> {
        let forecast = forecast_arg(&input, "forecast")?;
        ToolOutput::json(&summarize_uncertainty(&forecast)?)
    }
}

/// compute_temperature_range - daily highs and lows together
pub struct TemperatureRangeTool;

#[async_trait]
impl Tool for TemperatureRangeTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "compute_temperature_range",
            "For daily forecasts, calculate ensemble statistics for both temperature_max and temperature_min.",
        )
        .param("forecast", forecast_param())
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput, ToolError> {
        let forecast = forecast_arg(&input, "forecast")?;
        ToolOutput::json(&temperature_range(&forecast)?)
    }
}
