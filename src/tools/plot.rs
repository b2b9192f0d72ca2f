//! render_plot tool - draw an ensemble forecast to an image file

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{ParamSpec, ParamType, Tool, ToolError, ToolOutput, ToolSpec, forecast_arg, forecast_param};
use crate::weather::{Variable, render_plot};

/// Used when neither the caller nor the config names an output file
pub const DEFAULT_PLOT_PATH: &str = "forecast_uncertainty.svg";

const DEFAULT_TITLE: &str = "Weather Forecast Ensemble Analysis";

pub struct RenderPlotTool {
    default_path: PathBuf,
}

impl RenderPlotTool {
    pub fn new(default_path: PathBuf) -> Self {
        Self { default_path }
    }
}

impl Default for RenderPlotTool {
    fn default() -> Self {
        Self::new(PathBuf::from(DEFAULT_PLOT_PATH))
    }
}

#[async_trait]
impl Tool for RenderPlotTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "render_plot",
            "Create a multi-panel plot of an ensemble forecast: one panel per variable with every model's \
             trace and the ensemble mean. Paths ending in .svg produce an SVG, anything else a PNG. \
             Returns the path of the saved image.",
        )
        .param("forecast", forecast_param())
        .param(
            "variables",
            ParamSpec::new(ParamType::Array, "Variables to plot; defaults to every variable in the forecast")
                .items(ParamType::String)
                .allowed(Variable::KEYS),
        )
        .param(
            "output_path",
            ParamSpec::new(ParamType::String, "Where to save the plot, e.g. 'outputs/denver_forecast.svg'")
                .with_default(json!(self.default_path.display().to_string())),
        )
        .param(
            "title",
            ParamSpec::new(ParamType::String, "Title for the plot").with_default(json!(DEFAULT_TITLE)),
        )
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput, ToolError> {
        let forecast = forecast_arg(&input, "forecast")?;
        let variables = match input.get("variables").and_then(Value::as_array) {
            None => Vec::new(),
            Some(items) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::parse::<Variable>)
                .collect::<Result<Vec<_>, _>>()?,
        };
        let output_path = input
            .get("output_path")
            .and_then(Value::as_str)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| self.default_path.clone());
        let title = input
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_TITLE)
            .to_string();

        // Drawing is blocking file I/O
        let path = output_path.clone();
        let report = tokio::task::spawn_blocking(move || render_plot(&forecast, &variables, &path, &title))
            .await
            .map_err(|e| ToolError::Render(format!("Render task failed: {}", e)))??;

        let written = report.written();
        let output = ToolOutput::json(&report)?;
        Ok(if written { output.with_artifact(output_path) } else { output })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn forecast() -> Value {
        json!({
            "latitude": 39.74,
            "longitude": -104.99,
            "timezone": "America/Denver",
            "resolution": "hourly",
            "times": ["2026-01-05T00:00", "2026-01-05T01:00", "2026-01-05T02:00"],
            "models": {
                "gfs": {"temperature": [30.0, 31.0, 29.5], "wind_speed": [5.0, 6.0, 7.0]},
                "icon": {"temperature": [31.0, 30.0, 30.5]}
            }
        })
    }

    #[tokio::test]
    async fn test_render_plot_writes_artifact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("denver.svg");

        let out = RenderPlotTool::default()
            .execute(json!({"forecast": forecast(), "output_path": path.display().to_string()}))
            .await
            .unwrap();

        assert!(path.exists());
        assert_eq!(out.artifact, Some(path));
        assert_eq!(out.payload["models_plotted"], json!(["gfs", "icon"]));
        assert_eq!(out.payload["num_timesteps"], 3);
        assert_eq!(out.payload["resolution"], "hourly");
    }

    #[tokio::test]
    async fn test_render_plot_uses_default_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plots/default.svg");

        let out = RenderPlotTool::new(path.clone())
            .execute(json!({"forecast": forecast(), "variables": ["wind_speed"]}))
            .await
            .unwrap();

        assert!(path.exists());
        assert_eq!(out.payload["models_plotted"], json!(["gfs"]));
    }

    #[tokio::test]
    async fn test_render_plot_nothing_to_draw() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.svg");

        let out = RenderPlotTool::default()
            .execute(json!({
                "forecast": forecast(),
                "variables": ["precipitation"],
                "output_path": path.display().to_string()
            }))
            .await
            .unwrap();

        assert!(!path.exists());
        assert!(out.artifact.is_none());
        assert_eq!(out.payload["models_plotted"], json!([]));
        assert!(out.payload["note"].is_string());
    }
}
