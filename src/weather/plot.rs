//! Ensemble forecast plots
//!
//! One panel per variable: a thin trace per model plus the ensemble mean in
//! bold. `.svg` paths get an SVG with titles, axes and a legend. Anything
//! else is encoded as PNG regardless of its extension; no font backend is
//! compiled in, so PNG output carries the traces only.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use log::{debug, info};
use plotters::coord::Shift;
use plotters::prelude::*;
use serde::Serialize;

use super::model::{EnsembleForecast, ForecastModel, Resolution, Variable};
use super::stats::mean;
use crate::tools::ToolError;

const PALETTE: [RGBColor; 6] = [
    RGBColor(0x1f, 0x77, 0xb4),
    RGBColor(0xff, 0x7f, 0x0e),
    RGBColor(0x2c, 0xa0, 0x2c),
    RGBColor(0xd6, 0x27, 0x28),
    RGBColor(0x94, 0x67, 0xbd),
    RGBColor(0x8c, 0x56, 0x4b),
];

const WIDTH: u32 = 1400;
const PANEL_HEIGHT: u32 = 300;
const TITLE_HEIGHT: u32 = 60;

/// What was drawn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotReport {
    pub output_path: String,
    pub models_plotted: Vec<ForecastModel>,
    pub variables: Vec<Variable>,
    pub num_timesteps: usize,
    pub resolution: Resolution,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl PlotReport {
    /// Whether a file was written
    pub fn written(&self) -> bool {
        !self.models_plotted.is_empty()
    }
}

struct Panel<'a> {
    variable: Variable,
    traces: Vec<(ForecastModel, &'a [Option<f64>])>,
    mean: Vec<Option<f64>>,
}

impl Panel<'_> {
    fn y_range(&self) -> (f64, f64) {
        let (lo, hi) = self
            .traces
            .iter()
            .flat_map(|(_, values)| values.iter().flatten())
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if !lo.is_finite() {
            return (0.0, 1.0);
        }
        let pad = if hi > lo { (hi - lo) * 0.05 } else { 1.0 };
        (lo - pad, hi + pad)
    }
}

/// Render `forecast` to `output_path`, replacing any existing file
///
/// `variables` empty means every variable of the forecast's resolution.
/// When no model has data for any requested variable nothing is written and
/// the report says so.
pub fn render_plot(
    forecast: &EnsembleForecast,
    variables: &[Variable],
    output_path: &Path,
    title: &str,
) -> Result<PlotReport, ToolError> {
    forecast.check_shape()?;
    let resolution = forecast.resolution;

    let mut requested: Vec<Variable> = Vec::new();
    let candidates: Vec<Variable> = if variables.is_empty() {
        Variable::for_resolution(resolution).to_vec()
    } else {
        variables.iter().map(|v| v.resolve(resolution, true)).collect()
    };
    for v in candidates {
        if !requested.contains(&v) {
            requested.push(v);
        }
    }

    let panels: Vec<Panel> = requested
        .iter()
        .filter_map(|&variable| {
            let traces = forecast.series_with_data(variable);
            if traces.is_empty() {
                return None;
            }
            let mean = (0..forecast.num_timesteps())
                .map(|i| {
                    let values: Vec<f64> = traces.iter().filter_map(|(_, v)| v[i]).collect();
                    mean(&values)
                })
                .collect();
            Some(Panel { variable, traces, mean })
        })
        .collect();

    let mut models_plotted: Vec<ForecastModel> = panels
        .iter()
        .flat_map(|p| p.traces.iter().map(|(m, _)| *m))
        .collect();
    models_plotted.sort();
    models_plotted.dedup();

    let mut report = PlotReport {
        output_path: output_path.display().to_string(),
        models_plotted,
        variables: panels.iter().map(|p| p.variable).collect(),
        num_timesteps: forecast.num_timesteps(),
        resolution,
        note: None,
    };

    if panels.is_empty() {
        report.note = Some("No model has data for the requested variables; nothing was plotted".to_string());
        info!("Skipped plot {}: no data", report.output_path);
        return Ok(report);
    }

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| ToolError::Render(format!("Cannot create {}: {}", parent.display(), e)))?;
    }

    let height = TITLE_HEIGHT + PANEL_HEIGHT * panels.len() as u32;
    let is_svg = output_path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"));

    debug!(
        "Rendering {} panel(s) to {} as {}",
        panels.len(),
        output_path.display(),
        if is_svg { "SVG" } else { "PNG" }
    );

    let drawn = if is_svg {
        let root = SVGBackend::new(output_path, (WIDTH, height)).into_drawing_area();
        draw(&root, &forecast.times, &panels, Some(title)).map_err(|e| e.to_string())
    } else {
        write_png(output_path, (WIDTH, height), &forecast.times, &panels)
    };
    drawn.map_err(|e| ToolError::Render(format!("Failed to draw {}: {}", output_path.display(), e)))?;

    info!("Wrote plot {}", report.output_path);
    Ok(report)
}

/// Draw into an RGB buffer and encode it as PNG, whatever the extension
fn write_png(path: &Path, (width, height): (u32, u32), times: &[String], panels: &[Panel]) -> Result<(), String> {
    let mut buffer = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        draw(&root, times, panels, None).map_err(|e| e.to_string())?;
    }

    let file = File::create(path).map_err(|e| e.to_string())?;
    let mut writer = BufWriter::new(file);
    PngEncoder::new(&mut writer)
        .write_image(&buffer, width, height, ExtendedColorType::Rgb8)
        .map_err(|e| e.to_string())?;
    writer.flush().map_err(|e| e.to_string())
}

/// Draw every panel; `title` also switches on axes, labels and legend
fn draw<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    times: &[String],
    panels: &[Panel],
    title: Option<&str>,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let labelled = title.is_some();
    let body = match title {
        Some(title) => root.titled(title, ("sans-serif", 28))?,
        None => root.margin(TITLE_HEIGHT, 0, 0, 0),
    };

    let x_max = times.len().saturating_sub(1).max(1) as f64;
    let label_x = |x: &f64| {
        let i = x.round();
        if i >= 0.0 && (i as usize) < times.len() {
            short_time(&times[i as usize])
        } else {
            String::new()
        }
    };

    for (area, panel) in body.split_evenly((panels.len(), 1)).iter().zip(panels) {
        let (y_min, y_max) = panel.y_range();
        let mut builder = ChartBuilder::on(area);
        builder.margin(12);
        if labelled {
            builder.x_label_area_size(36).y_label_area_size(70);
        }
        let mut chart = builder.build_cartesian_2d(0f64..x_max, y_min..y_max)?;

        if labelled {
            chart
                .configure_mesh()
                .x_labels(8)
                .y_labels(6)
                .x_label_formatter(&label_x)
                .y_desc(panel.variable.label())
                .draw()?;
        }

        for (model, values) in &panel.traces {
            let style = PALETTE[*model as usize % PALETTE.len()].mix(0.7).stroke_width(2);
            for (n, segment) in segments(values).into_iter().enumerate() {
                let anno = chart.draw_series(LineSeries::new(segment, style))?;
                if labelled && n == 0 {
                    anno.label(model.id().to_uppercase())
                        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
                }
            }
        }

        let mean_style = BLACK.stroke_width(3);
        for (n, segment) in segments(&panel.mean).into_iter().enumerate() {
            let anno = chart.draw_series(LineSeries::new(segment, mean_style))?;
            if labelled && n == 0 {
                anno.label("Ensemble Mean")
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], mean_style));
            }
        }

        if labelled {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()?;
        }
    }

    root.present()?;
    Ok(())
}

/// Contiguous runs of present samples, as (index, value) points
fn segments(values: &[Option<f64>]) -> Vec<Vec<(f64, f64)>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    for (i, value) in values.iter().enumerate() {
        match value {
            Some(y) if y.is_finite() => current.push((i as f64, *y)),
            _ => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Compact axis label: `MM/DD` for dates, `MM/DD HH:MM` for hourly stamps
fn short_time(stamp: &str) -> String {
    if let Ok(dt) = NaiveDateTime::parse_from_str(stamp, "%Y-%m-%dT%H:%M") {
        return dt.format("%m/%d %H:%M").to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(stamp, "%Y-%m-%d") {
        return date.format("%m/%d").to_string();
    }
    stamp.to_string()
}
