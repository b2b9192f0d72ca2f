//! Ensemble analysis: pointwise statistics, model agreement and uncertainty
//!
//! Everything here is pure: the same forecast always yields the same report.

use std::collections::BTreeMap;

use serde::Serialize;

use super::model::{EnsembleForecast, ForecastModel, Resolution, Variable, VariableFamily};
use super::stats::{PointStats, mean, round2, round3};
use crate::tools::ToolError;

/// Agreement scores at or above this mark a high-agreement period
pub const HIGH_AGREEMENT: f64 = 0.8;

/// Agreement scores at or below this mark a low-agreement period
pub const LOW_AGREEMENT: f64 = 0.5;

/// Periods reported per agreement class
const MAX_PERIODS: usize = 5;

/// Coarse uncertainty classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UncertaintyLevel {
    Low,
    Moderate,
    High,
}

impl UncertaintyLevel {
    /// Classify an average spread with fixed per-family thresholds
    pub fn classify(family: VariableFamily, average_spread: f64) -> Self {
        let (low_below, high_from) = match family {
            VariableFamily::Temperature => (3.0, 7.0),
            VariableFamily::Precipitation => (0.05, 0.2),
            VariableFamily::Wind => (3.0, 8.0),
        };
        if average_spread < low_below {
            UncertaintyLevel::Low
        } else if average_spread < high_from {
            UncertaintyLevel::Moderate
        } else {
            UncertaintyLevel::High
        }
    }
}

/// Default agreement threshold: models agree when within this distance
pub fn default_threshold(family: VariableFamily) -> f64 {
    match family {
        VariableFamily::Temperature => 5.0,
        VariableFamily::Precipitation => 0.1,
        VariableFamily::Wind => 5.0,
    }
}

/// Pointwise statistics across models, `None` where no model has data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleStatistics {
    pub variable: Variable,
    pub field: Variable,
    pub resolution: Resolution,
    pub num_models: usize,
    pub models: Vec<ForecastModel>,
    pub times: Vec<String>,
    pub mean: Vec<Option<f64>>,
    pub median: Vec<Option<f64>>,
    pub stddev: Vec<Option<f64>>,
    pub min: Vec<Option<f64>>,
    pub max: Vec<Option<f64>>,
    pub percentile_25: Vec<Option<f64>>,
    pub percentile_75: Vec<Option<f64>>,
    pub spread: Vec<Option<f64>>,
}

/// Values present at timestep `i` across the given series
fn values_at(series: &[(ForecastModel, &[Option<f64>])], i: usize) -> Vec<f64> {
    series.iter().filter_map(|(_, values)| values.get(i).copied().flatten()).collect()
}

/// Series for the resolved field that carry at least one sample
fn field_series(
    forecast: &EnsembleForecast,
    field: Variable,
) -> Result<Vec<(ForecastModel, &[Option<f64>])>, ToolError> {
    forecast.check_shape()?;
    let series = forecast.series_with_data(field);
    if series.is_empty() {
        return Err(ToolError::InsufficientData(format!(
            "No model in the forecast has '{}' data (models: {})",
            field,
            forecast
                .model_ids()
                .iter()
                .map(|m| m.id())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }
    Ok(series)
}

/// Compute pointwise ensemble statistics for one variable
pub fn ensemble_statistics(
    forecast: &EnsembleForecast,
    variable: Variable,
    use_max: bool,
) -> Result<EnsembleStatistics, ToolError> {
    let field = variable.resolve(forecast.resolution, use_max);
    let series = field_series(forecast, field)?;
    let n = forecast.num_timesteps();

    let mut out = EnsembleStatistics {
        variable,
        field,
        resolution: forecast.resolution,
        num_models: series.len(),
        models: series.iter().map(|(m, _)| *m).collect(),
        times: forecast.times.clone(),
        mean: Vec::with_capacity(n),
        median: Vec::with_capacity(n),
        stddev: Vec::with_capacity(n),
        min: Vec::with_capacity(n),
        max: Vec::with_capacity(n),
        percentile_25: Vec::with_capacity(n),
        percentile_75: Vec::with_capacity(n),
        spread: Vec::with_capacity(n),
    };

    for i in 0..n {
        let point = PointStats::compute(&values_at(&series, i)).map(PointStats::rounded);
        out.mean.push(point.map(|p| p.mean));
        out.median.push(point.map(|p| p.median));
        out.stddev.push(point.map(|p| p.stddev));
        out.min.push(point.map(|p| p.min));
        out.max.push(point.map(|p| p.max));
        out.percentile_25.push(point.map(|p| p.percentile_25));
        out.percentile_75.push(point.map(|p| p.percentile_75));
        out.spread.push(point.map(|p| p.spread));
    }

    Ok(out)
}

/// A timestep singled out by its agreement score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgreementPeriod {
    pub time: String,
    pub spread: f64,
    pub agreement_score: f64,
}

/// How closely models track each other for one variable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgreementReport {
    pub variable: Variable,
    pub field: Variable,
    pub num_models: usize,
    pub models: Vec<ForecastModel>,
    pub threshold: f64,
    pub agreement_score: f64,
    pub min_agreement: f64,
    pub max_agreement: f64,
    pub mean_spread: f64,
    pub uncertainty_level: UncertaintyLevel,
    pub high_agreement_count: usize,
    pub low_agreement_count: usize,
    pub high_agreement_periods: Vec<AgreementPeriod>,
    pub low_agreement_periods: Vec<AgreementPeriod>,
}

/// Score model agreement per timestep as `max(0, 1 - spread / (2 * threshold))`
///
/// Timesteps where fewer than two models have data are not scored.
pub fn model_agreement(
    forecast: &EnsembleForecast,
    variable: Variable,
    threshold: Option<f64>,
    use_max: bool,
) -> Result<AgreementReport, ToolError> {
    let field = variable.resolve(forecast.resolution, use_max);
    let threshold = threshold.unwrap_or_else(|| default_threshold(field.family()));
    if !(threshold.is_finite() && threshold > 0.0) {
        return Err(ToolError::InvalidInput(format!(
            "threshold must be a positive number, got {}",
            threshold
        )));
    }

    let series = field_series(forecast, field)?;
    if series.len() < 2 {
        return Err(ToolError::InsufficientData(format!(
            "Need at least 2 models with '{}' data to compute agreement, got {}",
            field,
            series.len()
        )));
    }

    let mut scores = Vec::new();
    let mut spreads = Vec::new();
    let mut high = Vec::new();
    let mut low = Vec::new();

    for (i, time) in forecast.times.iter().enumerate() {
        let values = values_at(&series, i);
        if values.len() < 2 {
            continue;
        }
        let Some(point) = PointStats::compute(&values) else {
            continue;
        };
        let score = (1.0 - point.spread / (threshold * 2.0)).max(0.0);
        scores.push(score);
        spreads.push(point.spread);

        let period = AgreementPeriod {
            time: time.clone(),
            spread: round2(point.spread),
            agreement_score: round3(score),
        };
        if score >= HIGH_AGREEMENT {
            high.push(period);
        } else if score <= LOW_AGREEMENT {
            low.push(period);
        }
    }

    let (Some(avg_score), Some(avg_spread)) = (mean(&scores), mean(&spreads)) else {
        return Err(ToolError::InsufficientData(format!(
            "No timestep has '{}' data from at least 2 models",
            field
        )));
    };

    let high_count = high.len();
    let low_count = low.len();
    high.truncate(MAX_PERIODS);
    low.truncate(MAX_PERIODS);

    Ok(AgreementReport {
        variable,
        field,
        num_models: series.len(),
        models: series.iter().map(|(m, _)| *m).collect(),
        threshold,
        agreement_score: round3(avg_score),
        min_agreement: round3(scores.iter().copied().fold(f64::INFINITY, f64::min)),
        max_agreement: round3(scores.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        mean_spread: round2(avg_spread),
        uncertainty_level: UncertaintyLevel::classify(field.family(), avg_spread),
        high_agreement_count: high_count,
        low_agreement_count: low_count,
        high_agreement_periods: high,
        low_agreement_periods: low,
    })
}

/// Spread summary for one variable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableUncertainty {
    pub average_spread: f64,
    pub max_spread: f64,
    pub average_std_dev: f64,
    pub uncertainty_level: UncertaintyLevel,
}

impl VariableUncertainty {
    fn from_statistics(stats: &EnsembleStatistics) -> Option<Self> {
        let spreads: Vec<f64> = stats.spread.iter().flatten().copied().collect();
        let stddevs: Vec<f64> = stats.stddev.iter().flatten().copied().collect();
        let average_spread = mean(&spreads)?;
        let max_spread = spreads.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            average_spread: round2(average_spread),
            max_spread: round2(max_spread),
            average_std_dev: round2(mean(&stddevs).unwrap_or(0.0)),
            uncertainty_level: UncertaintyLevel::classify(stats.field.family(), average_spread),
        })
    }
}

/// Uncertainty across every variable the forecast carries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UncertaintySummary {
    pub num_models: usize,
    pub models: Vec<ForecastModel>,
    pub resolution: Resolution,
    pub variables: BTreeMap<Variable, VariableUncertainty>,
}

/// Summarize spread for each variable present in the forecast
pub fn summarize_uncertainty(forecast: &EnsembleForecast) -> Result<UncertaintySummary, ToolError> {
    if forecast.models.is_empty() {
        return Err(ToolError::InsufficientData("Forecast has no model data".to_string()));
    }
    forecast.check_shape()?;

    let mut variables = BTreeMap::new();
    for &field in Variable::for_resolution(forecast.resolution) {
        if forecast.series_with_data(field).is_empty() {
            continue;
        }
        let stats = ensemble_statistics(forecast, field, true)?;
        if let Some(summary) = VariableUncertainty::from_statistics(&stats) {
            variables.insert(field, summary);
        }
    }

    Ok(UncertaintySummary {
        num_models: forecast.models.len(),
        models: forecast.model_ids(),
        resolution: forecast.resolution,
        variables,
    })
}

/// Statistics for daily highs and lows together
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureRange {
    pub num_models: usize,
    pub models: Vec<ForecastModel>,
    pub temperature_max: EnsembleStatistics,
    pub temperature_min: EnsembleStatistics,
}

/// Compute statistics for both daily temperature fields
pub fn temperature_range(forecast: &EnsembleForecast) -> Result<TemperatureRange, ToolError> {
    if forecast.resolution != Resolution::Daily {
        return Err(ToolError::InvalidInput(
            "Temperature range needs a daily forecast; fetch with hourly=false".to_string(),
        ));
    }
    let max = ensemble_statistics(forecast, Variable::TemperatureMax, true)?;
    let min = ensemble_statistics(forecast, Variable::TemperatureMin, false)?;

    Ok(TemperatureRange {
        num_models: max.num_models,
        models: max.models.clone(),
        temperature_max: max,
        temperature_min: min,
    })
}
