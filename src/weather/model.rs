//! Ensemble forecast data model
//!
//! All models in an [`EnsembleForecast`] share one `times` axis. A variable a
//! model did not return is absent from that model's map; a missing sample is
//! `None` (serialized as `null`), never zero.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::tools::ToolError;

/// Maximum forecast horizon supported by the forecast provider
pub const MAX_FORECAST_DAYS: u8 = 16;

/// Default forecast horizon
pub const DEFAULT_FORECAST_DAYS: u8 = 7;

/// Numerical weather prediction models the forecast provider exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastModel {
    Gfs,
    Ecmwf,
    Gem,
    Icon,
}

impl ForecastModel {
    pub const ALL: [ForecastModel; 4] = [
        ForecastModel::Gfs,
        ForecastModel::Ecmwf,
        ForecastModel::Gem,
        ForecastModel::Icon,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            ForecastModel::Gfs => "gfs",
            ForecastModel::Ecmwf => "ecmwf",
            ForecastModel::Gem => "gem",
            ForecastModel::Icon => "icon",
        }
    }

    /// Path segment of the model's Open-Meteo endpoint
    pub fn endpoint(&self) -> &'static str {
        match self {
            ForecastModel::Icon => "dwd-icon",
            other => other.id(),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ForecastModel::Gfs => "NOAA Global Forecast System: global coverage, ~13 km, updated 4x daily",
            ForecastModel::Ecmwf => "ECMWF IFS: European Centre model, strong medium-range accuracy",
            ForecastModel::Gem => "Environment Canada GEM: ~15 km, good over North America",
            ForecastModel::Icon => "DWD ICON: German Weather Service model, ~13 km, high resolution over Europe",
        }
    }
}

impl fmt::Display for ForecastModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ForecastModel {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gfs" => Ok(ForecastModel::Gfs),
            "ecmwf" => Ok(ForecastModel::Ecmwf),
            "gem" => Ok(ForecastModel::Gem),
            "icon" => Ok(ForecastModel::Icon),
            other => Err(ToolError::InvalidInput(format!(
                "Unknown model '{}'; expected one of gfs, ecmwf, gem, icon",
                other
            ))),
        }
    }
}

/// Time resolution of a forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Hourly,
    Daily,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Hourly => "hourly",
            Resolution::Daily => "daily",
        }
    }
}

/// Which fixed uncertainty thresholds apply to a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableFamily {
    Temperature,
    Precipitation,
    Wind,
}

/// Forecast variables, keyed as they appear in forecast payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    Temperature,
    TemperatureMax,
    TemperatureMin,
    Precipitation,
    WindSpeed,
    WindSpeedMax,
}

impl Variable {
    pub const KEYS: [&'static str; 6] = [
        "temperature",
        "temperature_max",
        "temperature_min",
        "precipitation",
        "wind_speed",
        "wind_speed_max",
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Variable::Temperature => "temperature",
            Variable::TemperatureMax => "temperature_max",
            Variable::TemperatureMin => "temperature_min",
            Variable::Precipitation => "precipitation",
            Variable::WindSpeed => "wind_speed",
            Variable::WindSpeedMax => "wind_speed_max",
        }
    }

    /// Variables a forecast of the given resolution carries, in display order
    pub fn for_resolution(resolution: Resolution) -> &'static [Variable] {
        match resolution {
            Resolution::Hourly => &[Variable::Temperature, Variable::Precipitation, Variable::WindSpeed],
            Resolution::Daily => &[
                Variable::TemperatureMax,
                Variable::TemperatureMin,
                Variable::Precipitation,
                Variable::WindSpeedMax,
            ],
        }
    }

    /// Open-Meteo field name for this variable
    pub fn api_name(&self) -> &'static str {
        match self {
            Variable::Temperature => "temperature_2m",
            Variable::TemperatureMax => "temperature_2m_max",
            Variable::TemperatureMin => "temperature_2m_min",
            Variable::Precipitation => "precipitation",
            Variable::WindSpeed => "wind_speed_10m",
            Variable::WindSpeedMax => "wind_speed_10m_max",
        }
    }

    /// Open-Meteo field name, accounting for daily precipitation being a sum
    pub fn api_name_for(&self, resolution: Resolution) -> &'static str {
        match (self, resolution) {
            (Variable::Precipitation, Resolution::Daily) => "precipitation_sum",
            (v, _) => v.api_name(),
        }
    }

    /// Map a requested variable onto the field a forecast actually carries
    ///
    /// Daily data has no plain temperature or wind speed: temperature resolves
    /// to the daily max (or min when `use_max` is false) and wind speed to the
    /// daily max.
    pub fn resolve(self, resolution: Resolution, use_max: bool) -> Variable {
        match (self, resolution) {
            (Variable::Temperature, Resolution::Daily) if use_max => Variable::TemperatureMax,
            (Variable::Temperature, Resolution::Daily) => Variable::TemperatureMin,
            (Variable::WindSpeed, Resolution::Daily) => Variable::WindSpeedMax,
            (v, _) => v,
        }
    }

    pub fn family(&self) -> VariableFamily {
        match self {
            Variable::Temperature | Variable::TemperatureMax | Variable::TemperatureMin => {
                VariableFamily::Temperature
            }
            Variable::Precipitation => VariableFamily::Precipitation,
            Variable::WindSpeed | Variable::WindSpeedMax => VariableFamily::Wind,
        }
    }

    /// Axis label with units
    pub fn label(&self) -> &'static str {
        match self {
            Variable::Temperature => "Temperature (°F)",
            Variable::TemperatureMax => "Temperature Max (°F)",
            Variable::TemperatureMin => "Temperature Min (°F)",
            Variable::Precipitation => "Precipitation (in)",
            Variable::WindSpeed => "Wind Speed (mph)",
            Variable::WindSpeedMax => "Wind Speed Max (mph)",
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Variable {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "temperature" => Ok(Variable::Temperature),
            "temperature_max" => Ok(Variable::TemperatureMax),
            "temperature_min" => Ok(Variable::TemperatureMin),
            "precipitation" => Ok(Variable::Precipitation),
            "wind_speed" => Ok(Variable::WindSpeed),
            "wind_speed_max" => Ok(Variable::WindSpeedMax),
            other => Err(ToolError::InvalidInput(format!("Unknown variable '{}'", other))),
        }
    }
}

/// One model's series, keyed by variable
pub type ModelSeries = BTreeMap<Variable, Vec<Option<f64>>>;

/// Multi-model forecast on a shared time axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleForecast {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub resolution: Resolution,
    pub times: Vec<String>,
    pub models: BTreeMap<ForecastModel, ModelSeries>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failed_models: BTreeMap<ForecastModel, String>,
}

impl EnsembleForecast {
    pub fn num_timesteps(&self) -> usize {
        self.times.len()
    }

    pub fn model_ids(&self) -> Vec<ForecastModel> {
        self.models.keys().copied().collect()
    }

    /// Series for `variable` from every model that carries it
    pub fn series(&self, variable: Variable) -> Vec<(ForecastModel, &[Option<f64>])> {
        self.models
            .iter()
            .filter_map(|(model, series)| series.get(&variable).map(|v| (*model, v.as_slice())))
            .collect()
    }

    /// Like [`series`](Self::series), minus models whose samples are all missing
    pub fn series_with_data(&self, variable: Variable) -> Vec<(ForecastModel, &[Option<f64>])> {
        self.series(variable)
            .into_iter()
            .filter(|(_, values)| values.iter().any(Option::is_some))
            .collect()
    }

    /// Check every series lines up with the time axis
    pub fn check_shape(&self) -> Result<(), ToolError> {
        for (model, series) in &self.models {
            for (variable, values) in series {
                if values.len() != self.times.len() {
                    return Err(ToolError::InvalidInput(format!(
                        "Model {} has {} {} values for {} timesteps",
                        model,
                        values.len(),
                        variable,
                        self.times.len()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Validated arguments for a forecast fetch
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub days: u8,
    pub models: Vec<ForecastModel>,
    pub resolution: Resolution,
}

impl ForecastRequest {
    /// Validate and build a request; nothing here touches the network
    pub fn new(
        latitude: f64,
        longitude: f64,
        days: i64,
        models: Vec<ForecastModel>,
        resolution: Resolution,
    ) -> Result<Self, ToolError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(ToolError::InvalidInput(format!(
                "latitude must be within [-90, 90], got {}",
                latitude
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(ToolError::InvalidInput(format!(
                "longitude must be within [-180, 180], got {}",
                longitude
            )));
        }
        if !(1..=MAX_FORECAST_DAYS as i64).contains(&days) {
            return Err(ToolError::InvalidInput(format!(
                "days must be within [1, {}], got {}",
                MAX_FORECAST_DAYS, days
            )));
        }

        let mut unique = Vec::with_capacity(models.len());
        for model in models {
            if !unique.contains(&model) {
                unique.push(model);
            }
        }
        if unique.is_empty() {
            unique.push(ForecastModel::Gfs);
        }

        Ok(Self {
            latitude,
            longitude,
            days: days as u8,
            models: unique,
            resolution,
        })
    }
}
