//! Weather domain: forecast data model, providers, analysis and plotting

pub mod analysis;
pub mod forecast;
pub mod geocoding;
pub mod model;
pub mod open_meteo;
pub mod plot;
pub mod stats;

pub use analysis::{
    AgreementPeriod, AgreementReport, EnsembleStatistics, TemperatureRange, UncertaintyLevel, UncertaintySummary,
    VariableUncertainty, ensemble_statistics, model_agreement, summarize_uncertainty, temperature_range,
};
pub use forecast::{ForecastProvider, ModelForecast, fetch_ensemble};
pub use geocoding::{Geocoder, NOMINATIM_URL, NominatimGeocoder, Place, parse_coordinates};
pub use model::{
    DEFAULT_FORECAST_DAYS, EnsembleForecast, ForecastModel, ForecastRequest, MAX_FORECAST_DAYS, ModelSeries,
    Resolution, Variable, VariableFamily,
};
pub use open_meteo::{OPEN_METEO_URL, OpenMeteoClient};
pub use plot::{PlotReport, render_plot};
