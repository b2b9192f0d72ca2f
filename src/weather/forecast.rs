//! Multi-model forecast retrieval
//!
//! A [`ForecastProvider`] fetches one model at a time; [`fetch_ensemble`]
//! fans the requested models out concurrently and merges them onto a single
//! time axis.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, warn};

use super::model::{EnsembleForecast, ForecastModel, ForecastRequest, ModelSeries};
use crate::tools::ToolError;

/// One model's forecast as returned by the provider
#[derive(Debug, Clone, PartialEq)]
pub struct ModelForecast {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub times: Vec<String>,
    pub series: ModelSeries,
}

/// Source of single-model forecasts
#[async_trait]
pub trait ForecastProvider: Send + Sync {
    async fn fetch_model(&self, request: &ForecastRequest, model: ForecastModel) -> Result<ModelForecast, ToolError>;
}

/// Fetch every requested model concurrently and merge the survivors
///
/// The first model (in request order) that succeeds defines the time axis;
/// other models are aligned onto it, with `None` where a model has no sample
/// for a timestamp. Failed models are listed in `failed_models`. Fails only
/// when every model fails.
pub async fn fetch_ensemble(
    provider: &dyn ForecastProvider,
    request: &ForecastRequest,
) -> Result<EnsembleForecast, ToolError> {
    let fetches = request.models.iter().map(|&model| async move {
        debug!("Fetching {} forecast for ({}, {})", model, request.latitude, request.longitude);
        (model, provider.fetch_model(request, model).await)
    });
    let results = join_all(fetches).await;

    let mut base: Option<ModelForecast> = None;
    let mut survivors = Vec::new();
    let mut failed_models = BTreeMap::new();

    for (model, result) in results {
        match result {
            Ok(forecast) => {
                if base.is_none() {
                    base = Some(forecast.clone());
                }
                survivors.push((model, forecast));
            }
            Err(e) => {
                warn!("Forecast model {} failed: {}", model, e);
                failed_models.insert(model, e.to_string());
            }
        }
    }

    let Some(base) = base else {
        let reasons = failed_models
            .iter()
            .map(|(m, reason)| format!("{}: {}", m, reason))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ToolError::UpstreamUnavailable(format!("All forecast models failed ({})", reasons)));
    };

    let axis: HashMap<&str, usize> = base.times.iter().enumerate().map(|(i, t)| (t.as_str(), i)).collect();

    let mut models = BTreeMap::new();
    for (model, forecast) in &survivors {
        let series = if forecast.times == base.times {
            forecast.series.clone()
        } else {
            align(forecast, &base.times, &axis)
        };
        models.insert(*model, series);
    }

    Ok(EnsembleForecast {
        latitude: base.latitude,
        longitude: base.longitude,
        timezone: base.timezone,
        resolution: request.resolution,
        times: base.times,
        models,
        failed_models,
    })
}

/// Re-index a model's series onto the reference time axis
fn align(forecast: &ModelForecast, times: &[String], axis: &HashMap<&str, usize>) -> ModelSeries {
    forecast
        .series
        .iter()
        .map(|(variable, values)| {
            let mut aligned = vec![None; times.len()];
            for (t, value) in forecast.times.iter().zip(values) {
                if let Some(&i) = axis.get(t.as_str()) {
                    aligned[i] = *value;
                }
            }
            (*variable, aligned)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::model::{Resolution, Variable};

    struct StubProvider {
        failing: Vec<ForecastModel>,
    }

    #[async_trait]
    impl ForecastProvider for StubProvider {
        async fn fetch_model(
            &self,
            _request: &ForecastRequest,
            model: ForecastModel,
        ) -> Result<ModelForecast, ToolError> {
            if self.failing.contains(&model) {
                return Err(ToolError::UpstreamUnavailable(format!("{} is down", model)));
            }
            // ICON starts an hour later than everyone else
            let (times, temps) = match model {
                ForecastModel::Icon => (vec!["T1", "T2"], vec![Some(11.0), Some(12.0)]),
                _ => (vec!["T0", "T1"], vec![Some(1.0), Some(2.0)]),
            };
            Ok(ModelForecast {
                latitude: 39.74,
                longitude: -104.99,
                timezone: "America/Denver".to_string(),
                times: times.into_iter().map(String::from).collect(),
                series: BTreeMap::from([(Variable::Temperature, temps)]),
            })
        }
    }

    fn request(models: Vec<ForecastModel>) -> ForecastRequest {
        ForecastRequest::new(39.74, -104.99, 2, models, Resolution::Hourly).unwrap()
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_survivors() {
        let provider = StubProvider {
            failing: vec![ForecastModel::Gem],
        };
        let forecast = fetch_ensemble(&provider, &request(ForecastModel::ALL.to_vec())).await.unwrap();

        assert_eq!(forecast.models.len(), 3);
        assert!(!forecast.models.contains_key(&ForecastModel::Gem));
        assert!(forecast.failed_models[&ForecastModel::Gem].contains("gem is down"));
    }

    #[tokio::test]
    async fn test_all_failed_is_upstream_unavailable() {
        let provider = StubProvider {
            failing: ForecastModel::ALL.to_vec(),
        };
        let err = fetch_ensemble(&provider, &request(vec![ForecastModel::Gfs, ForecastModel::Ecmwf]))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::UpstreamUnavailable(_)));
        assert!(err.to_string().contains("gfs"));
        assert!(err.to_string().contains("ecmwf"));
    }

    #[tokio::test]
    async fn test_aligns_onto_first_successful_axis() {
        let provider = StubProvider {
            failing: vec![ForecastModel::Gfs],
        };
        let forecast = fetch_ensemble(&provider, &request(vec![ForecastModel::Gfs, ForecastModel::Icon, ForecastModel::Ecmwf]))
            .await
            .unwrap();

        // GFS failed, so ICON's axis wins
        assert_eq!(forecast.times, vec!["T1", "T2"]);
        assert_eq!(
            forecast.models[&ForecastModel::Icon][&Variable::Temperature],
            vec![Some(11.0), Some(12.0)]
        );
        assert_eq!(
            forecast.models[&ForecastModel::Ecmwf][&Variable::Temperature],
            vec![Some(2.0), None]
        );
        assert!(forecast.check_shape().is_ok());
    }
}
