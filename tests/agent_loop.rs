//! Agent loop integration tests
//!
//! Drives the full weather tool registry with a scripted reasoning client and
//! in-memory providers, so nothing here touches the network.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;

use weather_agent::llm::{MockLlmClient, ReasoningResponse, Role, ToolCall, ToolOutcome, ToolResult};
use weather_agent::runner::{AbortReason, AgentLoop, LoopConfig};
use weather_agent::tools::{Tool, ToolError, ToolOutput, ToolRegistry, ToolSpec};
use weather_agent::weather::{
    ForecastModel, ForecastProvider, ForecastRequest, Geocoder, ModelForecast, ModelSeries, Place, Variable,
};

struct FixedGeocoder {
    calls: AtomicUsize,
}

#[async_trait]
impl Geocoder for FixedGeocoder {
    async fn geocode(&self, location: &str) -> Result<Place, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match location {
            "Denver" => Ok(Place {
                latitude: 39.7392,
                longitude: -104.9903,
                display_name: "Denver, Colorado, United States".to_string(),
            }),
            other => Err(ToolError::NotFound(other.to_string())),
        }
    }
}

/// Three days of daily data per model; ICON is always down
struct FakeForecaster {
    calls: AtomicUsize,
}

#[async_trait]
impl ForecastProvider for FakeForecaster {
    async fn fetch_model(&self, request: &ForecastRequest, model: ForecastModel) -> Result<ModelForecast, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if model == ForecastModel::Icon {
            return Err(ToolError::UpstreamUnavailable("icon returned 503".to_string()));
        }
        let offset = match model {
            ForecastModel::Gfs => 0.0,
            ForecastModel::Ecmwf => 2.0,
            _ => -1.0,
        };
        let mut series = ModelSeries::new();
        series.insert(Variable::TemperatureMax, vec![Some(50.0 + offset), Some(55.0 + offset), Some(48.0 + offset)]);
        series.insert(Variable::TemperatureMin, vec![Some(20.0 + offset), Some(24.0 + offset), Some(18.0 + offset)]);
        series.insert(Variable::Precipitation, vec![Some(0.0), Some(0.1), None]);
        Ok(ModelForecast {
            latitude: request.latitude,
            longitude: request.longitude,
            timezone: "America/Denver".to_string(),
            times: vec!["2026-01-05".into(), "2026-01-06".into(), "2026-01-07".into()],
            series,
        })
    }
}

struct Harness {
    geocoder: Arc<FixedGeocoder>,
    forecaster: Arc<FakeForecaster>,
    registry: Arc<ToolRegistry>,
    dir: TempDir,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let geocoder = Arc::new(FixedGeocoder {
        calls: AtomicUsize::new(0),
    });
    let forecaster = Arc::new(FakeForecaster {
        calls: AtomicUsize::new(0),
    });
    let registry =
        ToolRegistry::weather(geocoder.clone(), forecaster.clone(), dir.path().join("default.svg")).unwrap();
    Harness {
        geocoder,
        forecaster,
        registry: Arc::new(registry),
        dir,
    }
}

fn batch(calls: Vec<ToolCall>) -> ReasoningResponse {
    ReasoningResponse::ToolCallBatch { text: None, calls }
}

fn answer(text: &str) -> ReasoningResponse {
    ReasoningResponse::FinalAnswer(text.to_string())
}

fn config() -> LoopConfig {
    LoopConfig {
        system_prompt: "You are a weather forecasting assistant.".to_string(),
        ..Default::default()
    }
}

/// Tool results in the order they appear in the transcript
fn results(transcript: &weather_agent::llm::Transcript) -> Vec<ToolResult> {
    transcript.tool_results().cloned().collect()
}

fn daily_forecast() -> Value {
    json!({
        "latitude": 39.7392,
        "longitude": -104.9903,
        "timezone": "America/Denver",
        "resolution": "daily",
        "times": ["2026-01-05", "2026-01-06", "2026-01-07"],
        "models": {
            "gfs": {"temperature_max": [50.0, 55.0, 48.0], "temperature_min": [20.0, 24.0, 18.0]},
            "ecmwf": {"temperature_max": [52.0, 57.0, 50.0], "temperature_min": [22.0, 26.0, 20.0]},
            "gem": {"temperature_max": [49.0, 54.0, 47.0], "temperature_min": [19.0, 23.0, 17.0]}
        }
    })
}

#[tokio::test]
async fn test_full_forecast_conversation() {
    let h = harness();
    let plot_path = h.dir.path().join("charts/denver.svg");
    let client = MockLlmClient::new()
        .with_response(batch(vec![ToolCall::new("g1", "geocode", json!({"location": "Denver"}))]))
        .with_response(batch(vec![ToolCall::new(
            "f1",
            "fetch_forecast",
            json!({"latitude": 39.7392, "longitude": -104.9903, "days": 3, "models": ["gfs", "ecmwf", "gem", "icon"]}),
        )]))
        .with_response(batch(vec![
            ToolCall::new("s1", "compute_statistics", json!({"forecast": daily_forecast(), "variable": "temperature"})),
            ToolCall::new(
                "p1",
                "render_plot",
                json!({"forecast": daily_forecast(), "output_path": plot_path.display().to_string()}),
            ),
        ]))
        .with_response(answer("Highs in the low 50s with good model agreement."));
    let client = Arc::new(client);

    let agent = AgentLoop::new(client.clone(), h.registry.clone(), config());
    let report = agent.run("What's the weather in Denver?").await.unwrap();

    assert_eq!(report.answer, "Highs in the low 50s with good model agreement.");
    assert_eq!(report.iterations, 3);
    assert_eq!(report.artifacts, vec![plot_path.clone()]);
    assert!(plot_path.exists());
    assert_eq!(h.geocoder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.forecaster.calls.load(Ordering::SeqCst), 4);

    let results = results(&report.transcript);
    let ids: Vec<&str> = results.iter().map(|r| r.tool_use_id.as_str()).collect();
    assert_eq!(ids, vec!["g1", "f1", "s1", "p1"]);
    assert!(results.iter().all(|r| !r.is_error()));

    let place = results[0].payload().unwrap();
    assert_eq!(place["latitude"], json!(39.7392));
    assert_eq!(place["longitude"], json!(-104.9903));

    let forecast = results[1].payload().unwrap();
    assert_eq!(forecast["models"].as_object().unwrap().len(), 3);
    assert!(forecast["models"].get("icon").is_none());
    assert_eq!(forecast["partial_data"]["error"], json!("partial_data"));

    let stats = results[2].payload().unwrap();
    assert_eq!(stats["mean"][0], json!(50.33));

    // Every request carries the whole tool catalog
    let requests = client.requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[0].tool_names.len(), 8);
    assert_eq!(requests[0].transcript_len, 1);
    assert_eq!(requests[3].last_message.as_ref().unwrap().role, Role::ToolResult);
}

#[tokio::test]
async fn test_unknown_tool_is_reported_and_loop_continues() {
    let h = harness();
    let client = MockLlmClient::new()
        .with_response(batch(vec![
            ToolCall::new("t1", "teleport_user", json!({"to": "Hawaii"})),
            ToolCall::new("g1", "geocode", json!({"location": "Denver"})),
        ]))
        .with_response(answer("I can't teleport you, but Denver is at 39.7N."));

    let report = AgentLoop::new(Arc::new(client), h.registry.clone(), config())
        .run("Teleport me somewhere warm")
        .await
        .unwrap();

    let results = results(&report.transcript);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].outcome, ToolOutcome::Error("Unknown tool: teleport_user".to_string()));
    assert!(!results[1].is_error());
    assert_eq!(report.iterations, 1);
}

#[tokio::test]
async fn test_location_not_found_is_a_tool_error() {
    let h = harness();
    let client = MockLlmClient::new()
        .with_response(batch(vec![ToolCall::new("g1", "geocode", json!({"location": "Atlantis"}))]))
        .with_response(answer("I couldn't find Atlantis."));

    let report = AgentLoop::new(Arc::new(client), h.registry.clone(), config())
        .run("Weather in Atlantis?")
        .await
        .unwrap();

    let results = results(&report.transcript);
    match &results[0].outcome {
        ToolOutcome::Error(message) => assert!(message.contains("Location not found: Atlantis")),
        other => panic!("expected an error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_days_out_of_range_never_reach_provider() {
    let h = harness();
    let fetch = |id: &str, days: i64| {
        ToolCall::new(id, "fetch_forecast", json!({"latitude": 39.7, "longitude": -105.0, "days": days}))
    };
    let client = MockLlmClient::new()
        .with_response(batch(vec![fetch("d0", 0), fetch("d17", 17)]))
        .with_response(batch(vec![fetch("d1", 1), fetch("d16", 16)]))
        .with_response(answer("done"));

    let report = AgentLoop::new(Arc::new(client), h.registry.clone(), config())
        .run("forecast")
        .await
        .unwrap();

    let results = results(&report.transcript);
    assert!(results[0].is_error());
    assert!(results[1].is_error());
    assert!(!results[2].is_error());
    assert!(!results[3].is_error());
    // Only the two valid calls, one default model each
    assert_eq!(h.forecaster.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_iteration_budget_exhausted() {
    let h = harness();
    let client = Arc::new(
        MockLlmClient::new().repeating(batch(vec![ToolCall::new("l", "list_models", json!({}))])),
    );

    let aborted = AgentLoop::new(client.clone(), h.registry.clone(), config())
        .run("loop forever")
        .await
        .unwrap_err();

    assert!(aborted.reason.is_budget_exceeded());
    assert!(matches!(aborted.reason, AbortReason::BudgetExceeded { cap: 10 }));
    assert_eq!(client.request_count(), 11);
    assert_eq!(aborted.iterations, 11);
    // Every executed batch is in the transcript, even the one over budget
    assert_eq!(results(&aborted.transcript).len(), 11);
    assert!(aborted.to_string().contains("Iteration budget exhausted"));
}

/// Sleeps for `ms` from the input, then echoes it
struct Sleeper;

#[async_trait]
impl Tool for Sleeper {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new("sleep", "Sleep then echo")
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput, ToolError> {
        let ms = input["ms"].as_u64().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(ToolOutput::new(json!({"slept": ms})))
    }
}

#[tokio::test]
async fn test_parallel_results_keep_request_order() {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(Sleeper)).unwrap();
    let registry = Arc::new(registry);

    for parallel in [true, false] {
        let client = MockLlmClient::new()
            .with_response(batch(vec![
                ToolCall::new("slow", "sleep", json!({"ms": 80})),
                ToolCall::new("fast", "sleep", json!({"ms": 1})),
                ToolCall::new("mid", "sleep", json!({"ms": 30})),
            ]))
            .with_response(answer("rested"));
        let config = LoopConfig {
            parallel_tools: parallel,
            ..config()
        };

        let report = AgentLoop::new(Arc::new(client), registry.clone(), config)
            .run("nap")
            .await
            .unwrap();

        let ids: Vec<String> = results(&report.transcript)
            .into_iter()
            .map(|r| r.tool_use_id)
            .collect();
        assert_eq!(ids, vec!["slow", "fast", "mid"]);
    }
}

#[tokio::test]
async fn test_analysis_is_idempotent_through_registry() {
    let h = harness();
    let call = ToolCall::new("s", "compute_agreement", json!({"forecast": daily_forecast()}));

    let first = h.registry.dispatch(&call).await;
    let second = h.registry.dispatch(&call).await;

    assert!(!first.is_error());
    assert_eq!(first, second);
    let _: BTreeMap<String, Value> = serde_json::from_value(first.payload().unwrap().clone()).unwrap();
}
