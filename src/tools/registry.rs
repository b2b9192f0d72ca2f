//! Tool registry - registration, lookup and dispatch

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use log::{debug, warn};

use super::{
    AgreementTool, FetchForecastTool, GeocodeTool, ListModelsTool, RegistryError, RenderPlotTool, StatisticsTool,
    TemperatureRangeTool, Tool, ToolSpec, UncertaintyTool,
};
use crate::llm::{ToolCall, ToolResult};
use crate::weather::{ForecastProvider, Geocoder};

/// Outcome of one dispatched call
#[derive(Debug, Clone, PartialEq)]
pub struct ToolRun {
    pub result: ToolResult,
    pub artifact: Option<PathBuf>,
}

struct Entry {
    spec: ToolSpec,
    tool: Arc<dyn Tool>,
}

/// Name → tool mapping, fixed once handed to a run
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard weather tool set
    pub fn weather(
        geocoder: Arc<dyn Geocoder>,
        forecaster: Arc<dyn ForecastProvider>,
        default_plot_path: PathBuf,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register(Arc::new(GeocodeTool::new(geocoder)))?;
        registry.register(Arc::new(FetchForecastTool::new(forecaster)))?;
        registry.register(Arc::new(ListModelsTool))?;
        registry.register(Arc::new(StatisticsTool))?;
        registry.register(Arc::new(AgreementTool))?;
        registry.register(Arc::new(UncertaintyTool))?;
        registry.register(Arc::new(TemperatureRangeTool))?;
        registry.register(Arc::new(RenderPlotTool::new(default_plot_path)))?;
        Ok(registry)
    }

    /// Add a tool; names must be unique
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let spec = tool.spec();
        if self.index.contains_key(&spec.name) {
            return Err(RegistryError::DuplicateTool(spec.name));
        }
        debug!("Registered tool {}", spec.name);
        self.index.insert(spec.name.clone(), self.entries.len());
        self.entries.push(Entry { spec, tool });
        Ok(())
    }

    /// Look up a tool by name
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>, RegistryError> {
        self.entry(name).map(|e| Arc::clone(&e.tool))
    }

    fn entry(&self, name: &str) -> Result<&Entry, RegistryError> {
        self.index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))
    }

    /// Specs in registration order
    pub fn list_specs(&self) -> Vec<ToolSpec> {
        self.entries.iter().map(|e| e.spec.clone()).collect()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.spec.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve, validate and run one call
    ///
    /// Every failure, including an unknown name, a schema violation or a
    /// panicking handler, comes back as an error result.
    pub async fn run(&self, call: &ToolCall) -> ToolRun {
        let entry = match self.entry(&call.name) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Rejected call {}: {}", call.id, e);
                return ToolRun {
                    result: ToolResult::error(&call.id, &call.name, e.to_string()),
                    artifact: None,
                };
            }
        };

        if let Err(e) = entry.spec.validate(&call.input) {
            warn!("Invalid input for {} ({}): {}", call.name, call.id, e);
            return ToolRun {
                result: ToolResult::error(&call.id, &call.name, e.to_string()),
                artifact: None,
            };
        }

        debug!("Executing {} ({})", call.name, call.id);
        let executed = AssertUnwindSafe(entry.tool.execute(call.input.clone()))
            .catch_unwind()
            .await;

        match executed {
            Ok(Ok(output)) => ToolRun {
                result: ToolResult::success(&call.id, &call.name, output.payload),
                artifact: output.artifact,
            },
            Ok(Err(e)) => {
                warn!("Tool {} failed: {}", call.name, e);
                ToolRun {
                    result: ToolResult::error(&call.id, &call.name, e.to_string()),
                    artifact: None,
                }
            }
            Err(_) => {
                warn!("Tool {} panicked", call.name);
                ToolRun {
                    result: ToolResult::error(&call.id, &call.name, format!("Tool {} crashed", call.name)),
                    artifact: None,
                }
            }
        }
    }

    /// Run one call, keeping only the transcript-facing result
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        self.run(call).await.result
    }

    /// Run a batch; results come back in request order either way
    pub async fn dispatch_all(&self, calls: &[ToolCall], parallel: bool) -> Vec<ToolRun> {
        if parallel {
            return join_all(calls.iter().map(|call| self.run(call))).await;
        }

        let mut runs = Vec::with_capacity(calls.len());
        for call in calls {
            runs.push(self.run(call).await);
        }
        runs
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tool_names())
            .finish()
    }
}
