//! Tool and registry error types

use serde_json::{Value, json};
use thiserror::Error;

/// Failure raised by a tool handler
///
/// Never escapes a run: the registry turns it into an error `ToolResult`
/// the reasoning service can read and react to.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("Location not found: {0}")]
    NotFound(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Degraded but usable; some requested data is missing
    #[error("Partial data: {0}")]
    PartialData(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ToolError {
    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::NotFound(_) => "not_found",
            ToolError::UpstreamUnavailable(_) => "upstream_unavailable",
            ToolError::PartialData(_) => "partial_data",
            ToolError::InsufficientData(_) => "insufficient_data",
            ToolError::Render(_) => "render_error",
            ToolError::InvalidInput(_) => "invalid_input",
        }
    }

    /// JSON descriptor embedded in tool payloads
    pub fn descriptor(&self) -> Value {
        json!({
            "error": self.kind(),
            "message": self.to_string(),
        })
    }
}

/// Registry lookup and setup failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Duplicate tool: {0} is already registered")]
    DuplicateTool(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}
