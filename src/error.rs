//! Error types for weather-agent
//!
//! Each boundary owns its own error enum (`LlmError`, `ToolError`,
//! `RegistryError`, `AbortReason`); this module wraps them for callers that
//! only need one type.

use thiserror::Error;

use crate::llm::LlmError;
use crate::runner::RunAborted;
use crate::tools::{RegistryError, ToolError};

/// All error types that can surface from the library
#[derive(Debug, Error)]
pub enum WeatherAgentError {
    /// Configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reasoning service error
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Tool handler error
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Registry setup error
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Agent run ended without a final answer
    #[error(transparent)]
    Aborted(#[from] Box<RunAborted>),

    /// Prompt template error
    #[error("Template error: {0}")]
    Template(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for weather-agent operations
pub type Result<T> = std::result::Result<T, WeatherAgentError>;
