//! Reasoning service layer - transcript types, client trait and the Anthropic adapter

pub mod anthropic;
pub mod client;
pub mod tool_parser;
pub mod types;

pub use anthropic::{AnthropicClient, AnthropicConfig, DEFAULT_MODEL, resolve_api_key};
pub use client::{API_KEY_ENV, LlmError, MockLlmClient, ReasoningClient, RecordedRequest};
pub use tool_parser::parse_response;
pub use types::{
    ContentBlock, Message, ReasoningResponse, Role, StopReason, ToolCall, ToolOutcome, ToolResult, Transcript, Usage,
};
