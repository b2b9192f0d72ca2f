//! Parser for Anthropic Messages API responses
//!
//! Turns the raw response body into either a final answer or a batch of tool
//! calls. Anything that fits neither shape is rejected as malformed rather
//! than guessed at.

use log::warn;
use serde_json::Value;

use crate::llm::client::LlmError;
use crate::llm::types::{ReasoningResponse, StopReason, ToolCall, Usage};

/// Parse a raw Anthropic API response
///
/// Fails when the stop reason is missing or unknown, when a `tool_use` block
/// lacks an id or name, when the model stopped for tool use without asking
/// for any tool, on `pause_turn`, or when there is neither text nor a tool
/// call. A refusal that carries text is a final answer.
pub fn parse_response(response: &Value) -> Result<(ReasoningResponse, Usage), LlmError> {
    let stop_reason = match response.get("stop_reason").and_then(|s| s.as_str()) {
        Some(reason) => StopReason::parse(reason)
            .ok_or_else(|| LlmError::malformed(format!("unknown stop reason '{}'", reason)))?,
        None => return Err(LlmError::malformed("missing stop reason")),
    };

    let mut text = String::new();
    let mut calls = Vec::new();

    if let Some(blocks) = response.get("content").and_then(|c| c.as_array()) {
        for block in blocks {
            match block.get("type").and_then(|t| t.as_str()) {
                Some("text") => {
                    if let Some(t) = block.get("text").and_then(|t| t.as_str()) {
                        if !text.is_empty() {
                            text.push('\n');
                        }
                        text.push_str(t);
                    }
                }
                Some("tool_use") => calls.push(parse_tool_use_block(block)?),
                _ => {} // Skip unknown block types
            }
        }
    }

    let usage = response.get("usage").map(parse_usage).unwrap_or_default();

    if stop_reason == StopReason::PauseTurn {
        return Err(LlmError::malformed("pause_turn is only sent for server-side tools, which are not used"));
    }

    if stop_reason == StopReason::ToolUse && calls.is_empty() {
        return Err(LlmError::malformed("stop reason is tool_use but no tool calls were requested"));
    }

    let reasoning = if !calls.is_empty() {
        ReasoningResponse::ToolCallBatch {
            text: (!text.is_empty()).then_some(text),
            calls,
        }
    } else if !text.is_empty() {
        match stop_reason {
            StopReason::MaxTokens => warn!("Answer truncated at max_tokens"),
            StopReason::Refusal => warn!("Model declined the request"),
            _ => {}
        }
        ReasoningResponse::FinalAnswer(text)
    } else {
        return Err(LlmError::malformed("response has no text and no tool calls"));
    };

    Ok((reasoning, usage))
}

/// Parse a single tool_use content block into a ToolCall
fn parse_tool_use_block(block: &Value) -> Result<ToolCall, LlmError> {
    let id = block
        .get("id")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LlmError::malformed("tool_use block without id"))?;
    let name = block
        .get("name")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LlmError::malformed(format!("tool_use block '{}' without name", id)))?;
    let input = block.get("input").cloned().unwrap_or(Value::Object(Default::default()));

    Ok(ToolCall::new(id, name, input))
}

/// Parse usage object from response
fn parse_usage(usage: &Value) -> Usage {
    Usage {
        input_tokens: usage.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
        output_tokens: usage.get("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
    }
}
