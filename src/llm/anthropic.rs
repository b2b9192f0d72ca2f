//! Anthropic API client implementation
//!
//! This module implements the ReasoningClient trait for the Anthropic (Claude) API.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde_json::{Value, json};

use crate::llm::client::{API_KEY_ENV, LlmError, ReasoningClient};
use crate::llm::tool_parser::parse_response;
use crate::llm::types::{ContentBlock, Message, ReasoningResponse, Role, Transcript, Usage};
use crate::tools::ToolSpec;

/// Anthropic API base URL
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default model to use
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Configuration for the Anthropic client
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub model: String,
    pub api_url: String,
    pub timeout: Duration,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_url: ANTHROPIC_API_URL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl AnthropicConfig {
    /// Create a new config with a specific model
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// Pick the API key: environment first, then the configured value
pub fn resolve_api_key(configured: Option<&str>) -> Result<String, LlmError> {
    pick_api_key(std::env::var(API_KEY_ENV).ok(), configured)
}

fn pick_api_key(env: Option<String>, configured: Option<&str>) -> Result<String, LlmError> {
    env.filter(|k| !k.trim().is_empty())
        .or_else(|| configured.map(str::trim).filter(|k| !k.is_empty()).map(String::from))
        .ok_or(LlmError::MissingApiKey)
}

/// Anthropic API client
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    config: AnthropicConfig,
    usage: Arc<Mutex<Usage>>,
}

impl AnthropicClient {
    /// Create a new Anthropic client
    ///
    /// Reads ANTHROPIC_API_KEY from environment
    pub fn new(config: AnthropicConfig) -> Result<Self, LlmError> {
        let api_key = resolve_api_key(None)?;
        Self::with_api_key(api_key, config)
    }

    /// Create a client with an explicit API key
    pub fn with_api_key(api_key: String, config: AnthropicConfig) -> Result<Self, LlmError> {
        if api_key.is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::transport(None, format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            config,
            usage: Arc::new(Mutex::new(Usage::default())),
        })
    }

    /// Build the request body for the Anthropic API
    fn build_request(&self, transcript: &Transcript, tools: &[ToolSpec], max_tokens: u32) -> Value {
        let messages: Vec<Value> = transcript.messages().iter().map(message_to_wire).collect();

        let mut body = json!({
            "model": self.config.model,
            "max_tokens": max_tokens,
            "messages": messages
        });

        if !transcript.system.is_empty() {
            body["system"] = json!(transcript.system);
        }

        if !tools.is_empty() {
            let tools: Vec<Value> = tools.iter().map(|t| t.to_anthropic_schema()).collect();
            body["tools"] = json!(tools);
        }

        body
    }

    /// Send a request to the Anthropic API
    async fn send_request(&self, body: Value) -> Result<Value, LlmError> {
        let response = self
            .client
            .post(&self.config.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::transport(None, format!("Request failed: {}", e)))?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LlmError::transport(
                Some(429),
                format!("Rate limited, retry after {} seconds", retry_after),
            ));
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::transport(
                Some(status.as_u16()),
                format!("API error {}: {}", status, error_body),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::malformed(format!("Failed to parse response body: {}", e)))
    }

    /// Parse a response body and record its usage
    fn parse(&self, body: &Value) -> Result<ReasoningResponse, LlmError> {
        let (response, usage) = parse_response(body)?;
        self.usage.lock().unwrap_or_else(PoisonError::into_inner).add(&usage);
        debug!(
            "Anthropic usage: {} in / {} out",
            usage.input_tokens, usage.output_tokens
        );
        Ok(response)
    }

    /// Get cumulative token usage
    pub fn total_usage(&self) -> Usage {
        *self.usage.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Map a transcript message onto the Messages API wire format
///
/// Agent messages become `assistant`; tool results travel in a `user`
/// message as `tool_result` blocks echoing the call id.
fn message_to_wire(message: &Message) -> Value {
    let role = match message.role {
        Role::User | Role::ToolResult => "user",
        Role::Agent => "assistant",
    };

    let content: Vec<Value> = message
        .content
        .iter()
        .map(|block| match block {
            ContentBlock::Text { text } => json!({"type": "text", "text": text}),
            ContentBlock::ToolUse { id, name, input } => json!({
                "type": "tool_use",
                "id": id,
                "name": name,
                "input": input
            }),
            ContentBlock::ToolResult(result) => json!({
                "type": "tool_result",
                "tool_use_id": result.tool_use_id,
                "content": result.content(),
                "is_error": result.is_error()
            }),
        })
        .collect();

    json!({"role": role, "content": content})
}

#[async_trait]
impl ReasoningClient for AnthropicClient {
    async fn request(
        &self,
        transcript: &Transcript,
        tools: &[ToolSpec],
        max_output_tokens: u32,
    ) -> Result<ReasoningResponse, LlmError> {
        let body = self.build_request(transcript, tools, max_output_tokens);
        let response = self.send_request(body).await?;
        self.parse(&response).inspect_err(|e| warn!("Rejected Anthropic response: {}", e))
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("model", &self.config.model)
            .field("api_url", &self.config.api_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{ToolCall, ToolResult};
    use crate::tools::{ParamSpec, ParamType};

    fn client() -> AnthropicClient {
        AnthropicClient::with_api_key("test-key".to_string(), AnthropicConfig::default()).unwrap()
    }

    #[test]
    fn test_config_default() {
        let config = AnthropicConfig::default();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.api_url, ANTHROPIC_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_config_with_model() {
        let config = AnthropicConfig::with_model("claude-3-haiku-20240307");
        assert_eq!(config.model, "claude-3-haiku-20240307");
    }

    #[test]
    fn test_pick_api_key_prefers_env() {
        let key = pick_api_key(Some("from-env".to_string()), Some("from-config")).unwrap();
        assert_eq!(key, "from-env");
    }

    #[test]
    fn test_pick_api_key_falls_back_to_config() {
        let key = pick_api_key(None, Some("  from-config ")).unwrap();
        assert_eq!(key, "from-config");

        let key = pick_api_key(Some(String::new()), Some("from-config")).unwrap();
        assert_eq!(key, "from-config");
    }

    #[test]
    fn test_pick_api_key_missing() {
        assert_eq!(pick_api_key(None, None), Err(LlmError::MissingApiKey));
        assert_eq!(pick_api_key(None, Some("")), Err(LlmError::MissingApiKey));
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let result = AnthropicClient::with_api_key(String::new(), AnthropicConfig::default());
        assert!(matches!(result, Err(LlmError::MissingApiKey)));
    }

    #[test]
    fn test_build_request_basic() {
        let client = client();
        let mut transcript = Transcript::new("You are a weather assistant");
        transcript.push(Message::user("Will it rain in Denver?"));

        let body = client.build_request(&transcript, &[], 4096);

        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["system"], "You are a weather assistant");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"][0]["text"], "Will it rain in Denver?");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_build_request_with_tools() {
        let client = client();
        let mut transcript = Transcript::new("sys");
        transcript.push(Message::user("Where is Denver?"));

        let spec = ToolSpec::new("geocode", "Look up coordinates").param(
            "location",
            ParamSpec::new(ParamType::String, "Place name").required(),
        );

        let body = client.build_request(&transcript, &[spec], 1024);

        assert_eq!(body["tools"][0]["name"], "geocode");
        assert_eq!(body["tools"][0]["input_schema"]["required"][0], "location");
    }

    #[test]
    fn test_build_request_maps_roles_and_tool_results() {
        let client = client();
        let mut transcript = Transcript::new("sys");
        transcript.push(Message::user("Where is Denver?"));
        transcript.push(Message::agent(
            Some("Looking it up".to_string()),
            &[ToolCall::new("toolu_1", "geocode", json!({"location": "Denver"}))],
        ));
        transcript.push(Message::tool_results(vec![
            ToolResult::success("toolu_1", "geocode", json!({"latitude": 39.74})),
            ToolResult::error("toolu_2", "teleport_user", "Unknown tool: teleport_user"),
        ]));

        let body = client.build_request(&transcript, &[], 1024);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);

        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["content"][0]["type"], "text");
        assert_eq!(messages[1]["content"][1]["type"], "tool_use");
        assert_eq!(messages[1]["content"][1]["id"], "toolu_1");

        let last = &messages[2];
        assert_eq!(last["role"], "user");
        assert_eq!(last["content"][0]["type"], "tool_result");
        assert_eq!(last["content"][0]["tool_use_id"], "toolu_1");
        assert_eq!(last["content"][0]["is_error"], false);
        assert_eq!(last["content"][1]["tool_use_id"], "toolu_2");
        assert_eq!(last["content"][1]["is_error"], true);
    }

    #[test]
    fn test_parse_accumulates_usage() {
        let client = client();

        client
            .parse(&json!({
                "content": [{"type": "text", "text": "a"}],
                "stop_reason": "end_turn",
                "usage": { "input_tokens": 100, "output_tokens": 50 }
            }))
            .unwrap();
        client
            .parse(&json!({
                "content": [{"type": "text", "text": "b"}],
                "stop_reason": "end_turn",
                "usage": { "input_tokens": 200, "output_tokens": 100 }
            }))
            .unwrap();

        let total = client.total_usage();
        assert_eq!(total.input_tokens, 300);
        assert_eq!(total.output_tokens, 150);
    }

    #[test]
    fn test_debug_impl() {
        let debug_str = format!("{:?}", client());
        assert!(debug_str.contains("AnthropicClient"));
        assert!(debug_str.contains(DEFAULT_MODEL));
        // Should NOT contain the API key
        assert!(!debug_str.contains("test-key"));
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AnthropicClient>();
    }

    #[test]
    fn test_model() {
        assert_eq!(client().model(), DEFAULT_MODEL);
    }
}
