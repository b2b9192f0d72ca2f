//! Reasoning client trait, its error type and a scripted mock

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::llm::types::{Message, ReasoningResponse, Transcript};
use crate::tools::ToolSpec;

/// Environment variable holding the Anthropic API key
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Stateless reasoning client: every request carries the full transcript
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    /// Send the transcript and advertised tools, get back either a final
    /// answer or a batch of tool calls
    async fn request(
        &self,
        transcript: &Transcript,
        tools: &[ToolSpec],
        max_output_tokens: u32,
    ) -> Result<ReasoningResponse, LlmError>;

    /// Model identifier, for display
    fn model(&self) -> &str;
}

/// Errors raised at the reasoning service boundary
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LlmError {
    /// Network failure, auth failure, rate limit or any non-2xx status
    #[error("Transport error: {message}")]
    Transport { status: Option<u16>, message: String },

    /// Response could not be interpreted as an answer or a tool-call batch
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Missing API key: set ANTHROPIC_API_KEY or run `weather-agent configure`")]
    MissingApiKey,
}

impl LlmError {
    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        LlmError::Transport {
            status,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        LlmError::MalformedResponse(message.into())
    }

    /// HTTP status, when the service answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            LlmError::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::transport(e.status().map(|s| s.as_u16()), e.to_string())
    }
}

/// What the mock saw on one request
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub transcript_len: usize,
    pub last_message: Option<Message>,
    pub tool_names: Vec<String>,
    pub max_output_tokens: u32,
}

/// Scripted client for tests and offline runs
///
/// Responses are popped in order. Once the script is exhausted the
/// `repeating` response is returned forever, or a malformed-response error
/// when none is set.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<ReasoningResponse, LlmError>>>,
    repeating: Option<ReasoningResponse>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response
    pub fn with_response(self, response: ReasoningResponse) -> Self {
        self.push(Ok(response));
        self
    }

    /// Queue an error
    pub fn with_error(self, error: LlmError) -> Self {
        self.push(Err(error));
        self
    }

    /// Response returned once the script runs out
    pub fn repeating(mut self, response: ReasoningResponse) -> Self {
        self.repeating = Some(response);
        self
    }

    fn push(&self, item: Result<ReasoningResponse, LlmError>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(item);
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl ReasoningClient for MockLlmClient {
    async fn request(
        &self,
        transcript: &Transcript,
        tools: &[ToolSpec],
        max_output_tokens: u32,
    ) -> Result<ReasoningResponse, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedRequest {
                transcript_len: transcript.len(),
                last_message: transcript.last().cloned(),
                tool_names: tools.iter().map(|t| t.name.clone()).collect(),
                max_output_tokens,
            });

        let next = self.script.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        match (next, &self.repeating) {
            (Some(item), _) => item,
            (None, Some(response)) => Ok(response.clone()),
            (None, None) => Err(LlmError::malformed("mock script exhausted")),
        }
    }

    fn model(&self) -> &str {
        "mock"
    }
}
