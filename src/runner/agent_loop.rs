//! Agent loop controller
//!
//! Drives one query to completion: ask the reasoning service, run whatever
//! tools it requests, feed the results back, and stop on a final answer, a
//! service failure, or when the iteration budget runs out.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::mpsc::UnboundedSender;

use super::state::{AbortReason, LoopConfig, LoopEvent, LoopState, RunAborted, RunReport, RunState};
use crate::llm::{LlmError, Message, ReasoningClient, ReasoningResponse, ToolOutcome, Transcript};
use crate::tools::ToolRegistry;

/// Longest tool output echoed in progress events
const SUMMARY_LIMIT: usize = 200;

/// Bounded tool-calling loop over a reasoning client and a tool registry
///
/// Each run owns its [`RunState`]; nothing is shared between runs apart from
/// the immutable client and registry.
pub struct AgentLoop<C: ReasoningClient> {
    client: Arc<C>,
    tools: Arc<ToolRegistry>,
    config: LoopConfig,
    events: Option<UnboundedSender<LoopEvent>>,
}

impl<C: ReasoningClient> AgentLoop<C> {
    pub fn new(client: Arc<C>, tools: Arc<ToolRegistry>, config: LoopConfig) -> Self {
        Self {
            client,
            tools,
            config,
            events: None,
        }
    }

    /// Stream progress events to `sender`
    pub fn with_events(mut self, sender: UnboundedSender<LoopEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Answer `query` starting from an empty transcript
    pub async fn run(&self, query: &str) -> Result<RunReport, Box<RunAborted>> {
        self.run_with_transcript(Transcript::new(self.config.system_prompt.clone()), query)
            .await
    }

    /// Answer `query` on top of an existing transcript
    ///
    /// Lets a caller carry conversation across queries; `run` never does.
    pub async fn run_with_transcript(
        &self,
        transcript: Transcript,
        query: &str,
    ) -> Result<RunReport, Box<RunAborted>> {
        let mut state = RunState::new(transcript, self.config.max_iterations);
        state.transcript.push(Message::user(query));
        info!("[{}] Run started (cap {} iterations)", state.run_id, state.cap);
        self.emit(LoopEvent::Started {
            run_id: state.run_id.clone(),
            query: query.to_string(),
        });

        let specs = self.tools.list_specs();

        loop {
            debug!("[{}] Awaiting model (iteration {})", state.run_id, state.iteration + 1);
            self.emit(LoopEvent::AwaitingModel {
                iteration: state.iteration + 1,
            });

            let requested = self
                .client
                .request(&state.transcript, &specs, self.config.max_output_tokens)
                .await;
            let response = match requested {
                Ok(response) => response,
                Err(e) => return Err(self.abort(state, e.into())),
            };

            let (text, calls) = match response {
                ReasoningResponse::FinalAnswer(answer) => {
                    state.transcript.push(Message::agent(Some(answer.clone()), &[]));
                    info!(
                        "[{}] Final answer after {} tool iteration(s)",
                        state.run_id, state.iteration
                    );
                    self.emit(LoopEvent::Finished { answer: answer.clone() });
                    return Ok(state.finish(answer));
                }
                ReasoningResponse::ToolCallBatch { calls, .. } if calls.is_empty() => {
                    let err = LlmError::malformed("tool call batch without any calls");
                    return Err(self.abort(state, err.into()));
                }
                ReasoningResponse::ToolCallBatch { text, calls } => (text, calls),
            };

            if let Some(text) = text.as_deref().filter(|t| !t.trim().is_empty()) {
                self.emit(LoopEvent::AgentText { text: text.to_string() });
            }
            state.transcript.push(Message::agent(text, &calls));
            state.state = LoopState::ExecutingTools;

            info!(
                "[{}] Executing {} tool call(s): {}",
                state.run_id,
                calls.len(),
                calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
            );
            self.emit(LoopEvent::ToolCalls { calls: calls.clone() });

            let runs = self.tools.dispatch_all(&calls, self.config.parallel_tools).await;
            let mut results = Vec::with_capacity(runs.len());
            for run in runs {
                self.emit(LoopEvent::ToolFinished {
                    call_id: run.result.tool_use_id.clone(),
                    tool_name: run.result.tool_name.clone(),
                    is_error: run.result.is_error(),
                    summary: summarize(&run.result.outcome),
                });
                if let Some(path) = run.artifact {
                    state.artifacts.push(path);
                }
                results.push(run.result);
            }
            state.transcript.push(Message::tool_results(results));

            if !state.complete_iteration() {
                let cap = state.cap;
                return Err(self.abort(state, AbortReason::BudgetExceeded { cap }));
            }
        }
    }

    fn abort(&self, state: RunState, reason: AbortReason) -> Box<RunAborted> {
        warn!("[{}] Run aborted ({}): {}", state.run_id, reason.kind(), reason);
        self.emit(LoopEvent::Aborted {
            kind: reason.kind(),
            message: reason.to_string(),
        });
        state.abort(reason)
    }

    fn emit(&self, event: LoopEvent) {
        if let Some(tx) = &self.events {
            // Receiver gone just means nobody is watching
            let _ = tx.send(event);
        }
    }
}

/// Short, single-line rendering of a tool outcome
fn summarize(outcome: &ToolOutcome) -> String {
    let full = match outcome {
        ToolOutcome::Success(payload) => payload.to_string(),
        ToolOutcome::Error(message) => message.clone(),
    };
    let count = full.chars().count();
    if count <= SUMMARY_LIMIT {
        return full;
    }
    let head: String = full.chars().take(SUMMARY_LIMIT).collect();
    format!("{}... [{} chars]", head, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLlmClient, Role, ToolCall};
    use serde_json::json;

    fn batch(calls: Vec<ToolCall>) -> ReasoningResponse {
        ReasoningResponse::ToolCallBatch { text: None, calls }
    }

    fn agent(client: MockLlmClient, config: LoopConfig) -> AgentLoop<MockLlmClient> {
        AgentLoop::new(Arc::new(client), Arc::new(ToolRegistry::new()), config)
    }

    #[tokio::test]
    async fn test_immediate_final_answer() {
        let client = MockLlmClient::new().with_response(ReasoningResponse::FinalAnswer("Sunny".to_string()));
        let report = agent(client, LoopConfig::default()).run("Weather?").await.unwrap();

        assert_eq!(report.answer, "Sunny");
        assert_eq!(report.iterations, 0);
        assert_eq!(report.transcript.len(), 2);
        assert_eq!(report.transcript.messages()[1].role, Role::Agent);
    }

    #[tokio::test]
    async fn test_system_prompt_seeds_transcript() {
        let client = MockLlmClient::new().with_response(ReasoningResponse::FinalAnswer("ok".to_string()));
        let config = LoopConfig {
            system_prompt: "You are a weather agent".to_string(),
            ..Default::default()
        };
        let report = agent(client, config).run("hi").await.unwrap();
        assert_eq!(report.transcript.system, "You are a weather agent");
    }

    #[tokio::test]
    async fn test_transport_error_aborts() {
        let client = MockLlmClient::new().with_error(LlmError::transport(Some(503), "overloaded"));
        let aborted = agent(client, LoopConfig::default()).run("hi").await.unwrap_err();

        assert!(matches!(aborted.reason, AbortReason::Transport(_)));
        assert_eq!(aborted.iterations, 0);
        assert_eq!(aborted.transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_is_malformed() {
        let client = MockLlmClient::new().with_response(batch(vec![]));
        let aborted = agent(client, LoopConfig::default()).run("hi").await.unwrap_err();
        assert!(matches!(aborted.reason, AbortReason::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_events_are_streamed() {
        let client = MockLlmClient::new()
            .with_response(batch(vec![ToolCall::new("c1", "missing", json!({}))]))
            .with_response(ReasoningResponse::FinalAnswer("done".to_string()));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        agent(client, LoopConfig::default())
            .with_events(tx)
            .run("hi")
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(LoopEvent::Started { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            LoopEvent::ToolFinished { call_id, is_error: true, .. } if call_id == "c1"
        )));
        assert_eq!(
            events.last(),
            Some(&LoopEvent::Finished {
                answer: "done".to_string()
            })
        );
    }

    #[test]
    fn test_summarize_truncates() {
        let long = ToolOutcome::Error("x".repeat(500));
        let summary = summarize(&long);
        assert!(summary.starts_with(&"x".repeat(SUMMARY_LIMIT)));
        assert!(summary.ends_with("[500 chars]"));

        assert_eq!(summarize(&ToolOutcome::Success(json!(1))), "1");
    }

    #[test]
    fn test_summarize_counts_chars_not_bytes() {
        let long = ToolOutcome::Error("°".repeat(300));
        let summary = summarize(&long);
        assert!(summary.ends_with("[300 chars]"));
        assert!(summary.starts_with(&"°".repeat(SUMMARY_LIMIT)));
    }
}
