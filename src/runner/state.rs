//! Run state, outcomes and progress events for the agent loop

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::id::generate_run_id;
use crate::llm::{LlmError, ToolCall, Transcript};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    AwaitingModel,
    ExecutingTools,
    Done,
    Aborted,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Done | LoopState::Aborted)
    }
}

/// Knobs for one controller, fixed at construction
#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    /// Tool-requiring iterations allowed before the run aborts
    pub max_iterations: u32,
    pub max_output_tokens: u32,
    /// Run the calls of one batch concurrently
    pub parallel_tools: bool,
    pub system_prompt: String,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_output_tokens: 8000,
            parallel_tools: true,
            system_prompt: String::new(),
        }
    }
}

/// Mutable state of a single run
#[derive(Debug, Clone, PartialEq)]
pub struct RunState {
    pub run_id: String,
    pub transcript: Transcript,
    pub iteration: u32,
    pub cap: u32,
    pub state: LoopState,
    pub artifacts: Vec<PathBuf>,
}

impl RunState {
    pub fn new(transcript: Transcript, cap: u32) -> Self {
        Self {
            run_id: generate_run_id(),
            transcript,
            iteration: 0,
            cap,
            state: LoopState::AwaitingModel,
            artifacts: Vec::new(),
        }
    }

    /// Count a finished tool batch; false once the budget is spent
    pub fn complete_iteration(&mut self) -> bool {
        self.iteration += 1;
        if self.iteration > self.cap {
            self.state = LoopState::Aborted;
            false
        } else {
            self.state = LoopState::AwaitingModel;
            true
        }
    }

    /// Consume the state into a successful report
    pub fn finish(mut self, answer: String) -> RunReport {
        self.state = LoopState::Done;
        RunReport {
            run_id: self.run_id,
            answer,
            iterations: self.iteration,
            artifacts: self.artifacts,
            transcript: self.transcript,
        }
    }

    /// Consume the state into an abort
    pub fn abort(mut self, reason: AbortReason) -> Box<RunAborted> {
        self.state = LoopState::Aborted;
        Box::new(RunAborted {
            reason,
            run_id: self.run_id,
            iterations: self.iteration,
            artifacts: self.artifacts,
            transcript: self.transcript,
        })
    }
}

/// A run that produced a final answer
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run_id: String,
    pub answer: String,
    /// Tool batches executed along the way
    pub iterations: u32,
    pub artifacts: Vec<PathBuf>,
    pub transcript: Transcript,
}

/// Why a run stopped without an answer
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AbortReason {
    /// Not a bug: the run made progress but ran out of iterations
    #[error("Iteration budget exhausted: no final answer within {cap} tool iterations")]
    BudgetExceeded { cap: u32 },

    #[error("{0}")]
    Transport(LlmError),

    #[error("{0}")]
    MalformedResponse(LlmError),
}

impl AbortReason {
    pub fn kind(&self) -> &'static str {
        match self {
            AbortReason::BudgetExceeded { .. } => "budget_exceeded",
            AbortReason::Transport(_) => "transport",
            AbortReason::MalformedResponse(_) => "malformed_response",
        }
    }

    pub fn is_budget_exceeded(&self) -> bool {
        matches!(self, AbortReason::BudgetExceeded { .. })
    }
}

impl From<LlmError> for AbortReason {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::MalformedResponse(_) => AbortReason::MalformedResponse(err),
            LlmError::Transport { .. } | LlmError::MissingApiKey => AbortReason::Transport(err),
        }
    }
}

/// Terminal failure of a run, carrying the partial transcript for diagnosis
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Run {run_id} aborted after {iterations} iteration(s): {reason}")]
pub struct RunAborted {
    pub reason: AbortReason,
    pub run_id: String,
    pub iterations: u32,
    pub artifacts: Vec<PathBuf>,
    pub transcript: Transcript,
}

/// Progress notifications for whoever is presenting the run
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    Started { run_id: String, query: String },
    AwaitingModel { iteration: u32 },
    AgentText { text: String },
    ToolCalls { calls: Vec<ToolCall> },
    ToolFinished { call_id: String, tool_name: String, is_error: bool, summary: String },
    Finished { answer: String },
    Aborted { kind: &'static str, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_iteration_respects_cap() {
        let mut state = RunState::new(Transcript::new("sys"), 2);
        assert!(state.complete_iteration());
        assert!(state.complete_iteration());
        assert_eq!(state.state, LoopState::AwaitingModel);
        assert!(!state.complete_iteration());
        assert_eq!(state.iteration, 3);
        assert_eq!(state.state, LoopState::Aborted);
    }

    #[test]
    fn test_zero_cap_aborts_first_batch() {
        let mut state = RunState::new(Transcript::new("sys"), 0);
        assert!(!state.complete_iteration());
    }

    #[test]
    fn test_abort_reason_from_llm_error() {
        let reason: AbortReason = LlmError::malformed("no content").into();
        assert_eq!(reason.kind(), "malformed_response");

        let reason: AbortReason = LlmError::transport(Some(401), "unauthorized").into();
        assert_eq!(reason.kind(), "transport");
        assert!(!reason.is_budget_exceeded());
    }

    #[test]
    fn test_run_aborted_display() {
        let aborted = RunState::new(Transcript::new("sys"), 10).abort(AbortReason::BudgetExceeded { cap: 10 });
        let msg = aborted.to_string();
        assert!(msg.starts_with(&format!("Run {} aborted after 0 iteration(s)", aborted.run_id)));
        assert!(msg.contains("within 10 tool iterations"));
    }

    #[test]
    fn test_terminal_states() {
        assert!(LoopState::Done.is_terminal());
        assert!(LoopState::Aborted.is_terminal());
        assert!(!LoopState::ExecutingTools.is_terminal());
    }
}
