//! Agent loop runner
//!
//! - [`AgentLoop`] drives a query through reasoning and tool execution
//! - [`RunState`] is the per-run transcript and budget bookkeeping
//! - [`RunReport`] / [`RunAborted`] are the two ways a run ends

mod agent_loop;
mod state;

pub use agent_loop::AgentLoop;
pub use state::{AbortReason, LoopConfig, LoopEvent, LoopState, RunAborted, RunReport, RunState};
