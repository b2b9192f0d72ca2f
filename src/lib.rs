//! Weather Agent - ensemble weather forecasts through an LLM tool-calling loop
//!
//! A reasoning service is handed a registry of weather tools (geocoding,
//! multi-model forecasts, ensemble statistics, plotting) and loops until it
//! produces a final answer or runs out of iterations.

pub mod error;
pub mod id;
pub mod llm;
pub mod prompt;
pub mod runner;
pub mod tools;
pub mod weather;

pub use error::{Result, WeatherAgentError};
