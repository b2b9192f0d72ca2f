//! CLI module for weather-agent - command-line interface and subcommands.
//!
//! Forecast-style subcommands are phrased as questions and handed to the
//! agent loop; the rest talk to the providers directly.

pub mod commands;

pub use commands::Cli;
