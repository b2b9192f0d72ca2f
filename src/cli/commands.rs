//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - ask: free-form question to the agent
//! - forecast / compare / visualize: canned queries run through the agent
//! - models / coordinates: direct lookups without the reasoning service
//! - configure: store the API key

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use weather_agent::weather::{DEFAULT_FORECAST_DAYS, ForecastModel, MAX_FORECAST_DAYS, Variable};

/// Weather Agent - ensemble weather forecasts through an LLM tool-calling loop
#[derive(Parser, Debug)]
#[command(name = "weather-agent")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask the agent any weather question
    Ask {
        /// The question, e.g. "Will it rain in Boston this weekend?"
        query: String,

        /// Override the tool iteration budget
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Run each batch of tool calls one at a time
        #[arg(long)]
        sequential: bool,
    },

    /// Ensemble forecast summary for a location
    Forecast {
        /// City name, address or "lat, lon"
        location: String,

        /// Forecast length in days
        #[arg(short, long, default_value_t = DEFAULT_FORECAST_DAYS, value_parser = parse_days)]
        days: u8,

        /// Comma-separated model ids (gfs, ecmwf, icon, gem)
        #[arg(short, long, value_delimiter = ',', value_parser = parse_model)]
        models: Vec<ForecastModel>,

        /// Use hourly instead of daily data
        #[arg(long)]
        hourly: bool,

        /// Also render a chart
        #[arg(long)]
        visualize: bool,

        /// Chart path (defaults to the configured plot path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare how the models agree on one variable
    Compare {
        /// City name, address or "lat, lon"
        location: String,

        /// Forecast length in days
        #[arg(short, long, default_value_t = DEFAULT_FORECAST_DAYS, value_parser = parse_days)]
        days: u8,

        /// Variable to compare
        #[arg(long, default_value = "temperature", value_parser = parse_variable)]
        variable: Variable,

        /// Comma-separated model ids (gfs, ecmwf, icon, gem)
        #[arg(short, long, value_delimiter = ',', value_parser = parse_model)]
        models: Vec<ForecastModel>,
    },

    /// Render a chart of every model's forecast
    Visualize {
        /// City name, address or "lat, lon"
        location: String,

        /// Forecast length in days
        #[arg(short, long, default_value_t = DEFAULT_FORECAST_DAYS, value_parser = parse_days)]
        days: u8,

        /// Use hourly instead of daily data
        #[arg(long)]
        hourly: bool,

        /// Chart path (defaults to the configured plot path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the available forecast models
    Models,

    /// Look up the coordinates of a location
    Coordinates {
        /// City name or address
        location: String,
    },

    /// Save the Anthropic API key to the user config file
    Configure {
        /// API key; read from stdin when omitted
        #[arg(long)]
        api_key: Option<String>,
    },
}

impl Commands {
    /// Natural-language query for the subcommands that go through the agent
    ///
    /// `default_output` fills in when a chart is requested without `--output`.
    pub fn agent_query(&self, default_output: &std::path::Path) -> Option<String> {
        match self {
            Commands::Ask { query, .. } => Some(query.clone()),
            Commands::Forecast {
                location,
                days,
                models,
                hourly,
                visualize,
                output,
            } => {
                let mut query = format!("Get a {}-day {} weather forecast for {}. ", days, data_kind(*hourly), location);
                query.push_str(&models_clause(models));
                if *visualize {
                    let path = output.as_deref().unwrap_or(default_output);
                    query.push_str(&format!("Create a visualization saved to {}. ", path.display()));
                }
                query.push_str("Provide a clear summary of the forecast.");
                Some(query)
            }
            Commands::Compare {
                location,
                days,
                variable,
                models,
            } => Some(format!(
                "Compare {} forecasts for {} over {} days. {}Focus on model agreement and disagreement. \
                 Calculate ensemble statistics and identify periods of high and low uncertainty.",
                variable.key().replace('_', " "),
                location,
                days,
                models_clause(models)
            )),
            Commands::Visualize {
                location,
                days,
                hourly,
                output,
            } => Some(format!(
                "Create a comprehensive weather forecast visualization for {} covering {} days using {} data. \
                 Include all available models and save to {}.",
                location,
                days,
                data_kind(*hourly),
                output.as_deref().unwrap_or(default_output).display()
            )),
            Commands::Models | Commands::Coordinates { .. } | Commands::Configure { .. } => None,
        }
    }
}

fn data_kind(hourly: bool) -> &'static str {
    if hourly { "hourly" } else { "daily" }
}

fn models_clause(models: &[ForecastModel]) -> String {
    if models.is_empty() {
        return String::new();
    }
    let ids: Vec<&str> = models.iter().map(|m| m.id()).collect();
    format!("Use models: {}. ", ids.join(", "))
}

fn parse_days(s: &str) -> Result<u8, String> {
    let days: u8 = s.parse().map_err(|_| format!("'{}' is not a number of days", s))?;
    if days == 0 || days > MAX_FORECAST_DAYS {
        return Err(format!("days must be between 1 and {}", MAX_FORECAST_DAYS));
    }
    Ok(days)
}

fn parse_model(s: &str) -> Result<ForecastModel, String> {
    s.trim().parse().map_err(|e: weather_agent::tools::ToolError| e.to_string())
}

fn parse_variable(s: &str) -> Result<Variable, String> {
    s.trim().parse().map_err(|e: weather_agent::tools::ToolError| e.to_string())
}
