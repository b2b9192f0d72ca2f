use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use std::fs;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

mod cli;
mod config;

use cli::Cli;
use cli::commands::Commands;
use config::Config;
use weather_agent::llm::{AnthropicClient, AnthropicConfig, API_KEY_ENV};
use weather_agent::prompt::PromptRenderer;
use weather_agent::runner::{AgentLoop, LoopEvent};
use weather_agent::tools::ToolRegistry;
use weather_agent::weather::{ForecastModel, Geocoder, NominatimGeocoder, OpenMeteoClient, parse_coordinates};

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("weather-agent")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("weather-agent.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    if let Some(query) = cli.command.agent_query(&config.output.plot_path) {
        let (max_iterations, sequential) = match &cli.command {
            Commands::Ask {
                max_iterations,
                sequential,
                ..
            } => (*max_iterations, *sequential),
            _ => (None, false),
        };
        return handle_agent_command(&query, max_iterations, sequential, cli.is_verbose(), config).await;
    }

    match &cli.command {
        Commands::Models => handle_models_command(),
        Commands::Coordinates { location } => handle_coordinates_command(location, config).await,
        Commands::Configure { api_key } => handle_configure_command(api_key.as_deref(), cli.config.as_ref()),
        other => Err(eyre!("{:?} has no handler", other)),
    }
}

fn build_geocoder(config: &Config) -> Result<NominatimGeocoder> {
    let providers = &config.providers;
    Ok(NominatimGeocoder::new(
        providers.geocoding_url.clone(),
        &providers.user_agent,
        providers.timeout(),
    )?)
}

fn build_registry(config: &Config) -> Result<ToolRegistry> {
    let providers = &config.providers;
    let geocoder = Arc::new(build_geocoder(config)?);
    let forecaster = Arc::new(OpenMeteoClient::new(
        providers.forecast_url.clone(),
        &providers.user_agent,
        providers.timeout(),
    )?);
    Ok(ToolRegistry::weather(geocoder, forecaster, config.output.plot_path.clone())?)
}

fn system_prompt(config: &Config) -> Result<String> {
    let renderer = match &config.agent.system_prompt_file {
        Some(path) => {
            let template = fs::read_to_string(path)
                .context(format!("Failed to read system prompt template {}", path.display()))?;
            PromptRenderer::with_template(&template)?
        }
        None => PromptRenderer::new()?,
    };
    Ok(renderer.render_system()?)
}

async fn handle_agent_command(
    query: &str,
    max_iterations: Option<u32>,
    sequential: bool,
    verbose: bool,
    config: &Config,
) -> Result<()> {
    let api_key = config.api_key().map_err(|e| {
        eyre!(
            "{}\n\nSet {} or run `weather-agent configure` to store a key in {}",
            e,
            API_KEY_ENV,
            Config::user_config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "the config file".to_string())
        )
    })?;

    let llm_config = AnthropicConfig {
        timeout: Duration::from_millis(config.llm.timeout_ms),
        ..AnthropicConfig::with_model(config.llm.model.clone())
    };
    let client = Arc::new(AnthropicClient::with_api_key(api_key, llm_config)?);
    let tools = Arc::new(build_registry(config)?);

    let mut loop_config = config.loop_config(system_prompt(config)?);
    if let Some(cap) = max_iterations {
        loop_config.max_iterations = cap;
    }
    if sequential {
        loop_config.parallel_tools = false;
    }

    println!("{} {}", "Query:".bold(), query);

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_events(rx, verbose));
    let agent = AgentLoop::new(client.clone(), tools, loop_config).with_events(tx);
    let outcome = agent.run(query).await;
    // Dropping the loop closes the channel so the printer drains and exits
    drop(agent);
    let _ = printer.await;

    if verbose {
        let usage = client.total_usage();
        println!(
            "{} {} in / {} out (~${:.4})",
            "Tokens:".dimmed(),
            usage.input_tokens,
            usage.output_tokens,
            usage.cost_usd(&config.llm.model)
        );
    }

    match outcome {
        Ok(report) => {
            println!("\n{}\n{}", "Answer:".green().bold(), report.answer);
            for artifact in &report.artifacts {
                println!("{} {}", "Saved:".blue(), artifact.display());
            }
            info!("Run {} finished after {} iteration(s)", report.run_id, report.iterations);
            Ok(())
        }
        Err(aborted) => {
            for artifact in &aborted.artifacts {
                println!("{} {}", "Saved:".blue(), artifact.display());
            }
            Err(eyre!("{}", aborted))
        }
    }
}

async fn print_events(mut rx: mpsc::UnboundedReceiver<LoopEvent>, verbose: bool) {
    while let Some(event) = rx.recv().await {
        match event {
            LoopEvent::Started { run_id, .. } => {
                if verbose {
                    println!("{} {}", "Run:".dimmed(), run_id);
                }
            }
            LoopEvent::AwaitingModel { iteration } => {
                if verbose {
                    println!("{} iteration {}", "Thinking...".dimmed(), iteration);
                }
            }
            LoopEvent::AgentText { text } => println!("{}", text.italic()),
            LoopEvent::ToolCalls { calls } => {
                for call in calls {
                    println!("{} {} {}", "→".cyan(), call.name.cyan(), call.input);
                }
            }
            LoopEvent::ToolFinished {
                tool_name,
                is_error,
                summary,
                ..
            } => {
                let mark = if is_error { "✗".red() } else { "✓".green() };
                if verbose || is_error {
                    println!("{} {} {}", mark, tool_name, summary.dimmed());
                } else {
                    println!("{} {}", mark, tool_name);
                }
            }
            LoopEvent::Finished { .. } => {}
            LoopEvent::Aborted { kind, message } => {
                println!("{} ({}) {}", "Aborted:".red().bold(), kind, message);
            }
        }
    }
}

fn handle_models_command() -> Result<()> {
    println!("{}", "Available forecast models:".cyan().bold());
    for model in ForecastModel::ALL {
        println!("  {} {}", model.id().to_uppercase().green().bold(), model.description());
    }
    Ok(())
}

async fn handle_coordinates_command(location: &str, config: &Config) -> Result<()> {
    info!("Looking up coordinates for: {}", location);
    let place = match parse_coordinates(location) {
        Some(place) => place,
        None => build_geocoder(config)?.geocode(location).await?,
    };
    println!("{}", place.display_name.cyan().bold());
    println!("  Latitude:  {}", place.latitude);
    println!("  Longitude: {}", place.longitude);
    Ok(())
}

fn handle_configure_command(api_key: Option<&str>, config_path: Option<&PathBuf>) -> Result<()> {
    let path = match config_path {
        Some(path) => path.clone(),
        None => Config::user_config_path().ok_or_else(|| eyre!("Could not determine the config directory"))?,
    };

    let key = match api_key {
        Some(key) => key.to_string(),
        None => {
            println!("Enter your Anthropic API key:");
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("Failed to read API key")?;
            line
        }
    };
    if key.trim().is_empty() {
        return Err(eyre!("API key is empty"));
    }

    Config::save_api_key(&path, &key)?;
    println!("{} {}", "API key saved to".green(), path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging first
    setup_logging(cli.is_verbose()).context("Failed to setup logging")?;

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
