use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use weather_agent::llm::{DEFAULT_MODEL, LlmError, resolve_api_key};
use weather_agent::runner::LoopConfig;
use weather_agent::tools::DEFAULT_PLOT_PATH;
use weather_agent::weather::{NOMINATIM_URL, OPEN_METEO_URL};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub providers: ProvidersConfig,
    pub output: OutputConfig,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 8000,
            timeout_ms: 120000,
            api_key: None,
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_ms", &self.timeout_ms)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_iterations: u32,
    pub parallel_tools: bool,
    /// Handlebars template replacing the built-in system prompt
    pub system_prompt_file: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            parallel_tools: true,
            system_prompt_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub geocoding_url: String,
    pub forecast_url: String,
    pub user_agent: String,
    pub timeout_ms: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            geocoding_url: NOMINATIM_URL.to_string(),
            forecast_url: OPEN_METEO_URL.to_string(),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            timeout_ms: 30000,
        }
    }
}

impl ProvidersConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub plot_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            plot_path: PathBuf::from("outputs").join(DEFAULT_PLOT_PATH),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(primary_config) = Self::user_config_path()
            && primary_config.exists()
        {
            match Self::load_from_file(&primary_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// `~/.config/<project>/<project>.yml`
    pub fn user_config_path() -> Option<PathBuf> {
        let project_name = env!("CARGO_PKG_NAME");
        dirs::config_dir().map(|dir| dir.join(project_name).join(format!("{}.yml", project_name)))
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// API key from the environment, then this config
    pub fn api_key(&self) -> std::result::Result<String, LlmError> {
        resolve_api_key(self.llm.api_key.as_deref())
    }

    /// Loop settings, with the rendered system prompt
    pub fn loop_config(&self, system_prompt: String) -> LoopConfig {
        LoopConfig {
            max_iterations: self.agent.max_iterations,
            max_output_tokens: self.llm.max_tokens,
            parallel_tools: self.agent.parallel_tools,
            system_prompt,
        }
    }

    /// Store `api_key` in the config file at `path`, keeping its other settings
    ///
    /// The file is created owner read/write only.
    pub fn save_api_key(path: &Path, api_key: &str) -> Result<()> {
        let mut config = if path.exists() {
            Self::load_from_file(path)?
        } else {
            Self::default()
        };
        config.llm.api_key = Some(api_key.trim().to_string());

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context(format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_yaml::to_string(&config).context("Failed to serialize config")?;
        write_private(path, &content).context(format!("Failed to write {}", path.display()))?;

        log::info!("Saved API key to {}", path.display());
        Ok(())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, content: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(content.as_bytes())
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &str) -> std::io::Result<()> {
    fs::write(path, content)
}
