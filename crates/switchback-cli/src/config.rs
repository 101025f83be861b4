//! CLI configuration.
//!
//! Loaded from `~/.config/switchback/config.toml` (or `--config <path>`);
//! command-line flags override file values.
//!
//! ## Example Configuration
//!
//! ```toml
//! model = "gpt-4o"
//! api_key_env = "OPENAI_API_KEY"
//! system_prompt = "You are a helpful assistant. Be concise."
//! max_tool_rounds = 8
//! parallel_tool_calls = true
//! continuation = "previous_response"
//! tool_timeout_secs = 30
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use switchback::{
    Config, ContinuationStrategy, DEFAULT_BASE_URL, DEFAULT_MAX_TOOL_ROUNDS, OrchestratorOptions,
    RetryConfig, WeatherConfig,
};
use thiserror::Error;

use crate::Args;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to determine config directory")]
    NoConfigDir,

    #[error("API key not set: export {0}")]
    MissingApiKey(String),
}

/// Settings for one CLI run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub model: String,
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub system_prompt: Option<String>,
    pub max_tool_rounds: u32,
    pub parallel_tool_calls: bool,
    pub continuation: ContinuationStrategy,
    pub tool_timeout_secs: Option<u64>,
    /// HTTP timeout for model requests
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub weather_endpoint: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            system_prompt: None,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            parallel_tool_calls: false,
            continuation: ContinuationStrategy::FullHistory,
            tool_timeout_secs: None,
            timeout_seconds: 60,
            max_retries: 3,
            weather_endpoint: None,
        }
    }
}

impl CliConfig {
    /// Loads the config for `args`, then applies flag overrides.
    ///
    /// An explicit `--config` path must exist; a missing default file falls
    /// back to built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(args: &Args) -> Result<Self, CliError> {
        let config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Self::config_path()?;
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    log::debug!("No config at {}, using defaults", path.display());
                    Self::default()
                }
            }
        };
        Ok(config.with_overrides(args))
    }

    /// Parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable or malformed.
    pub fn from_file(path: &Path) -> Result<Self, CliError> {
        if !path.exists() {
            return Err(CliError::NotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Returns the default configuration file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined.
    pub fn config_path() -> Result<PathBuf, CliError> {
        let dir = dirs::config_dir().ok_or(CliError::NoConfigDir)?;
        Ok(dir.join("switchback").join("config.toml"))
    }

    /// Path of the REPL line history, if a data directory exists.
    pub fn history_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("switchback").join("history.txt"))
    }

    #[must_use]
    pub fn with_overrides(mut self, args: &Args) -> Self {
        if let Some(model) = &args.model {
            self.model.clone_from(model);
        }
        if let Some(base_url) = &args.base_url {
            self.base_url.clone_from(base_url);
        }
        if let Some(system) = &args.system {
            self.system_prompt = Some(system.clone());
        }
        if let Some(rounds) = args.max_tool_rounds {
            self.max_tool_rounds = rounds;
        }
        if args.parallel_tools {
            self.parallel_tool_calls = true;
        }
        if args.previous_response {
            self.continuation = ContinuationStrategy::PreviousResponse;
        }
        self
    }

    /// Builds the client configuration, reading the key from `api_key_env`.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::MissingApiKey`] if the variable is unset or empty.
    pub fn client_config(&self) -> Result<Config, CliError> {
        let api_key = std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| CliError::MissingApiKey(self.api_key_env.clone()))?;

        Ok(Config::new(&self.model)
            .with_base_url(&self.base_url)
            .with_api_key(api_key)
            .with_timeout(self.timeout_seconds)
            .with_retry_config(RetryConfig {
                max_retries: self.max_retries,
                ..RetryConfig::default()
            }))
    }

    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            max_tool_rounds: self.max_tool_rounds,
            parallel_tool_calls: self.parallel_tool_calls,
            continuation: self.continuation,
            omit_tools_on_continuation: false,
            tool_timeout: self.tool_timeout_secs.map(Duration::from_secs),
            tool_choice: None,
        }
    }

    pub fn weather_config(&self) -> WeatherConfig {
        let mut config = WeatherConfig::default();
        if let Some(endpoint) = &self.weather_endpoint {
            config.api_endpoint.clone_from(endpoint);
        }
        config
    }
}
