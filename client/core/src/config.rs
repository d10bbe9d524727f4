//! TOML Configuration File Support
//!
//! Centralized configuration loading for webserve clients, from a TOML file
//! at `~/.config/webserve/client.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied by the caller through [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! url = "ws://127.0.0.1:8010/v1/retrieveResponse"
//! connect_timeout_ms = 5000
//!
//! [session]
//! model = "Qwen/Qwen2.5-7B-Instruct"
//! temperature = 0.6
//! stop_grace_ms = 5000
//!
//! [ui]
//! dark_mode = false
//! export_dir = "/home/me/Downloads"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::export::SessionMetadata;
use crate::transport::config::TransportConfig;

/// Default time a stop request may wait for the next update
pub const DEFAULT_STOP_GRACE_MS: u64 = 5000;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Server section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerToml {
    /// Streaming endpoint URL
    pub url: Option<String>,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
}

/// Session section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionToml {
    /// Model identifier shown in the header and written to exports
    pub model: Option<String>,

    /// Sampling temperature written to exports
    pub temperature: Option<f64>,

    /// Stop grace period in milliseconds (0 = wait for the server forever)
    pub stop_grace_ms: Option<u64>,
}

/// UI section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UiToml {
    /// Start in dark mode
    pub dark_mode: Option<bool>,

    /// Directory exports are written to
    pub export_dir: Option<PathBuf>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientToml {
    /// Server section
    pub server: ServerToml,

    /// Session section
    pub session: SessionToml,

    /// UI section
    pub ui: UiToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Transport configuration
    pub transport: TransportConfig,

    /// Model settings recorded with exports
    pub metadata: SessionMetadata,

    /// How long a stop request waits for the next update
    pub stop_grace: Duration,

    /// Start in dark mode
    pub dark_mode: bool,

    /// Directory exports are written to
    pub export_dir: PathBuf,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    source: ConfigSource,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            metadata: SessionMetadata::default(),
            stop_grace: Duration::from_millis(DEFAULT_STOP_GRACE_MS),
            dark_mode: false,
            export_dir: default_export_dir(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Stop grace period, `None` when disabled
    #[must_use]
    pub fn stop_deadline(&self) -> Option<Duration> {
        if self.stop_grace.is_zero() {
            None
        } else {
            Some(self.stop_grace)
        }
    }

    /// Check values that cannot be expressed in the types
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for a URL that is not
    /// `ws://`/`wss://`, an empty model id, or a non-finite temperature.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.transport.url;
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ConfigError::ValidationError(format!(
                "server url must start with ws:// or wss://, got {url:?}"
            )));
        }
        if self.metadata.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "model must not be empty".to_string(),
            ));
        }
        if let Some(temperature) = self.metadata.temperature {
            if !temperature.is_finite() {
                return Err(ConfigError::ValidationError(format!(
                    "temperature must be a finite number, got {temperature}"
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/webserve/client.toml` or
/// `~/.config/webserve/client.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("webserve").join("client.toml"))
}

/// Where exports go when nothing is configured
///
/// The user's download directory, else the home directory, else the
/// working directory.
#[must_use]
pub fn default_export_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Load configuration from all sources except the CLI
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the resulting configuration is invalid. A missing config file is not an
/// error (defaults are used).
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or if the resulting configuration is invalid.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ClientConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration, reading environment variables through `env`
///
/// # Errors
///
/// Same as [`load_config_from_path`].
pub fn load_config_with_env(
    path: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ClientToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);
    config.validate()?;

    Ok(config)
}

fn apply_toml_config(config: &mut ClientConfig, toml: &ClientToml) {
    if let Some(ref url) = toml.server.url {
        config.transport.url = url.clone();
    }
    if let Some(timeout) = toml.server.connect_timeout_ms {
        config.transport.connect_timeout_ms = timeout;
    }

    if let Some(ref model) = toml.session.model {
        config.metadata.model = model.clone();
    }
    if toml.session.temperature.is_some() {
        config.metadata.temperature = toml.session.temperature;
    }
    if let Some(grace) = toml.session.stop_grace_ms {
        config.stop_grace = Duration::from_millis(grace);
    }

    if let Some(dark) = toml.ui.dark_mode {
        config.dark_mode = dark;
    }
    if let Some(ref dir) = toml.ui.export_dir {
        config.export_dir = dir.clone();
    }
}

fn apply_env_config(config: &mut ClientConfig, env: impl Fn(&str) -> Option<String>) {
    if let Some(url) = env("WEBSERVE_URL") {
        config.transport.url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(timeout) = env("WEBSERVE_CONNECT_TIMEOUT_MS") {
        if let Ok(ms) = timeout.parse::<u64>() {
            config.transport.connect_timeout_ms = ms;
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %timeout, "Ignoring invalid WEBSERVE_CONNECT_TIMEOUT_MS");
        }
    }
    if let Some(model) = env("WEBSERVE_MODEL") {
        config.metadata.model = model;
        config.source = ConfigSource::Env;
    }
    if let Some(temperature) = env("WEBSERVE_TEMPERATURE") {
        if let Ok(t) = temperature.parse::<f64>() {
            config.metadata.temperature = Some(t);
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %temperature, "Ignoring invalid WEBSERVE_TEMPERATURE");
        }
    }
    if let Some(grace) = env("WEBSERVE_STOP_GRACE_MS") {
        if let Ok(ms) = grace.parse::<u64>() {
            config.stop_grace = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %grace, "Ignoring invalid WEBSERVE_STOP_GRACE_MS");
        }
    }
    if let Some(dark) = env("WEBSERVE_DARK_MODE") {
        config.dark_mode = dark != "0" && dark.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
    if let Some(dir) = env("WEBSERVE_EXPORT_DIR") {
        config.export_dir = PathBuf::from(dir);
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Overrides
// =============================================================================

/// Values given on the command line
///
/// Applied last, on top of file and environment values.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Server URL override
    pub url: Option<String>,

    /// Model override
    pub model: Option<String>,

    /// Temperature override
    pub temperature: Option<f64>,

    /// Stop grace override in milliseconds
    pub stop_grace_ms: Option<u64>,

    /// Dark mode override
    pub dark_mode: Option<bool>,

    /// Export directory override
    pub export_dir: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set server URL override
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set model override
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set temperature override
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set stop grace override
    #[must_use]
    pub fn with_stop_grace_ms(mut self, ms: u64) -> Self {
        self.stop_grace_ms = Some(ms);
        self
    }

    /// Set dark mode override
    #[must_use]
    pub fn with_dark_mode(mut self, dark: bool) -> Self {
        self.dark_mode = Some(dark);
        self
    }

    /// Set export directory override
    #[must_use]
    pub fn with_export_dir(mut self, dir: PathBuf) -> Self {
        self.export_dir = Some(dir);
        self
    }

    fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.model.is_none()
            && self.temperature.is_none()
            && self.stop_grace_ms.is_none()
            && self.dark_mode.is_none()
            && self.export_dir.is_none()
    }

    /// Apply overrides to a configuration and re-validate it
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if an override makes the
    /// configuration invalid.
    pub fn apply(&self, config: &mut ClientConfig) -> Result<(), ConfigError> {
        if self.is_empty() {
            return Ok(());
        }
        config.source = ConfigSource::Cli;

        if let Some(ref url) = self.url {
            config.transport.url = url.clone();
        }
        if let Some(ref model) = self.model {
            config.metadata.model = model.clone();
        }
        if self.temperature.is_some() {
            config.metadata.temperature = self.temperature;
        }
        if let Some(ms) = self.stop_grace_ms {
            config.stop_grace = Duration::from_millis(ms);
        }
        if let Some(dark) = self.dark_mode {
            config.dark_mode = dark;
        }
        if let Some(ref dir) = self.export_dir {
            config.export_dir = dir.clone();
        }

        config.validate()
    }
}
