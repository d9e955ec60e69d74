//!
//! Configuration management for callmux.
//!
//! Configuration is layered, lowest priority first:
//! - built-in defaults
//! - system config file (/etc/callmux/config.toml)
//! - user config file (platform config directory)
//! - explicit file given with `--config`
//! - environment variables (`CALLMUX_*`, plus the unprefixed legacy names)
//!
//! Submodules:
//! - `loader.rs` - layered loading
//! - `paths.rs` - platform-native path resolution
//! - `validation.rs` - validation rules
//! - `cli.rs` - `config` subcommands
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- modules --------------------------------------------------------------------------------- */

pub mod cli;
pub mod loader;
pub mod paths;
pub mod validation;

/* --- uses ------------------------------------------------------------------------------------ */

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ProxyError, Result};

/* --- types ----------------------------------------------------------------------------------- */

///
/// Main application configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Proxy listener settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Inference backend the proxy forwards to
    #[serde(default)]
    pub backend: BackendConfig,
    /// Tool-call conversion switches
    #[serde(default)]
    pub conversion: ConversionConfig,
}

///
/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_server_host")]
    pub host: String,
    /// Listen port
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Application logging level
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
}

///
/// Backend server configuration.
///
/// The backend is any OpenAI-compatible server (LM Studio, Ollama, vLLM, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Known backend whose host, port and protocol are used as a base
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<BackendPreset>,
    /// `http` or `https`
    #[serde(default = "default_backend_protocol")]
    pub protocol: String,
    #[serde(default = "default_backend_host")]
    pub host: String,
    #[serde(default = "default_backend_port")]
    pub port: u16,
    /// Total time allowed for a non-streaming backend request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Longest silence allowed between streamed chunks; unset means no limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming_timeout_secs: Option<u64>,
}

///
/// Tool-call conversion configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Rewrite model-specific tool-call markup into `tool_calls`
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Also drop `<think>` spans that carry text (empty ones always go)
    #[serde(default = "default_true")]
    pub remove_think_tags: bool,
}

///
/// Well-known backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreset {
    /// LM Studio local server
    Lmstudio,
    /// Ollama local server
    Ollama,
    /// OpenAI API
    Openai,
    /// Anthropic API
    Anthropic,
}

///
/// Logging level enumeration.
///
/// Defines available log levels compatible with tracing crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
}

/* --- defaults -------------------------------------------------------------------------------- */

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    5000
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_backend_protocol() -> String {
    "http".to_string()
}

fn default_backend_host() -> String {
    "localhost".to_string()
}

/// LM Studio's default port
fn default_backend_port() -> u16 {
    8888
}

fn default_request_timeout() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

/* --- implementations --------------------------------------------------------------------- */

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            backend: BackendConfig::default(),
            conversion: ConversionConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_server_host(), port: default_server_port(), log_level: default_log_level() }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            preset: None,
            protocol: default_backend_protocol(),
            host: default_backend_host(),
            port: default_backend_port(),
            request_timeout_secs: default_request_timeout(),
            streaming_timeout_secs: None,
        }
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self { enabled: true, remove_think_tags: true }
    }
}

impl Config {
    /// Load configuration from the standard hierarchy:
    /// 1. Environment variables (highest priority)
    /// 2. User config file
    /// 3. System config file (/etc/callmux/config.toml)
    /// 4. Built-in defaults (lowest priority)
    ///
    /// # Returns
    /// * `Ok(Config)` - Successfully loaded configuration
    /// * `Err(ProxyError)` - Configuration loading failed
    ///
    /// # Examples
    /// ```rust,no_run
    /// use callmux::config::Config;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = Config::load()?;
    /// println!("Forwarding to {}", config.backend.backend_url());
    /// # Ok(())
    /// # }
    /// ```
    pub fn load() -> Result<Self> {
        Self::load_with_file(None::<&Path>)
    }

    /// Same as [`Config::load`], with an extra config file layered above the
    /// user file (`--config <path>`).
    pub fn load_with_file<P: AsRef<Path>>(file: Option<P>) -> Result<Self> {
        Self::layered_loader(file)?.build()
    }

    /// Load every layer but skip validation, for reporting commands
    pub fn load_unvalidated<P: AsRef<Path>>(file: Option<P>) -> Result<Self> {
        Self::layered_loader(file)?.build_base()
    }

    fn layered_loader<P: AsRef<Path>>(file: Option<P>) -> Result<loader::ConfigLoader> {
        let mut loader = loader::ConfigLoader::new().with_defaults().with_system_config()?.with_user_config()?;
        if let Some(file) = file {
            let expanded = paths::expand_path(file)?;
            loader = loader.with_config_file(expanded)?;
        }
        loader.with_env_vars()
    }

    /// Validate the current configuration
    ///
    /// # Returns
    /// * `Ok(())` - Configuration is valid
    /// * `Err(ProxyError)` - Configuration validation failed with details
    pub fn validate(&self) -> Result<()> {
        validation::ConfigValidator::new(self).validate()
    }

    /// Address the proxy listens on
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ProxyError::Config(format!("Failed to serialize configuration: {}", e)))
    }

    /// Get configuration file example as TOML string
    ///
    /// Returns a documented example configuration file that users
    /// can use as a starting point for their own configuration.
    pub fn example_toml() -> &'static str {
        r#"# callmux configuration
# This file should be placed at:
#   Linux/Unix: ~/.config/callmux/config.toml
#   macOS: ~/Library/Application Support/com.SkyCorp.callmux/config.toml
#   Windows: %APPDATA%/SkyCorp/callmux/config/config.toml

[server]
# Listen address and port (default: 0.0.0.0:5000)
host = "0.0.0.0"
port = 5000

# Logging level: trace, debug, info, warn, error (default: info)
log_level = "info"

[backend]
# Optional preset: lmstudio, ollama, openai, anthropic.
# Explicit protocol/host/port below still win over the preset.
# preset = "ollama"
protocol = "http"
host = "localhost"
port = 8888

# Total timeout for non-streaming requests in seconds (default: 300)
request_timeout_secs = 300

# Longest silence between streamed chunks in seconds (default: unlimited)
# streaming_timeout_secs = 600

[conversion]
# Rewrite model-specific tool-call markup into standard tool_calls (default: true)
enabled = true

# Remove <think>...</think> reasoning spans from content (default: true).
# Empty think spans are always removed.
remove_think_tags = true

# Environment variables override the file, e.g.:
# CALLMUX_BACKEND_HOST=127.0.0.1
# CALLMUX_BACKEND_PORT=11434
# CALLMUX_CONVERSION_REMOVE_THINK_TAGS=false
"#
    }
}

impl BackendConfig {
    /// `protocol://host:port`
    pub fn backend_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn streaming_timeout(&self) -> Option<Duration> {
        self.streaming_timeout_secs.map(Duration::from_secs)
    }

    /// Replace protocol, host and port with the preset's values
    pub fn apply_preset(&mut self, preset: BackendPreset) {
        let (protocol, host, port) = preset.endpoint();
        self.preset = Some(preset);
        self.protocol = protocol.to_string();
        self.host = host.to_string();
        self.port = port;
    }
}

impl BackendPreset {
    pub const ALL: [BackendPreset; 4] =
        [BackendPreset::Lmstudio, BackendPreset::Ollama, BackendPreset::Openai, BackendPreset::Anthropic];

    /// `(protocol, host, port)` of the preset
    pub fn endpoint(&self) -> (&'static str, &'static str, u16) {
        match self {
            BackendPreset::Lmstudio => ("http", "localhost", 8888),
            BackendPreset::Ollama => ("http", "localhost", 11434),
            BackendPreset::Openai => ("https", "api.openai.com", 443),
            BackendPreset::Anthropic => ("https", "api.anthropic.com", 443),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            BackendPreset::Lmstudio => "LM Studio local server",
            BackendPreset::Ollama => "Ollama local server",
            BackendPreset::Openai => "OpenAI API",
            BackendPreset::Anthropic => "Anthropic Claude API",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lmstudio" | "lm-studio" => Ok(BackendPreset::Lmstudio),
            "ollama" => Ok(BackendPreset::Ollama),
            "openai" => Ok(BackendPreset::Openai),
            "anthropic" => Ok(BackendPreset::Anthropic),
            _ => Err(ProxyError::Config(format!(
                "Invalid backend preset '{}'. Valid presets are: lmstudio, ollama, openai, anthropic",
                s
            ))),
        }
    }
}

impl LogLevel {
    /// Convert to tracing::Level for logging setup
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }

    /// Directive string for `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" | "critical" => Ok(LogLevel::Error),
            _ => Err(ProxyError::Config(format!(
                "Invalid log level '{}'. Valid levels are: trace, debug, info, warn, error",
                s
            ))),
        }
    }
}

/* --- tests ----------------------------------------------------------------------------------- */
