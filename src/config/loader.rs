//!
//! Configuration loading system for callmux.
//!
//! Layers are applied lowest priority first:
//! 1. Built-in defaults
//! 2. System config file (/etc/callmux/config.toml)
//! 3. User config file (~/.config/callmux/config.toml)
//! 4. Explicit config file (`--config <path>`)
//! 5. Environment variables
//!
//! TOML layers are deep-merged key by key, so a file only overrides the keys
//! it actually sets. Environment variables are applied last on the typed
//! configuration.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use crate::config::paths;
use crate::config::{BackendPreset, Config, LogLevel};
use crate::error::{ProxyError, Result};

use std::collections::HashMap;
use std::env;
use std::path::Path;

/* --- types ----------------------------------------------------------------------------------- */

///
/// Configuration loader implementing the Builder pattern.
///
/// Provides a fluent interface for building configuration from multiple sources
/// in the correct precedence order. Each method returns self for chaining.
pub struct ConfigLoader {
    /// TOML layers merged so far
    layers: toml::Table,
    /// Environment variable overrides collected
    env_overrides: HashMap<String, String>,
    /// Whether defaults have been applied
    defaults_applied: bool,
}

/* --- constants ------------------------------------------------------------------------------- */

/// Prefix of all callmux environment variables
pub const ENV_PREFIX: &str = "CALLMUX_";

/// Unprefixed variable names accepted for compatibility with older deployments
pub const LEGACY_ENV_VARS: &[&str] = &[
    "BACKEND_HOST",
    "BACKEND_PORT",
    "BACKEND_PROTOCOL",
    "PROXY_HOST",
    "PROXY_PORT",
    "REQUEST_TIMEOUT",
    "STREAMING_TIMEOUT",
    "ENABLE_TOOL_CALL_CONVERSION",
    "REMOVE_THINK_TAGS",
    "LOG_LEVEL",
];

/* --- implementations --------------------------------------------------------------------- */

impl ConfigLoader {
    /// Create a new configuration loader
    ///
    /// # Examples
    /// ```rust,no_run
    /// use callmux::config::loader::ConfigLoader;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = ConfigLoader::new()
    ///     .with_defaults()
    ///     .with_user_config()?
    ///     .with_env_vars()?
    ///     .build_base()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new() -> Self {
        Self { layers: toml::Table::new(), env_overrides: HashMap::new(), defaults_applied: false }
    }

    /// Apply built-in default values
    ///
    /// Must be called before `build()`.
    pub fn with_defaults(mut self) -> Self {
        self.layers = toml::Table::new();
        self.defaults_applied = true;
        self
    }

    /// Load system-wide configuration file
    ///
    /// A missing file is not an error.
    ///
    /// # Returns
    /// * `Ok(Self)` - System config loaded or skipped (file not found)
    /// * `Err(ProxyError)` - System config exists but failed to load
    pub fn with_system_config(mut self) -> Result<Self> {
        let system_config_path = paths::system_config_file()?;

        if system_config_path.exists() {
            tracing::debug!("Loading system config from: {}", system_config_path.display());
            self.load_config_file(&system_config_path)?;
        } else {
            tracing::debug!("System config not found at: {}", system_config_path.display());
        }

        Ok(self)
    }

    /// Load user configuration file
    ///
    /// A missing file (or an undeterminable home directory) is not an error.
    pub fn with_user_config(mut self) -> Result<Self> {
        let Some(user_config_path) = paths::user_config_file() else {
            tracing::debug!("No user config directory on this platform");
            return Ok(self);
        };

        if user_config_path.exists() {
            tracing::debug!("Loading user config from: {}", user_config_path.display());
            self.load_config_file(&user_config_path)?;
        } else {
            tracing::debug!("User config not found at: {}", user_config_path.display());
        }

        Ok(self)
    }

    /// Load configuration from specific file path
    ///
    /// Unlike the system and user files, this file must exist.
    ///
    /// # Arguments
    /// * `path` - Path to configuration file to load
    pub fn with_config_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Loading custom config from: {}", path.display());
        self.load_config_file(path)?;
        Ok(self)
    }

    /// Apply environment variable overrides
    ///
    /// Reads every `CALLMUX_*` variable plus the legacy unprefixed names.
    /// Prefixed variables win over legacy ones.
    pub fn with_env_vars(mut self) -> Result<Self> {
        tracing::debug!("Loading configuration from environment variables");

        for (key, value) in env::vars() {
            if key.starts_with(ENV_PREFIX) || LEGACY_ENV_VARS.contains(&key.as_str()) {
                self.env_overrides.insert(key, value);
            }
        }

        Ok(self)
    }

    /// Build and validate the final configuration
    pub fn build(self) -> Result<Config> {
        let config = self.build_base()?;
        config.validate()?;
        Ok(config)
    }

    /// Build the final configuration without validation
    pub fn build_base(self) -> Result<Config> {
        if !self.defaults_applied {
            return Err(ProxyError::Config(
                "Configuration loader must call with_defaults() before build()".to_string(),
            ));
        }

        let mut config: Config = toml::Value::Table(self.layers.clone())
            .try_into()
            .map_err(|e| ProxyError::Config(format!("Invalid configuration: {}", e)))?;
        self.apply_file_preset(&mut config);
        self.apply_env_overrides(&mut config)?;

        tracing::debug!(
            "Config: listen={}, backend={}, conversion={}, remove_think_tags={}",
            config.listen_addr(),
            config.backend.backend_url(),
            config.conversion.enabled,
            config.conversion.remove_think_tags
        );

        Ok(config)
    }

    /* --- private methods ----------------------------------------------------------------- */

    /// Load and merge configuration from a TOML file
    fn load_config_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();

        paths::validate_config_file(path)?;

        let contents = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::Config(format!(
                "Failed to read configuration file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let table: toml::Table = toml::from_str(&contents).map_err(|e| {
            ProxyError::Config(format!(
                "Failed to parse TOML configuration file '{}': {}\n\
                 \n\
                 Please check the syntax of your configuration file.\n\
                 Run 'callmux config example' to see a valid configuration.",
                path.display(),
                e
            ))
        })?;

        // surface type errors with the file name attached
        toml::Value::Table(table.clone()).try_into::<Config>().map_err(|e| {
            ProxyError::Config(format!("Invalid value in configuration file '{}': {}", path.display(), e))
        })?;

        merge_tables(&mut self.layers, table);
        tracing::debug!("Successfully loaded config from: {}", path.display());
        Ok(())
    }

    /// A preset from the files supplies endpoint fields no file set explicitly
    fn apply_file_preset(&self, config: &mut Config) {
        let Some(preset) = config.backend.preset else { return };
        let backend = self.layers.get("backend").and_then(toml::Value::as_table);
        let is_set = |key: &str| backend.is_some_and(|b| b.contains_key(key));

        let (protocol, host, port) = preset.endpoint();
        if !is_set("protocol") {
            config.backend.protocol = protocol.to_string();
        }
        if !is_set("host") {
            config.backend.host = host.to_string();
        }
        if !is_set("port") {
            config.backend.port = port;
        }
    }

    fn env(&self, key: &str) -> Option<&str> {
        self.env_overrides.get(key).map(String::as_str)
    }

    /// Apply environment variable overrides in a fixed order
    fn apply_env_overrides(&self, config: &mut Config) -> Result<()> {
        if let Some(value) = self.env("CALLMUX_BACKEND_PRESET") {
            config.backend.apply_preset(BackendPreset::from_str(value)?);
        }

        // legacy names first so prefixed ones win
        for (legacy, prefixed) in [
            ("PROXY_HOST", "CALLMUX_SERVER_HOST"),
            ("PROXY_PORT", "CALLMUX_SERVER_PORT"),
            ("LOG_LEVEL", "CALLMUX_SERVER_LOG_LEVEL"),
            ("BACKEND_PROTOCOL", "CALLMUX_BACKEND_PROTOCOL"),
            ("BACKEND_HOST", "CALLMUX_BACKEND_HOST"),
            ("BACKEND_PORT", "CALLMUX_BACKEND_PORT"),
            ("REQUEST_TIMEOUT", "CALLMUX_BACKEND_REQUEST_TIMEOUT_SECS"),
            ("STREAMING_TIMEOUT", "CALLMUX_BACKEND_STREAMING_TIMEOUT_SECS"),
            ("ENABLE_TOOL_CALL_CONVERSION", "CALLMUX_CONVERSION_ENABLED"),
            ("REMOVE_THINK_TAGS", "CALLMUX_CONVERSION_REMOVE_THINK_TAGS"),
        ] {
            for key in [legacy, prefixed] {
                if let Some(value) = self.env(key) {
                    apply_env_value(config, prefixed, key, value)?;
                }
            }
        }

        for key in self.env_overrides.keys() {
            if key.starts_with(ENV_PREFIX) && !is_known_prefixed(key) {
                tracing::debug!("Ignoring unknown environment variable: {}", key);
            }
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/* --- utility functions ------------------------------------------------------------------- */

fn is_known_prefixed(key: &str) -> bool {
    matches!(
        key,
        "CALLMUX_BACKEND_PRESET"
            | "CALLMUX_SERVER_HOST"
            | "CALLMUX_SERVER_PORT"
            | "CALLMUX_SERVER_LOG_LEVEL"
            | "CALLMUX_BACKEND_PROTOCOL"
            | "CALLMUX_BACKEND_HOST"
            | "CALLMUX_BACKEND_PORT"
            | "CALLMUX_BACKEND_REQUEST_TIMEOUT_SECS"
            | "CALLMUX_BACKEND_STREAMING_TIMEOUT_SECS"
            | "CALLMUX_CONVERSION_ENABLED"
            | "CALLMUX_CONVERSION_REMOVE_THINK_TAGS"
    )
}

///
/// Set one configuration field from an environment variable.
///
/// # Arguments
/// * `field` - canonical (prefixed) variable naming the field
/// * `var_name` - variable actually read, used in error messages
/// * `value` - raw value
fn apply_env_value(config: &mut Config, field: &str, var_name: &str, value: &str) -> Result<()> {
    match field {
        "CALLMUX_SERVER_HOST" => config.server.host = value.trim().to_string(),
        "CALLMUX_SERVER_PORT" => config.server.port = parse_port(value, var_name)?,
        "CALLMUX_SERVER_LOG_LEVEL" => config.server.log_level = LogLevel::from_str(value)?,
        "CALLMUX_BACKEND_PROTOCOL" => config.backend.protocol = value.trim().to_lowercase(),
        "CALLMUX_BACKEND_HOST" => config.backend.host = value.trim().to_string(),
        "CALLMUX_BACKEND_PORT" => config.backend.port = parse_port(value, var_name)?,
        "CALLMUX_BACKEND_REQUEST_TIMEOUT_SECS" => {
            config.backend.request_timeout_secs = parse_number(value, var_name)?;
        }
        "CALLMUX_BACKEND_STREAMING_TIMEOUT_SECS" => {
            config.backend.streaming_timeout_secs = parse_optional_timeout(value, var_name)?;
        }
        "CALLMUX_CONVERSION_ENABLED" => config.conversion.enabled = parse_bool_env(value, var_name)?,
        "CALLMUX_CONVERSION_REMOVE_THINK_TAGS" => {
            config.conversion.remove_think_tags = parse_bool_env(value, var_name)?;
        }
        _ => tracing::debug!("Ignoring unknown environment variable: {}", var_name),
    }
    Ok(())
}

/// Recursively merge `overlay` into `base`; overlay values win
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn parse_port(value: &str, var_name: &str) -> Result<u16> {
    value.trim().parse().map_err(|e| {
        ProxyError::Config(format!(
            "Invalid {} value '{}': {}\n\
             Port must be a number between 1 and 65535.",
            var_name, value, e
        ))
    })
}

fn parse_number(value: &str, var_name: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|e| ProxyError::Config(format!("Invalid {} value '{}': {}", var_name, value, e)))
}

/// `none`, empty and `0` mean no timeout
fn parse_optional_timeout(value: &str, var_name: &str) -> Result<Option<u64>> {
    match value.trim().to_lowercase().as_str() {
        "" | "none" | "0" => Ok(None),
        _ => parse_number(value, var_name).map(Some),
    }
}

/// Parse boolean value from environment variable
pub fn parse_bool_env(value: &str, var_name: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" | "enabled" => Ok(true),
        "false" | "no" | "0" | "off" | "disabled" => Ok(false),
        _ => Err(ProxyError::Config(format!(
            "Invalid boolean value for {}: '{}'\n\
             Valid values: true/false, yes/no, 1/0, on/off, enabled/disabled",
            var_name, value
        ))),
    }
}

/* --- tests ------------------------------------------------------------------------------- */
