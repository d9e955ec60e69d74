//!
//! Configuration validation for callmux.
//!
//! Errors are collected across all sections before reporting so a user sees
//! every problem at once. Warnings never fail validation.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use crate::config::{Config, LogLevel};
use crate::error::{ProxyError, Result};

/* --- types ----------------------------------------------------------------------------------- */

///
/// Configuration validator.
///
/// Checks listener settings, the backend endpoint and the timeouts.
pub struct ConfigValidator<'a> {
    /// Configuration to validate
    config: &'a Config,
    /// Validation errors collected during validation
    errors: Vec<String>,
    /// Validation warnings collected during validation
    warnings: Vec<String>,
}

/* --- constants ------------------------------------------------------------------------------- */

const SUPPORTED_PROTOCOLS: [&str; 2] = ["http", "https"];

/* --- implementations --------------------------------------------------------------------- */

impl<'a> ConfigValidator<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config, errors: Vec::new(), warnings: Vec::new() }
    }

    /// Run every check, log warnings and fail with all errors joined
    pub fn validate(self) -> Result<()> {
        let (errors, warnings) = self.check();

        for warning in &warnings {
            tracing::warn!("Configuration warning: {}", warning);
        }

        if !errors.is_empty() {
            let error_msg = format!(
                "Configuration validation failed with {} error(s):\n\n{}\n\
                 \n\
                 Please fix these issues and try again.\n\
                 Run 'callmux config example' to see a valid configuration.",
                errors.len(),
                errors
                    .iter()
                    .enumerate()
                    .map(|(i, e)| format!("{}. {}", i + 1, e))
                    .collect::<Vec<_>>()
                    .join("\n")
            );
            return Err(ProxyError::Config(error_msg));
        }

        tracing::debug!("Configuration validation passed with {} warning(s)", warnings.len());
        Ok(())
    }

    ///
    /// Run every check without logging.
    ///
    /// # Returns
    ///  * `(errors, warnings)`
    pub fn check(mut self) -> (Vec<String>, Vec<String>) {
        self.validate_server_config();
        self.validate_backend_config();
        self.validate_log_level();
        (self.errors, self.warnings)
    }

    /* --- private validation methods ------------------------------------------------------ */

    fn validate_server_config(&mut self) {
        let server = &self.config.server;

        if server.host.trim().is_empty() {
            self.add_error("Server host cannot be empty".to_string());
        }

        if server.port == 0 {
            self.add_error(format!(
                "Invalid server port {}: must be between 1 and 65535",
                server.port
            ));
        } else if server.port < 1024 {
            self.add_warning(format!(
                "Server port {} requires root/administrator privileges",
                server.port
            ));
        }

        if server.port == self.config.backend.port && is_local(&self.config.backend.host) {
            self.add_warning(format!(
                "Server port {} is the same as the local backend port; the proxy would call itself",
                server.port
            ));
        }
    }

    fn validate_backend_config(&mut self) {
        let backend = &self.config.backend;

        if !SUPPORTED_PROTOCOLS.contains(&backend.protocol.as_str()) {
            self.add_error(format!(
                "Unsupported backend protocol '{}': expected one of {}",
                backend.protocol,
                SUPPORTED_PROTOCOLS.join(", ")
            ));
        }

        if backend.host.trim().is_empty() {
            self.add_error("Backend host cannot be empty".to_string());
        } else if backend.host.contains("://") || backend.host.contains('/') {
            self.add_error(format!(
                "Backend host '{}' must be a bare host name; set the scheme with backend.protocol",
                backend.host
            ));
        }

        if backend.port == 0 {
            self.add_error(format!(
                "Invalid backend port {}: must be between 1 and 65535",
                backend.port
            ));
        }

        if backend.request_timeout_secs == 0 {
            self.add_error("Backend request timeout cannot be zero".to_string());
        } else if backend.request_timeout_secs < 10 {
            self.add_warning(format!(
                "Short request timeout ({}s) may cut off slow model responses",
                backend.request_timeout_secs
            ));
        }

        match backend.streaming_timeout_secs {
            Some(0) => self.add_warning(
                "Streaming timeout of 0 is treated as no idle ceiling; remove the key instead"
                    .to_string(),
            ),
            Some(secs) if secs < backend.request_timeout_secs => self.add_warning(format!(
                "Streaming timeout ({}s) is shorter than the request timeout ({}s)",
                secs, backend.request_timeout_secs
            )),
            _ => {}
        }
    }

    fn validate_log_level(&mut self) {
        if self.config.server.log_level == LogLevel::Trace {
            self.add_warning(
                "Trace log level enabled: stream contents will be logged".to_string(),
            );
        }
    }

    fn add_error(&mut self, error: String) {
        tracing::debug!("Validation error: {}", error);
        self.errors.push(error);
    }

    fn add_warning(&mut self, warning: String) {
        tracing::debug!("Validation warning: {}", warning);
        self.warnings.push(warning);
    }
}

/* --- utility functions ------------------------------------------------------------------- */

fn is_local(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1" | "0.0.0.0")
}

/* --- tests ------------------------------------------------------------------------------- */
