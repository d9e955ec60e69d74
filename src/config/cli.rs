//!
//! CLI configuration commands for callmux.
//!
//! - `config show` - effective configuration as TOML, plus file sources
//! - `config example` - documented sample configuration
//! - `validate` - load and validate, reporting every problem
//! - `models` - supported model families in selection order
//!
//! Each command has a `render_*` function returning the text, so output can be
//! tested without capturing stdout.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use std::fmt::Write as _;
use std::path::Path;

use crate::config::validation::ConfigValidator;
use crate::config::{BackendPreset, Config, paths};
use crate::converter::ConverterRegistry;
use crate::error::Result;

/* --- types ----------------------------------------------------------------------------------- */

///
/// CLI configuration command handler.
pub struct ConfigCli;

/* --- implementations --------------------------------------------------------------------- */

impl ConfigCli {
    /// Handle the `config show` command
    pub fn show(config_file: Option<&Path>) -> Result<()> {
        let config = Config::load_unvalidated(config_file)?;
        print!("{}", Self::render_show(&config)?);
        Ok(())
    }

    /// Handle the `config example` command
    pub fn example() {
        print!("{}", Config::example_toml());
    }

    ///
    /// Handle the `validate` command.
    ///
    /// # Returns
    ///  * `Ok(true)` when the configuration loaded and has no errors
    pub fn validate(config_file: Option<&Path>) -> bool {
        let config = match Config::load_unvalidated(config_file) {
            Ok(config) => config,
            Err(e) => {
                println!("Configuration loading failed:\n{}", e);
                return false;
            }
        };

        let (errors, warnings) = ConfigValidator::new(&config).check();
        print!("{}", Self::render_validation(&config, &errors, &warnings));
        errors.is_empty()
    }

    /// Handle the `models` command
    pub fn models() {
        print!("{}", Self::render_models(&ConverterRegistry::default()));
    }

    pub fn render_show(config: &Config) -> Result<String> {
        let mut out = String::new();
        let _ = writeln!(out, "# Effective callmux configuration");
        let _ = writeln!(out, "# Backend URL: {}", config.backend.backend_url());
        let _ = writeln!(out, "#");
        let _ = writeln!(out, "# Configuration sources (highest priority first):");
        for path in paths::config_file_paths() {
            let status = if path.exists() { "found" } else { "not found" };
            let _ = writeln!(out, "#   {} ({})", path.display(), status);
        }
        let _ = writeln!(out, "#");
        let _ = writeln!(out, "# Backend presets:");
        for preset in BackendPreset::ALL {
            let (protocol, host, port) = preset.endpoint();
            let _ = writeln!(
                out,
                "#   {:<10} {}://{}:{} ({})",
                format!("{:?}", preset).to_lowercase(),
                protocol,
                host,
                port,
                preset.description()
            );
        }
        let _ = writeln!(out);
        out.push_str(&config.to_toml()?);
        Ok(out)
    }

    pub fn render_validation(config: &Config, errors: &[String], warnings: &[String]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Listening on:  {}", config.listen_addr());
        let _ = writeln!(out, "Backend:       {}", config.backend.backend_url());
        let _ = writeln!(
            out,
            "Conversion:    {} (remove think tags: {})",
            if config.conversion.enabled { "enabled" } else { "disabled" },
            config.conversion.remove_think_tags
        );
        let _ = writeln!(out);

        for warning in warnings {
            let _ = writeln!(out, "warning: {}", warning);
        }
        for error in errors {
            let _ = writeln!(out, "error: {}", error);
        }

        if errors.is_empty() {
            let _ = writeln!(out, "Configuration is valid.");
        } else {
            let _ = writeln!(out, "Configuration has {} error(s).", errors.len());
        }
        out
    }

    pub fn render_models(registry: &ConverterRegistry) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Supported model families (first match wins):");
        let mut current = None;
        for (format, pattern) in registry.supported_models() {
            if current != Some(format) {
                let _ = writeln!(out, "  {}", format);
                current = Some(format);
            }
            let _ = writeln!(out, "      {}", pattern);
        }
        let _ = writeln!(out, "  passthrough");
        let _ = writeln!(out, "      (any other model)");
        out
    }
}

/* --- tests ------------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_show_contains_toml() {
        let out = ConfigCli::render_show(&Config::default()).unwrap();
        assert!(out.contains("[server]"));
        assert!(out.contains("[backend]"));
        assert!(out.contains("http://localhost:8888"));
        assert!(out.contains("ollama"));
    }

    #[test]
    fn test_render_validation() {
        let config = Config::default();
        let ok = ConfigCli::render_validation(&config, &[], &[]);
        assert!(ok.contains("Configuration is valid."));

        let bad = ConfigCli::render_validation(&config, &["bad port".to_string()], &[]);
        assert!(bad.contains("error: bad port"));
        assert!(bad.contains("1 error(s)"));
    }

    #[test]
    fn test_render_models_in_registry_order() {
        let out = ConfigCli::render_models(&ConverterRegistry::default());
        let coder = out.find("qwen3-coder").unwrap();
        let qwen3 = out.find("  qwen3\n").unwrap();
        assert!(coder < qwen3);
        assert!(out.contains(".*devstral.*"));
        assert!(out.trim_end().ends_with("(any other model)"));
    }
}
