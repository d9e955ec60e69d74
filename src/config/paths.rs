//!
//! Platform-native path resolution for callmux configuration.
//!
//! - Linux/Unix: XDG Base Directory layout (~/.config/callmux)
//! - macOS: ~/Library/Application Support/callmux
//! - Windows: %APPDATA%\callmux
//!
//! Nothing here creates directories; callmux only reads configuration.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use crate::error::{ProxyError, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/* --- constants ------------------------------------------------------------------------------- */

/// Application name for directory resolution
pub const APP_NAME: &str = "callmux";
/// Organization qualifier for directory resolution
const ORGANIZATION: &str = "com";
/// Organization name for directory resolution
const ORG_NAME: &str = "SkyCorp";
/// File name looked up in every configuration directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/* --- public functions ------------------------------------------------------------------------ */

/// User configuration directory, if the platform has a home directory
pub fn user_config_dir() -> Option<PathBuf> {
    ProjectDirs::from(ORGANIZATION, ORG_NAME, APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the system configuration directory for callmux
///
/// Returns the platform-appropriate system-wide configuration directory:
/// - Linux: /etc/callmux/
/// - macOS: /Library/Preferences/callmux/
/// - Windows: %PROGRAMDATA%/callmux/
pub fn system_config_dir() -> Result<PathBuf> {
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        Ok(PathBuf::from("/etc").join(APP_NAME))
    }

    #[cfg(target_os = "macos")]
    {
        Ok(PathBuf::from("/Library/Preferences").join(APP_NAME))
    }

    #[cfg(windows)]
    {
        std::env::var("PROGRAMDATA").map(|path| PathBuf::from(path).join(APP_NAME)).map_err(|_| {
            ProxyError::Config("PROGRAMDATA environment variable not found".to_string())
        })
    }
}

pub fn user_config_file() -> Option<PathBuf> {
    user_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

pub fn system_config_file() -> Result<PathBuf> {
    Ok(system_config_dir()?.join(CONFIG_FILE_NAME))
}

/// Expand `~/` and environment variables in a path
///
/// # Arguments
/// * `path` - Path string that may contain ~ or environment variables
///
/// # Examples
/// ```rust
/// use callmux::config::paths::expand_path;
///
/// let expanded = expand_path("~/.config/callmux/config.toml").unwrap();
/// assert!(!expanded.to_string_lossy().starts_with('~'));
/// ```
pub fn expand_path<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path_str = path.as_ref().to_string_lossy();

    if let Some(rest) = path_str.strip_prefix("~/") {
        return directories::UserDirs::new().map(|dirs| dirs.home_dir().join(rest)).ok_or_else(|| {
            ProxyError::Config("Unable to determine user home directory for tilde expansion".to_string())
        });
    }

    if path_str.contains('$') {
        let expanded = shellexpand::full(&path_str).map_err(|e| {
            ProxyError::Config(format!(
                "Failed to expand environment variables in path '{}': {}",
                path_str, e
            ))
        })?;
        return Ok(PathBuf::from(expanded.as_ref()));
    }

    Ok(path.as_ref().to_path_buf())
}

/// Check that a configuration file exists, is a regular file and is readable
pub fn validate_config_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ProxyError::Config(format!(
            "Configuration file '{}' does not exist",
            path.display()
        )));
    }

    if !path.is_file() {
        return Err(ProxyError::Config(format!(
            "Configuration path '{}' exists but is not a regular file",
            path.display()
        )));
    }

    std::fs::File::open(path).map_err(|e| {
        ProxyError::Config(format!(
            "Configuration file '{}' exists but cannot be read: {}\n\
             \n\
             Please check file permissions. You can fix this with: chmod 644 '{}'",
            path.display(),
            e,
            path.display()
        ))
    })?;

    Ok(())
}

/// Configuration file locations, highest priority first
pub fn config_file_paths() -> Vec<PathBuf> {
    user_config_file().into_iter().chain(system_config_file().ok()).collect()
}

/* --- tests ----------------------------------------------------------------------------------- */
