//! Configuration module tests
//!
//! Exercises the full layering (user file, explicit file, environment) through
//! the public API. Uses temp-env to point HOME at a scratch directory and to
//! restore every variable after each test.

use std::fs;
use std::path::Path;

use callmux::config::loader::ConfigLoader;
use callmux::config::{BackendPreset, Config, LogLevel};
use tempfile::TempDir;

const CONFIG_VARS: &[&str] = &[
    "CALLMUX_SERVER_HOST",
    "CALLMUX_SERVER_PORT",
    "CALLMUX_SERVER_LOG_LEVEL",
    "CALLMUX_BACKEND_PRESET",
    "CALLMUX_BACKEND_PROTOCOL",
    "CALLMUX_BACKEND_HOST",
    "CALLMUX_BACKEND_PORT",
    "CALLMUX_BACKEND_REQUEST_TIMEOUT_SECS",
    "CALLMUX_BACKEND_STREAMING_TIMEOUT_SECS",
    "CALLMUX_CONVERSION_ENABLED",
    "CALLMUX_CONVERSION_REMOVE_THINK_TAGS",
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

/// Run `f` with HOME in `home`, config variables cleared and `vars` set
fn with_isolated_env<F: FnOnce()>(home: &Path, vars: &[(&str, &str)], f: F) {
    let home_str = home.to_str().unwrap().to_string();
    let xdg = home.join(".config").to_str().unwrap().to_string();
    let mut all: Vec<(String, Option<String>)> = CONFIG_VARS
        .iter()
        .map(|name| {
            let value = vars.iter().find(|(k, _)| k == name).map(|(_, v)| v.to_string());
            (name.to_string(), value)
        })
        .collect();
    all.push(("HOME".to_string(), Some(home_str)));
    all.push(("XDG_CONFIG_HOME".to_string(), Some(xdg)));
    temp_env::with_vars(all, f);
}

#[test]
fn test_load_defaults_without_files() {
    let home = TempDir::new().unwrap();
    with_isolated_env(home.path(), &[], || {
        let config = Config::load().expect("defaults should load");
        assert_eq!(config, Config::default());
    });
}

#[test]
#[cfg(target_os = "linux")]
fn test_user_config_file_is_picked_up() {
    let home = TempDir::new().unwrap();
    let user_dir = home.path().join(".config").join("callmux");
    fs::create_dir_all(&user_dir).unwrap();
    fs::write(user_dir.join("config.toml"), "[server]\nport = 6000\n").unwrap();

    with_isolated_env(home.path(), &[], || {
        let config = Config::load().expect("user config should load");
        assert_eq!(config.server.port, 6000);
    });
}

#[test]
fn test_explicit_file_with_tilde() {
    let home = TempDir::new().unwrap();
    fs::write(home.path().join("proxy.toml"), "[backend]\nhost = \"gpu-01\"\nport = 1234\n").unwrap();

    with_isolated_env(home.path(), &[], || {
        let config = Config::load_with_file(Some("~/proxy.toml")).expect("file should load");
        assert_eq!(config.backend.backend_url(), "http://gpu-01:1234");
    });
}

#[test]
fn test_environment_beats_files() {
    let home = TempDir::new().unwrap();
    let file = home.path().join("proxy.toml");
    fs::write(&file, "[server]\nport = 7000\nlog_level = \"debug\"\n").unwrap();

    with_isolated_env(home.path(), &[("PROXY_PORT", "7100"), ("CALLMUX_SERVER_LOG_LEVEL", "warning")], || {
        let config = Config::load_with_file(Some(&file)).unwrap();
        assert_eq!(config.server.port, 7100);
        assert_eq!(config.server.log_level, LogLevel::Warn);
    });
}

#[test]
fn test_legacy_unprefixed_variables() {
    let home = TempDir::new().unwrap();
    with_isolated_env(
        home.path(),
        &[
            ("BACKEND_PROTOCOL", "https"),
            ("BACKEND_HOST", "inference.internal"),
            ("BACKEND_PORT", "8443"),
            ("REQUEST_TIMEOUT", "120"),
            ("STREAMING_TIMEOUT", "900"),
            ("ENABLE_TOOL_CALL_CONVERSION", "no"),
            ("LOG_LEVEL", "DEBUG"),
        ],
        || {
            let config = Config::load().unwrap();
            assert_eq!(config.backend.backend_url(), "https://inference.internal:8443");
            assert_eq!(config.backend.request_timeout_secs, 120);
            assert_eq!(config.backend.streaming_timeout_secs, Some(900));
            assert!(!config.conversion.enabled);
            assert_eq!(config.server.log_level, LogLevel::Debug);
        },
    );
}

#[test]
fn test_preset_from_environment() {
    let home = TempDir::new().unwrap();
    with_isolated_env(home.path(), &[("CALLMUX_BACKEND_PRESET", "anthropic")], || {
        let config = Config::load().unwrap();
        assert_eq!(config.backend.preset, Some(BackendPreset::Anthropic));
        assert_eq!(config.backend.backend_url(), "https://api.anthropic.com:443");
    });
}

#[test]
fn test_invalid_preset_is_reported() {
    let home = TempDir::new().unwrap();
    with_isolated_env(home.path(), &[("CALLMUX_BACKEND_PRESET", "vertex")], || {
        let error = Config::load().unwrap_err().to_string();
        assert!(error.contains("Invalid backend preset 'vertex'"));
    });
}

#[test]
fn test_load_validates_but_load_unvalidated_does_not() {
    let home = TempDir::new().unwrap();
    with_isolated_env(home.path(), &[("CALLMUX_BACKEND_PROTOCOL", "ftp")], || {
        assert!(Config::load().is_err());
        let config = Config::load_unvalidated(None::<&Path>).unwrap();
        assert_eq!(config.backend.protocol, "ftp");
    });
}

#[test]
fn test_unknown_key_type_error_names_file() {
    let home = TempDir::new().unwrap();
    let file = home.path().join("typo.toml");
    fs::write(&file, "[server]\nport = \"five thousand\"\n").unwrap();

    let error = ConfigLoader::new().with_defaults().with_config_file(&file).err().expect("should fail");
    assert!(error.to_string().contains("typo.toml"));
}

#[test]
fn test_effective_config_round_trips_through_toml() {
    let mut config = Config::default();
    config.backend.apply_preset(BackendPreset::Ollama);
    config.backend.streaming_timeout_secs = Some(600);
    config.conversion.remove_think_tags = false;

    let text = config.to_toml().unwrap();
    let parsed: Config = toml::from_str(&text).unwrap();
    assert_eq!(parsed, config);
}
