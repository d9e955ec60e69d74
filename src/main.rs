//! # callmux - tool-call markup conversion proxy
//!
//! Sits between OpenAI-compatible clients and a local inference server and
//! rewrites model-specific tool-call markup into standard `tool_calls`.
//!
//! ## Quick Start
//!
//! ```bash
//! # LM Studio on its default port
//! callmux
//!
//! # Ollama
//! CALLMUX_BACKEND_PRESET=ollama callmux
//!
//! # explicit config file
//! callmux --config ~/callmux.toml
//! ```
//!
//! Clients then point their base URL at `http://localhost:5000/v1`.
//!
//! ## License
//!
//! Licensed under either of Apache License, Version 2.0 or MIT license at your option.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use std::env;
use std::path::PathBuf;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use callmux::config::Config;
use callmux::config::cli::ConfigCli;
use callmux::create_app;

/* --- types ----------------------------------------------------------------------------------- */

///
/// Command selected on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Serve,
    Validate,
    ConfigShow,
    ConfigExample,
    Models,
    Version,
    Help,
}

///
/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CliArgs {
    /** what to do */
    command: Command,
    /** extra config file from `--config` */
    config_file: Option<PathBuf>,
}

/* --- constants ------------------------------------------------------------------------------ */

/** the version as defined in cargo.toml */
const VERSION: &str = env!("CARGO_PKG_VERSION");

/* --- start of code -------------------------------------------------------------------------- */

#[tokio::main]
async fn main() {
    // .env values act as environment variables; a missing file is fine
    let _ = dotenvy::dotenv();

    let args: Vec<String> = env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(message) => {
            eprintln!("Error: {}", message);
            eprintln!();
            eprintln!("Run 'callmux --help' for more information.");
            std::process::exit(2);
        }
    };

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error:");
            for line in format!("{:#}", e).lines() {
                eprintln!("{}", line);
            }
            1
        }
    };
    std::process::exit(exit_code);
}

async fn run(cli: CliArgs) -> anyhow::Result<i32> {
    let config_file = cli.config_file.as_deref();
    match cli.command {
        Command::Version => println!("callmux {}", VERSION),
        Command::Help => print_help(),
        Command::ConfigExample => ConfigCli::example(),
        Command::Models => ConfigCli::models(),
        Command::ConfigShow => ConfigCli::show(config_file)?,
        Command::Validate => return Ok(if ConfigCli::validate(config_file) { 0 } else { 1 }),
        Command::Serve => serve(Config::load_unvalidated(config_file)?).await?,
    }
    Ok(0)
}

///
/// Parse arguments (without the program name).
///
/// `--config <path>` may appear anywhere; at most one command is accepted.
fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut config_file = None;
    let mut words = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--version" | "-V" => return Ok(CliArgs { command: Command::Version, config_file }),
            "--help" | "-h" => return Ok(CliArgs { command: Command::Help, config_file }),
            "--config" | "-c" => {
                let path = iter.next().ok_or_else(|| format!("{} requires a file path", arg))?;
                config_file = Some(PathBuf::from(path));
            }
            other => {
                if let Some(path) = other.strip_prefix("--config=") {
                    config_file = Some(PathBuf::from(path));
                } else if other.starts_with('-') {
                    return Err(format!("Unknown option: {}", other));
                } else {
                    words.push(other);
                }
            }
        }
    }

    let command = match words.as_slice() {
        [] | ["serve"] => Command::Serve,
        ["validate"] => Command::Validate,
        ["models"] => Command::Models,
        ["config", "show"] => Command::ConfigShow,
        ["config", "example"] => Command::ConfigExample,
        ["config"] => return Err("config requires a subcommand: show, example".to_string()),
        _ => return Err(format!("Unknown command: {}", words.join(" "))),
    };

    Ok(CliArgs { command, config_file })
}

///
/// Print help information for the callmux CLI.
fn print_help() {
    println!("callmux v{}", VERSION);
    println!("OpenAI-compatible proxy converting model-specific tool-call markup into tool_calls");
    println!();
    println!("USAGE:");
    println!("    callmux [OPTIONS] [COMMAND]");
    println!();
    println!("COMMANDS:");
    println!("    serve               Start the proxy (default)");
    println!("    validate            Validate configuration and exit");
    println!("    config show         Print the effective configuration as TOML");
    println!("    config example      Print a documented example configuration");
    println!("    models              List supported model families");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <PATH> Extra configuration file (highest file priority)");
    println!("    -h, --help          Print help information");
    println!("    -V, --version       Print version information");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("    CALLMUX_SERVER_HOST / CALLMUX_SERVER_PORT      Listen address (default: 0.0.0.0:5000)");
    println!("    CALLMUX_BACKEND_PRESET                         lmstudio, ollama, openai, anthropic");
    println!("    CALLMUX_BACKEND_PROTOCOL / _HOST / _PORT       Backend endpoint (default: http://localhost:8888)");
    println!("    CALLMUX_BACKEND_REQUEST_TIMEOUT_SECS           Non-streaming timeout (default: 300)");
    println!("    CALLMUX_BACKEND_STREAMING_TIMEOUT_SECS         Streaming idle timeout (default: none)");
    println!("    CALLMUX_CONVERSION_ENABLED                     Convert tool-call markup (default: true)");
    println!("    CALLMUX_CONVERSION_REMOVE_THINK_TAGS           Drop <think> spans (default: true)");
    println!("    CALLMUX_SERVER_LOG_LEVEL                       trace, debug, info, warn, error (default: info)");
    println!("    RUST_LOG                                       Full tracing filter, overrides the log level");
    println!();
    println!("    Unprefixed BACKEND_HOST, BACKEND_PORT, PROXY_PORT, ... are accepted as well.");
}

///
/// Initialize logging.
///
/// `RUST_LOG` wins over the configured level when set.
fn initialize_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.as_filter()));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

///
/// Start the HTTP server.
///
/// Validation runs after logging is up so its warnings are visible.
async fn serve(config: Config) -> anyhow::Result<()> {
    initialize_logging(&config);
    config.validate()?;

    let app = create_app(config.clone())?;
    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| {
        format!(
            "Failed to bind to {}\n\n\
             If the port is already in use, stop the other process or pick another port:\n\
             CALLMUX_SERVER_PORT=5001 callmux",
            addr
        )
    })?;

    log_startup_info(&config);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("callmux stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn log_startup_info(config: &Config) {
    info!("callmux v{} listening on {}", VERSION, config.listen_addr());
    info!("Proxying to backend: {}", config.backend.backend_url());
    info!(
        "Tool call conversion: {}",
        if config.conversion.enabled { "enabled" } else { "disabled" }
    );
    info!("OpenAI-compatible endpoint: http://localhost:{}/v1", config.server.port);
}

/* --- tests ----------------------------------------------------------------------------------- */
