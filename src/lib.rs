//! # callmux - tool-call markup conversion proxy
//!
//! An OpenAI-compatible proxy placed in front of a local inference server
//! (LM Studio, Ollama, vLLM, ...) whose models write tool calls as textual
//! markup (GLM, Qwen3, Qwen3-Coder, Devstral, Claude-style XML) instead of the
//! standard `tool_calls` field. Responses are rewritten on the way back, both
//! whole JSON documents and SSE streams.
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use callmux::{Config, create_app};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load()?;
//!     let app = create_app(config.clone())?;
//!
//!     let listener = tokio::net::TcpListener::bind(config.listen_addr()).await?;
//!     axum::serve(listener, app).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! The conversion engine can also be used on its own:
//!
//! ```rust
//! use callmux::converter::ConverterRegistry;
//! use serde_json::json;
//!
//! let registry = ConverterRegistry::default();
//! let mut body = json!({
//!     "model": "glm-4.5",
//!     "choices": [{"message": {"role": "assistant",
//!         "content": "<tool_call>fetch_x<arg_key>q</arg_key><arg_value>v</arg_value></tool_call>"},
//!         "finish_reason": "stop"}]
//! });
//! callmux::converter::transform_response(&registry, &mut body, None);
//! assert_eq!(body["choices"][0]["finish_reason"], "tool_calls");
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Layered configuration (TOML files, environment variables)
//! - [`converter`] - Per-family markup grammars, registry, response and stream conversion
//! - [`sse`] - SSE line framing around the streaming state machine
//! - [`server`] - HTTP handlers and forwarding
//! - [`error`] - Error types and handling

pub mod config;
pub mod converter;
pub mod error;
pub mod server;
pub mod sse;

// Re-export commonly used types
pub use config::Config;
pub use converter::{ConverterRegistry, StreamingToolCallHandler, ToolCall, ToolCallFormat};
pub use error::ProxyError;

/// Upper bound on request bodies; chat requests carry whole conversations
pub const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Creates the callmux application router for the given configuration.
///
/// Sets up the shared state (converter registry, HTTP client, metrics), the
/// routes, and the CORS and tracing middleware.
///
/// # Arguments
///
/// * `config` - Application configuration
///
/// # Errors
///
/// Returns a `ProxyError` if the HTTP client cannot be created.
pub fn create_app(config: Config) -> Result<axum::Router, ProxyError> {
    use axum::Router;
    use axum::extract::DefaultBodyLimit;
    use axum::routing::{get, post};
    use std::sync::Arc;
    use tower_http::cors::CorsLayer;
    use tower_http::trace::TraceLayer;

    let app_state = Arc::new(server::AppState::new(config)?);

    Ok(Router::new()
        .route("/v1/chat/completions", post(server::chat_completions))
        .route("/chat/completions", post(server::chat_completions))
        .route("/v1/completions", post(server::completions))
        .route("/v1/embeddings", post(server::embeddings))
        .route("/v1/models", get(server::models))
        .route("/health", get(server::health))
        .fallback(server::passthrough)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state))
}
