//!
//! Error handling for the tool-call conversion proxy.
//!
//! Defines the error types used by configuration loading and by the HTTP
//! forwarding layer. The conversion engine itself never fails: malformed
//! markup degrades to passthrough instead of producing an error.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use thiserror::Error;

/* --- types ----------------------------------------------------------------------------------- */

///
/// Application error types.
///
/// Covers configuration problems and failures talking to the backend.
/// Uses thiserror for automatic Display and Error trait implementations.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Upstream timed out after {0} second(s)")]
    Timeout(u64),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
}

/* --- start of code -------------------------------------------------------------------------- */

/// Result type alias for cleaner error handling throughout the application
pub type Result<T> = std::result::Result<T, ProxyError>;

impl ProxyError {
    /// True when the error means the backend did not answer in time
    pub fn is_timeout(&self) -> bool {
        match self {
            ProxyError::Timeout(_) => true,
            ProxyError::Request(e) => e.is_timeout(),
            _ => false,
        }
    }
}
