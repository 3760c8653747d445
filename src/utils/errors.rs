// src/utils/errors.rs
//! Error types for the mock engine

use thiserror::Error;

/// Error name carried by failures of a deliberate passthrough fetch.
///
/// Errors with this name are swallowed by the interceptor instead of failing
/// the original request.
pub const NETWORK_ERROR_NAME: &str = "NetworkError";

/// Diagnostic used when a client never answers a bridge message.
pub const BRIDGE_TIMEOUT_MESSAGE: &str = "Failed to receive a timely response from the client";

/// Engine-wide error type
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Interception failed: {0}")]
    InterceptionFailed(String),

    #[error("Failed to receive a timely response from the client (after {timeout_ms}ms)")]
    BridgeTimeout { timeout_ms: u64 },

    #[error("Message port closed: {0}")]
    PortClosed(String),

    #[error("Client replied with an error: {0}")]
    ClientError(String),

    /// A network-class failure, re-raised with the name and message the
    /// failing side supplied so callers can branch on `name`.
    #[error("{name}: {message}")]
    Network { name: String, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Build a network error with the given name and message
    pub fn network(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Build a failed-passthrough error
    pub fn passthrough_failed(message: impl Into<String>) -> Self {
        Self::network(NETWORK_ERROR_NAME, message)
    }

    /// Whether this error marks a passthrough fetch that failed to reach the
    /// real network
    pub fn is_bypass_failure(&self) -> bool {
        matches!(self, Self::Network { name, .. } if name == NETWORK_ERROR_NAME)
    }

    /// Name of a network-class error, if this is one
    pub fn network_name(&self) -> Option<&str> {
        match self {
            Self::Network { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, EngineError>;
