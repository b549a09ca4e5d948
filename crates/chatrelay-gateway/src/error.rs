//! Gateway error types.

use thiserror::Error;

/// Errors that can occur in the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] chatrelay_core::ConfigError),

    /// Writing to or reading from the connection failed.
    #[error("WebSocket error: {0}")]
    Transport(String),

    /// The connection writer has already shut down.
    #[error("Connection closed")]
    Closed,

    /// The process is shutting down.
    #[error("Gateway shutting down")]
    Cancelled,
}
