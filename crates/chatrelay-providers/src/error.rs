//! Error types for upstream providers.

use thiserror::Error;

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Failures talking to the upstream completion API.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Upstream rejected the API key (HTTP 401).
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Upstream rate limit exceeded.
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// Upstream refused the request body (HTTP 400).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Any other non-success status.
    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// Transport failure before a status was received.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The stream broke before it finished normally.
    #[error("Stream error: {0}")]
    Stream(String),

    /// Client could not be built from the configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Map an HTTP failure status and upstream message to an error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Self::Authentication(message),
            429 => Self::RateLimit(message),
            400 => Self::InvalidRequest(message),
            _ => Self::ServerError { status, message },
        }
    }

    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
