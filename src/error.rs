//! Roomsync error types

use thiserror::Error;

/// Roomsync error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Endpoint connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Backend API error (non-ok response from the platform)
    #[error("API error: {0}")]
    Api(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Result type alias for roomsync operations
pub type Result<T> = std::result::Result<T, Error>;
