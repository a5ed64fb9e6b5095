//! Error types for the realtime streamer

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to the realtime service
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Invalid websocket URL: {0}")]
    InvalidUrl(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    #[error("Websocket error: {0}")]
    WebSocket(String),

    /// The socket is closed or was never opened
    #[error("Socket not connected")]
    NotConnected,

    #[error("Failed to fetch access token: {0}")]
    AccessToken(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for streamer operations
pub type StreamResult<T> = Result<T, StreamError>;
