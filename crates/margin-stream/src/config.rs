//! Streamer configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable holding the realtime endpoint
pub const WEBSOCKET_URL_ENV: &str = "MARGIN_WEBSOCKET_URL";

/// Configuration for a [`Streamer`](crate::Streamer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamerConfig {
    /// Realtime endpoint; `None` disables the streamer
    pub websocket_url: Option<String>,
    /// How long a socket may take to open
    pub connect_timeout: Duration,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            websocket_url: None,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl StreamerConfig {
    /// Read the endpoint from `MARGIN_WEBSOCKET_URL`
    pub fn from_env() -> Self {
        Self {
            websocket_url: std::env::var(WEBSOCKET_URL_ENV)
                .ok()
                .filter(|url| !url.is_empty()),
            ..Default::default()
        }
    }

    pub fn with_websocket_url(mut self, url: impl Into<String>) -> Self {
        self.websocket_url = Some(url.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
