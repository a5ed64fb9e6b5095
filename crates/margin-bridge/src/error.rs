//! Error types for bridge channels and the frame registry

use thiserror::Error;

/// Errors that can occur talking to content frames
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Channel destroyed")]
    ChannelDestroyed,

    #[error("Call to {method} failed: {reason}")]
    CallFailed {
        method: &'static str,
        reason: String,
    },

    #[error("Frame not connected: {0}")]
    FrameNotConnected(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_error_display() {
        assert!(format!("{}", BridgeError::ChannelDestroyed).contains("destroyed"));

        let err = BridgeError::CallFailed {
            method: "getDocumentInfo",
            reason: "timeout".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("getDocumentInfo"));
        assert!(msg.contains("timeout"));

        let err = BridgeError::FrameNotConnected("f1".to_string());
        assert!(format!("{}", err).contains("f1"));

        let err = BridgeError::InvalidResponse("expected object".to_string());
        assert!(format!("{}", err).contains("expected object"));
    }
}
