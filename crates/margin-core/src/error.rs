//! Error types shared across Margin crates

use thiserror::Error;

/// Errors from the annotation model
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid annotation payload: {0}")]
    InvalidPayload(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for model operations
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_display() {
        let err = CoreError::InvalidPayload("missing target".to_string());
        assert!(format!("{}", err).contains("missing target"));
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: CoreError = json_err.into();
        assert!(format!("{}", err).contains("Serialization error"));
    }
}
