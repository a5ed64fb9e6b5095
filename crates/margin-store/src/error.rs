//! Error types for the sidebar store

use margin_core::Identity;
use thiserror::Error;

/// Errors that can occur in store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// No annotation with this identity is loaded
    #[error("Annotation not loaded: {0}")]
    AnnotationNotLoaded(Identity),

    /// No frame with this id is connected
    #[error("Frame not connected: {0}")]
    FrameNotConnected(String),
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use margin_core::Tag;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::AnnotationNotLoaded(Identity::Local(Tag::from("t1")));
        assert!(format!("{}", err).contains("local:t1"));

        let err = StoreError::FrameNotConnected("main".to_string());
        assert!(format!("{}", err).contains("main"));
    }
}
