//! Error types for thread composition and windowing

use thiserror::Error;

use margin_core::Identity;

/// Errors that can occur while composing or windowing threads
#[derive(Debug, Error)]
pub enum ThreadError {
    /// A measured height was zero, negative or not a number
    #[error("Invalid height {height} for thread {id}")]
    InvalidHeight { id: Identity, height: f64 },

    /// The window tracker has stopped
    #[error("Window tracker is not running")]
    TrackerStopped,
}

/// Result type alias for thread operations
pub type ThreadResult<T> = Result<T, ThreadError>;
