//! Error types for frame synchronization

use thiserror::Error;

use margin_bridge::BridgeError;
use margin_core::Tag;

/// Errors that can occur while synchronizing frames
#[derive(Debug, Error)]
pub enum SyncError {
    /// Annotation has no tag and cannot be addressed in a frame
    #[error("Annotation has no tag")]
    Untagged,

    /// No frame is connected to receive the call
    #[error("No frame for annotation {0}")]
    NoFrame(Tag),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

/// Result type alias for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
