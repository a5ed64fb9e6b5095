//! Configuration for the frame synchronizer

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default time an annotation may take to anchor before it is flagged
pub const DEFAULT_ANCHORING_TIMEOUT: Duration = Duration::from_millis(500);

/// Default window over which anchoring results are batched into one write
pub const DEFAULT_ANCHOR_STATUS_DEBOUNCE: Duration = Duration::from_millis(10);

/// Configuration for a [`FrameSynchronizer`](crate::FrameSynchronizer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Deadline after which a still-anchoring annotation is marked timed out
    pub anchoring_timeout: Duration,
    /// Debounce window for anchoring status writes
    pub anchor_status_debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            anchoring_timeout: DEFAULT_ANCHORING_TIMEOUT,
            anchor_status_debounce: DEFAULT_ANCHOR_STATUS_DEBOUNCE,
        }
    }
}

impl SyncConfig {
    /// Set the anchoring timeout
    pub fn with_anchoring_timeout(mut self, timeout: Duration) -> Self {
        self.anchoring_timeout = timeout;
        self
    }

    /// Set the anchoring status debounce window
    pub fn with_anchor_status_debounce(mut self, debounce: Duration) -> Self {
        self.anchor_status_debounce = debounce;
        self
    }
}
