//! Configuration for thread windowing

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Space above the viewport still treated as on-screen
pub const DEFAULT_MARGIN_ABOVE: f64 = 800.0;

/// Space below the viewport still treated as on-screen
pub const DEFAULT_MARGIN_BELOW: f64 = 800.0;

/// Height assumed for a thread that has not been measured yet
pub const DEFAULT_THREAD_HEIGHT: f64 = 200.0;

/// Quiet period before scroll, resize and measurement changes are applied
pub const DEFAULT_WINDOW_DEBOUNCE: Duration = Duration::from_millis(20);

/// Configuration for [`WindowCalculator`](crate::WindowCalculator) and
/// [`WindowTracker`](crate::WindowTracker)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub margin_above: f64,
    pub margin_below: f64,
    pub default_height: f64,
    pub debounce: Duration,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            margin_above: DEFAULT_MARGIN_ABOVE,
            margin_below: DEFAULT_MARGIN_BELOW,
            default_height: DEFAULT_THREAD_HEIGHT,
            debounce: DEFAULT_WINDOW_DEBOUNCE,
        }
    }
}

impl WindowConfig {
    /// Set both margins
    pub fn with_margins(mut self, above: f64, below: f64) -> Self {
        self.margin_above = above;
        self.margin_below = below;
        self
    }

    pub fn with_default_height(mut self, height: f64) -> Self {
        self.default_height = height;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}
