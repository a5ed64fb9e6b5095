//! Configuration for the sidebar store

use serde::{Deserialize, Serialize};

use crate::session::Surface;

/// Configuration for a [`SidebarStore`](crate::SidebarStore)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Sidebar event broadcast channel capacity
    pub event_channel_capacity: usize,
    /// Surface the engine starts on
    pub surface: Surface,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: 256,
            surface: Surface::Sidebar,
        }
    }
}

impl StoreConfig {
    /// Set the event channel capacity
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// Set the initial surface
    pub fn with_surface(mut self, surface: Surface) -> Self {
        self.surface = surface;
        self
    }
}
