//! # Margin Sync
//!
//! Keeps the annotations shown in content frames in step with the sidebar
//! store, and turns frame events into store updates.
//!
//! ## Key Components
//!
//! - [`FrameSynchronizer`]: Background task diffing the store against what
//!   frames hold, and handling events frames send back
//! - [`diff`]: Pure computation of the calls one pass needs
//! - [`SyncHandle`]: Sidebar-initiated focus and scroll requests
//!
//! ## Example
//!
//! ```rust,ignore
//! let registry = FrameRegistry::new(store.clone(), 256);
//! let sync = FrameSynchronizer::new(registry.clone(), SyncConfig::default());
//! let handle = sync.handle();
//! let task = sync.spawn(shutdown_rx);
//!
//! handle.focus_annotations(&[tag]).await;
//! ```

pub mod config;
pub mod diff;
pub mod error;
pub mod synchronizer;

pub use config::SyncConfig;
pub use diff::{FrameLoad, SyncActions, diff};
pub use error::{SyncError, SyncResult};
pub use synchronizer::{FrameSynchronizer, SyncHandle};
