//! # Margin Store
//!
//! The single source of truth for the sidebar: loaded annotations, connected
//! frames, selection and filter state, the session, and realtime updates
//! that have been received but not applied.
//!
//! ## Key Components
//!
//! - [`SidebarStore`]: Cloneable handle; every mutation publishes a new
//!   [`StoreState`] snapshot on a `watch` channel
//! - [`AnnotationSet`]: Annotations indexed by both id and tag
//! - [`PendingUpdates`]: At most one buffered notification per identity
//! - [`SelectionState`], [`SessionState`], [`FrameList`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use margin_core::Annotation;
//! use margin_store::SidebarStore;
//!
//! let store = SidebarStore::default();
//! let tag = store.create_annotation(Annotation::default());
//! assert!(store.state().annotations.find_by_tag(&tag).is_some());
//! ```

pub mod annotations;
pub mod config;
pub mod error;
pub mod frames;
pub mod realtime;
pub mod selection;
pub mod session;
pub mod store;

pub use annotations::{AddOutcome, AnnotationSet};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use frames::FrameList;
pub use realtime::{AppliedUpdates, PendingUpdate, PendingUpdates, RealtimeBatch};
pub use selection::{SelectionState, SortKey, TabKind};
pub use session::{Profile, SessionState, Surface};
pub use store::{SidebarStore, StoreState};
