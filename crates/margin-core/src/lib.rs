//! # Margin Core
//!
//! Core types and events for the Margin annotation sidebar engine.
//!
//! Everything else in the workspace (store, frame synchronizer, realtime
//! streamer, thread composer) speaks in terms of the types defined here.
//!
//! ## Key Types
//!
//! - [`Annotation`]: An annotation record with typed fields the engine reads
//!   and passthrough for the rest
//! - [`Identity`]: `Local(Tag)` before save, `Saved(AnnotationId)` after
//! - [`Frame`]: A connected content frame and the URIs it is searched by
//! - [`SidebarEvent`]: Closed set of cross-component events, carried by [`EventBus`]
//!
//! ## Key Modules
//!
//! - [`metadata`]: Predicates such as [`metadata::is_reply`] and
//!   [`metadata::location`]

pub mod annotation;
pub mod error;
pub mod event;
pub mod frame;
pub mod identity;
pub mod metadata;

pub use annotation::*;
pub use error::*;
pub use event::*;
pub use frame::*;
pub use identity::*;
