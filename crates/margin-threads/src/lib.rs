//! # Margin Threads
//!
//! Turns the flat annotation collection into the conversation tree the
//! sidebar displays, and decides which part of it is worth rendering.
//!
//! ## Key Components
//!
//! - [`build_thread`]: Pure tree construction with filtering, visibility,
//!   collapse state, sorting and counts
//! - [`ThreadComposer`]: Builds options from a store snapshot and memoizes
//!   the tree on the identity of its inputs
//! - [`sorters`] and [`filters`]: Sort keys, search queries and tabs
//! - [`WindowCalculator`]: Which top-level threads are near the viewport
//! - [`WindowTracker`]: Debounced background recalculation
//!
//! ## Example
//!
//! ```rust,ignore
//! let composer = ThreadComposer::new();
//! let root = composer.compose(&store.state());
//!
//! let (tracker, window) = WindowTracker::new(WindowConfig::default(), root, 900.0);
//! let task = tracker.spawn(shutdown_rx);
//! window.scroll_to(1200.0)?;
//! ```

pub mod build;
pub mod composer;
pub mod config;
pub mod error;
pub mod filters;
pub mod sorters;
pub mod thread;
pub mod window;
pub mod window_tracker;

pub use build::{AnnotationFilter, BuildThreadOptions, ThreadComparator, ThreadFilter, build_thread};
pub use composer::{ThreadComposer, build_options};
pub use config::WindowConfig;
pub use error::{ThreadError, ThreadResult};
pub use filters::{ContentFilter, matches_tab, tab_filter};
pub use sorters::{compare_threads, sorter};
pub use thread::Thread;
pub use window::{ThreadWindow, WindowCalculator};
pub use window_tracker::{WindowHandle, WindowInput, WindowTracker};
