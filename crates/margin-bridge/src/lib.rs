//! # Margin Bridge
//!
//! RPC channels between the sidebar and the content frames it annotates,
//! and the registry of frames currently connected.
//!
//! ## Key Components
//!
//! - [`BridgeChannel`]: Call methods in a frame, subscribe to its events
//! - [`BridgeCall`] / [`BridgeEvent`]: The closed set of methods and events,
//!   serialized as `{"method", "args"}` envelopes
//! - [`FrameRegistry`]: Connects frames after `getDocumentInfo`, merges
//!   their events into one [`FrameEvent`] stream
//! - [`MockChannel`]: In-memory channel for tests

pub mod channel;
pub mod error;
pub mod mock_channel;
pub mod protocol;
pub mod registry;

pub use channel::{BridgeChannel, fetch_document_info};
pub use error::{BridgeError, BridgeResult};
pub use mock_channel::MockChannel;
pub use protocol::{AnchorMessage, AnchorReport, BridgeCall, BridgeEvent, FrameEvent};
pub use registry::{FrameDiscovery, FrameRegistry};
