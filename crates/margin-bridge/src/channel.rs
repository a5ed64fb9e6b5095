//! Bridge channel abstraction
//!
//! A [`BridgeChannel`] is an RPC link to one content frame. The sidebar
//! calls methods in the frame and receives their results asynchronously;
//! the frame emits events the sidebar observes through a subscription.
//!
//! ## Implementations
//!
//! - [`MockChannel`](crate::MockChannel): In-memory channel for testing
//! - Channels over a real frame transport are supplied by the host

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use margin_core::DocumentInfo;

use crate::error::{BridgeError, BridgeResult};
use crate::protocol::{BridgeCall, BridgeEvent};

/// RPC link to a single content frame
#[async_trait]
pub trait BridgeChannel: Send + Sync {
    /// Invoke a method in the frame
    ///
    /// Returns the method's result, or `None` for methods without one.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is destroyed or the call fails in
    /// the frame.
    async fn call(&self, call: BridgeCall) -> BridgeResult<Option<Value>>;

    /// Subscribe to events emitted by the frame
    fn subscribe(&self) -> broadcast::Receiver<BridgeEvent>;

    /// Tear the channel down; later calls fail
    async fn destroy(&self);

    fn is_destroyed(&self) -> bool;
}

/// Fetch and parse the frame's document info
pub async fn fetch_document_info(channel: &dyn BridgeChannel) -> BridgeResult<DocumentInfo> {
    let value = channel
        .call(BridgeCall::GetDocumentInfo)
        .await?
        .ok_or_else(|| BridgeError::InvalidResponse("getDocumentInfo returned nothing".into()))?;
    Ok(serde_json::from_value(value)?)
}
