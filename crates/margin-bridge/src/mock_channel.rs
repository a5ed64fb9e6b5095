//! Mock bridge channel for testing
//!
//! Records every call it receives and lets tests emit frame events,
//! without a real content frame on the other side.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use margin_bridge::{BridgeCall, BridgeEvent, MockChannel};
//!
//! let channel = Arc::new(MockChannel::for_uri("http://example.com", None));
//! registry.connect(channel.clone()).await?;
//!
//! channel.emit(BridgeEvent::SidebarOpened);
//! assert_eq!(channel.calls_to("loadAnnotations").len(), 1);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;

use margin_core::{DocumentInfo, DocumentMetadata, FrameId};

use crate::channel::BridgeChannel;
use crate::error::{BridgeError, BridgeResult};
use crate::protocol::{BridgeCall, BridgeEvent};

/// An in-memory bridge channel
pub struct MockChannel {
    /// Reply to `getDocumentInfo`; `None` makes the call fail
    document_info: Option<DocumentInfo>,
    /// Calls received, in order
    calls: Mutex<Vec<BridgeCall>>,
    /// Methods that should fail, with the failure reason
    failing: DashMap<&'static str, String>,
    events_tx: broadcast::Sender<BridgeEvent>,
    destroyed: AtomicBool,
}

impl MockChannel {
    pub fn new(document_info: DocumentInfo) -> Self {
        Self::with_document_info(Some(document_info))
    }

    /// Channel to a frame showing `uri`
    pub fn for_uri(uri: &str, frame_id: Option<&str>) -> Self {
        Self::new(DocumentInfo {
            uri: uri.to_string(),
            metadata: DocumentMetadata::default(),
            frame_identifier: frame_id.map(FrameId::from),
        })
    }

    /// Channel whose `getDocumentInfo` call fails
    pub fn failing() -> Self {
        Self::with_document_info(None)
    }

    fn with_document_info(document_info: Option<DocumentInfo>) -> Self {
        let (events_tx, _) = broadcast::channel(64);
        Self {
            document_info,
            calls: Mutex::new(Vec::new()),
            failing: DashMap::new(),
            events_tx,
            destroyed: AtomicBool::new(false),
        }
    }

    /// Make calls to `method` fail from now on
    pub fn fail_method(&self, method: &'static str, reason: impl Into<String>) {
        self.failing.insert(method, reason.into());
    }

    /// Emit an event as if the frame sent it. Returns the number of receivers.
    pub fn emit(&self, event: BridgeEvent) -> usize {
        self.events_tx.send(event).unwrap_or(0)
    }

    pub fn calls(&self) -> Vec<BridgeCall> {
        self.calls.lock().clone()
    }

    /// Calls to one method, by wire name
    pub fn calls_to(&self, method: &str) -> Vec<BridgeCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.method() == method)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl BridgeChannel for MockChannel {
    async fn call(&self, call: BridgeCall) -> BridgeResult<Option<Value>> {
        if self.is_destroyed() {
            return Err(BridgeError::ChannelDestroyed);
        }
        let method = call.method();
        let is_info = matches!(call, BridgeCall::GetDocumentInfo);
        self.calls.lock().push(call);

        if let Some(reason) = self.failing.get(&method) {
            return Err(BridgeError::CallFailed {
                method,
                reason: reason.value().clone(),
            });
        }

        if is_info {
            let info = self.document_info.as_ref().ok_or(BridgeError::CallFailed {
                method,
                reason: "frame did not answer".to_string(),
            })?;
            return Ok(Some(serde_json::to_value(info)?));
        }
        Ok(None)
    }

    fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events_tx.subscribe()
    }

    async fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}
