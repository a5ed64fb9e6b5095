//! Messages exchanged with content frames
//!
//! Both directions use `{"method": <name>, "args": <payload>}` envelopes.
//! [`BridgeCall`] is what the sidebar invokes in a frame, [`BridgeEvent`] is
//! what a frame announces to the sidebar.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use margin_core::{AnchorStatus, Annotation, AnnotationData, FrameId, Tag};

use crate::error::BridgeResult;

/// A method the sidebar calls in a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args", rename_all = "camelCase")]
pub enum BridgeCall {
    /// Ask for `{uri, metadata, frameIdentifier}`
    GetDocumentInfo,
    /// Anchor these annotations in the document
    LoadAnnotations(Vec<AnnotationData>),
    /// Remove one annotation's highlights
    DeleteAnnotation(Tag),
    /// Emphasize the highlights of these annotations
    FocusAnnotations(Vec<Tag>),
    /// Scroll the document to an annotation
    ScrollToAnnotation(Tag),
    /// Number of public annotations on the page
    PublicAnnotationCountChanged(usize),
}

impl BridgeCall {
    /// Wire name of the method
    pub fn method(&self) -> &'static str {
        match self {
            BridgeCall::GetDocumentInfo => "getDocumentInfo",
            BridgeCall::LoadAnnotations(_) => "loadAnnotations",
            BridgeCall::DeleteAnnotation(_) => "deleteAnnotation",
            BridgeCall::FocusAnnotations(_) => "focusAnnotations",
            BridgeCall::ScrollToAnnotation(_) => "scrollToAnnotation",
            BridgeCall::PublicAnnotationCountChanged(_) => "publicAnnotationCountChanged",
        }
    }

    pub fn to_message(&self) -> BridgeResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Anchoring result for one annotation, as reported in a `sync` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorReport {
    pub tag: Tag,
    pub msg: AnchorMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorMessage {
    #[serde(rename = "$orphan", default)]
    pub orphan: bool,
}

impl AnchorReport {
    pub fn new(tag: impl Into<String>, orphan: bool) -> Self {
        Self {
            tag: Tag::new(tag),
            msg: AnchorMessage { orphan },
        }
    }

    pub fn status(&self) -> AnchorStatus {
        if self.msg.orphan {
            AnchorStatus::Orphan
        } else {
            AnchorStatus::Anchored
        }
    }
}

/// An event a frame emits towards the sidebar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args", rename_all = "camelCase")]
pub enum BridgeEvent {
    /// The user created an annotation or highlight in the frame
    BeforeCreateAnnotation { tag: Tag, msg: Annotation },
    /// Anchoring finished for a batch of annotations
    Sync(Vec<AnchorReport>),
    /// Select these annotations in the sidebar
    ShowAnnotations(Vec<Tag>),
    /// Hovered highlights changed
    FocusAnnotations(Vec<Tag>),
    /// Toggle these annotations in the selection
    ToggleAnnotationSelection(Vec<Tag>),
    /// The sidebar was opened from the frame
    SidebarOpened,
    /// The frame is going away
    Close,
}

impl BridgeEvent {
    pub fn from_message(message: Value) -> BridgeResult<Self> {
        Ok(serde_json::from_value(message)?)
    }
}

/// A [`BridgeEvent`] tagged with the frame that emitted it
#[derive(Debug, Clone, PartialEq)]
pub struct FrameEvent {
    pub frame_id: Option<FrameId>,
    pub event: BridgeEvent,
}
