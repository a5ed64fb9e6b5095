//! Sidebar events
//!
//! Components announce cross-cutting happenings on an [`EventBus`] as
//! [`SidebarEvent`] values. The set of events is closed, so consumers
//! match on it exhaustively instead of subscribing to string names.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::frame::FrameId;
use crate::identity::Tag;

/// Outcome of anchoring one annotation in a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorStatus {
    /// Anchored in the document
    Anchored,
    /// Could not be located in the document
    Orphan,
    /// No result arrived before the anchoring deadline
    Timeout,
}

/// Events that occur in the sidebar
#[derive(Debug, Clone, PartialEq)]
pub enum SidebarEvent {
    /// A frame reported a new, unsaved annotation
    AnnotationCreated { tag: Tag, highlight: bool },

    /// Annotations not previously held by the store were added
    AnnotationsAdded { tags: Vec<Tag> },

    /// A batch of anchoring results was written to the store
    AnchoringSynced { statuses: Vec<(Tag, AnchorStatus)> },

    /// A content frame finished connecting
    FrameConnected { frame_id: Option<FrameId> },

    /// A content frame went away
    FrameDisconnected { frame_id: Option<FrameId> },

    /// The sidebar should be shown
    OpenSidebar,

    /// The sidebar was shown
    SidebarOpened,

    /// An action needs a logged-in user
    LoginRequired,

    /// Number of buffered realtime updates changed
    PendingUpdatesChanged { count: usize },

    /// The logged-in user changed
    SessionChanged { userid: Option<String> },

    /// The realtime socket closed without being asked to
    StreamDisconnected,
}

/// Broadcast hub for [`SidebarEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SidebarEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event: SidebarEvent) {
        if self.tx.send(event).is_err() {
            trace!("Sidebar event dropped, no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SidebarEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(SidebarEvent::SidebarOpened);
        bus.publish(SidebarEvent::AnnotationsAdded {
            tags: vec![Tag::from("t1")],
        });

        assert_eq!(rx.recv().await.unwrap(), SidebarEvent::SidebarOpened);
        assert_eq!(
            rx.recv().await.unwrap(),
            SidebarEvent::AnnotationsAdded {
                tags: vec![Tag::from("t1")]
            }
        );
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(SidebarEvent::LoginRequired);
    }
}
