//! Background task keeping frames in step with the sidebar
//!
//! Handles:
//! - Loading new annotations into the frame they belong to
//! - Retracting annotations the sidebar no longer holds
//! - Reporting the public annotation count once fetching is done
//! - Events frames send back: creation, anchoring results, selection
//! - Flagging annotations that take too long to anchor

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use margin_bridge::{AnchorReport, BridgeCall, BridgeEvent, FrameEvent, FrameRegistry};
use margin_core::metadata;
use margin_core::{AnchorStatus, Annotation, SidebarEvent, Tag};
use margin_store::{AnnotationSet, FrameList, SidebarStore, StoreState, TabKind};

use crate::config::SyncConfig;
use crate::diff::{SyncActions, diff};
use crate::error::{SyncError, SyncResult};

/// Keeps every connected frame's annotations matching the store
pub struct FrameSynchronizer {
    store: SidebarStore,
    registry: FrameRegistry,
    config: SyncConfig,
    state_rx: watch::Receiver<StoreState>,
    frame_events: broadcast::Receiver<FrameEvent>,
    sidebar_events: broadcast::Receiver<SidebarEvent>,
    /// Tags frames currently hold
    loaded_tags: HashSet<Tag>,
    /// Collections seen by the last pass
    previous: Option<(Arc<AnnotationSet>, Arc<FrameList>)>,
    previous_public: Option<usize>,
    /// Anchoring results waiting for the debounce window to close
    anchor_updates: HashMap<Tag, AnchorStatus>,
    anchor_deadline: Option<Instant>,
    anchoring_timeouts: JoinSet<()>,
}

impl FrameSynchronizer {
    /// Create a synchronizer for the frames in `registry`.
    ///
    /// Subscriptions are taken here, so nothing published between
    /// construction and [`spawn`](Self::spawn) is missed.
    pub fn new(registry: FrameRegistry, config: SyncConfig) -> Self {
        let store = registry.store().clone();
        Self {
            state_rx: store.subscribe(),
            frame_events: registry.events(),
            sidebar_events: store.events().subscribe(),
            store,
            registry,
            config,
            loaded_tags: HashSet::new(),
            previous: None,
            previous_public: None,
            anchor_updates: HashMap::new(),
            anchor_deadline: None,
            anchoring_timeouts: JoinSet::new(),
        }
    }

    /// Handle for sidebar-initiated calls into frames
    pub fn handle(&self) -> SyncHandle {
        SyncHandle {
            store: self.store.clone(),
            registry: self.registry.clone(),
        }
    }

    /// Tags currently loaded into frames
    pub fn loaded_tags(&self) -> &HashSet<Tag> {
        &self.loaded_tags
    }

    /// Spawn the synchronizer as a background task
    pub fn spawn(self, shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run(shutdown_rx).await;
        })
    }

    async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Frame synchronizer started");
        self.sync_frames().await;

        loop {
            let deadline = self.anchor_deadline;
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Frame synchronizer shutting down");
                    break;
                }
                changed = self.state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.sync_frames().await;
                }
                event = self.frame_events.recv() => match event {
                    Ok(event) => self.handle_frame_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Frame event stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                event = self.sidebar_events.recv() => match event {
                    Ok(SidebarEvent::AnnotationsAdded { tags }) => {
                        self.schedule_anchoring_timeout(tags);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Sidebar event stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = sleep_until(deadline) => {
                    self.flush_anchor_statuses();
                }
                Some(_) = self.anchoring_timeouts.join_next(), if !self.anchoring_timeouts.is_empty() => {}
            }
        }

        self.flush_anchor_statuses();
        self.anchoring_timeouts.abort_all();
    }

    /// Push the current store contents into frames.
    ///
    /// Does nothing unless the annotation collection or the frame list
    /// changed since the last pass.
    pub async fn sync_frames(&mut self) -> SyncActions {
        let state = self.store.state();
        if let Some((annotations, frames)) = &self.previous {
            if Arc::ptr_eq(annotations, &state.annotations) && Arc::ptr_eq(frames, &state.frames) {
                return SyncActions::default();
            }
        }
        self.previous = Some((state.annotations.clone(), state.frames.clone()));

        let actions = diff(
            &state.annotations,
            &state.frames,
            &self.loaded_tags,
            self.previous_public,
        );
        self.apply(&actions).await;
        actions
    }

    async fn apply(&mut self, actions: &SyncActions) {
        for load in &actions.loads {
            let call = BridgeCall::LoadAnnotations(load.annotations.clone());
            match self.registry.call(load.frame_id.as_ref(), call).await {
                Ok(_) => {
                    debug!(
                        frame = ?load.frame_id,
                        count = load.annotations.len(),
                        "Loaded annotations into frame"
                    );
                    self.loaded_tags
                        .extend(load.annotations.iter().map(|data| data.tag.clone()));
                }
                Err(e) => warn!(frame = ?load.frame_id, error = %e, "Failed to load annotations"),
            }
        }

        for tag in &actions.deletes {
            self.registry
                .call_all(BridgeCall::DeleteAnnotation(tag.clone()))
                .await;
            self.loaded_tags.remove(tag);
        }

        if let Some(count) = actions.public_count {
            self.registry
                .call_all(BridgeCall::PublicAnnotationCountChanged(count))
                .await;
            self.previous_public = Some(count);
        }
    }

    /// React to one event from a frame
    pub async fn handle_frame_event(&mut self, event: FrameEvent) {
        match event.event {
            BridgeEvent::BeforeCreateAnnotation { tag, msg } => {
                self.before_create_annotation(tag, msg).await;
            }
            BridgeEvent::Sync(reports) => self.queue_anchor_statuses(reports),
            BridgeEvent::ShowAnnotations(tags) => {
                let ids = self.store.find_ids_for_tags(&tags);
                self.store.select_annotations(&ids);
                self.store.select_tab(TabKind::Annotation);
            }
            BridgeEvent::FocusAnnotations(tags) => self.store.focus_annotations(&tags),
            BridgeEvent::ToggleAnnotationSelection(tags) => {
                let ids = self.store.find_ids_for_tags(&tags);
                self.store.toggle_selected_annotations(&ids);
            }
            BridgeEvent::SidebarOpened => {
                self.store.set_sidebar_opened(true);
                self.store.events().publish(SidebarEvent::SidebarOpened);
            }
            BridgeEvent::Close => {
                if let Err(e) = self.registry.disconnect(event.frame_id.as_ref()).await {
                    debug!(frame = ?event.frame_id, error = %e, "Close from unknown frame");
                }
            }
        }
    }

    async fn before_create_annotation(&mut self, tag: Tag, msg: Annotation) {
        let events = self.store.events();
        if !self.store.state().session.is_logged_in() {
            info!(%tag, "Annotation created while logged out, retracting");
            self.registry
                .call_all(BridgeCall::DeleteAnnotation(tag))
                .await;
            events.publish(SidebarEvent::OpenSidebar);
            events.publish(SidebarEvent::LoginRequired);
            return;
        }

        let highlight = msg.highlight;
        self.loaded_tags.insert(tag.clone());
        self.store.add_annotations(vec![Annotation {
            tag: Some(tag.clone()),
            ..msg
        }]);
        events.publish(SidebarEvent::AnnotationCreated { tag, highlight });
        if !highlight {
            events.publish(SidebarEvent::OpenSidebar);
        }
    }

    fn queue_anchor_statuses(&mut self, reports: Vec<AnchorReport>) {
        for report in reports {
            let status = report.status();
            self.loaded_tags.insert(report.tag.clone());
            self.anchor_updates.insert(report.tag, status);
        }
        self.anchor_deadline = Some(Instant::now() + self.config.anchor_status_debounce);
    }

    /// Write queued anchoring results to the store as one batch.
    ///
    /// Returns the number of statuses written.
    pub fn flush_anchor_statuses(&mut self) -> usize {
        self.anchor_deadline = None;
        if self.anchor_updates.is_empty() {
            return 0;
        }
        let updates = std::mem::take(&mut self.anchor_updates);
        self.store.update_anchor_status(&updates);

        let mut statuses: Vec<(Tag, AnchorStatus)> = updates.into_iter().collect();
        statuses.sort_by(|a, b| a.0.cmp(&b.0));
        let count = statuses.len();
        debug!(count, "Anchoring statuses synced");
        self.store
            .events()
            .publish(SidebarEvent::AnchoringSynced { statuses });
        count
    }

    /// Flag annotations still anchoring once the deadline passes.
    ///
    /// Only applies on the sidebar surface, where frames do the anchoring.
    pub fn schedule_anchoring_timeout(&mut self, tags: Vec<Tag>) {
        let state = self.store.state();
        if !state.session.is_sidebar() {
            return;
        }
        let waiting: Vec<Tag> = tags
            .into_iter()
            .filter(|tag| is_waiting(&state.annotations, tag))
            .collect();
        if waiting.is_empty() {
            return;
        }

        let store = self.store.clone();
        let timeout = self.config.anchoring_timeout;
        self.anchoring_timeouts.spawn(async move {
            tokio::time::sleep(timeout).await;
            let state = store.state();
            let timed_out: HashMap<Tag, AnchorStatus> = waiting
                .into_iter()
                .filter(|tag| is_waiting(&state.annotations, tag))
                .map(|tag| (tag, AnchorStatus::Timeout))
                .collect();
            if !timed_out.is_empty() {
                warn!(count = timed_out.len(), "Annotations timed out while anchoring");
                store.update_anchor_status(&timed_out);
            }
        });
    }
}

fn is_waiting(annotations: &AnnotationSet, tag: &Tag) -> bool {
    annotations
        .find_by_tag(tag)
        .is_some_and(|annotation| metadata::is_waiting_to_anchor(annotation))
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Sidebar-initiated calls into frames
#[derive(Clone)]
pub struct SyncHandle {
    store: SidebarStore,
    registry: FrameRegistry,
}

impl SyncHandle {
    /// Highlight the given annotations in every frame.
    ///
    /// Returns the number of frames reached.
    pub async fn focus_annotations(&self, tags: &[Tag]) -> usize {
        self.registry
            .call_all(BridgeCall::FocusAnnotations(tags.to_vec()))
            .await
    }

    /// Scroll the frame showing `annotation` to its highlight
    pub async fn scroll_to_annotation(&self, annotation: &Annotation) -> SyncResult<()> {
        let tag = annotation.tag.clone().ok_or(SyncError::Untagged)?;
        let frame_id = {
            let state = self.store.state();
            let frame = state
                .frames
                .frame_for_uri(annotation.uri.as_deref())
                .ok_or_else(|| SyncError::NoFrame(tag.clone()))?;
            frame.id.clone()
        };
        self.registry
            .call(frame_id.as_ref(), BridgeCall::ScrollToAnnotation(tag))
            .await?;
        Ok(())
    }
}
