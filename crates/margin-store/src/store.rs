//! The shared sidebar store
//!
//! [`SidebarStore`] is a cheap, cloneable handle. Each mutation builds a new
//! [`StoreState`] snapshot and publishes it on a `watch` channel. Only the
//! sub-collections a mutation touches get a new `Arc`, so readers can tell
//! what changed by pointer comparison.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info};

use margin_core::metadata;
use margin_core::{
    AnchorStatus, Annotation, AnnotationId, EventBus, Frame, FrameId, Identity, SidebarEvent, Tag,
};

use crate::annotations::{AddOutcome, AnnotationSet};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::frames::FrameList;
use crate::realtime::{AppliedUpdates, PendingUpdates, RealtimeBatch};
use crate::selection::{SelectionState, SortKey, TabKind};
use crate::session::{Profile, SessionState, Surface};

/// An immutable snapshot of everything the sidebar knows
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    pub annotations: Arc<AnnotationSet>,
    pub frames: Arc<FrameList>,
    pub selection: Arc<SelectionState>,
    pub session: Arc<SessionState>,
    pub realtime: Arc<PendingUpdates>,
}

impl StoreState {
    /// True when both snapshots share every sub-collection
    pub fn ptr_eq(&self, other: &StoreState) -> bool {
        Arc::ptr_eq(&self.annotations, &other.annotations)
            && Arc::ptr_eq(&self.frames, &other.frames)
            && Arc::ptr_eq(&self.selection, &other.selection)
            && Arc::ptr_eq(&self.session, &other.session)
            && Arc::ptr_eq(&self.realtime, &other.realtime)
    }
}

struct StoreInner {
    /// Serializes writers; readers go through the watch channel
    write_lock: Mutex<()>,
    state_tx: watch::Sender<StoreState>,
    events: EventBus,
}

/// Handle to the shared sidebar state
#[derive(Clone)]
pub struct SidebarStore {
    inner: Arc<StoreInner>,
}

impl Default for SidebarStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl SidebarStore {
    pub fn new(config: StoreConfig) -> Self {
        let state = StoreState {
            session: Arc::new(SessionState {
                surface: config.surface,
                ..Default::default()
            }),
            ..Default::default()
        };
        let (state_tx, _) = watch::channel(state);
        Self {
            inner: Arc::new(StoreInner {
                write_lock: Mutex::new(()),
                state_tx,
                events: EventBus::new(config.event_channel_capacity),
            }),
        }
    }

    /// Current snapshot
    pub fn state(&self) -> StoreState {
        self.inner.state_tx.borrow().clone()
    }

    /// Receiver notified whenever a mutation changes the state
    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.inner.state_tx.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Run `f` against a working copy and publish it if anything changed
    fn mutate<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let _guard = self.inner.write_lock.lock();
        let before = self.state();
        let mut next = before.clone();
        let result = f(&mut next);
        if !next.ptr_eq(&before) {
            self.inner.state_tx.send_replace(next);
        }
        result
    }

    // ----- Annotations -----

    /// Merge annotations into the store by identity.
    ///
    /// Pending realtime updates are discarded if any incoming annotation is
    /// referenced by one, since the incoming data is at least as fresh.
    pub fn add_annotations(&self, annotations: Vec<Annotation>) -> AddOutcome {
        if annotations.is_empty() {
            return AddOutcome::default();
        }
        let (outcome, pending_cleared) = self.mutate(|state| {
            let conflict = annotations.iter().any(|a| state.realtime.references(a));
            let cleared = conflict && Self::clear_pending_in(state);
            (Self::add_in(state, annotations), cleared)
        });
        self.after_add(&outcome);
        if pending_cleared {
            self.publish_pending_count();
        }
        outcome
    }

    /// Add a locally created annotation, returning its tag
    pub fn create_annotation(&self, mut annotation: Annotation) -> Tag {
        let (tag, outcome) = self.mutate(|state| {
            let annotations = Arc::make_mut(&mut state.annotations);
            let tag = annotation
                .tag
                .get_or_insert_with(|| annotations.allocate_tag())
                .clone();
            (tag, Self::add_in(state, vec![annotation]))
        });
        self.after_add(&outcome);
        tag
    }

    /// Remove annotations by id or tag. Returns how many were removed.
    pub fn remove_annotations(&self, identities: &[Identity]) -> usize {
        if identities.is_empty() {
            return 0;
        }
        let (removed, pending_cleared) = self.mutate(|state| {
            let conflict = identities.iter().any(|identity| {
                state.realtime.get(identity).is_some()
                    || state
                        .annotations
                        .get(identity)
                        .is_some_and(|a| state.realtime.references(a))
            });
            let cleared = conflict && Self::clear_pending_in(state);
            (Self::remove_in(state, identities), cleared)
        });
        if pending_cleared {
            self.publish_pending_count();
        }
        debug!(count = removed, "Removed annotations");
        removed
    }

    /// Drop every annotation along with highlight and hover state
    pub fn clear_annotations(&self) {
        self.mutate(|state| {
            if !state.annotations.is_empty() {
                Arc::make_mut(&mut state.annotations).clear();
            }
            if !state.selection.highlighted.is_empty() || !state.selection.focused.is_empty() {
                let selection = Arc::make_mut(&mut state.selection);
                selection.highlighted.clear();
                selection.focused.clear();
            }
        });
    }

    /// Record anchoring results keyed by tag
    pub fn update_anchor_status(&self, statuses: &HashMap<Tag, AnchorStatus>) {
        if statuses.is_empty() {
            return;
        }
        self.mutate(|state| {
            let mut annotations = AnnotationSet::clone(&state.annotations);
            if annotations.update_anchor_status(statuses) {
                state.annotations = Arc::new(annotations);
            }
        });
    }

    pub fn find_ids_for_tags(&self, tags: &[Tag]) -> Vec<AnnotationId> {
        self.state().annotations.find_ids_for_tags(tags)
    }

    pub fn annotation_exists(&self, id: &AnnotationId) -> bool {
        self.state().annotations.contains_id(id)
    }

    pub fn find_annotation(&self, identity: &Identity) -> StoreResult<Arc<Annotation>> {
        self.state()
            .annotations
            .get(identity)
            .cloned()
            .ok_or_else(|| StoreError::AnnotationNotLoaded(identity.clone()))
    }

    // ----- Frames -----

    /// Register a frame, replacing one with the same id
    pub fn connect_frame(&self, frame: Frame) {
        let frame_id = frame.id.clone();
        self.mutate(|state| Arc::make_mut(&mut state.frames).connect(frame));
        info!(frame_id = ?frame_id, "Frame connected");
        self.inner
            .events
            .publish(SidebarEvent::FrameConnected { frame_id });
    }

    pub fn destroy_frame(&self, id: Option<&FrameId>) -> StoreResult<Frame> {
        let destroyed = self.mutate(|state| {
            state.frames.get(id)?;
            Arc::make_mut(&mut state.frames).destroy(id)
        });
        let frame = destroyed.ok_or_else(|| {
            StoreError::FrameNotConnected(id.map_or_else(|| "main".to_string(), |f| f.to_string()))
        })?;
        info!(frame_id = ?frame.id, "Frame destroyed");
        self.inner.events.publish(SidebarEvent::FrameDisconnected {
            frame_id: frame.id.clone(),
        });
        Ok(frame)
    }

    pub fn update_frame_annotation_fetch_status(&self, uri: &str, complete: bool) {
        self.mutate(|state| {
            let mut frames = FrameList::clone(&state.frames);
            if frames.update_fetch_status(uri, complete) {
                state.frames = Arc::new(frames);
            }
        });
    }

    // ----- Selection -----

    /// Replace the selection with the given annotations
    pub fn select_annotations(&self, ids: &[AnnotationId]) {
        self.update_selection(|s| s.select(ids));
    }

    pub fn toggle_selected_annotations(&self, ids: &[AnnotationId]) {
        if ids.is_empty() {
            return;
        }
        self.mutate(|state| Arc::make_mut(&mut state.selection).toggle(ids));
    }

    /// Clear selection and forced visibility
    pub fn clear_selection(&self) {
        self.update_selection(|s| {
            if s.selected.is_empty() && s.forced_visible.is_empty() {
                return false;
            }
            s.reset_selection();
            true
        });
    }

    pub fn set_expanded(&self, identity: Identity, expanded: bool) {
        self.update_selection(|s| s.expanded.insert(identity, expanded) != Some(expanded));
    }

    pub fn set_forced_visible(&self, identity: Identity, visible: bool) {
        self.update_selection(|s| {
            if visible {
                s.forced_visible.insert(identity)
            } else {
                s.forced_visible.remove(&identity)
            }
        });
    }

    /// Replace the set of highlighted annotations
    pub fn highlight_annotations(&self, ids: &[AnnotationId]) {
        self.update_selection(|s| s.highlight(ids));
    }

    /// Replace the set of hovered annotations
    pub fn focus_annotations(&self, tags: &[Tag]) {
        self.update_selection(|s| {
            let focused = tags.iter().cloned().collect();
            if s.focused == focused {
                return false;
            }
            s.focused = focused;
            true
        });
    }

    pub fn select_tab(&self, tab: TabKind) {
        self.update_selection(|s| s.set_tab(tab));
    }

    pub fn set_sort_key(&self, key: SortKey) {
        self.update_selection(|s| std::mem::replace(&mut s.sort_key, key) != key);
    }

    /// Set the search query; selection and expansion start over
    pub fn set_filter_query(&self, query: Option<String>) {
        self.update_selection(|s| {
            if s.filter_query == query {
                return false;
            }
            s.filter_query = query;
            s.reset_selection();
            s.expanded.clear();
            true
        });
    }

    /// Show only annotations by one user
    pub fn set_focused_user(&self, user: Option<String>) {
        self.update_selection(|s| {
            if s.focused_user == user {
                return false;
            }
            s.focused_user = user;
            s.reset_selection();
            true
        });
    }

    pub fn set_sidebar_opened(&self, opened: bool) {
        self.update_selection(|s| std::mem::replace(&mut s.sidebar_opened, opened) != opened);
    }

    fn update_selection(&self, f: impl FnOnce(&mut SelectionState) -> bool) {
        self.mutate(|state| {
            let mut selection = SelectionState::clone(&state.selection);
            if f(&mut selection) {
                state.selection = Arc::new(selection);
            }
        });
    }

    // ----- Session -----

    pub fn update_profile(&self, profile: Profile) {
        let changed_user = self.mutate(|state| {
            if state.session.profile == profile {
                return None;
            }
            let session = Arc::make_mut(&mut state.session);
            let user_changed = session.profile.userid != profile.userid;
            session.profile = profile;
            user_changed.then(|| session.profile.userid.clone())
        });
        if let Some(userid) = changed_user {
            info!(userid = ?userid, "Session user changed");
            self.inner
                .events
                .publish(SidebarEvent::SessionChanged { userid });
        }
    }

    /// Focus a different group.
    ///
    /// Pending realtime updates belong to the old group and are dropped. On
    /// the sidebar the loaded annotations are dropped too, ready for the new
    /// group's annotations to be fetched.
    pub fn focus_group(&self, group: Option<String>) {
        let changed = self.mutate(|state| {
            if state.session.focused_group == group {
                return false;
            }
            Arc::make_mut(&mut state.session).focused_group = group.clone();
            Self::clear_pending_in(state);
            if state.session.is_sidebar() && !state.annotations.is_empty() {
                Arc::make_mut(&mut state.annotations).clear();
            }
            true
        });
        if changed {
            info!(group = ?group, "Focused group changed");
            self.publish_pending_count();
        }
    }

    pub fn set_surface(&self, surface: Surface) {
        self.mutate(|state| {
            if state.session.surface != surface {
                Arc::make_mut(&mut state.session).surface = surface;
            }
        });
    }

    // ----- Realtime updates -----

    /// Buffer notifications from the push channel.
    ///
    /// On the sidebar, upserts outside the focused group are dropped. A
    /// deletion is buffered only if the annotation is loaded.
    pub fn receive_realtime_updates(&self, batch: RealtimeBatch) {
        if batch.is_empty() {
            return;
        }
        let count = self.mutate(|state| {
            let mut pending = PendingUpdates::clone(&state.realtime);
            let sidebar = state.session.is_sidebar();

            for annotation in batch.updated {
                let Some(identity) = annotation.identity() else {
                    continue;
                };
                if sidebar && annotation.group != state.session.focused_group {
                    debug!(%identity, group = ?annotation.group, "Dropping update outside focused group");
                    continue;
                }
                pending.upsert(identity, annotation);
            }
            for identity in batch.deleted {
                let loaded = state.annotations.get(&identity).is_some();
                pending.delete(identity, loaded);
            }

            let count = pending.len();
            if pending != *state.realtime {
                state.realtime = Arc::new(pending);
            }
            count
        });
        debug!(count, "Pending realtime updates");
        self.inner
            .events
            .publish(SidebarEvent::PendingUpdatesChanged { count });
    }

    pub fn pending_updates(&self) -> Arc<PendingUpdates> {
        self.state().realtime
    }

    pub fn pending_count(&self) -> usize {
        self.state().realtime.len()
    }

    /// Load buffered upserts and unload buffered deletions in one batch
    pub fn apply_pending_updates(&self) -> AppliedUpdates {
        let (applied, outcome) = self.mutate(|state| {
            let upserts = state.realtime.upserts();
            let deletions = state.realtime.deletions();
            if upserts.is_empty() && deletions.is_empty() {
                return (AppliedUpdates::default(), AddOutcome::default());
            }
            Arc::make_mut(&mut state.realtime).clear();

            let applied = AppliedUpdates {
                upserted: upserts.len(),
                deleted: deletions.len(),
            };
            let outcome = Self::add_in(state, upserts);
            Self::remove_in(state, &deletions);
            (applied, outcome)
        });
        if applied != AppliedUpdates::default() {
            info!(upserted = applied.upserted, deleted = applied.deleted, "Applied pending updates");
            self.after_add(&outcome);
            self.publish_pending_count();
        }
        applied
    }

    /// Discard buffered updates without applying them
    pub fn clear_pending_updates(&self) {
        if self.mutate(Self::clear_pending_in) {
            self.publish_pending_count();
        }
    }

    // ----- Helpers operating on a working copy -----

    fn add_in(state: &mut StoreState, annotations: Vec<Annotation>) -> AddOutcome {
        let previous_count = state.annotations.len();
        let top_level: Vec<bool> = annotations
            .iter()
            .filter(|a| !metadata::is_reply(a))
            .map(metadata::is_page_note)
            .collect();

        let outcome = Arc::make_mut(&mut state.annotations).add(annotations);

        // First load made only of page notes: show the notes tab.
        if previous_count == 0 && !top_level.is_empty() && top_level.iter().all(|is_note| *is_note) {
            let mut selection = SelectionState::clone(&state.selection);
            if selection.set_tab(TabKind::Note) {
                state.selection = Arc::new(selection);
            }
        }
        outcome
    }

    fn remove_in(state: &mut StoreState, identities: &[Identity]) -> usize {
        if !identities.iter().any(|i| state.annotations.get(i).is_some()) {
            return 0;
        }
        let removed = Arc::make_mut(&mut state.annotations).remove(identities);
        if removed.is_empty() {
            return 0;
        }

        let keys: Vec<_> = removed.iter().map(|a| (a.id.clone(), a.tag.clone())).collect();
        let mut selection = SelectionState::clone(&state.selection);
        selection.forget(&keys);
        if selection.selected_tab == TabKind::Orphan
            && !state.annotations.iter().any(|a| metadata::is_orphan(a))
        {
            selection.set_tab(TabKind::Annotation);
        }
        if selection != *state.selection {
            state.selection = Arc::new(selection);
        }
        removed.len()
    }

    fn clear_pending_in(state: &mut StoreState) -> bool {
        if state.realtime.is_empty() {
            return false;
        }
        Arc::make_mut(&mut state.realtime).clear();
        true
    }

    fn after_add(&self, outcome: &AddOutcome) {
        if !outcome.added.is_empty() {
            debug!(count = outcome.added.len(), "Annotations added");
            self.inner.events.publish(SidebarEvent::AnnotationsAdded {
                tags: outcome.added.clone(),
            });
        }
    }

    fn publish_pending_count(&self) {
        let count = self.pending_count();
        self.inner
            .events
            .publish(SidebarEvent::PendingUpdatesChanged { count });
    }
}
