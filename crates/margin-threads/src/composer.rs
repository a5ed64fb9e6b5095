//! Building the thread tree from store snapshots
//!
//! [`ThreadComposer`] turns a [`StoreState`] into [`BuildThreadOptions`] and
//! caches the result. The cache key is the identity of the annotation,
//! selection and session `Arc`s, so asking again after an unrelated store
//! change hands back the same tree.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use margin_store::{AnnotationSet, SelectionState, SessionState, SortKey, StoreState};

use crate::build::{BuildThreadOptions, build_thread};
use crate::filters::{ContentFilter, tab_filter};
use crate::sorters::sorter;
use crate::thread::Thread;

struct Cached {
    annotations: Arc<AnnotationSet>,
    selection: Arc<SelectionState>,
    session: Arc<SessionState>,
    thread: Arc<Thread>,
}

impl Cached {
    fn matches(&self, state: &StoreState) -> bool {
        Arc::ptr_eq(&self.annotations, &state.annotations)
            && Arc::ptr_eq(&self.selection, &state.selection)
            && Arc::ptr_eq(&self.session, &state.session)
    }
}

/// Memoizing thread builder
#[derive(Default)]
pub struct ThreadComposer {
    cache: Mutex<Option<Cached>>,
}

impl ThreadComposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root thread for `state`, rebuilt only when its inputs changed
    pub fn compose(&self, state: &StoreState) -> Arc<Thread> {
        let mut cache = self.cache.lock();
        if let Some(cached) = cache.as_ref().filter(|cached| cached.matches(state)) {
            return Arc::clone(&cached.thread);
        }

        let options = build_options(&state.selection, &state.session);
        let thread = Arc::new(build_thread(state.annotations.as_slice(), &options));
        debug!(
            annotations = state.annotations.len(),
            top_level = thread.children.len(),
            "Threads rebuilt"
        );

        *cache = Some(Cached {
            annotations: Arc::clone(&state.annotations),
            selection: Arc::clone(&state.selection),
            session: Arc::clone(&state.session),
            thread: Arc::clone(&thread),
        });
        thread
    }
}

/// Options derived from the selection and session.
///
/// Tabs only apply on the sidebar, and only while no content filter is
/// active. Replies are always shown oldest first.
pub fn build_options(selection: &SelectionState, session: &SessionState) -> BuildThreadOptions {
    let content_filter = ContentFilter::new(
        selection.filter_query.as_deref(),
        selection.focused_user.as_deref(),
    );

    let mut options = BuildThreadOptions::new(sorter(selection.sort_key))
        .with_reply_compare(sorter(SortKey::Oldest))
        .with_expanded(selection.expanded.clone())
        .with_force_visible(selection.forced_visible.clone())
        .with_selected(selection.selected.clone())
        .with_highlighted(selection.highlighted.clone());

    match content_filter {
        Some(filter) => options = options.with_filter(filter.into_filter()),
        None if session.is_sidebar() => {
            options = options.with_thread_filter(tab_filter(selection.selected_tab));
        }
        None => {}
    }
    options
}
