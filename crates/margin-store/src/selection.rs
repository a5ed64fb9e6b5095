//! Transient UI state that shapes which threads are shown and how
//!
//! Keys are annotation [`Identity`] values, which is also how threads are
//! identified (id when saved, tag otherwise).

use std::collections::{BTreeSet, HashMap, HashSet};

use margin_core::{AnnotationId, Identity, Tag};
use serde::{Deserialize, Serialize};

/// Tabs of the sidebar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabKind {
    #[default]
    Annotation,
    Note,
    Orphan,
}

impl TabKind {
    /// Sort key a tab starts with when selected
    pub fn default_sort_key(self) -> SortKey {
        match self {
            TabKind::Annotation | TabKind::Orphan => SortKey::Location,
            TabKind::Note => SortKey::Oldest,
        }
    }

    /// Sort keys offered on this tab; location is meaningless for notes
    pub fn sort_keys(self) -> &'static [SortKey] {
        match self {
            TabKind::Note => &[SortKey::Newest, SortKey::Oldest],
            TabKind::Annotation | TabKind::Orphan => {
                &[SortKey::Newest, SortKey::Oldest, SortKey::Location]
            }
        }
    }
}

/// Ordering applied to top-level threads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortKey {
    #[default]
    Location,
    Newest,
    Oldest,
}

/// Selection, expansion, filtering and hover state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    pub selected: BTreeSet<Identity>,
    pub expanded: HashMap<Identity, bool>,
    pub forced_visible: HashSet<Identity>,
    pub highlighted: HashSet<Identity>,
    /// Tags hovered in the sidebar or in a frame
    pub focused: HashSet<Tag>,
    pub selected_tab: TabKind,
    pub sort_key: SortKey,
    pub filter_query: Option<String>,
    pub focused_user: Option<String>,
    pub sidebar_opened: bool,
}

impl SelectionState {
    pub fn is_selected(&self, identity: &Identity) -> bool {
        self.selected.contains(identity)
    }

    pub fn has_selection(&self) -> bool {
        !self.selected.is_empty()
    }

    /// True when a content filter (query or user focus) is active
    pub fn has_content_filter(&self) -> bool {
        self.filter_query.as_deref().is_some_and(|q| !q.trim().is_empty())
            || self.focused_user.is_some()
    }

    /// Returns whether the selection changed
    pub(crate) fn select(&mut self, ids: &[AnnotationId]) -> bool {
        let selected: BTreeSet<Identity> = ids.iter().cloned().map(Identity::Saved).collect();
        if self.selected == selected {
            return false;
        }
        self.selected = selected;
        true
    }

    /// Returns whether the highlighted set changed
    pub(crate) fn highlight(&mut self, ids: &[AnnotationId]) -> bool {
        let highlighted: HashSet<Identity> = ids.iter().cloned().map(Identity::Saved).collect();
        if self.highlighted == highlighted {
            return false;
        }
        self.highlighted = highlighted;
        true
    }

    pub(crate) fn toggle(&mut self, ids: &[AnnotationId]) {
        for id in ids {
            let key = Identity::Saved(id.clone());
            if !self.selected.remove(&key) {
                self.selected.insert(key);
            }
        }
    }

    pub(crate) fn reset_selection(&mut self) {
        self.selected.clear();
        self.forced_visible.clear();
    }

    /// Switch tab; re-selecting the current tab keeps its sort key
    pub(crate) fn set_tab(&mut self, tab: TabKind) -> bool {
        if self.selected_tab == tab {
            return false;
        }
        self.selected_tab = tab;
        self.sort_key = tab.default_sort_key();
        true
    }

    /// Forget per-annotation state for annotations that went away
    pub(crate) fn forget(&mut self, removed: &[(Option<AnnotationId>, Option<Tag>)]) {
        for (id, tag) in removed {
            let keys = id
                .iter()
                .cloned()
                .map(Identity::Saved)
                .chain(tag.iter().cloned().map(Identity::Local));
            for key in keys {
                self.expanded.remove(&key);
                self.forced_visible.remove(&key);
                self.selected.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_defaults() {
        assert_eq!(TabKind::Note.default_sort_key(), SortKey::Oldest);
        assert_eq!(TabKind::Orphan.default_sort_key(), SortKey::Location);
        assert!(!TabKind::Note.sort_keys().contains(&SortKey::Location));
    }

    #[test]
    fn test_set_same_tab_keeps_sort_key() {
        let mut state = SelectionState {
            sort_key: SortKey::Newest,
            ..Default::default()
        };
        assert!(!state.set_tab(TabKind::Annotation));
        assert_eq!(state.sort_key, SortKey::Newest);

        assert!(state.set_tab(TabKind::Note));
        assert_eq!(state.sort_key, SortKey::Oldest);
    }

    #[test]
    fn test_toggle_selection() {
        let mut state = SelectionState::default();
        let a1 = AnnotationId::from("a1");
        state.toggle(&[a1.clone()]);
        assert!(state.is_selected(&Identity::Saved(a1.clone())));
        state.toggle(&[a1.clone()]);
        assert!(!state.has_selection());
    }

    #[test]
    fn test_reselecting_is_a_no_op() {
        let mut state = SelectionState::default();
        let ids = [AnnotationId::from("a1"), AnnotationId::from("a2")];
        assert!(state.select(&ids));
        assert!(!state.select(&ids));
        assert!(state.highlight(&ids[..1]));
        assert!(!state.highlight(&ids[..1]));
    }

    #[test]
    fn test_content_filter() {
        let mut state = SelectionState::default();
        assert!(!state.has_content_filter());
        state.filter_query = Some("   ".to_string());
        assert!(!state.has_content_filter());
        state.filter_query = Some("foo".to_string());
        assert!(state.has_content_filter());
    }
}
