//! Threading a flat annotation list into a tree
//!
//! Parent links come from each annotation's `references`, whose last entry
//! is the immediate parent. Links are first made between indices in an
//! arena of nodes, and the owned [`Thread`] tree is only materialised once
//! every link is known. A reply whose parent is missing gets a placeholder
//! parent, which is itself linked to the remaining ancestors. A link that
//! would close a cycle is never made.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use tracing::trace;

use margin_core::{Annotation, AnnotationId, Identity};

use crate::thread::Thread;

/// Orders two sibling threads
pub type ThreadComparator = Box<dyn Fn(&Thread, &Thread) -> Ordering + Send + Sync>;

/// Whether an annotation matches the content filter
pub type AnnotationFilter = Box<dyn Fn(&Annotation) -> bool + Send + Sync>;

/// Whether a top-level thread belongs in the tree at all
pub type ThreadFilter = Box<dyn Fn(&Thread) -> bool + Send + Sync>;

/// Inputs to [`build_thread`] besides the annotations
pub struct BuildThreadOptions {
    /// Orders top-level threads
    pub sort_compare_fn: ThreadComparator,
    /// Orders replies; top-level order is used when absent
    pub reply_compare_fn: Option<ThreadComparator>,
    pub filter_fn: Option<AnnotationFilter>,
    pub thread_filter_fn: Option<ThreadFilter>,
    /// Explicit open (`true`) or closed state per thread
    pub expanded: HashMap<Identity, bool>,
    /// Threads shown even when the filter does not match them
    pub force_visible: HashSet<Identity>,
    /// When non-empty, only these top-level threads are kept
    pub selected: BTreeSet<Identity>,
    pub highlighted: HashSet<Identity>,
}

impl BuildThreadOptions {
    pub fn new(sort_compare_fn: ThreadComparator) -> Self {
        Self {
            sort_compare_fn,
            reply_compare_fn: None,
            filter_fn: None,
            thread_filter_fn: None,
            expanded: HashMap::new(),
            force_visible: HashSet::new(),
            selected: BTreeSet::new(),
            highlighted: HashSet::new(),
        }
    }

    pub fn with_reply_compare(mut self, compare: ThreadComparator) -> Self {
        self.reply_compare_fn = Some(compare);
        self
    }

    pub fn with_filter(mut self, filter: AnnotationFilter) -> Self {
        self.filter_fn = Some(filter);
        self
    }

    pub fn with_thread_filter(mut self, filter: ThreadFilter) -> Self {
        self.thread_filter_fn = Some(filter);
        self
    }

    pub fn with_expanded(mut self, expanded: HashMap<Identity, bool>) -> Self {
        self.expanded = expanded;
        self
    }

    pub fn with_force_visible(mut self, ids: HashSet<Identity>) -> Self {
        self.force_visible = ids;
        self
    }

    pub fn with_selected(mut self, ids: BTreeSet<Identity>) -> Self {
        self.selected = ids;
        self
    }

    pub fn with_highlighted(mut self, ids: HashSet<Identity>) -> Self {
        self.highlighted = ids;
        self
    }

    fn reply_compare(&self) -> &ThreadComparator {
        self.reply_compare_fn.as_ref().unwrap_or(&self.sort_compare_fn)
    }
}

impl std::fmt::Debug for BuildThreadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildThreadOptions")
            .field("has_filter", &self.filter_fn.is_some())
            .field("has_thread_filter", &self.thread_filter_fn.is_some())
            .field("expanded", &self.expanded.len())
            .field("force_visible", &self.force_visible.len())
            .field("selected", &self.selected.len())
            .finish()
    }
}

struct Node {
    id: Identity,
    annotation: Option<Arc<Annotation>>,
    parent: Option<usize>,
    children: Vec<usize>,
}

#[derive(Default)]
struct Arena {
    nodes: Vec<Node>,
    index: HashMap<Identity, usize>,
}

impl Arena {
    fn push(&mut self, id: Identity, annotation: Option<Arc<Annotation>>) -> usize {
        let idx = self.nodes.len();
        self.index.insert(id.clone(), idx);
        self.nodes.push(Node {
            id,
            annotation,
            parent: None,
            children: Vec::new(),
        });
        idx
    }

    /// Link `child` under the last of `parents`, creating placeholders for
    /// missing ancestors
    fn set_parent(&mut self, child: usize, parents: &[AnnotationId]) {
        if self.nodes[child].parent.is_some() {
            return;
        }
        let Some((parent_id, ancestors)) = parents.split_last() else {
            return;
        };

        let key = Identity::Saved(parent_id.clone());
        let parent = match self.index.get(&key) {
            Some(&idx) => idx,
            None => {
                trace!(parent = %key, "Placeholder for missing parent");
                let idx = self.push(key, None);
                self.set_parent(idx, ancestors);
                idx
            }
        };

        if self.reaches_top_without(parent, child) {
            self.nodes[child].parent = Some(parent);
            self.nodes[parent].children.push(child);
        }
    }

    /// Walk up from `start`; false if the walk passes through `avoid`
    fn reaches_top_without(&self, start: usize, avoid: usize) -> bool {
        let mut current = Some(start);
        while let Some(idx) = current {
            if idx == avoid {
                return false;
            }
            current = self.nodes[idx].parent;
        }
        true
    }

    /// Build the owned subtree at `idx`: visibility, collapse state and
    /// sorted replies
    fn materialize(&self, idx: usize, parent: Option<&Identity>, options: &BuildThreadOptions) -> Thread {
        let node = &self.nodes[idx];
        let mut thread = Thread::new(Some(node.id.clone()), node.annotation.clone());
        thread.parent = parent.cloned();
        thread.highlighted = options.highlighted.contains(&node.id);

        thread.children = node
            .children
            .iter()
            .map(|&child| self.materialize(child, Some(&node.id), options))
            .collect();
        let compare = options.reply_compare();
        thread.children.sort_by(|a, b| compare(a, b));

        let any_child_visible = thread.children.iter().any(|child| child.visible);
        let matches = match (&options.filter_fn, &node.annotation) {
            (None, _) => true,
            (Some(filter), Some(annotation)) => filter(annotation),
            (Some(_), None) => false,
        };
        thread.visible = matches || any_child_visible || options.force_visible.contains(&node.id);

        if parent.is_some() {
            thread.collapsed = match options.expanded.get(&node.id) {
                Some(expanded) => !expanded,
                None => !(options.filter_fn.is_some() && any_child_visible),
            };
        }
        thread
    }
}

/// Turn a flat list of annotations into a thread tree.
///
/// The returned root is a placeholder whose children are the top-level
/// threads. An annotation is left out when its top-level thread is not
/// selected (while a selection exists), fails `thread_filter_fn`, or
/// contains nothing visible.
pub fn build_thread(annotations: &[Arc<Annotation>], options: &BuildThreadOptions) -> Thread {
    let mut arena = Arena::default();
    for annotation in annotations {
        let Some(id) = annotation.identity() else {
            continue;
        };
        if arena.index.contains_key(&id) {
            continue;
        }
        arena.push(id, Some(Arc::clone(annotation)));
    }

    let annotation_count = arena.nodes.len();
    for idx in 0..annotation_count {
        let Some(annotation) = arena.nodes[idx].annotation.clone() else {
            continue;
        };
        let parents: Vec<AnnotationId> = annotation
            .references
            .iter()
            .filter(|reference| Some(*reference) != annotation.id.as_ref())
            .cloned()
            .collect();
        arena.set_parent(idx, &parents);
    }

    let has_selection = !options.selected.is_empty();
    let mut root = Thread::root();
    root.children = (0..arena.nodes.len())
        .filter(|&idx| arena.nodes[idx].parent.is_none())
        .filter(|&idx| {
            let id = &arena.nodes[idx].id;
            !has_selection || options.selected.contains(id) || options.force_visible.contains(id)
        })
        .map(|idx| arena.materialize(idx, None, options))
        .filter(|thread| options.thread_filter_fn.as_ref().is_none_or(|filter| filter(thread)))
        .filter(|thread| thread.visible)
        .collect();

    let compare = &options.sort_compare_fn;
    root.children.sort_by(|a, b| compare(a, b));
    root.count(0);
    root
}
