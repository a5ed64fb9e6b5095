//! The derived conversation tree

use std::sync::Arc;

use margin_core::{Annotation, Identity};

/// A node in the conversation tree.
///
/// Threads are rebuilt from the annotation collection on every change and
/// never mutated afterwards. A thread without an annotation is a
/// placeholder: either the synthetic root, or a parent that replies refer
/// to but that is not loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Thread {
    /// `None` only for the synthetic root
    pub id: Option<Identity>,
    pub annotation: Option<Arc<Annotation>>,
    pub parent: Option<Identity>,
    pub children: Vec<Thread>,
    /// Whether the replies of this thread are hidden
    pub collapsed: bool,
    pub visible: bool,
    pub highlighted: bool,
    /// Number of threads below this one
    pub reply_count: usize,
    /// Distance from the top level; top-level threads and the root are 0
    pub depth: usize,
    /// Visible annotations in this subtree, this thread included
    pub visible_count: usize,
    /// Annotations in this subtree hidden by the current filter
    pub hidden_count: usize,
}

impl Thread {
    pub(crate) fn new(id: Option<Identity>, annotation: Option<Arc<Annotation>>) -> Self {
        Self {
            id,
            annotation,
            parent: None,
            children: Vec::new(),
            collapsed: false,
            visible: true,
            highlighted: false,
            reply_count: 0,
            depth: 0,
            visible_count: 0,
            hidden_count: 0,
        }
    }

    /// An empty root
    pub fn root() -> Self {
        let mut root = Self::new(None, None);
        root.visible = false;
        root
    }

    pub fn is_placeholder(&self) -> bool {
        self.annotation.is_none()
    }

    /// The annotation used to order this thread: its own, or for a
    /// placeholder the first annotation found below it
    pub fn sort_annotation(&self) -> Option<&Annotation> {
        match &self.annotation {
            Some(annotation) => Some(annotation),
            None => self.children.iter().find_map(Thread::sort_annotation),
        }
    }

    /// Depth-first search for a thread by id
    pub fn find(&self, id: &Identity) -> Option<&Thread> {
        if self.id.as_ref() == Some(id) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Ids of the top-level threads, in display order
    pub fn top_level_ids(&self) -> impl Iterator<Item = &Identity> {
        self.children.iter().filter_map(|child| child.id.as_ref())
    }

    /// Every thread below this one, parents before children
    pub fn descendants(&self) -> Vec<&Thread> {
        let mut out = Vec::new();
        let mut stack: Vec<&Thread> = self.children.iter().rev().collect();
        while let Some(thread) = stack.pop() {
            out.push(thread);
            stack.extend(thread.children.iter().rev());
        }
        out
    }

    /// Fill in reply, depth and visibility counts for this subtree
    pub(crate) fn count(&mut self, depth: usize) {
        self.depth = depth;
        let child_depth = if self.id.is_none() { 0 } else { depth + 1 };

        let mut reply_count = 0;
        let mut visible_count = 0;
        let mut hidden_count = 0;
        for child in &mut self.children {
            child.count(child_depth);
            reply_count += 1 + child.reply_count;
            visible_count += child.visible_count;
            hidden_count += child.hidden_count;
        }
        if self.annotation.is_some() {
            if self.visible {
                visible_count += 1;
            } else {
                hidden_count += 1;
            }
        }

        self.reply_count = reply_count;
        self.visible_count = visible_count;
        self.hidden_count = hidden_count;
    }
}
