//! Realtime updates received but not yet applied
//!
//! Holds at most one entry per annotation identity. A later notification
//! for the same identity replaces the earlier one.

use std::collections::BTreeMap;
use std::sync::Arc;

use margin_core::{Annotation, Identity};

/// A buffered notification for one annotation
#[derive(Debug, Clone, PartialEq)]
pub enum PendingUpdate {
    /// Create or update, with the group the notification came from
    Upsert {
        annotation: Arc<Annotation>,
        group: Option<String>,
    },
    /// Delete a loaded annotation
    Delete,
}

/// Notifications from the push channel, split by kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RealtimeBatch {
    pub updated: Vec<Annotation>,
    pub deleted: Vec<Identity>,
}

impl RealtimeBatch {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Result of applying the pending set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedUpdates {
    pub upserted: usize,
    pub deleted: usize,
}

/// The pending update set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingUpdates {
    entries: BTreeMap<Identity, PendingUpdate>,
}

impl PendingUpdates {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, identity: &Identity) -> Option<&PendingUpdate> {
        self.entries.get(identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identity, &PendingUpdate)> {
        self.entries.iter()
    }

    /// True if any entry refers to the annotation with this id or tag
    pub fn references(&self, annotation: &Annotation) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let by_id = annotation
            .id
            .as_ref()
            .is_some_and(|id| self.entries.contains_key(&Identity::Saved(id.clone())));
        let by_tag = annotation
            .tag
            .as_ref()
            .is_some_and(|tag| self.entries.contains_key(&Identity::Local(tag.clone())));
        by_id || by_tag
    }

    /// Buffered creates and updates, in identity order
    pub fn upserts(&self) -> Vec<Annotation> {
        self.entries
            .values()
            .filter_map(|entry| match entry {
                PendingUpdate::Upsert { annotation, .. } => Some(Annotation::clone(annotation)),
                PendingUpdate::Delete => None,
            })
            .collect()
    }

    /// Identities with a buffered deletion
    pub fn deletions(&self) -> Vec<Identity> {
        self.entries
            .iter()
            .filter(|(_, entry)| matches!(entry, PendingUpdate::Delete))
            .map(|(identity, _)| identity.clone())
            .collect()
    }

    pub(crate) fn upsert(&mut self, identity: Identity, annotation: Annotation) {
        let group = annotation.group.clone();
        self.entries.insert(
            identity,
            PendingUpdate::Upsert {
                annotation: Arc::new(annotation),
                group,
            },
        );
    }

    /// Record a deletion. Any buffered upsert is discarded; the deletion
    /// itself is kept only when the annotation is loaded.
    pub(crate) fn delete(&mut self, identity: Identity, loaded: bool) {
        self.entries.remove(&identity);
        if loaded {
            self.entries.insert(identity, PendingUpdate::Delete);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use margin_core::AnnotationId;

    fn saved(id: &str) -> Identity {
        Identity::Saved(AnnotationId::from(id))
    }

    #[test]
    fn test_later_upsert_wins() {
        let mut pending = PendingUpdates::default();
        let mut first = Annotation::with_id("a1");
        first.text = Some("first".to_string());
        let mut second = Annotation::with_id("a1");
        second.text = Some("second".to_string());

        pending.upsert(saved("a1"), first);
        pending.upsert(saved("a1"), second);

        assert_eq!(pending.len(), 1);
        assert_eq!(pending.upserts()[0].text.as_deref(), Some("second"));
    }

    #[test]
    fn test_delete_of_unloaded_annotation_is_dropped() {
        let mut pending = PendingUpdates::default();
        pending.upsert(saved("a1"), Annotation::with_id("a1"));
        pending.delete(saved("a1"), false);
        assert!(pending.is_empty());

        pending.delete(saved("a2"), true);
        assert_eq!(pending.get(&saved("a2")), Some(&PendingUpdate::Delete));
        assert_eq!(pending.deletions(), vec![saved("a2")]);
    }

    #[test]
    fn test_references() {
        let mut pending = PendingUpdates::default();
        pending.upsert(saved("a1"), Annotation::with_id("a1"));

        assert!(pending.references(&Annotation::with_id("a1")));
        assert!(!pending.references(&Annotation::with_id("a2")));
        assert!(!pending.references(&Annotation::with_tag("t1")));
    }
}
