//! The annotation collection
//!
//! Annotations are kept in insertion order with lookup tables on both the
//! durable id and the local tag, so either key resolves the same entry.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use margin_core::{AnchorStatus, Annotation, AnnotationId, Identity, Tag};

/// Result of merging a batch of annotations into the collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddOutcome {
    /// Tags of annotations that were not previously held
    pub added: Vec<Tag>,
    /// Tags of annotations that were merged into an existing entry
    pub updated: Vec<Tag>,
}

/// Ordered annotation collection indexed by id and tag
#[derive(Debug, Clone, Default)]
pub struct AnnotationSet {
    entries: Vec<Arc<Annotation>>,
    by_id: HashMap<AnnotationId, usize>,
    by_tag: HashMap<Tag, usize>,
    next_tag: u64,
}

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Annotation>> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[Arc<Annotation>] {
        &self.entries
    }

    pub fn find_by_id(&self, id: &AnnotationId) -> Option<&Arc<Annotation>> {
        self.by_id.get(id).map(|&i| &self.entries[i])
    }

    pub fn find_by_tag(&self, tag: &Tag) -> Option<&Arc<Annotation>> {
        self.by_tag.get(tag).map(|&i| &self.entries[i])
    }

    pub fn get(&self, identity: &Identity) -> Option<&Arc<Annotation>> {
        match identity {
            Identity::Saved(id) => self.find_by_id(id),
            Identity::Local(tag) => self.find_by_tag(tag),
        }
    }

    pub fn contains_id(&self, id: &AnnotationId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Ids of the annotations with the given tags, skipping unsaved ones
    pub fn find_ids_for_tags(&self, tags: &[Tag]) -> Vec<AnnotationId> {
        tags.iter()
            .filter_map(|tag| self.find_by_tag(tag))
            .filter_map(|ann| ann.id.clone())
            .collect()
    }

    /// Allocate the next session-local tag.
    ///
    /// Tags supplied by frames share the namespace, so counter values
    /// already in use are skipped.
    pub fn allocate_tag(&mut self) -> Tag {
        loop {
            self.next_tag += 1;
            let tag = Tag::from_counter(self.next_tag);
            if !self.by_tag.contains_key(&tag) {
                return tag;
            }
        }
    }

    /// Merge a batch into the collection.
    ///
    /// An incoming annotation matches an existing entry by id first, then by
    /// tag. Matches are shallow-merged and keep their tag; everything else is
    /// appended with a freshly allocated tag when it has none.
    pub fn add(&mut self, incoming: Vec<Annotation>) -> AddOutcome {
        let mut outcome = AddOutcome::default();

        for mut ann in incoming {
            let existing = ann
                .id
                .as_ref()
                .and_then(|id| self.by_id.get(id))
                .or_else(|| ann.tag.as_ref().and_then(|tag| self.by_tag.get(tag)))
                .copied();

            match existing {
                Some(index) => {
                    let mut merged = Annotation::clone(&self.entries[index]);
                    let tag = merged.tag.clone();
                    merged.merge_from(ann);
                    if tag.is_some() {
                        merged.tag = tag;
                    }
                    self.index_entry(index, &merged);
                    if let Some(tag) = merged.tag.clone() {
                        outcome.updated.push(tag);
                    }
                    self.entries[index] = Arc::new(merged);
                }
                None => {
                    let tag = match &ann.tag {
                        Some(tag) => tag.clone(),
                        None => {
                            let tag = self.allocate_tag();
                            ann.tag = Some(tag.clone());
                            tag
                        }
                    };
                    ann.anchor_timeout = false;
                    if ann.id.is_none() {
                        ann.orphan = Some(false);
                    }
                    let index = self.entries.len();
                    self.index_entry(index, &ann);
                    self.entries.push(Arc::new(ann));
                    outcome.added.push(tag);
                }
            }
        }

        outcome
    }

    /// Remove every annotation matching one of `identities`
    pub fn remove(&mut self, identities: &[Identity]) -> Vec<Arc<Annotation>> {
        let ids: HashSet<&AnnotationId> = identities.iter().filter_map(Identity::as_id).collect();
        let tags: HashSet<&Tag> = identities.iter().filter_map(Identity::as_tag).collect();

        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|ann| {
                ann.id.as_ref().is_some_and(|id| ids.contains(id))
                    || ann.tag.as_ref().is_some_and(|tag| tags.contains(tag))
            });

        self.entries = kept;
        self.reindex();
        removed
    }

    /// Drop every annotation; the tag counter keeps counting
    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_id.clear();
        self.by_tag.clear();
    }

    /// Apply anchoring results. Returns whether anything changed.
    pub fn update_anchor_status(&mut self, statuses: &HashMap<Tag, AnchorStatus>) -> bool {
        let mut changed = false;
        for entry in self.entries.iter_mut() {
            let Some(status) = entry.tag.as_ref().and_then(|tag| statuses.get(tag)) else {
                continue;
            };
            let ann = Arc::make_mut(entry);
            match status {
                AnchorStatus::Timeout => ann.anchor_timeout = true,
                // Drafts have nothing to be orphaned from
                AnchorStatus::Orphan => ann.orphan = Some(ann.id.is_some()),
                AnchorStatus::Anchored => ann.orphan = Some(false),
            }
            changed = true;
        }
        changed
    }

    fn index_entry(&mut self, index: usize, ann: &Annotation) {
        if let Some(id) = &ann.id {
            self.by_id.insert(id.clone(), index);
        }
        if let Some(tag) = &ann.tag {
            self.by_tag.insert(tag.clone(), index);
        }
    }

    fn reindex(&mut self) {
        self.by_id.clear();
        self.by_tag.clear();
        let entries = std::mem::take(&mut self.entries);
        for (index, ann) in entries.iter().enumerate() {
            self.index_entry(index, ann);
        }
        self.entries = entries;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_annotations_get_tags() {
        let mut set = AnnotationSet::new();
        let outcome = set.add(vec![Annotation::with_id("a1"), Annotation::with_id("a2")]);

        assert_eq!(outcome.added, vec![Tag::from("t1"), Tag::from("t2")]);
        assert!(outcome.updated.is_empty());
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.find_by_tag(&Tag::from("t2")).unwrap().id,
            Some(AnnotationId::from("a2"))
        );
    }

    #[test]
    fn test_unsaved_annotation_is_not_orphan() {
        let mut set = AnnotationSet::new();
        let mut ann = Annotation::with_tag("a:1");
        ann.orphan = Some(true);
        ann.anchor_timeout = true;
        set.add(vec![ann]);

        let stored = set.find_by_tag(&Tag::from("a:1")).unwrap();
        assert_eq!(stored.orphan, Some(false));
        assert!(!stored.anchor_timeout);
    }

    #[test]
    fn test_saved_version_merges_into_local_entry() {
        let mut set = AnnotationSet::new();
        set.add(vec![Annotation::with_tag("t9")]);

        let mut saved = Annotation::with_id("a1");
        saved.tag = Some(Tag::from("t9"));
        saved.text = Some("hello".to_string());
        let outcome = set.add(vec![saved]);

        assert_eq!(outcome.updated, vec![Tag::from("t9")]);
        assert_eq!(set.len(), 1);

        // A later update that only knows the id still hits the same entry.
        let mut update = Annotation::with_id("a1");
        update.text = Some("edited".to_string());
        set.add(vec![update]);

        assert_eq!(set.len(), 1);
        let stored = set.find_by_id(&AnnotationId::from("a1")).unwrap();
        assert_eq!(stored.tag, Some(Tag::from("t9")));
        assert_eq!(stored.text.as_deref(), Some("edited"));
    }

    #[test]
    fn test_remove_by_id_or_tag() {
        let mut set = AnnotationSet::new();
        set.add(vec![
            Annotation::with_id("a1"),
            Annotation::with_tag("local"),
            Annotation::with_id("a3"),
        ]);

        let removed = set.remove(&[
            Identity::Saved(AnnotationId::from("a1")),
            Identity::Local(Tag::from("local")),
        ]);

        assert_eq!(removed.len(), 2);
        assert_eq!(set.len(), 1);
        assert!(set.contains_id(&AnnotationId::from("a3")));
        assert!(set.find_by_tag(&Tag::from("local")).is_none());
        assert!(set.find_by_tag(&Tag::from("t2")).is_some());
    }

    #[test]
    fn test_allocated_tags_skip_frame_tags() {
        let mut set = AnnotationSet::new();
        set.add(vec![Annotation::with_tag("t2")]);
        let outcome = set.add(vec![Annotation::with_id("a1"), Annotation::with_id("a2")]);

        assert_eq!(outcome.added, vec![Tag::from("t1"), Tag::from("t3")]);
        assert_eq!(set.len(), 3);
        let local = set.find_by_tag(&Tag::from("t2")).unwrap();
        assert!(local.id.is_none());
        assert_eq!(
            set.find_by_tag(&Tag::from("t3")).unwrap().id,
            Some(AnnotationId::from("a2"))
        );
    }

    #[test]
    fn test_anchor_status_updates() {
        let mut set = AnnotationSet::new();
        set.add(vec![Annotation::with_id("a1"), Annotation::with_id("a2")]);

        let statuses = HashMap::from([
            (Tag::from("t1"), AnchorStatus::Orphan),
            (Tag::from("t2"), AnchorStatus::Timeout),
        ]);
        assert!(set.update_anchor_status(&statuses));

        assert_eq!(set.find_by_tag(&Tag::from("t1")).unwrap().orphan, Some(true));
        assert!(set.find_by_tag(&Tag::from("t2")).unwrap().anchor_timeout);

        assert!(!set.update_anchor_status(&HashMap::new()));
    }

    #[test]
    fn test_draft_never_marked_orphan() {
        let mut set = AnnotationSet::new();
        set.add(vec![Annotation::with_tag("draft")]);

        let statuses = HashMap::from([(Tag::from("draft"), AnchorStatus::Orphan)]);
        set.update_anchor_status(&statuses);

        let draft = set.find_by_tag(&Tag::from("draft")).unwrap();
        assert!(draft.id.is_none());
        assert_eq!(draft.orphan, Some(false));
    }

    #[test]
    fn test_find_ids_for_tags_skips_unsaved() {
        let mut set = AnnotationSet::new();
        set.add(vec![Annotation::with_id("a1"), Annotation::with_tag("draft")]);

        let ids = set.find_ids_for_tags(&[Tag::from("t1"), Tag::from("draft"), Tag::from("nope")]);
        assert_eq!(ids, vec![AnnotationId::from("a1")]);
    }
}
