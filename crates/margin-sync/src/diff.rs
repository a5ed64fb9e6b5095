//! Computing what frames need to be told
//!
//! [`diff`] compares the annotation collection against the tags already
//! pushed into frames. It performs no I/O, so the synchronizer can apply
//! the result and tests can inspect it directly.

use std::collections::HashSet;

use margin_core::metadata;
use margin_core::{AnnotationData, FrameId, Tag};
use margin_store::{AnnotationSet, FrameList};

/// Annotations to load into one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameLoad {
    pub frame_id: Option<FrameId>,
    pub annotations: Vec<AnnotationData>,
}

/// Everything one pass of synchronization has to send
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncActions {
    /// One `loadAnnotations` call per target frame, in first-seen order
    pub loads: Vec<FrameLoad>,
    /// Tags to retract from every frame
    pub deletes: Vec<Tag>,
    /// New public annotation count, when frames should be told about it
    pub public_count: Option<usize>,
}

impl SyncActions {
    pub fn is_empty(&self) -> bool {
        self.loads.is_empty() && self.deletes.is_empty() && self.public_count.is_none()
    }

    /// Tags carried by all the loads
    pub fn loaded_tags(&self) -> impl Iterator<Item = &Tag> {
        self.loads
            .iter()
            .flat_map(|load| load.annotations.iter().map(|data| &data.tag))
    }
}

/// Work out the calls needed to bring frames in line with `annotations`.
///
/// `loaded` holds the tags frames already know about. `previous_public` is
/// the count last reported, if any.
pub fn diff(
    annotations: &AnnotationSet,
    frames: &FrameList,
    loaded: &HashSet<Tag>,
    previous_public: Option<usize>,
) -> SyncActions {
    let mut actions = SyncActions::default();
    let mut present: HashSet<&Tag> = HashSet::new();
    let mut public = 0;

    for annotation in annotations.iter() {
        // Frames never need reply bodies
        if metadata::is_reply(annotation) {
            continue;
        }
        if metadata::is_public(annotation) {
            public += 1;
        }
        let Some(tag) = annotation.tag.as_ref() else {
            continue;
        };
        present.insert(tag);
        if loaded.contains(tag) {
            continue;
        }
        let Some(frame) = frames.frame_for_uri(annotation.uri.as_deref()) else {
            continue;
        };
        let Some(data) = annotation.to_frame_data() else {
            continue;
        };
        match actions.loads.iter_mut().find(|load| load.frame_id == frame.id) {
            Some(load) => load.annotations.push(data),
            None => actions.loads.push(FrameLoad {
                frame_id: frame.id.clone(),
                annotations: vec![data],
            }),
        }
    }

    let mut deletes: Vec<Tag> = loaded
        .iter()
        .filter(|tag| !present.contains(tag))
        .cloned()
        .collect();
    deletes.sort();
    actions.deletes = deletes;

    if frames.all_fetch_complete() && (public == 0 || Some(public) != previous_public) {
        actions.public_count = Some(public);
    }

    actions
}
