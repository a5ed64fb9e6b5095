//! Predicates and derived values over annotations
//!
//! These are the only interpretations of annotation content the engine
//! relies on. Everything else about an annotation is passthrough.

use std::cmp::Ordering;

use crate::annotation::{Annotation, Selector, Shape};

/// Principal that marks an annotation as world-readable
pub const WORLD_READABLE: &str = "group:__world__";

/// Key containing what is needed to order annotations by document position
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationKey {
    /// EPUB canonical fragment identifier of the chapter
    pub cfi: Option<String>,
    /// Zero-based page index
    pub page_index: Option<u64>,
    /// Distance of a shape from the top of its page or image
    pub top: Option<f64>,
    /// Character offset of the start of the quote
    pub char_offset: Option<u64>,
}

impl LocationKey {
    /// Field-by-field comparison; a missing field sorts before a present one
    pub fn compare(&self, other: &LocationKey) -> Ordering {
        fn missing_first<T>(a: &Option<T>, b: &Option<T>, cmp: impl Fn(&T, &T) -> Ordering) -> Ordering {
            match (a, b) {
                (Some(a), Some(b)) => cmp(a, b),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        }

        missing_first(&self.cfi, &other.cfi, |a, b| a.cmp(b))
            .then_with(|| missing_first(&self.page_index, &other.page_index, |a, b| a.cmp(b)))
            .then_with(|| missing_first(&self.top, &other.top, |a, b| a.total_cmp(b)))
            .then_with(|| missing_first(&self.char_offset, &other.char_offset, |a, b| a.cmp(b)))
    }
}

pub fn is_reply(annotation: &Annotation) -> bool {
    !annotation.references.is_empty()
}

pub fn is_new(annotation: &Annotation) -> bool {
    annotation.id.is_none()
}

pub fn is_saved(annotation: &Annotation) -> bool {
    annotation.id.is_some()
}

/// True when the annotation refers to a specific part of the document
pub fn has_selector(annotation: &Annotation) -> bool {
    annotation
        .target
        .first()
        .is_some_and(|target| target.selector.is_some())
}

/// True while anchoring is still in progress and has not timed out
pub fn is_waiting_to_anchor(annotation: &Annotation) -> bool {
    has_selector(annotation) && annotation.orphan.is_none() && !annotation.anchor_timeout
}

pub fn is_hidden(annotation: &Annotation) -> bool {
    annotation.hidden
}

/// Highlights are saved annotations with no body: no text and no tags
pub fn is_highlight(annotation: &Annotation) -> bool {
    if annotation.highlight {
        return true;
    }
    if is_new(annotation) {
        return false;
    }
    !is_page_note(annotation)
        && !is_reply(annotation)
        && !annotation.hidden
        && annotation.text.as_deref().is_none_or(str::is_empty)
        && annotation.tags.is_empty()
}

pub fn is_orphan(annotation: &Annotation) -> bool {
    has_selector(annotation) && annotation.orphan == Some(true)
}

pub fn is_page_note(annotation: &Annotation) -> bool {
    !has_selector(annotation) && !is_reply(annotation)
}

/// Anchored (or still anchoring) top-level annotation
pub fn is_annotation(annotation: &Annotation) -> bool {
    has_selector(annotation) && !is_orphan(annotation)
}

pub fn is_public(annotation: &Annotation) -> bool {
    annotation
        .permissions
        .as_ref()
        .is_some_and(|perms| perms.read.iter().any(|p| p == WORLD_READABLE))
}

pub fn flag_count(annotation: &Annotation) -> Option<u32> {
    annotation.moderation.as_ref().map(|m| m.flag_count)
}

/// The exact text quoted by the first target, if any
pub fn quote(annotation: &Annotation) -> Option<&str> {
    annotation
        .target
        .first()?
        .selector
        .as_ref()?
        .iter()
        .find_map(|selector| match selector {
            Selector::TextQuoteSelector { exact, .. } => Some(exact.as_str()),
            _ => None,
        })
}

/// Position of the annotation within its document (first target only)
pub fn location(annotation: &Annotation) -> LocationKey {
    let mut key = LocationKey::default();
    let Some(selectors) = annotation
        .target
        .first()
        .and_then(|target| target.selector.as_ref())
    else {
        return key;
    };

    for selector in selectors {
        match selector {
            Selector::TextPositionSelector { start, .. } => key.char_offset = Some(*start),
            Selector::EpubContentSelector { cfi, .. } => key.cfi = Some(cfi.clone()),
            Selector::PageSelector { index, .. } => key.page_index = Some(*index),
            Selector::ShapeSelector { shape, view } => {
                let page_top = view.as_ref().map_or(0.0, |v| v.top);
                key.top = Some(match shape {
                    Shape::Rect { top, .. } => (page_top - top).abs(),
                    Shape::Point { y, .. } => (page_top - y).abs(),
                });
            }
            _ => {}
        }
    }
    key
}
