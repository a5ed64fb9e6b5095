//! Annotation records
//!
//! Annotations are treated as opaque records with a known shape. Fields the
//! engine reads are typed; everything else the service sends is kept in
//! [`Annotation::extra`] and written back unchanged.
//!
//! Local-only state travels under `$`-prefixed keys (`$tag`, `$orphan`,
//! `$anchorTimeout`, `$highlight`) so it never collides with service fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};
use crate::identity::{AnnotationId, Identity, Tag};

/// An annotation as held by the sidebar
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AnnotationId>,

    #[serde(rename = "$tag", default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<Tag>,

    #[serde(default)]
    pub target: Vec<Target>,

    /// Ancestor ids, furthest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<AnnotationId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,

    /// Hidden by a moderator
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moderation: Option<Moderation>,

    /// `None` until anchoring reports a result
    #[serde(rename = "$orphan", default, skip_serializing_if = "Option::is_none")]
    pub orphan: Option<bool>,

    #[serde(
        rename = "$anchorTimeout",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub anchor_timeout: bool,

    #[serde(rename = "$highlight", default, skip_serializing_if = "std::ops::Not::not")]
    pub highlight: bool,

    /// Service fields this crate does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Annotation {
    /// Create an unsaved annotation carrying only a local tag
    pub fn with_tag(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(Tag::new(tag)),
            ..Default::default()
        }
    }

    /// Create a saved annotation with the given id
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(AnnotationId::new(id)),
            ..Default::default()
        }
    }

    /// Parse an annotation from a JSON payload
    pub fn from_json(value: Value) -> CoreResult<Self> {
        if !value.is_object() {
            return Err(CoreError::InvalidPayload(format!(
                "expected object, got {}",
                value
            )));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn identity(&self) -> Option<Identity> {
        Identity::resolve(self.id.as_ref(), self.tag.as_ref())
    }

    /// Id of the immediate parent, ignoring self references
    pub fn parent_id(&self) -> Option<&AnnotationId> {
        self.references
            .last()
            .filter(|parent| Some(*parent) != self.id.as_ref())
    }

    /// Shallow merge of `incoming` over `self`.
    ///
    /// Service fields are replaced wholesale. Local-only fields keep their
    /// current value unless the incoming record sets them.
    pub fn merge_from(&mut self, incoming: Annotation) {
        let tag = self.tag.take();
        let orphan = self.orphan;
        let anchor_timeout = self.anchor_timeout;
        let highlight = self.highlight;
        let mut extra = std::mem::take(&mut self.extra);

        *self = Annotation {
            tag: incoming.tag.clone().or(tag),
            orphan: incoming.orphan.or(orphan),
            anchor_timeout: incoming.anchor_timeout || anchor_timeout,
            highlight: incoming.highlight || highlight,
            ..incoming
        };
        extra.extend(std::mem::take(&mut self.extra));
        self.extra = extra;
    }

    /// The minimal projection handed to content frames
    pub fn to_frame_data(&self) -> Option<AnnotationData> {
        Some(AnnotationData {
            tag: self.tag.clone()?,
            target: self.target.clone(),
            uri: self.uri.clone(),
            document: self.document.clone(),
        })
    }
}

/// What part of which document an annotation refers to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    #[serde(default)]
    pub source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<Vec<Selector>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Target {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn with_selectors(mut self, selectors: Vec<Selector>) -> Self {
        self.selector = Some(selectors);
        self
    }
}

/// A selector describing a region of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Selector {
    TextQuoteSelector {
        exact: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suffix: Option<String>,
    },
    TextPositionSelector {
        start: u64,
        end: u64,
    },
    #[serde(rename_all = "camelCase")]
    RangeSelector {
        start_container: String,
        start_offset: u64,
        end_container: String,
        end_offset: u64,
    },
    PageSelector {
        index: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    #[serde(rename = "EPUBContentSelector")]
    EpubContentSelector {
        cfi: String,
        #[serde(default)]
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    ShapeSelector {
        shape: Shape,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        view: Option<ViewBox>,
    },
    /// A selector kind this client does not understand
    #[serde(other)]
    Unknown,
}

/// Geometry of a [`Selector::ShapeSelector`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    Rect {
        left: f64,
        top: f64,
        right: f64,
        bottom: f64,
    },
    Point {
        x: f64,
        y: f64,
    },
}

/// Bounds of the page or image a shape was drawn on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewBox {
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub right: f64,
    #[serde(default)]
    pub bottom: f64,
}

/// Principals allowed to act on an annotation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub read: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub update: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delete: Vec<String>,
}

/// Moderation metadata, present only for moderators
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Moderation {
    #[serde(rename = "flagCount", default)]
    pub flag_count: u32,
}

/// Projection of an annotation that crosses into a content frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationData {
    #[serde(rename = "$tag")]
    pub tag: Tag,
    pub target: Vec<Target>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_keeps_unknown_fields() {
        let ann: Annotation = serde_json::from_value(json!({
            "id": "a1",
            "$tag": "t1",
            "target": [{"source": "http://example.com"}],
            "links": {"html": "http://example.com/a1"},
        }))
        .unwrap();

        assert_eq!(ann.id, Some(AnnotationId::from("a1")));
        assert_eq!(ann.tag, Some(Tag::from("t1")));
        assert!(ann.extra.contains_key("links"));

        let back = serde_json::to_value(&ann).unwrap();
        assert_eq!(back["links"]["html"], "http://example.com/a1");
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(matches!(
            Annotation::from_json(json!("a1")),
            Err(CoreError::InvalidPayload(_))
        ));
        assert!(Annotation::from_json(json!({"id": "a1"})).is_ok());
    }

    #[test]
    fn test_unknown_selector_kind() {
        let target: Target = serde_json::from_value(json!({
            "source": "x",
            "selector": [{"type": "FragmentSelector", "value": "p1"}],
        }))
        .unwrap();
        assert_eq!(target.selector, Some(vec![Selector::Unknown]));
    }

    #[test]
    fn test_merge_keeps_local_fields() {
        let mut existing = Annotation::with_tag("t1");
        existing.orphan = Some(false);

        let mut incoming = Annotation::with_id("a1");
        incoming.text = Some("saved".to_string());
        existing.merge_from(incoming);

        assert_eq!(existing.tag, Some(Tag::from("t1")));
        assert_eq!(existing.id, Some(AnnotationId::from("a1")));
        assert_eq!(existing.orphan, Some(false));
        assert_eq!(existing.text.as_deref(), Some("saved"));
    }

    #[test]
    fn test_parent_ignores_self_reference() {
        let mut ann = Annotation::with_id("a1");
        ann.references = vec![AnnotationId::from("a1")];
        assert!(ann.parent_id().is_none());

        ann.references = vec![AnnotationId::from("root"), AnnotationId::from("p")];
        assert_eq!(ann.parent_id(), Some(&AnnotationId::from("p")));
    }

    #[test]
    fn test_frame_projection_requires_tag() {
        assert!(Annotation::with_id("a1").to_frame_data().is_none());

        let mut ann = Annotation::with_tag("t4");
        ann.uri = Some("http://example.com".to_string());
        ann.text = Some("private".to_string());
        let data = serde_json::to_value(ann.to_frame_data().unwrap()).unwrap();
        assert_eq!(data["$tag"], "t4");
        assert!(data.get("text").is_none());
    }
}
