//! Annotation identities
//!
//! Every annotation has a local [`Tag`] for as long as this client session
//! holds it, and acquires a durable [`AnnotationId`] once the service has
//! saved it. [`Identity`] is the key used wherever one of the two must be
//! chosen: the id when it exists, the tag otherwise.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Durable identifier assigned by the annotation service
#[derive(Debug, Display, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(pub String);

impl AnnotationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AnnotationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Session-local identifier, stable across edits and saves
#[derive(Debug, Display, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(pub String);

impl Tag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Tag in the form handed out by the store: `t1`, `t2`, ...
    pub fn from_counter(n: u64) -> Self {
        Self(format!("t{}", n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Tag {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

/// Identity of an annotation: local before save, durable after
#[derive(Debug, Display, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Identity {
    #[display("local:{_0}")]
    Local(Tag),
    #[display("saved:{_0}")]
    Saved(AnnotationId),
}

impl Identity {
    /// Pick the durable id when present, falling back to the tag
    pub fn resolve(id: Option<&AnnotationId>, tag: Option<&Tag>) -> Option<Self> {
        match (id, tag) {
            (Some(id), _) => Some(Identity::Saved(id.clone())),
            (None, Some(tag)) => Some(Identity::Local(tag.clone())),
            (None, None) => None,
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, Identity::Saved(_))
    }

    pub fn as_id(&self) -> Option<&AnnotationId> {
        match self {
            Identity::Saved(id) => Some(id),
            Identity::Local(_) => None,
        }
    }

    pub fn as_tag(&self) -> Option<&Tag> {
        match self {
            Identity::Local(tag) => Some(tag),
            Identity::Saved(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_id() {
        let id = AnnotationId::from("a1");
        let tag = Tag::from("t1");
        assert_eq!(
            Identity::resolve(Some(&id), Some(&tag)),
            Some(Identity::Saved(id.clone()))
        );
        assert_eq!(
            Identity::resolve(None, Some(&tag)),
            Some(Identity::Local(tag))
        );
        assert_eq!(Identity::resolve(None, None), None);
    }

    #[test]
    fn test_tag_from_counter() {
        assert_eq!(Tag::from_counter(7).as_str(), "t7");
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(Identity::Local(Tag::from("t3")).to_string(), "local:t3");
        assert_eq!(
            Identity::Saved(AnnotationId::from("abc")).to_string(),
            "saved:abc"
        );
    }

    #[test]
    fn test_wire_form_is_plain_string() {
        let json = serde_json::to_string(&Tag::from("t9")).unwrap();
        assert_eq!(json, "\"t9\"");
    }
}
