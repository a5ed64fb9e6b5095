//! Content and tab filters
//!
//! The content filter decides which annotations are visible while the user
//! is searching. A query is split on whitespace; every term must match.
//! A bare term matches the text, a tag, the quote or the user; a term of the
//! form `field:value` is checked against that field only. Matching ignores
//! case. A focused user further restricts matches to that user's
//! annotations.

use margin_core::metadata;
use margin_core::Annotation;
use margin_store::TabKind;

use crate::build::{AnnotationFilter, ThreadFilter};
use crate::thread::Thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Any,
    Quote,
    Text,
    Tag,
    User,
    Uri,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "quote" => Some(Field::Quote),
            "text" => Some(Field::Text),
            "tag" => Some(Field::Tag),
            "user" => Some(Field::User),
            "uri" | "url" => Some(Field::Uri),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Term {
    field: Field,
    value: String,
}

impl Term {
    fn parse(raw: &str) -> Option<Self> {
        let (field, value) = match raw.split_once(':') {
            Some((name, value)) => match Field::parse(&name.to_lowercase()) {
                Some(field) => (field, value),
                None => (Field::Any, raw),
            },
            None => (Field::Any, raw),
        };
        let value = value.to_lowercase();
        (!value.is_empty()).then_some(Term { field, value })
    }

    fn matches(&self, annotation: &Annotation) -> bool {
        match self.field {
            Field::Any => [Field::Quote, Field::Text, Field::Tag, Field::User]
                .into_iter()
                .any(|field| self.matches_field(field, annotation)),
            field => self.matches_field(field, annotation),
        }
    }

    fn matches_field(&self, field: Field, annotation: &Annotation) -> bool {
        let contains = |haystack: &str| haystack.to_lowercase().contains(&self.value);
        match field {
            // Replies carry no quote of their own
            Field::Quote => {
                !metadata::is_reply(annotation) && metadata::quote(annotation).is_some_and(contains)
            }
            Field::Text => annotation.text.as_deref().is_some_and(contains),
            Field::Tag => annotation.tags.iter().any(|tag| tag.to_lowercase() == self.value),
            Field::User => annotation.user.as_deref().is_some_and(contains),
            Field::Uri => annotation.uri.as_deref().is_some_and(contains),
            Field::Any => false,
        }
    }
}

/// A parsed search query plus the focused user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFilter {
    terms: Vec<Term>,
    focused_user: Option<String>,
}

impl ContentFilter {
    /// Returns `None` when there is nothing to filter on
    pub fn new(query: Option<&str>, focused_user: Option<&str>) -> Option<Self> {
        let terms: Vec<Term> = query
            .unwrap_or_default()
            .split_whitespace()
            .filter_map(Term::parse)
            .collect();
        if terms.is_empty() && focused_user.is_none() {
            return None;
        }
        Some(Self {
            terms,
            focused_user: focused_user.map(str::to_string),
        })
    }

    /// Unsaved annotations always match, so drafts do not vanish mid-edit
    pub fn matches(&self, annotation: &Annotation) -> bool {
        if metadata::is_new(annotation) {
            return true;
        }
        if let Some(user) = &self.focused_user {
            if annotation.user.as_deref() != Some(user.as_str()) {
                return false;
            }
        }
        self.terms.iter().all(|term| term.matches(annotation))
    }

    pub fn into_filter(self) -> AnnotationFilter {
        Box::new(move |annotation| self.matches(annotation))
    }
}

/// Whether a top-level thread belongs on `tab`.
///
/// Placeholder threads, whose root annotation is gone, are listed with
/// annotations.
pub fn matches_tab(tab: TabKind, thread: &Thread) -> bool {
    let Some(annotation) = &thread.annotation else {
        return tab == TabKind::Annotation;
    };
    match tab {
        TabKind::Annotation => metadata::is_annotation(annotation),
        TabKind::Note => metadata::is_page_note(annotation),
        TabKind::Orphan => metadata::is_orphan(annotation),
    }
}

pub fn tab_filter(tab: TabKind) -> ThreadFilter {
    Box::new(move |thread| matches_tab(tab, thread))
}
