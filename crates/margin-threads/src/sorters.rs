//! Orderings for sibling threads
//!
//! All comparisons look at a thread's [`sort_annotation`](Thread::sort_annotation),
//! so a placeholder is ordered by the first annotation below it. Sorting
//! with these is stable: threads that compare equal keep their input order.

use std::cmp::Ordering;

use margin_core::metadata;
use margin_core::Annotation;
use margin_store::SortKey;

use crate::build::ThreadComparator;
use crate::thread::Thread;

fn by_annotation(a: &Thread, b: &Thread, compare: impl Fn(&Annotation, &Annotation) -> Ordering) -> Ordering {
    match (a.sort_annotation(), b.sort_annotation()) {
        (Some(a), Some(b)) => compare(a, b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn created(a: &Annotation, b: &Annotation) -> Ordering {
    a.created.cmp(&b.created)
}

/// Compare two threads under `key`
pub fn compare_threads(key: SortKey, a: &Thread, b: &Thread) -> Ordering {
    match key {
        SortKey::Newest => by_annotation(a, b, |a, b| created(b, a)),
        SortKey::Oldest => by_annotation(a, b, created),
        SortKey::Location => by_annotation(a, b, |a, b| {
            metadata::location(a)
                .compare(&metadata::location(b))
                .then_with(|| created(a, b))
        }),
    }
}

/// Boxed comparator for `key`, as taken by [`BuildThreadOptions`](crate::BuildThreadOptions)
pub fn sorter(key: SortKey) -> ThreadComparator {
    Box::new(move |a, b| compare_threads(key, a, b))
}
