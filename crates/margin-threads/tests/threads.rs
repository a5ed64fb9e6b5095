//! Integration tests for thread composition and windowing
//!
//! 1. **test_reply_threads_under_parent**: Two-annotation conversation
//! 2. **test_page_note_load_uses_notes_tab**: First load of notes lands on the notes tab
//! 3. **test_deep_match_keeps_ancestors_visible**: Visibility propagates upwards
//! 4. **test_composer_memoizes_on_inputs**: Same inputs, same tree
//! 5. **test_tab_filters_scope**: Tabs only on the sidebar, only without a query
//! 6. **test_window_of_composed_threads**: Ten default-height threads all visible
//! 7. **test_window_tracker_debounces**: Bursts produce one recalculation

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_test::assert_ok;

use margin_core::{Annotation, AnnotationId, Identity, Selector, Target};
use margin_store::{RealtimeBatch, SidebarStore, SortKey, Surface, TabKind};
use margin_threads::{
    BuildThreadOptions, Thread, ThreadComposer, ThreadError, WindowCalculator, WindowConfig,
    WindowTracker, build_thread, sorter,
};

fn saved(id: &str) -> Identity {
    Identity::Saved(AnnotationId::from(id))
}

fn anchored(id: &str, offset: u64) -> Annotation {
    let mut annotation = Annotation::with_id(id);
    annotation.target = vec![Target::new("http://example.com").with_selectors(vec![
        Selector::TextPositionSelector {
            start: offset,
            end: offset + 10,
        },
    ])];
    annotation
}

fn reply(id: &str, references: &[&str], text: &str) -> Annotation {
    let mut annotation = Annotation::with_id(id);
    annotation.references = references.iter().map(|r| AnnotationId::from(*r)).collect();
    annotation.text = Some(text.into());
    annotation
}

fn top_level(root: &Thread) -> Vec<String> {
    root.top_level_ids().map(|id| id.to_string()).collect()
}

#[test]
fn test_reply_threads_under_parent() {
    let annotations = vec![
        Arc::new(Annotation::with_id("a1")),
        Arc::new(reply("a2", &["a1"], "")),
    ];
    let root = build_thread(&annotations, &BuildThreadOptions::new(sorter(SortKey::Location)));

    assert_eq!(root.children.len(), 1);
    let a1 = &root.children[0];
    assert_eq!(a1.id, Some(saved("a1")));
    assert_eq!(a1.children.len(), 1);
    assert_eq!(a1.children[0].id, Some(saved("a2")));
    assert_eq!(a1.children[0].parent, Some(saved("a1")));
    assert_eq!(a1.reply_count, 1);
}

#[test]
fn test_page_note_load_uses_notes_tab() {
    margin_logging::init_testing();
    let store = SidebarStore::default();
    store.add_annotations(vec![Annotation::with_id("a1"), reply("a2", &["a1"], "reply")]);
    assert_eq!(store.state().selection.selected_tab, TabKind::Note);

    let root = ThreadComposer::new().compose(&store.state());
    assert_eq!(top_level(&root), vec!["saved:a1"]);
    assert_eq!(root.children[0].reply_count, 1);
    assert!(root.children[0].children[0].collapsed);
}

#[test]
fn test_deep_match_keeps_ancestors_visible() {
    let store = SidebarStore::default();
    store.add_annotations(vec![
        anchored("a", 0),
        reply("b", &["a"], "first"),
        reply("c", &["a", "b"], "second"),
        reply("d", &["a", "b", "c"], "the needle"),
        reply("x", &["a"], "unrelated"),
        anchored("e", 50),
    ]);
    store.set_filter_query(Some("needle".into()));

    let root = ThreadComposer::new().compose(&store.state());
    assert_eq!(top_level(&root), vec!["saved:a"]);

    for (id, depth) in [("a", 0), ("b", 1), ("c", 2), ("d", 3)] {
        let thread = root.find(&saved(id)).unwrap();
        assert!(thread.visible, "{} should be visible", id);
        assert_eq!(thread.depth, depth);
    }
    // Replies leading to the match are opened
    assert!(!root.find(&saved("b")).unwrap().collapsed);
    assert!(!root.find(&saved("c")).unwrap().collapsed);

    assert!(!root.find(&saved("x")).unwrap().visible);
    assert_eq!(root.hidden_count, 1);
    assert_eq!(root.visible_count, 4);
}

#[test]
fn test_composer_memoizes_on_inputs() {
    let store = SidebarStore::default();
    store.add_annotations(vec![anchored("a", 0), anchored("b", 10)]);
    let composer = ThreadComposer::new();

    let first = composer.compose(&store.state());
    let second = composer.compose(&store.state());
    assert!(Arc::ptr_eq(&first, &second));

    // Only the pending set changes
    store.receive_realtime_updates(RealtimeBatch {
        updated: vec![anchored("c", 20)],
        deleted: vec![],
    });
    let third = composer.compose(&store.state());
    assert!(Arc::ptr_eq(&first, &third));

    store.set_sort_key(SortKey::Newest);
    let fourth = composer.compose(&store.state());
    assert!(!Arc::ptr_eq(&first, &fourth));
}

#[test]
fn test_tab_filters_scope() {
    let store = SidebarStore::default();
    let mut orphan = anchored("o1", 30);
    orphan.orphan = Some(true);
    let mut note = Annotation::with_id("n1");
    note.text = Some("shared".into());
    let mut annotation = anchored("a1", 0);
    annotation.text = Some("shared".into());
    orphan.text = Some("shared".into());
    store.add_annotations(vec![annotation, note, orphan]);

    let composer = ThreadComposer::new();
    let sorted = |root: &Thread| {
        let mut ids = top_level(root);
        ids.sort();
        ids
    };

    assert_eq!(sorted(&composer.compose(&store.state())), vec!["saved:a1"]);

    store.select_tab(TabKind::Orphan);
    assert_eq!(sorted(&composer.compose(&store.state())), vec!["saved:o1"]);

    store.set_filter_query(Some("shared".into()));
    assert_eq!(
        sorted(&composer.compose(&store.state())),
        vec!["saved:a1", "saved:n1", "saved:o1"]
    );

    store.set_filter_query(None);
    store.set_surface(Surface::Stream);
    assert_eq!(composer.compose(&store.state()).children.len(), 3);
}

#[test]
fn test_window_of_composed_threads() {
    let store = SidebarStore::default();
    store.add_annotations((0..10).map(|n| anchored(&format!("a{}", n), n * 10)).collect());
    let root = ThreadComposer::new().compose(&store.state());
    assert_eq!(root.children.len(), 10);

    let mut calculator = WindowCalculator::new(WindowConfig::default());
    let window = calculator.calculate(&root, 600.0, 800.0);
    assert_eq!(window.visible, 0..10);
    assert_eq!(window.threads(&root).len(), 10);
    assert_eq!(calculator.y_offset_of(&root, &saved("a3")), 600.0);
}

#[tokio::test(start_paused = true)]
async fn test_window_tracker_debounces() {
    let annotations: Vec<_> = (0..30).map(|n| Arc::new(anchored(&format!("a{}", n), n))).collect();
    let root = Arc::new(build_thread(
        &annotations,
        &BuildThreadOptions::new(sorter(SortKey::Location)),
    ));

    let (tracker, handle) = WindowTracker::new(WindowConfig::default(), root, 500.0);
    assert_eq!(handle.window().visible, 0..7);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = tracker.spawn(shutdown_rx);
    let mut windows = handle.subscribe();

    assert_ok!(handle.scroll_to(1000.0));
    assert_ok!(handle.scroll_to(2000.0));
    // Rejected by the calculator, logged and skipped
    assert_ok!(handle.set_thread_height(saved("a0"), -5.0));
    let sent_at = Instant::now();

    assert_ok!(windows.changed().await);
    assert!(sent_at.elapsed() >= Duration::from_millis(20));
    let window = windows.borrow_and_update().clone();
    assert_eq!(window.visible, 5..17);
    assert_eq!(window.offscreen_above, 1000.0);

    shutdown_tx.send(()).unwrap();
    task.await.unwrap();
    assert!(matches!(handle.scroll_to(0.0), Err(ThreadError::TrackerStopped)));
}
