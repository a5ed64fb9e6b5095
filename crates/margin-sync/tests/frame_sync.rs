//! Integration tests for frame synchronization
//!
//! 1. **test_load_then_delete**: One load for a new tag, one delete when it goes
//! 2. **test_saved_version_not_pushed_again**: Gaining a server id is not a new annotation
//! 3. **test_replies_never_reach_frames**: Replies stay in the sidebar
//! 4. **test_create_while_logged_out**: Retracted from frames, login requested
//! 5. **test_create_while_logged_in**: Added to the store, not loaded twice
//! 6. **test_anchor_statuses_batched**: Sync events coalesce into one write
//! 7. **test_show_and_toggle_selection**: Tags translate to selected ids
//! 8. **test_scroll_to_annotation**: Routed to the annotation's frame
//! 9. **test_background_task_times_out_anchoring**: Deadline flags stuck annotations
//! 10. **test_background_task_skips_anchored**: Anchored in time, never flagged

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_test::assert_ok;

use margin_bridge::{
    AnchorReport, BridgeCall, BridgeChannel, BridgeEvent, FrameEvent, FrameRegistry, MockChannel,
};
use margin_core::{
    AnchorStatus, Annotation, AnnotationId, Identity, Selector, SidebarEvent, Tag, Target,
};
use margin_store::{Profile, SidebarStore, TabKind};
use margin_sync::{FrameSynchronizer, SyncConfig, SyncError};

const URI: &str = "http://example.com";

async fn setup() -> (SidebarStore, Arc<MockChannel>, FrameSynchronizer) {
    let store = SidebarStore::default();
    let registry = FrameRegistry::new(store.clone(), 64);
    let channel = Arc::new(MockChannel::for_uri(URI, None));
    assert_ok!(registry.connect(channel.clone()).await);
    let sync = FrameSynchronizer::new(registry, SyncConfig::default());
    (store, channel, sync)
}

fn annotation(tag: &str) -> Annotation {
    Annotation {
        uri: Some(URI.to_string()),
        target: vec![Target::new(URI)],
        ..Annotation::with_tag(tag)
    }
}

fn anchored_annotation(id: &str) -> Annotation {
    let selector = Selector::TextQuoteSelector {
        exact: "quoted".to_string(),
        prefix: None,
        suffix: None,
    };
    Annotation {
        uri: Some(URI.to_string()),
        target: vec![Target::new(URI).with_selectors(vec![selector])],
        ..Annotation::with_id(id)
    }
}

fn frame_event(event: BridgeEvent) -> FrameEvent {
    FrameEvent {
        frame_id: None,
        event,
    }
}

fn drain(rx: &mut broadcast::Receiver<SidebarEvent>) -> Vec<SidebarEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_load_then_delete() {
    margin_logging::init_testing();
    let (store, channel, mut sync) = setup().await;

    store.add_annotations(vec![annotation("t1")]);
    sync.sync_frames().await;

    let loads = channel.calls_to("loadAnnotations");
    assert_eq!(loads.len(), 1);
    match &loads[0] {
        BridgeCall::LoadAnnotations(data) => {
            assert_eq!(data.len(), 1);
            assert_eq!(data[0].tag, Tag::from("t1"));
            assert_eq!(data[0].uri.as_deref(), Some(URI));
        }
        other => panic!("unexpected call {:?}", other),
    }
    assert!(sync.loaded_tags().contains(&Tag::from("t1")));

    // Unchanged store: nothing sent
    assert!(sync.sync_frames().await.is_empty());

    store.remove_annotations(&[Identity::Local(Tag::from("t1"))]);
    sync.sync_frames().await;

    assert_eq!(
        channel.calls_to("deleteAnnotation"),
        vec![BridgeCall::DeleteAnnotation(Tag::from("t1"))]
    );
    assert_eq!(channel.calls_to("loadAnnotations").len(), 1);
    assert!(sync.loaded_tags().is_empty());
}

#[tokio::test]
async fn test_saved_version_not_pushed_again() {
    let (store, channel, mut sync) = setup().await;
    store.add_annotations(vec![annotation("t1")]);
    sync.sync_frames().await;
    assert_eq!(channel.calls_to("loadAnnotations").len(), 1);

    let saved = Annotation {
        id: Some(AnnotationId::from("a1")),
        ..annotation("t1")
    };
    let edited = Annotation {
        uri: Some(URI.to_string()),
        target: vec![Target::new(URI)],
        text: Some("edited".to_string()),
        ..Annotation::with_id("a1")
    };
    store.add_annotations(vec![saved, edited]);
    sync.sync_frames().await;

    let state = store.state();
    assert_eq!(state.annotations.len(), 1);
    let stored = state.annotations.find_by_tag(&Tag::from("t1")).unwrap();
    assert_eq!(stored.id, Some(AnnotationId::from("a1")));
    assert_eq!(stored.text.as_deref(), Some("edited"));

    assert_eq!(channel.calls_to("loadAnnotations").len(), 1);
    assert!(channel.calls_to("deleteAnnotation").is_empty());
    assert!(sync.loaded_tags().contains(&Tag::from("t1")));
}

#[tokio::test]
async fn test_replies_never_reach_frames() {
    let (store, channel, mut sync) = setup().await;

    let reply = Annotation {
        references: vec![AnnotationId::from("parent")],
        ..annotation("t2")
    };
    store.add_annotations(vec![reply]);
    sync.sync_frames().await;

    assert!(channel.calls_to("loadAnnotations").is_empty());
}

#[tokio::test]
async fn test_create_while_logged_out() {
    let (store, channel, mut sync) = setup().await;
    let mut events = store.events().subscribe();

    sync.handle_frame_event(frame_event(BridgeEvent::BeforeCreateAnnotation {
        tag: Tag::from("t5"),
        msg: annotation("ignored"),
    }))
    .await;

    assert_eq!(
        channel.calls_to("deleteAnnotation"),
        vec![BridgeCall::DeleteAnnotation(Tag::from("t5"))]
    );
    assert!(store.state().annotations.is_empty());
    assert!(!sync.loaded_tags().contains(&Tag::from("t5")));
    assert!(drain(&mut events).contains(&SidebarEvent::LoginRequired));
}

#[tokio::test]
async fn test_create_while_logged_in() {
    let (store, channel, mut sync) = setup().await;
    store.update_profile(Profile::logged_in("acct:reader@example.com"));
    let mut events = store.events().subscribe();

    sync.handle_frame_event(frame_event(BridgeEvent::BeforeCreateAnnotation {
        tag: Tag::from("t5"),
        msg: Annotation {
            tag: None,
            ..annotation("unused")
        },
    }))
    .await;

    assert!(store.state().annotations.find_by_tag(&Tag::from("t5")).is_some());

    let events = drain(&mut events);
    assert!(events.contains(&SidebarEvent::AnnotationCreated {
        tag: Tag::from("t5"),
        highlight: false,
    }));
    assert!(events.contains(&SidebarEvent::OpenSidebar));

    // The frame made it, so it is never loaded back
    sync.sync_frames().await;
    assert!(channel.calls_to("loadAnnotations").is_empty());
}

#[tokio::test]
async fn test_highlight_does_not_open_sidebar() {
    let (store, _channel, mut sync) = setup().await;
    store.update_profile(Profile::logged_in("acct:reader@example.com"));
    let mut events = store.events().subscribe();

    sync.handle_frame_event(frame_event(BridgeEvent::BeforeCreateAnnotation {
        tag: Tag::from("t6"),
        msg: Annotation {
            highlight: true,
            ..annotation("unused")
        },
    }))
    .await;

    let events = drain(&mut events);
    assert!(events.contains(&SidebarEvent::AnnotationCreated {
        tag: Tag::from("t6"),
        highlight: true,
    }));
    assert!(!events.contains(&SidebarEvent::OpenSidebar));
}

#[tokio::test]
async fn test_anchor_statuses_batched() {
    let (store, _channel, mut sync) = setup().await;
    store.add_annotations(vec![
        Annotation {
            id: Some(AnnotationId::from("a1")),
            ..annotation("t1")
        },
        Annotation {
            id: Some(AnnotationId::from("a2")),
            ..annotation("t2")
        },
    ]);
    let mut events = store.events().subscribe();

    sync.handle_frame_event(frame_event(BridgeEvent::Sync(vec![AnchorReport::new("t1", true)])))
        .await;
    sync.handle_frame_event(frame_event(BridgeEvent::Sync(vec![AnchorReport::new("t2", false)])))
        .await;
    assert_eq!(sync.flush_anchor_statuses(), 2);
    assert_eq!(sync.flush_anchor_statuses(), 0);

    let state = store.state();
    assert_eq!(state.annotations.find_by_tag(&Tag::from("t1")).unwrap().orphan, Some(true));
    assert_eq!(state.annotations.find_by_tag(&Tag::from("t2")).unwrap().orphan, Some(false));

    assert_eq!(
        drain(&mut events),
        vec![SidebarEvent::AnchoringSynced {
            statuses: vec![
                (Tag::from("t1"), AnchorStatus::Orphan),
                (Tag::from("t2"), AnchorStatus::Anchored),
            ],
        }]
    );
}

#[tokio::test]
async fn test_show_and_toggle_selection() {
    let (store, _channel, mut sync) = setup().await;
    store.add_annotations(vec![anchored_annotation("a1"), anchored_annotation("a2")]);
    let tag = store
        .state()
        .annotations
        .find_by_id(&AnnotationId::from("a1"))
        .and_then(|a| a.tag.clone())
        .unwrap();
    store.select_tab(TabKind::Orphan);

    sync.handle_frame_event(frame_event(BridgeEvent::ShowAnnotations(vec![tag.clone()])))
        .await;
    let selection = store.state().selection;
    assert!(selection.is_selected(&Identity::Saved(AnnotationId::from("a1"))));
    assert_eq!(selection.selected_tab, TabKind::Annotation);

    sync.handle_frame_event(frame_event(BridgeEvent::ToggleAnnotationSelection(vec![tag])))
        .await;
    assert!(!store.state().selection.has_selection());
}

#[tokio::test]
async fn test_close_disconnects_frame() {
    let (store, channel, mut sync) = setup().await;

    sync.handle_frame_event(frame_event(BridgeEvent::Close)).await;

    assert!(channel.is_destroyed());
    assert!(store.state().frames.is_empty());
}

#[tokio::test]
async fn test_scroll_to_annotation() {
    let (_store, channel, sync) = setup().await;
    let handle = sync.handle();

    assert_ok!(handle.scroll_to_annotation(&annotation("t1")).await);
    assert_eq!(
        channel.calls_to("scrollToAnnotation"),
        vec![BridgeCall::ScrollToAnnotation(Tag::from("t1"))]
    );

    let untagged = Annotation {
        tag: None,
        ..annotation("t1")
    };
    assert!(matches!(
        handle.scroll_to_annotation(&untagged).await,
        Err(SyncError::Untagged)
    ));

    assert_eq!(handle.focus_annotations(&[Tag::from("t1")]).await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_background_task_times_out_anchoring() {
    let (store, channel, sync) = setup().await;
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = sync.spawn(shutdown_rx);

    store.add_annotations(vec![anchored_annotation("a1")]);

    let mut state_rx = store.subscribe();
    let timed_out = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let done = state_rx
                .borrow_and_update()
                .annotations
                .find_by_id(&AnnotationId::from("a1"))
                .is_some_and(|a| a.anchor_timeout);
            if done {
                break;
            }
            state_rx.changed().await.unwrap();
        }
    })
    .await;
    assert_ok!(timed_out);
    assert_eq!(channel.calls_to("loadAnnotations").len(), 1);

    shutdown_tx.send(()).unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_background_task_skips_anchored() {
    let (store, _channel, sync) = setup().await;
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = sync.spawn(shutdown_rx);

    store.add_annotations(vec![anchored_annotation("a1")]);
    tokio::task::yield_now().await;
    let tag = store
        .state()
        .annotations
        .find_by_id(&AnnotationId::from("a1"))
        .and_then(|a| a.tag.clone())
        .unwrap();
    store.update_anchor_status(&HashMap::from([(tag, AnchorStatus::Anchored)]));

    tokio::time::sleep(Duration::from_secs(1)).await;
    let state = store.state();
    let annotation = state.annotations.find_by_id(&AnnotationId::from("a1")).unwrap();
    assert!(!annotation.anchor_timeout);
    assert_eq!(annotation.orphan, Some(false));

    shutdown_tx.send(()).unwrap();
    task.await.unwrap();
}
