//! Integration tests for the frame registry
//!
//! 1. **test_connect_registers_frame**: Document info lands in the store
//! 2. **test_failed_document_info_destroys_channel**: Nothing registered on failure
//! 3. **test_reconnect_same_id_replaces**: One entry per frame id
//! 4. **test_events_are_tagged_with_frame**: Merged stream carries the frame id
//! 5. **test_disconnect**: Channel destroyed and store entry removed
//! 6. **test_discovery_connects_channels**: Discovered channels get registered

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio_test::assert_ok;

use margin_bridge::{
    BridgeCall, BridgeChannel, BridgeError, BridgeEvent, FrameRegistry, MockChannel,
};
use margin_core::{FrameId, Tag};
use margin_store::SidebarStore;

fn registry() -> (SidebarStore, FrameRegistry) {
    let store = SidebarStore::default();
    let registry = FrameRegistry::new(store.clone(), 64);
    (store, registry)
}

#[tokio::test]
async fn test_connect_registers_frame() {
    let (store, registry) = registry();
    let channel = Arc::new(MockChannel::for_uri("http://example.com", None));

    let frame_id = assert_ok!(registry.connect(channel.clone()).await);
    assert_eq!(frame_id, None);
    assert!(registry.is_connected(None));

    let state = store.state();
    assert_eq!(state.frames.len(), 1);
    let frame = state.frames.main_frame().unwrap();
    assert_eq!(frame.uri, "http://example.com");
    assert_eq!(frame.search_uris, vec!["http://example.com".to_string()]);
    assert_eq!(channel.calls_to("getDocumentInfo").len(), 1);
}

#[tokio::test]
async fn test_failed_document_info_destroys_channel() {
    let (store, registry) = registry();
    let channel = Arc::new(MockChannel::failing());

    let result = registry.connect(channel.clone()).await;
    assert!(matches!(result, Err(BridgeError::CallFailed { .. })));
    assert!(channel.is_destroyed());
    assert!(registry.is_empty());
    assert!(store.state().frames.is_empty());
}

#[tokio::test]
async fn test_reconnect_same_id_replaces() {
    let (store, registry) = registry();
    let first = Arc::new(MockChannel::for_uri("http://a.com", Some("f1")));
    let second = Arc::new(MockChannel::for_uri("http://b.com", Some("f1")));

    assert_ok!(registry.connect(first.clone()).await);
    assert_ok!(registry.connect(second.clone()).await);

    assert_eq!(registry.len(), 1);
    assert!(first.is_destroyed());
    assert!(!second.is_destroyed());

    let state = store.state();
    assert_eq!(state.frames.len(), 1);
    assert_eq!(state.frames.get(Some(&FrameId::from("f1"))).unwrap().uri, "http://b.com");
}

#[tokio::test]
async fn test_events_are_tagged_with_frame() {
    let (_store, registry) = registry();
    let mut events = registry.events();
    let channel = Arc::new(MockChannel::for_uri("http://a.com", Some("f1")));
    assert_ok!(registry.connect(channel.clone()).await);

    channel.emit(BridgeEvent::ShowAnnotations(vec![Tag::from("t1")]));

    let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("event not forwarded")
        .unwrap();
    assert_eq!(event.frame_id, Some(FrameId::from("f1")));
    assert_eq!(event.event, BridgeEvent::ShowAnnotations(vec![Tag::from("t1")]));
}

#[tokio::test]
async fn test_call_and_call_all() {
    let (_store, registry) = registry();
    let main = Arc::new(MockChannel::for_uri("http://a.com", None));
    let sub = Arc::new(MockChannel::for_uri("http://b.com", Some("f2")));
    assert_ok!(registry.connect(main.clone()).await);
    assert_ok!(registry.connect(sub.clone()).await);

    registry
        .call(Some(&FrameId::from("f2")), BridgeCall::ScrollToAnnotation(Tag::from("t1")))
        .await
        .unwrap();
    assert_eq!(sub.calls_to("scrollToAnnotation").len(), 1);
    assert!(main.calls_to("scrollToAnnotation").is_empty());

    sub.fail_method("deleteAnnotation", "gone");
    let delivered = registry
        .call_all(BridgeCall::DeleteAnnotation(Tag::from("t1")))
        .await;
    assert_eq!(delivered, 1);

    let missing = registry
        .call(Some(&FrameId::from("nope")), BridgeCall::GetDocumentInfo)
        .await;
    assert!(matches!(missing, Err(BridgeError::FrameNotConnected(_))));
}

#[tokio::test]
async fn test_disconnect() {
    let (store, registry) = registry();
    let channel = Arc::new(MockChannel::for_uri("http://a.com", Some("f1")));
    assert_ok!(registry.connect(channel.clone()).await);

    registry.disconnect(Some(&FrameId::from("f1"))).await.unwrap();
    assert!(channel.is_destroyed());
    assert!(registry.is_empty());
    assert!(store.state().frames.is_empty());

    assert!(registry.disconnect(Some(&FrameId::from("f1"))).await.is_err());
}

#[tokio::test]
async fn test_discovery_connects_channels() {
    let (store, registry) = registry();
    let (found_tx, found_rx) = mpsc::channel::<Arc<dyn BridgeChannel>>(4);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let handle = registry.spawn_discovery(found_rx, shutdown_rx);
    found_tx
        .send(Arc::new(MockChannel::for_uri("http://a.com", None)))
        .await
        .unwrap();

    let mut state_rx = store.subscribe();
    tokio::time::timeout(Duration::from_secs(1), async {
        while state_rx.borrow_and_update().frames.is_empty() {
            state_rx.changed().await.unwrap();
        }
    })
    .await
    .expect("frame never registered");

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();
    assert_eq!(registry.len(), 1);
}
