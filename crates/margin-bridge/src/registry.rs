//! Registry of connected content frames
//!
//! A frame is registered once its channel has answered `getDocumentInfo`.
//! The registry owns one channel per frame id, writes frame entries into
//! the store, and merges every channel's events into a single stream
//! tagged with the emitting frame.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use margin_core::{Frame, FrameId};
use margin_store::SidebarStore;

use crate::channel::{BridgeChannel, fetch_document_info};
use crate::error::{BridgeError, BridgeResult};
use crate::protocol::{BridgeCall, BridgeEvent, FrameEvent};

/// Source of channels to newly discovered frames
#[async_trait]
pub trait FrameDiscovery: Send {
    /// Wait for the next frame; `None` when discovery has ended
    async fn next_channel(&mut self) -> Option<Arc<dyn BridgeChannel>>;
}

#[async_trait]
impl FrameDiscovery for mpsc::Receiver<Arc<dyn BridgeChannel>> {
    async fn next_channel(&mut self) -> Option<Arc<dyn BridgeChannel>> {
        self.recv().await
    }
}

struct ChannelEntry {
    channel: Arc<dyn BridgeChannel>,
    /// Forwards this channel's events into the merged stream
    forwarder: JoinHandle<()>,
}

struct RegistryInner {
    store: SidebarStore,
    channels: DashMap<Option<FrameId>, ChannelEntry>,
    events_tx: broadcast::Sender<FrameEvent>,
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        for entry in self.channels.iter() {
            entry.forwarder.abort();
        }
    }
}

/// Connected frames and their channels
#[derive(Clone)]
pub struct FrameRegistry {
    inner: Arc<RegistryInner>,
}

impl FrameRegistry {
    pub fn new(store: SidebarStore, event_capacity: usize) -> Self {
        let (events_tx, _) = broadcast::channel(event_capacity);
        Self {
            inner: Arc::new(RegistryInner {
                store,
                channels: DashMap::new(),
                events_tx,
            }),
        }
    }

    pub fn store(&self) -> &SidebarStore {
        &self.inner.store
    }

    /// Merged stream of events from every connected frame
    pub fn events(&self) -> broadcast::Receiver<FrameEvent> {
        self.inner.events_tx.subscribe()
    }

    pub fn len(&self) -> usize {
        self.inner.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.channels.is_empty()
    }

    pub fn frame_ids(&self) -> Vec<Option<FrameId>> {
        self.inner.channels.iter().map(|e| e.key().clone()).collect()
    }

    pub fn is_connected(&self, frame_id: Option<&FrameId>) -> bool {
        self.inner.channels.contains_key(&frame_id.cloned())
    }

    /// Register the frame behind `channel`.
    ///
    /// The frame's document info is fetched first. If that fails the channel
    /// is destroyed and nothing is registered. A frame with the same id as
    /// an existing one replaces it.
    pub async fn connect(&self, channel: Arc<dyn BridgeChannel>) -> BridgeResult<Option<FrameId>> {
        let info = match fetch_document_info(channel.as_ref()).await {
            Ok(info) => info,
            Err(e) => {
                warn!(error = %e, "Failed to fetch document info, dropping channel");
                channel.destroy().await;
                return Err(e);
            }
        };

        let frame = Frame::from_document_info(info);
        let frame_id = frame.id.clone();

        if let Some((_, previous)) = self.inner.channels.remove(&frame_id) {
            previous.forwarder.abort();
            if !Arc::ptr_eq(&previous.channel, &channel) {
                previous.channel.destroy().await;
            }
            debug!(frame_id = ?frame_id, "Replacing existing frame channel");
        }

        let forwarder = self.spawn_forwarder(frame_id.clone(), channel.subscribe());
        self.inner
            .channels
            .insert(frame_id.clone(), ChannelEntry { channel, forwarder });

        info!(frame_id = ?frame_id, uri = %frame.uri, "Frame registered");
        self.inner.store.connect_frame(frame);
        Ok(frame_id)
    }

    /// Remove a frame and destroy its channel
    pub async fn disconnect(&self, frame_id: Option<&FrameId>) -> BridgeResult<()> {
        let key = frame_id.cloned();
        let (_, entry) = self
            .inner
            .channels
            .remove(&key)
            .ok_or_else(|| BridgeError::FrameNotConnected(describe(frame_id)))?;

        entry.forwarder.abort();
        entry.channel.destroy().await;

        if let Err(e) = self.inner.store.destroy_frame(frame_id) {
            debug!(error = %e, "Frame had no store entry");
        }
        info!(frame_id = ?frame_id, "Frame disconnected");
        Ok(())
    }

    /// Call a method in one frame
    pub async fn call(&self, frame_id: Option<&FrameId>, call: BridgeCall) -> BridgeResult<Option<Value>> {
        let channel = self
            .channel(frame_id)
            .ok_or_else(|| BridgeError::FrameNotConnected(describe(frame_id)))?;
        channel.call(call).await
    }

    /// Call a method in every frame; failures are logged and skipped
    pub async fn call_all(&self, call: BridgeCall) -> usize {
        let channels: Vec<_> = self
            .inner
            .channels
            .iter()
            .map(|e| (e.key().clone(), e.channel.clone()))
            .collect();

        let mut delivered = 0;
        for (frame_id, channel) in channels {
            match channel.call(call.clone()).await {
                Ok(_) => delivered += 1,
                Err(e) => warn!(frame_id = ?frame_id, method = call.method(), error = %e, "Bridge call failed"),
            }
        }
        delivered
    }

    fn channel(&self, frame_id: Option<&FrameId>) -> Option<Arc<dyn BridgeChannel>> {
        self.inner
            .channels
            .get(&frame_id.cloned())
            .map(|e| e.channel.clone())
    }

    fn spawn_forwarder(
        &self,
        frame_id: Option<FrameId>,
        mut rx: broadcast::Receiver<BridgeEvent>,
    ) -> JoinHandle<()> {
        let events_tx = self.inner.events_tx.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let _ = events_tx.send(FrameEvent {
                            frame_id: frame_id.clone(),
                            event,
                        });
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(frame_id = ?frame_id, skipped, "Frame event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Connect every channel `discovery` yields until it ends or shutdown
    pub fn spawn_discovery<D>(
        &self,
        mut discovery: D,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()>
    where
        D: FrameDiscovery + 'static,
    {
        let registry = self.clone();
        tokio::spawn(async move {
            info!("Frame discovery started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Frame discovery shutting down");
                        break;
                    }
                    next = discovery.next_channel() => {
                        let Some(channel) = next else {
                            debug!("Frame discovery ended");
                            break;
                        };
                        let registry = registry.clone();
                        tokio::spawn(async move {
                            // Failure is logged by connect; the channel is already gone.
                            let _ = registry.connect(channel).await;
                        });
                    }
                }
            }
        })
    }
}

fn describe(frame_id: Option<&FrameId>) -> String {
    frame_id.map_or_else(|| "main".to_string(), |id| id.to_string())
}
