//! Realtime streamer
//!
//! Keeps one socket open to the realtime service. Each time a socket opens
//! the client's configuration messages are sent on it. Incoming
//! notifications are handed to the store, which buffers or drops them
//! according to the current surface.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use margin_core::SidebarEvent;
use margin_store::{AppliedUpdates, SidebarStore};

use crate::config::StreamerConfig;
use crate::error::{StreamError, StreamResult};
use crate::protocol::{AUTH_CHECK_KEY, CLIENT_ID_KEY, ClientMessage, ServerMessage};
use crate::socket::{Socket, SocketConnector, SocketEvent};

/// Supplies the token used to authenticate the socket
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// `None` when the user is not logged in
    async fn access_token(&self) -> StreamResult<Option<String>>;
}

/// A fixed token, or none
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

#[async_trait]
impl AccessTokenProvider for StaticToken {
    async fn access_token(&self) -> StreamResult<Option<String>> {
        Ok(self.0.clone())
    }
}

struct ActiveSocket {
    socket: Arc<dyn Socket>,
    generation: u64,
    pump: JoinHandle<()>,
}

struct StreamerInner {
    store: SidebarStore,
    config: StreamerConfig,
    connector: Arc<dyn SocketConnector>,
    tokens: Arc<dyn AccessTokenProvider>,
    client_id: String,
    /// Keyed config messages in first-set order, resent on every open
    config_messages: Mutex<Vec<(String, Value)>>,
    current: Mutex<Option<ActiveSocket>>,
    /// Bumped by every connection attempt
    generation: AtomicU64,
    started: AtomicBool,
    warned_types: Mutex<HashSet<String>>,
    shutdown_tx: broadcast::Sender<()>,
}

/// Handle to the realtime connection
#[derive(Clone)]
pub struct Streamer {
    inner: Arc<StreamerInner>,
}

impl Streamer {
    pub fn new(
        store: SidebarStore,
        config: StreamerConfig,
        connector: Arc<dyn SocketConnector>,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        let client_id = hex::encode(rand::random::<[u8; 16]>());
        let config_messages = vec![
            (
                CLIENT_ID_KEY.to_string(),
                ClientMessage::ClientId(client_id.clone()).to_json(),
            ),
            (AUTH_CHECK_KEY.to_string(), ClientMessage::WhoAmI.to_json()),
        ];
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            inner: Arc::new(StreamerInner {
                store,
                config,
                connector,
                tokens,
                client_id,
                config_messages: Mutex::new(config_messages),
                current: Mutex::new(None),
                generation: AtomicU64::new(0),
                started: AtomicBool::new(false),
                warned_types: Mutex::new(HashSet::new()),
                shutdown_tx,
            }),
        }
    }

    /// Random 32-character hex id identifying this client to the service
    pub fn client_id(&self) -> &str {
        &self.inner.client_id
    }

    pub fn is_connected(&self) -> bool {
        self.inner
            .current
            .lock()
            .as_ref()
            .is_some_and(|active| active.socket.is_open())
    }

    /// Open the socket unless one already exists
    pub async fn connect(&self) -> StreamResult<()> {
        self.inner.started.store(true, Ordering::SeqCst);
        if self.inner.current.lock().is_some() {
            return Ok(());
        }
        self.reconnect().await
    }

    /// Open a fresh socket, then close the previous one.
    ///
    /// If a newer attempt starts before this one has opened and sent its
    /// configuration, this one's socket is closed instead of installed.
    pub async fn reconnect(&self) -> StreamResult<()> {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let Some(url) = self.socket_url().await? else {
            debug!("No websocket URL configured, streamer disabled");
            return Ok(());
        };

        let (socket, events) = self.inner.connector.connect(&url).await?;
        if self.is_superseded(generation) {
            debug!(generation, "Connection attempt superseded, closing it");
            socket.close().await;
            return Ok(());
        }

        self.send_client_config(socket.as_ref()).await;

        // A newer attempt may have started while the configuration was sent
        let previous = {
            let mut current = self.inner.current.lock();
            if self.is_superseded(generation) {
                None
            } else {
                let pump = self.spawn_pump(generation, events);
                Some(current.replace(ActiveSocket {
                    socket: Arc::clone(&socket),
                    generation,
                    pump,
                }))
            }
        };
        let Some(previous) = previous else {
            debug!(generation, "Connection attempt superseded during handshake, closing it");
            socket.close().await;
            return Ok(());
        };
        if let Some(previous) = previous {
            previous.pump.abort();
            previous.socket.close().await;
        }
        info!(host = url.host_str().unwrap_or_default(), generation, "Realtime socket open");
        Ok(())
    }

    /// Close the socket and stop its event pump
    pub async fn disconnect(&self) {
        let _ = self.inner.shutdown_tx.send(());
        let current = self.inner.current.lock().take();
        if let Some(active) = current {
            active.socket.close().await;
        }
    }

    /// Set a keyed configuration message, sending it now if the socket is open
    pub async fn set_config(&self, key: impl Into<String>, message: Value) -> StreamResult<()> {
        let key = key.into();
        {
            let mut messages = self.inner.config_messages.lock();
            match messages.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = message.clone(),
                None => messages.push((key, message.clone())),
            }
        }
        let socket = self.current_socket();
        match socket {
            Some(socket) if socket.is_open() => socket.send(message.to_string()).await,
            _ => Ok(()),
        }
    }

    /// Apply every buffered realtime update to the loaded annotations
    pub fn apply_pending_updates(&self) -> AppliedUpdates {
        self.inner.store.apply_pending_updates()
    }

    /// Reconnect whenever the logged-in user changes.
    ///
    /// Only reconnects once [`connect`](Self::connect) has been called.
    pub fn watch_session(&self, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let streamer = self.clone();
        let mut state_rx = self.inner.store.subscribe();
        let mut userid = state_rx.borrow().session.profile.userid.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    changed = state_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let current = state_rx.borrow_and_update().session.profile.userid.clone();
                        if current == userid {
                            continue;
                        }
                        userid = current;
                        if !streamer.inner.started.load(Ordering::SeqCst) {
                            continue;
                        }
                        info!(userid = ?userid, "User changed, reconnecting realtime socket");
                        if let Err(e) = streamer.reconnect().await {
                            warn!(error = %e, "Realtime reconnect failed");
                        }
                    }
                }
            }
        })
    }

    fn is_superseded(&self, generation: u64) -> bool {
        self.inner.generation.load(Ordering::SeqCst) != generation
    }

    fn current_socket(&self) -> Option<Arc<dyn Socket>> {
        self.inner
            .current
            .lock()
            .as_ref()
            .map(|active| Arc::clone(&active.socket))
    }

    async fn socket_url(&self) -> StreamResult<Option<Url>> {
        let Some(base) = &self.inner.config.websocket_url else {
            return Ok(None);
        };
        let mut url = Url::parse(base)?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(StreamError::InvalidUrl(base.clone()));
        }
        if let Some(token) = self.inner.tokens.access_token().await? {
            set_query_param(&mut url, "access_token", &token);
        }
        Ok(Some(url))
    }

    async fn send_client_config(&self, socket: &dyn Socket) {
        let messages: Vec<Value> = self
            .inner
            .config_messages
            .lock()
            .iter()
            .map(|(_, message)| message.clone())
            .collect();
        for message in messages {
            if let Err(e) = socket.send(message.to_string()).await {
                warn!(error = %e, "Failed to send client configuration");
            }
        }
    }

    fn spawn_pump(
        &self,
        generation: u64,
        mut events: mpsc::UnboundedReceiver<SocketEvent>,
    ) -> JoinHandle<()> {
        let streamer = self.clone();
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    event = events.recv() => match event {
                        Some(SocketEvent::Message(text)) => streamer.handle_message(&text),
                        Some(SocketEvent::Error(error)) => {
                            warn!(%error, "Realtime socket error");
                        }
                        Some(SocketEvent::Closed { normal }) => {
                            streamer.handle_close(generation, normal);
                            break;
                        }
                        None => break,
                    },
                }
            }
        })
    }

    fn handle_close(&self, generation: u64, normal: bool) {
        let mut current = self.inner.current.lock();
        if current.as_ref().is_none_or(|active| active.generation != generation) {
            return;
        }
        *current = None;
        drop(current);
        if !normal {
            warn!(generation, "Realtime socket closed unexpectedly");
            self.inner
                .store
                .events()
                .publish(SidebarEvent::StreamDisconnected);
        }
    }

    fn handle_message(&self, text: &str) {
        let message = match ServerMessage::parse(text) {
            Ok(Some(message)) => message,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "Unparseable realtime message");
                return;
            }
        };

        let store = &self.inner.store;
        match message {
            ServerMessage::AnnotationNotification { options, payload } => {
                debug!(action = ?options.action, count = payload.len(), "Annotation notification");
                store.receive_realtime_updates(options.action.into_batch(payload));
                if !store.state().session.is_sidebar() {
                    store.apply_pending_updates();
                }
            }
            ServerMessage::SessionChange { model } => store.update_profile(model),
            ServerMessage::WhoYouAre { userid } => {
                let state = store.state();
                let expected = state.session.userid();
                if userid.as_deref() != expected {
                    warn!(
                        socket_user = ?userid,
                        store_user = ?expected,
                        "Realtime socket user does not match logged-in user"
                    );
                }
            }
            ServerMessage::Unsupported(kind) => {
                if self.inner.warned_types.lock().insert(kind.clone()) {
                    warn!(message_type = %kind, "Received unsupported notification");
                }
            }
        }
    }
}

/// Set `key` in the query string, keeping every other parameter
fn set_query_param(url: &mut Url, key: &str, value: &str) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k.as_ref() != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let mut pairs = url.query_pairs_mut();
    pairs.clear();
    for (k, v) in &kept {
        pairs.append_pair(k, v);
    }
    pairs.append_pair(key, value);
}
