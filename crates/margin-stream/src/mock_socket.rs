//! Mock sockets for testing
//!
//! [`MockConnector`] hands out [`MockSocket`]s that record what the client
//! sends. Tests push server frames through the socket's handle and can
//! delay or fail individual connection attempts, or slow down a socket's
//! sends.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use crate::error::{StreamError, StreamResult};
use crate::socket::{Socket, SocketConnector, SocketEvent};

/// An in-memory socket
pub struct MockSocket {
    url: Url,
    sent: Mutex<Vec<String>>,
    open: AtomicBool,
    /// Time each `send` takes
    send_delay: Option<Duration>,
    events_tx: mpsc::UnboundedSender<SocketEvent>,
}

impl MockSocket {
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Frames sent by the client, in order
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Sent frames parsed as JSON
    pub fn sent_json(&self) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .filter_map(|text| serde_json::from_str(text).ok())
            .collect()
    }

    /// Deliver a frame as if the server sent it
    pub fn push_message(&self, message: Value) {
        let _ = self.events_tx.send(SocketEvent::Message(message.to_string()));
    }

    /// Drop the connection abnormally
    pub fn drop_connection(&self) {
        self.open.store(false, Ordering::SeqCst);
        let _ = self.events_tx.send(SocketEvent::Closed { normal: false });
    }
}

#[async_trait]
impl Socket for MockSocket {
    async fn send(&self, text: String) -> StreamResult<()> {
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }
        if !self.is_open() {
            return Err(StreamError::NotConnected);
        }
        self.sent.lock().push(text);
        Ok(())
    }

    async fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            let _ = self.events_tx.send(SocketEvent::Closed { normal: true });
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Connector producing [`MockSocket`]s
#[derive(Default)]
pub struct MockConnector {
    sockets: Mutex<Vec<Arc<MockSocket>>>,
    /// Delay applied to upcoming attempts, front first
    delays: Mutex<VecDeque<Duration>>,
    send_delay_next: Mutex<Option<Duration>>,
    fail_next: AtomicBool,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every socket opened so far
    pub fn sockets(&self) -> Vec<Arc<MockSocket>> {
        self.sockets.lock().clone()
    }

    pub fn last_socket(&self) -> Option<Arc<MockSocket>> {
        self.sockets.lock().last().cloned()
    }

    /// Make the next attempt take `delay` before it opens
    pub fn delay_next(&self, delay: Duration) {
        self.delays.lock().push_back(delay);
    }

    /// Make every send on the next socket take `delay`
    pub fn slow_sends_next(&self, delay: Duration) {
        *self.send_delay_next.lock() = Some(delay);
    }

    /// Make the next attempt fail
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SocketConnector for MockConnector {
    async fn connect(
        &self,
        url: &Url,
    ) -> StreamResult<(Arc<dyn Socket>, mpsc::UnboundedReceiver<SocketEvent>)> {
        let delay = self.delays.lock().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StreamError::WebSocket("connection refused".into()));
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let socket = Arc::new(MockSocket {
            url: url.clone(),
            sent: Mutex::new(Vec::new()),
            open: AtomicBool::new(true),
            send_delay: self.send_delay_next.lock().take(),
            events_tx,
        });
        self.sockets.lock().push(Arc::clone(&socket));
        Ok((socket, events_rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_socket_records_and_delivers() {
        let connector = MockConnector::new();
        let url = Url::parse("ws://localhost/ws").unwrap();
        let (socket, mut events) = connector.connect(&url).await.unwrap();

        socket.send("hello".into()).await.unwrap();
        let mock = connector.last_socket().unwrap();
        assert_eq!(mock.sent(), vec!["hello".to_string()]);

        mock.push_message(json!({ "type": "whoyouare" }));
        assert!(matches!(events.recv().await, Some(SocketEvent::Message(_))));

        socket.close().await;
        assert_eq!(events.recv().await, Some(SocketEvent::Closed { normal: true }));
        assert!(socket.send("late".into()).await.is_err());
    }

    #[tokio::test]
    async fn test_fail_next() {
        let connector = MockConnector::new();
        let url = Url::parse("ws://localhost/ws").unwrap();
        connector.fail_next();
        assert!(connector.connect(&url).await.is_err());
        assert!(connector.connect(&url).await.is_ok());
    }
}
