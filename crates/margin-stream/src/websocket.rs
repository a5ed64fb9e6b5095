//! tokio-tungstenite socket implementation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};
use url::Url;

use crate::error::{StreamError, StreamResult};
use crate::socket::{Socket, SocketConnector, SocketEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;

/// Opens real websockets
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl SocketConnector for WebSocketConnector {
    async fn connect(
        &self,
        url: &Url,
    ) -> StreamResult<(Arc<dyn Socket>, mpsc::UnboundedReceiver<SocketEvent>)> {
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(StreamError::InvalidUrl(format!(
                "URL must use ws:// or wss:// scheme, got: {}",
                url.scheme()
            )));
        }

        let (stream, _response) = timeout(self.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| StreamError::Timeout(self.connect_timeout))?
            .map_err(|e| StreamError::WebSocket(e.to_string()))?;

        let (writer, mut reader) = stream.split();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(true));
        let closing = Arc::new(AtomicBool::new(false));

        let reader_open = Arc::clone(&open);
        let reader_closing = Arc::clone(&closing);
        let host = url.host_str().unwrap_or_default().to_string();
        let reader_task = tokio::spawn(async move {
            let mut normal = false;
            while let Some(frame) = reader.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if events_tx.send(SocketEvent::Message(text.to_string())).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        normal = frame.is_none_or(|f| {
                            matches!(f.code, CloseCode::Normal | CloseCode::Away)
                        });
                        break;
                    }
                    Ok(Message::Ping(payload)) => {
                        debug!(host = %host, bytes = payload.len(), "Websocket ping");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(host = %host, error = %e, "Websocket read error");
                        let _ = events_tx.send(SocketEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
            reader_open.store(false, Ordering::SeqCst);
            let normal = normal || reader_closing.load(Ordering::SeqCst);
            let _ = events_tx.send(SocketEvent::Closed { normal });
        });

        let socket = WebSocket {
            writer: Mutex::new(Some(writer)),
            open,
            closing,
            reader_task,
        };
        Ok((Arc::new(socket), events_rx))
    }
}

/// One open websocket
pub struct WebSocket {
    writer: Mutex<Option<WsWriter>>,
    open: Arc<AtomicBool>,
    /// Set once we start a close, so the reader reports it as normal
    closing: Arc<AtomicBool>,
    reader_task: JoinHandle<()>,
}

#[async_trait]
impl Socket for WebSocket {
    async fn send(&self, text: String) -> StreamResult<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(StreamError::NotConnected)?;
        writer
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| StreamError::WebSocket(e.to_string()))
    }

    async fn close(&self) {
        self.closing.store(true, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
        if let Some(mut writer) = self.writer.lock().await.take() {
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            };
            if let Err(e) = writer.send(Message::Close(Some(frame))).await {
                debug!(error = %e, "Close frame not sent");
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Drop for WebSocket {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}
