//! Socket abstraction
//!
//! The streamer talks to the realtime service through these traits. The
//! production implementation lives in [`websocket`](crate::websocket); tests
//! use [`MockConnector`](crate::MockConnector).

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use crate::error::StreamResult;

/// Something that happened on an open socket
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    /// A text frame arrived
    Message(String),
    /// A transport error; a `Closed` event follows if the socket died
    Error(String),
    /// The socket closed. `normal` is false for abnormal closes.
    Closed { normal: bool },
}

/// An open connection to the realtime service
#[async_trait]
pub trait Socket: Send + Sync {
    /// Send one text frame
    async fn send(&self, text: String) -> StreamResult<()>;

    /// Close with a normal status code
    async fn close(&self);

    fn is_open(&self) -> bool;
}

/// Opens sockets
#[async_trait]
pub trait SocketConnector: Send + Sync {
    /// Open a socket to `url`. The socket is open when this returns.
    async fn connect(
        &self,
        url: &Url,
    ) -> StreamResult<(Arc<dyn Socket>, mpsc::UnboundedReceiver<SocketEvent>)>;
}
