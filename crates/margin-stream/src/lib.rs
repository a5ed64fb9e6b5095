//! # Margin Stream
//!
//! Client for the realtime annotation service. Notifications about
//! annotations created, updated or deleted elsewhere arrive over a
//! websocket and are handed to the sidebar store.
//!
//! ## Key Components
//!
//! - [`Streamer`]: Connection lifecycle, client configuration and
//!   notification handling
//! - [`Socket`] / [`SocketConnector`]: Transport seam
//! - [`WebSocketConnector`]: tokio-tungstenite implementation
//! - [`MockConnector`]: In-memory sockets for tests
//!
//! ## Example
//!
//! ```rust,ignore
//! let connector = Arc::new(WebSocketConnector::new(config.connect_timeout));
//! let streamer = Streamer::new(store.clone(), config, connector, Arc::new(StaticToken(token)));
//! streamer.connect().await?;
//! let watcher = streamer.watch_session(shutdown_rx);
//! ```

pub mod config;
pub mod error;
pub mod mock_socket;
pub mod protocol;
pub mod socket;
pub mod streamer;
pub mod websocket;

pub use config::StreamerConfig;
pub use error::{StreamError, StreamResult};
pub use mock_socket::{MockConnector, MockSocket};
pub use protocol::{ClientMessage, NotificationAction, ServerMessage};
pub use socket::{Socket, SocketConnector, SocketEvent};
pub use streamer::{AccessTokenProvider, StaticToken, Streamer};
pub use websocket::{WebSocket, WebSocketConnector};
