//! Transport Layer for Exchange Channels
//!
//! Every exchange gets its own channel, opened when the user sends a turn
//! and closed once the response is over:
//! - `WebSocketConnector`: one `tokio-tungstenite` connection per exchange
//! - `InProcessConnector`: in-memory channels for tests and scripted runs
//!
//! # Design Philosophy
//!
//! The transport separates the connection mechanics from the session state
//! machine. Connectors never call into the session: they only produce
//! [`ChannelEvent`]s, and whoever owns the session feeds those back in order.
//! That keeps every session mutation on one logical thread.

pub mod config;
pub mod in_process;
pub mod traits;
pub mod websocket;

// Re-exports for convenience
pub use config::{default_url, endpoint_url, TransportConfig, DEFAULT_PORT};
pub use in_process::{ChannelRecord, InProcessChannel, InProcessConnector};
pub use traits::{
    Channel, ChannelEvent, ChannelEventKind, Connector, ExchangeId, TransportError,
};
pub use websocket::{WebSocketChannel, WebSocketConnector, EVENT_CHANNEL_CAPACITY};
