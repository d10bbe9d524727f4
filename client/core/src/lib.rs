//! Webserve Core - Headless Streaming Chat Sessions
//!
//! This crate provides the client-side logic for talking to a webserve
//! model server, completely independent of any UI framework. It can drive a
//! terminal UI, a scripted headless run, or a test harness.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         UI Surfaces                           │
//! │   ┌──────────────┐   ┌──────────────────┐   ┌─────────────┐  │
//! │   │     TUI      │   │ RecordingRenderer│   │  (others)   │  │
//! │   │  (ratatui)   │   │  headless/tests  │   │             │  │
//! │   └──────┬───────┘   └────────┬─────────┘   └──────┬──────┘  │
//! │          └────────────────────┼────────────────────┘         │
//! │                        Renderer trait                         │
//! └───────────────────────────────┼───────────────────────────────┘
//!                                 │
//! ┌───────────────────────────────┼───────────────────────────────┐
//! │                         WEBSERVE CORE                          │
//! │   ┌───────────────────────────┴──────────────────────────┐    │
//! │   │                  StreamingSession                     │    │
//! │   │  ┌──────────────┐  ┌─────────────┐  ┌──────────────┐ │    │
//! │   │  │ Conversation │  │  Exchange   │  │   Export     │ │    │
//! │   │  │   History    │  │   state     │  │              │ │    │
//! │   │  └──────────────┘  └──────┬──────┘  └──────────────┘ │    │
//! │   └───────────────────────────┼──────────────────────────┘    │
//! │                  Channel ▼    │    ▲ ChannelEvent              │
//! │   ┌───────────────────────────┴──────────────────────────┐    │
//! │   │   Connector: WebSocket (tokio-tungstenite) / in-proc │    │
//! │   └───────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//!                                 │
//!                      ws://host:port/v1/retrieveResponse
//! ```
//!
//! # Key Types
//!
//! - [`StreamingSession`]: The exchange state machine
//! - [`ConversationHistory`]: Ordered user/assistant turns
//! - [`ServerUpdate`]: One streamed update from the server
//! - [`Renderer`]: What a surface must implement to display a session
//! - [`WebSocketConnector`]: Opens one WebSocket per exchange
//!
//! # Quick Start
//!
//! ```ignore
//! use webserve_core::{
//!     RecordingRenderer, SessionMetadata, StreamingSession, TransportConfig,
//!     WebSocketConnector,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let (connector, mut events) =
//!         WebSocketConnector::with_event_channel(TransportConfig::default());
//!     let mut session = StreamingSession::new(
//!         RecordingRenderer::new(),
//!         connector,
//!         SessionMetadata::default(),
//!     );
//!
//!     session.start("hello");
//!     while let Some(event) = events.recv().await {
//!         session.handle_channel_event(event);
//!         if !session.state().is_busy() {
//!             break;
//!         }
//!     }
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`config`]: TOML/env configuration loading
//! - [`export`]: Conversation export artifacts
//! - [`history`]: Conversation history
//! - [`messages`]: Wire protocol
//! - [`render`]: Renderer contract and the recording renderer
//! - [`session`]: The streaming session state machine
//! - [`transport`]: Per-exchange channels (WebSocket, in-process)
//!
//! # No TUI Dependencies
//!
//! This crate has **zero** dependencies on ratatui, crossterm, or any other
//! UI framework.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod export;
pub mod history;
pub mod messages;
pub mod render;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use export::{
    export, DirectorySink, ExportArtifact, ExportDocument, ExportError, ExportSink,
    SessionMetadata,
};
pub use history::{ConversationHistory, Role, Turn};
pub use messages::{
    encode_transcript, ProtocolError, ServerUpdate, DEFAULT_ENDPOINT_PATH, NORMAL_CLOSURE,
};
pub use render::{ControlState, ElementId, NoticeLevel, RecordedElement, RecordingRenderer, Renderer};
pub use session::{ExchangeState, StreamingSession};
pub use transport::{
    Channel, ChannelEvent, ChannelEventKind, Connector, ExchangeId, InProcessConnector,
    TransportConfig, TransportError, WebSocketConnector,
};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ClientConfig, ClientToml,
    ConfigError, ConfigOverrides, ConfigSource,
};
