//! Transport Traits
//!
//! Core trait definitions for the per-exchange channel.
//!
//! Two traits split the transport:
//! - `Connector`: opens one channel per exchange
//! - `Channel`: the session's write side of an open channel
//!
//! The read side is not a trait: every transport reports what happens on a
//! channel as [`ChannelEvent`]s, which the owner of the session feeds to
//! `StreamingSession::handle_channel_event` one at a time.

use std::fmt;

use thiserror::Error;

/// Identifies one exchange (and the channel opened for it)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeId(pub u64);

impl ExchangeId {
    /// The id that follows this one
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exchange-{}", self.0)
    }
}

/// Errors that can occur during transport operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The channel already ended; nothing can be written to it
    #[error("Channel closed")]
    ChannelClosed,

    /// Connecting to the server failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connecting to the server took too long
    #[error("Connection timed out after {0} ms")]
    Timeout(u64),
}

/// Something that happened on a channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelEvent {
    /// Exchange whose channel produced the event
    pub exchange: ExchangeId,
    /// What happened
    pub kind: ChannelEventKind,
}

impl ChannelEvent {
    /// Create an event
    pub fn new(exchange: ExchangeId, kind: ChannelEventKind) -> Self {
        Self { exchange, kind }
    }
}

/// Kind of channel event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelEventKind {
    /// The connection is up and ready for the request
    Opened,
    /// A text frame arrived
    Message(String),
    /// The transport failed; a `Closed` event follows
    Failed(String),
    /// The channel ended, whatever the cause. Always the last event.
    Closed {
        /// Close code, when the peer sent one
        code: Option<u16>,
        /// Close reason (may be empty)
        reason: String,
    },
}

/// Write side of an open channel
pub trait Channel {
    /// Send a text frame
    fn send(&mut self, payload: String) -> Result<(), TransportError>;

    /// Close the channel with the given code
    fn close(&mut self, code: u16) -> Result<(), TransportError>;
}

/// Opens one channel per exchange
pub trait Connector {
    /// Channel type produced by this connector
    type Channel: Channel;

    /// Start opening a channel for `exchange`
    ///
    /// Never fails synchronously: connection errors are reported as
    /// `Failed` followed by `Closed` events for the exchange.
    fn open(&mut self, exchange: ExchangeId) -> Self::Channel;
}
