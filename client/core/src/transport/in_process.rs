//! In-Process Transport
//!
//! A connector that never touches the network. Every channel it opens is
//! recorded in a shared log, so a test (or a scripted headless run) can see
//! what the session sent and how it closed the channel, and then feed the
//! session whatever `ChannelEvent`s it wants.
//!
//! # Usage
//!
//! ```ignore
//! let connector = InProcessConnector::new();
//! let log = connector.clone();
//! let mut session = StreamingSession::new(renderer, connector, metadata);
//!
//! let exchange = session.start("hello").unwrap();
//! session.handle_channel_event(ChannelEvent::new(exchange, ChannelEventKind::Opened));
//! assert_eq!(log.sent(exchange).len(), 1);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use super::traits::{Channel, Connector, ExchangeId, TransportError};

/// What happened on one in-process channel
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelRecord {
    /// Frames the session sent
    pub sent: Vec<String>,
    /// Close code, once the session closed the channel
    pub close_code: Option<u16>,
}

/// Connector producing in-memory channels
///
/// Clones share the same log.
#[derive(Clone, Debug, Default)]
pub struct InProcessConnector {
    log: Arc<Mutex<Vec<(ExchangeId, ChannelRecord)>>>,
}

impl InProcessConnector {
    /// Create a connector with an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Exchanges a channel was opened for, in order
    pub fn opened(&self) -> Vec<ExchangeId> {
        self.log.lock().iter().map(|(id, _)| *id).collect()
    }

    /// Record of the channel opened for `exchange`
    pub fn record(&self, exchange: ExchangeId) -> Option<ChannelRecord> {
        self.log
            .lock()
            .iter()
            .find(|(id, _)| *id == exchange)
            .map(|(_, record)| record.clone())
    }

    /// Frames sent on the channel for `exchange`
    pub fn sent(&self, exchange: ExchangeId) -> Vec<String> {
        self.record(exchange).map(|r| r.sent).unwrap_or_default()
    }

    /// Close code used on the channel for `exchange`
    pub fn close_code(&self, exchange: ExchangeId) -> Option<u16> {
        self.record(exchange).and_then(|r| r.close_code)
    }
}

impl Connector for InProcessConnector {
    type Channel = InProcessChannel;

    fn open(&mut self, exchange: ExchangeId) -> InProcessChannel {
        self.log.lock().push((exchange, ChannelRecord::default()));
        tracing::debug!(exchange = %exchange, "Opened in-process channel");
        InProcessChannel {
            exchange,
            log: Arc::clone(&self.log),
        }
    }
}

/// Write side of an in-process channel
#[derive(Debug)]
pub struct InProcessChannel {
    exchange: ExchangeId,
    log: Arc<Mutex<Vec<(ExchangeId, ChannelRecord)>>>,
}

impl InProcessChannel {
    fn with_record<T>(
        &self,
        f: impl FnOnce(&mut ChannelRecord) -> Result<T, TransportError>,
    ) -> Result<T, TransportError> {
        let mut log = self.log.lock();
        let record = log
            .iter_mut()
            .find(|(id, _)| *id == self.exchange)
            .map(|(_, record)| record)
            .ok_or(TransportError::ChannelClosed)?;
        f(record)
    }
}

impl Channel for InProcessChannel {
    fn send(&mut self, payload: String) -> Result<(), TransportError> {
        self.with_record(|record| {
            if record.close_code.is_some() {
                return Err(TransportError::ChannelClosed);
            }
            record.sent.push(payload);
            Ok(())
        })
    }

    fn close(&mut self, code: u16) -> Result<(), TransportError> {
        self.with_record(|record| {
            if record.close_code.is_some() {
                return Err(TransportError::ChannelClosed);
            }
            record.close_code = Some(code);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_open_records_channel() {
        let mut connector = InProcessConnector::new();
        let log = connector.clone();

        let _a = connector.open(ExchangeId(1));
        let _b = connector.open(ExchangeId(2));

        assert_eq!(log.opened(), vec![ExchangeId(1), ExchangeId(2)]);
        assert_eq!(log.record(ExchangeId(1)), Some(ChannelRecord::default()));
        assert!(log.record(ExchangeId(3)).is_none());
    }

    #[test]
    fn test_send_and_close() {
        let mut connector = InProcessConnector::new();
        let mut channel = connector.open(ExchangeId(7));

        assert_ok!(channel.send("[]".to_string()));
        assert_ok!(channel.close(1000));

        assert_eq!(connector.sent(ExchangeId(7)), vec!["[]".to_string()]);
        assert_eq!(connector.close_code(ExchangeId(7)), Some(1000));
    }

    #[test]
    fn test_closed_channel_rejects_writes() {
        let mut connector = InProcessConnector::new();
        let mut channel = connector.open(ExchangeId(1));
        assert_ok!(channel.close(1000));

        assert_eq!(
            assert_err!(channel.send("late".to_string())),
            TransportError::ChannelClosed
        );
        assert_eq!(assert_err!(channel.close(1000)), TransportError::ChannelClosed);
        assert!(connector.sent(ExchangeId(1)).is_empty());
    }
}
