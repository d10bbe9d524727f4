//! WebSocket Transport
//!
//! One `tokio-tungstenite` connection per exchange. Each channel runs in its
//! own tokio task:
//!
//! ```text
//!   session ──Send/Close──► WebSocketChannel ──mpsc──► channel task ──► socket
//!   session ◄──────────── ChannelEvent mpsc ◄────────── channel task ◄── socket
//! ```
//!
//! The task never touches session state. It reports `Opened`, every text
//! frame as `Message`, transport problems as `Failed`, and finally exactly
//! one `Closed`, whatever ended the connection.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use super::config::TransportConfig;
use super::traits::{
    Channel, ChannelEvent, ChannelEventKind, Connector, ExchangeId, TransportError,
};

/// Default capacity of the event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Commands from the session to a channel task
#[derive(Debug)]
enum Command {
    Send(String),
    Close(u16),
}

/// Connector that opens a WebSocket per exchange
pub struct WebSocketConnector {
    config: TransportConfig,
    events: mpsc::Sender<ChannelEvent>,
}

impl WebSocketConnector {
    /// Create a connector reporting events on `events`
    pub fn new(config: TransportConfig, events: mpsc::Sender<ChannelEvent>) -> Self {
        Self { config, events }
    }

    /// Create a connector together with the receiver for its events
    pub fn with_event_channel(config: TransportConfig) -> (Self, mpsc::Receiver<ChannelEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (Self::new(config, tx), rx)
    }

    /// Transport configuration
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl Connector for WebSocketConnector {
    type Channel = WebSocketChannel;

    /// Must be called from within a tokio runtime
    fn open(&mut self, exchange: ExchangeId) -> WebSocketChannel {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let task = ChannelTask {
            exchange,
            config: self.config.clone(),
            events: self.events.clone(),
        };
        tokio::spawn(task.run(commands_rx));

        WebSocketChannel {
            exchange,
            commands: commands_tx,
        }
    }
}

/// Write side of a WebSocket channel
#[derive(Debug)]
pub struct WebSocketChannel {
    exchange: ExchangeId,
    commands: mpsc::UnboundedSender<Command>,
}

impl WebSocketChannel {
    /// Exchange this channel belongs to
    pub fn exchange(&self) -> ExchangeId {
        self.exchange
    }
}

impl Channel for WebSocketChannel {
    fn send(&mut self, payload: String) -> Result<(), TransportError> {
        self.commands
            .send(Command::Send(payload))
            .map_err(|_| TransportError::ChannelClosed)
    }

    fn close(&mut self, code: u16) -> Result<(), TransportError> {
        self.commands
            .send(Command::Close(code))
            .map_err(|_| TransportError::ChannelClosed)
    }
}

/// State of one connection task
struct ChannelTask {
    exchange: ExchangeId,
    config: TransportConfig,
    events: mpsc::Sender<ChannelEvent>,
}

impl ChannelTask {
    /// Report an event; false once nobody is listening
    async fn emit(&self, kind: ChannelEventKind) -> bool {
        self.events
            .send(ChannelEvent::new(self.exchange, kind))
            .await
            .is_ok()
    }

    async fn fail_and_close(&self, error: TransportError) {
        tracing::warn!(exchange = %self.exchange, error = %error, "Channel failed");
        if self.emit(ChannelEventKind::Failed(error.to_string())).await {
            self.emit(ChannelEventKind::Closed {
                code: None,
                reason: String::new(),
            })
            .await;
        }
    }

    /// Latest instant to wait for the peer's close frame
    fn close_deadline(&self) -> tokio::time::Instant {
        tokio::time::Instant::now() + self.config.connect_timeout()
    }

    async fn run(self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let connect = tokio_tungstenite::connect_async(self.config.url.as_str());
        let stream = match tokio::time::timeout(self.config.connect_timeout(), connect).await {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                self.fail_and_close(TransportError::ConnectionFailed(e.to_string()))
                    .await;
                return;
            }
            Err(_) => {
                self.fail_and_close(TransportError::Timeout(self.config.connect_timeout_ms))
                    .await;
                return;
            }
        };

        tracing::info!(exchange = %self.exchange, url = %self.config.url, "Connected");
        if !self.emit(ChannelEventKind::Opened).await {
            return;
        }

        let (mut sink, mut source) = stream.split();
        let mut closing = false;
        let mut sent_close = None;
        let mut close_deadline = None;
        let mut close_code = None;
        let mut close_reason = String::new();
        let mut frames = 0usize;

        loop {
            tokio::select! {
                command = commands.recv(), if !closing => match command {
                    Some(Command::Send(text)) => {
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            let reason = format!("Send failed: {e}");
                            tracing::warn!(exchange = %self.exchange, error = %e, "Send failed");
                            self.emit(ChannelEventKind::Failed(reason)).await;
                            break;
                        }
                    }
                    Some(Command::Close(code)) => {
                        closing = true;
                        sent_close = Some(code);
                        close_deadline = Some(self.close_deadline());
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: "".into(),
                        };
                        if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                            tracing::debug!(exchange = %self.exchange, error = %e, "Close send failed");
                            break;
                        }
                    }
                    None => {
                        // Channel handle dropped without an explicit close
                        closing = true;
                        sent_close = Some(u16::from(CloseCode::Normal));
                        close_deadline = Some(self.close_deadline());
                        if sink.send(Message::Close(None)).await.is_err() {
                            break;
                        }
                    }
                },

                frame = source.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        frames += 1;
                        if !self.emit(ChannelEventKind::Message(text)).await {
                            tracing::debug!(exchange = %self.exchange, "Event receiver dropped");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        if let Some(frame) = frame {
                            close_code = Some(u16::from(frame.code));
                            close_reason = frame.reason.into_owned();
                        }
                        closing = true;
                        close_deadline.get_or_insert_with(|| self.close_deadline());
                    }
                    Some(Ok(_)) => {
                        // Binary, ping and pong frames carry nothing for us
                    }
                    Some(Err(e)) => {
                        if !closing {
                            tracing::warn!(exchange = %self.exchange, error = %e, "Read error");
                            self.emit(ChannelEventKind::Failed(format!("Read failed: {e}")))
                                .await;
                        }
                        break;
                    }
                    None => break,
                },

                () = wait_for_close(close_deadline), if close_deadline.is_some() => {
                    // Peer never completed the closing handshake
                    tracing::debug!(exchange = %self.exchange, "Close handshake timed out");
                    close_code = close_code.or(sent_close);
                    break;
                }
            }
        }

        tracing::info!(
            exchange = %self.exchange,
            frames = frames,
            code = ?close_code,
            "Channel closed"
        );
        self.emit(ChannelEventKind::Closed {
            code: close_code,
            reason: close_reason,
        })
        .await;
    }
}

/// Resolve at `deadline`; never when there is none
async fn wait_for_close(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
