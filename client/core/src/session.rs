//! Streaming Session
//!
//! The exchange state machine. A session owns the conversation history, the
//! renderer, the connector and the one exchange that may be in flight.
//!
//! # Lifecycle
//!
//! ```text
//!            start()                     request_stop()
//!   Idle ───────────────► Streaming ───────────────────► StopRequested
//!    ▲                       │                                 │
//!    └──── Closed event ─────┴──────────── Closed event ───────┘
//! ```
//!
//! The only way back to `Idle` is the channel's `Closed` event, whatever
//! caused it (completion, stop, transport failure). That keeps the offered
//! controls in line with the exchange state even when the connection dies.
//!
//! # Event dispatch
//!
//! Nothing here blocks or awaits. `start` asks the connector to open a
//! channel and returns; everything after that is driven by
//! [`StreamingSession::handle_channel_event`], called once per event, in the
//! order the transport produced them.
//!
//! # Stop
//!
//! Stopping is cooperative: `request_stop` only flags the exchange. The next
//! server update ends it, keeping whatever output that update carried. If no
//! update arrives, the driver calls [`StreamingSession::stop_deadline_elapsed`]
//! after its grace period and the session closes the channel itself.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::export::{self, ExportArtifact, ExportError, ExportSink, SessionMetadata};
use crate::history::{ConversationHistory, Turn};
use crate::messages::{encode_transcript, ServerUpdate, NORMAL_CLOSURE};
use crate::render::{ControlState, ElementId, NoticeLevel, Renderer};
use crate::transport::{Channel, ChannelEvent, ChannelEventKind, Connector, ExchangeId};

/// State of the exchange machine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExchangeState {
    /// No exchange in flight
    #[default]
    Idle,
    /// A response is streaming
    Streaming,
    /// The user asked to stop; the next update ends the exchange
    StopRequested,
}

impl ExchangeState {
    /// Whether an exchange is in flight
    pub fn is_busy(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Idle => "Ready",
            Self::Streaming => "Responding...",
            Self::StopRequested => "Stopping...",
        }
    }
}

/// The exchange currently in flight
struct ActiveExchange<Ch> {
    id: ExchangeId,
    channel: Ch,
    /// Latest full output seen on this exchange
    latest_output: Option<String>,
    /// Whether the assistant turn was appended to history
    committed: bool,
    /// Number of server updates applied
    updates: usize,
}

/// A chat session driving one streamed exchange at a time
pub struct StreamingSession<R: Renderer, C: Connector> {
    history: ConversationHistory,
    state: ExchangeState,
    live_element: Option<ElementId>,
    exchange: Option<ActiveExchange<C::Channel>>,
    last_exchange: ExchangeId,
    confirm_visible: bool,
    metadata: SessionMetadata,
    renderer: R,
    connector: C,
}

impl<R: Renderer, C: Connector> StreamingSession<R, C> {
    /// Create an idle session with an empty conversation
    pub fn new(mut renderer: R, connector: C, metadata: SessionMetadata) -> Self {
        renderer.set_controls(ControlState::idle(true));
        Self {
            history: ConversationHistory::new(),
            state: ExchangeState::Idle,
            live_element: None,
            exchange: None,
            last_exchange: ExchangeId(0),
            confirm_visible: false,
            metadata,
            renderer,
            connector,
        }
    }

    // ========================================================================
    // User actions
    // ========================================================================

    /// Send a user turn and open a channel for the response
    ///
    /// Ignored (returns `None`) when `user_text` is empty or an exchange is
    /// already in flight.
    pub fn start(&mut self, user_text: &str) -> Option<ExchangeId> {
        if user_text.is_empty() {
            tracing::debug!("Ignoring empty submission");
            return None;
        }
        if self.state != ExchangeState::Idle {
            tracing::debug!(state = ?self.state, "Ignoring submission while an exchange is in flight");
            return None;
        }

        self.state = ExchangeState::Streaming;
        self.renderer.set_controls(ControlState::streaming());
        self.live_element = None;
        if self.confirm_visible {
            self.cancel_clear();
        }

        let was_at_bottom = self.renderer.is_viewport_at_bottom();
        self.renderer.render_user_turn(user_text);
        if was_at_bottom {
            self.renderer.scroll_to_bottom();
        }

        self.history.append(Turn::user(user_text));

        let id = self.last_exchange.next();
        self.last_exchange = id;
        let channel = self.connector.open(id);
        self.exchange = Some(ActiveExchange {
            id,
            channel,
            latest_output: None,
            committed: false,
            updates: 0,
        });

        tracing::info!(exchange = %id, turns = self.history.len(), "Exchange started");
        Some(id)
    }

    /// Ask the in-flight exchange to stop
    ///
    /// Only honored while streaming. The channel is closed when the next
    /// update arrives or when the stop deadline elapses.
    pub fn request_stop(&mut self) -> bool {
        if self.state != ExchangeState::Streaming {
            tracing::debug!(state = ?self.state, "Ignoring stop request");
            return false;
        }
        self.state = ExchangeState::StopRequested;
        tracing::info!(exchange = ?self.active_exchange(), "Stop requested");
        true
    }

    /// The stop grace period of `exchange` is over
    ///
    /// Ends the exchange with whatever output it has if it is still waiting
    /// on a stop. Returns whether anything happened.
    pub fn stop_deadline_elapsed(&mut self, exchange: ExchangeId) -> bool {
        if self.state != ExchangeState::StopRequested {
            return false;
        }
        match &self.exchange {
            Some(active) if active.id == exchange && !active.committed => {}
            _ => return false,
        }
        tracing::info!(exchange = %exchange, "No update after stop request; closing channel");
        self.finish_exchange(false);
        true
    }

    /// Ask the user to confirm clearing the conversation
    pub fn request_clear(&mut self) -> bool {
        if self.state != ExchangeState::Idle || self.history.is_empty() {
            return false;
        }
        self.confirm_visible = true;
        self.renderer.set_clear_confirm(true);
        true
    }

    /// Dismiss the clear confirmation
    pub fn cancel_clear(&mut self) {
        self.confirm_visible = false;
        self.renderer.set_clear_confirm(false);
    }

    /// Empty the conversation and the rendering surface
    ///
    /// Only valid while idle.
    pub fn clear(&mut self) -> bool {
        if self.state != ExchangeState::Idle {
            tracing::debug!(state = ?self.state, "Ignoring clear while an exchange is in flight");
            return false;
        }
        self.renderer.clear_surface();
        self.history.clear();
        self.live_element = None;
        self.confirm_visible = false;
        self.renderer.set_clear_confirm(false);
        self.renderer.set_controls(ControlState::hidden());
        tracing::info!("Conversation cleared");
        true
    }

    /// Whether the conversation can be exported right now
    pub fn can_export(&self) -> bool {
        self.state == ExchangeState::Idle && !self.history.is_empty()
    }

    /// Serialize the conversation, if exporting is currently allowed
    pub fn export_artifact(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<ExportArtifact>, ExportError> {
        if !self.can_export() {
            return Ok(None);
        }
        export::export(&self.history, &self.metadata, now).map(Some)
    }

    /// Serialize the conversation and hand it to `sink`
    pub fn export_to(
        &self,
        sink: &mut impl ExportSink,
        now: DateTime<Utc>,
    ) -> Result<Option<PathBuf>, ExportError> {
        match self.export_artifact(now)? {
            Some(artifact) => sink.write(&artifact).map(Some),
            None => Ok(None),
        }
    }

    // ========================================================================
    // Channel events
    // ========================================================================

    /// Apply one channel event
    ///
    /// Events for any exchange other than the one in flight are ignored.
    pub fn handle_channel_event(&mut self, event: ChannelEvent) {
        match &self.exchange {
            Some(active) if active.id == event.exchange => {}
            _ => {
                tracing::debug!(exchange = %event.exchange, "Ignoring event for inactive exchange");
                return;
            }
        }

        match event.kind {
            ChannelEventKind::Opened => self.on_open(),
            ChannelEventKind::Message(raw) => self.on_message(&raw),
            ChannelEventKind::Failed(reason) => self.on_failure(&reason),
            ChannelEventKind::Closed { code, reason } => self.on_close(code, &reason),
        }
    }

    fn on_open(&mut self) {
        match &self.exchange {
            Some(active) if !active.committed => {}
            _ => {
                tracing::debug!("Exchange already ended; not sending transcript");
                return;
            }
        }

        let payload = match encode_transcript(self.history.turns()) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Could not encode transcript");
                self.renderer.show_notice(NoticeLevel::Error, &e.to_string());
                if let Some(active) = self.exchange.as_mut() {
                    if let Err(e) = active.channel.close(NORMAL_CLOSURE) {
                        tracing::debug!(exchange = %active.id, error = %e, "Channel already closed");
                    }
                }
                return;
            }
        };

        if let Some(active) = self.exchange.as_mut() {
            tracing::debug!(exchange = %active.id, bytes = payload.len(), "Sending transcript");
            if let Err(e) = active.channel.send(payload) {
                tracing::warn!(exchange = %active.id, error = %e, "Failed to send transcript");
            }
        }
    }

    fn on_message(&mut self, raw: &str) {
        match self.exchange.as_mut() {
            Some(active) if !active.committed => active.updates += 1,
            _ => {
                tracing::debug!("Ignoring update after the exchange ended");
                return;
            }
        }

        let update = ServerUpdate::parse(raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Malformed server update");
            ServerUpdate::error(e.to_string())
        });

        let was_at_bottom = self.renderer.is_viewport_at_bottom();

        if let Some(error) = update.error_text() {
            let element = self.ensure_assistant_element();
            self.renderer.set_assistant_text(element, error, true);
        }

        if let Some(output) = update.output_text() {
            let element = self.ensure_assistant_element();
            self.renderer.set_assistant_text(element, output, false);
            if let Some(active) = self.exchange.as_mut() {
                active.latest_output = Some(output.to_string());
            }
        }

        if was_at_bottom {
            self.renderer.scroll_to_bottom();
        }

        if update.is_completed() || self.state == ExchangeState::StopRequested {
            self.finish_exchange(true);
        }
    }

    fn on_failure(&mut self, reason: &str) {
        tracing::warn!(exchange = ?self.active_exchange(), reason = %reason, "Transport failure");
        self.renderer.show_notice(NoticeLevel::Error, reason);
    }

    fn on_close(&mut self, code: Option<u16>, reason: &str) {
        let Some(active) = self.exchange.take() else {
            return;
        };

        if !active.committed {
            if let Some(partial) = active.latest_output {
                tracing::info!(exchange = %active.id, "Keeping partial response");
                self.history.append(Turn::assistant(partial));
            }
        }

        self.state = ExchangeState::Idle;
        self.renderer
            .set_controls(ControlState::idle(self.history.is_empty()));

        tracing::info!(
            exchange = %active.id,
            code = ?code,
            reason = %reason,
            updates = active.updates,
            "Exchange finished"
        );
    }

    /// Commit the assistant turn and close the channel normally
    ///
    /// Without any output the turn is recorded as empty only when
    /// `commit_empty` is set, i.e. when the server actually answered.
    fn finish_exchange(&mut self, commit_empty: bool) {
        let Some(active) = self.exchange.as_mut() else {
            return;
        };
        if active.committed {
            return;
        }
        active.committed = true;

        match active.latest_output.clone() {
            Some(content) => self.history.append(Turn::assistant(content)),
            None if commit_empty => self.history.append(Turn::assistant("")),
            None => tracing::debug!(exchange = %active.id, "No output to keep"),
        }

        if let Err(e) = active.channel.close(NORMAL_CLOSURE) {
            tracing::debug!(exchange = %active.id, error = %e, "Channel already closed");
        }
    }

    /// The live assistant element, created on first use
    fn ensure_assistant_element(&mut self) -> ElementId {
        match self.live_element {
            Some(element) => element,
            None => {
                let element = self.renderer.create_assistant_element();
                self.live_element = Some(element);
                element
            }
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Current exchange state
    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// The conversation so far
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// The live assistant element, if one was created for the latest turn
    pub fn live_element(&self) -> Option<ElementId> {
        self.live_element
    }

    /// The exchange in flight
    pub fn active_exchange(&self) -> Option<ExchangeId> {
        self.exchange.as_ref().map(|a| a.id)
    }

    /// Whether the clear confirmation is showing
    pub fn is_confirming_clear(&self) -> bool {
        self.confirm_visible
    }

    /// Model settings of the session
    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    /// The renderer
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// The renderer, mutably (for surface-only state such as scrolling)
    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// The connector
    pub fn connector_mut(&mut self) -> &mut C {
        &mut self.connector
    }
}
