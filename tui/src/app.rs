//! Main Application
//!
//! The App struct manages the TUI lifecycle around one [`StreamingSession`]:
//! - Event loop (keyboard, mouse, resize, channel events, stop deadline)
//! - Key bindings mapped onto session operations
//! - Layout and drawing of [`DisplayState`]
//!
//! # Event Loop
//!
//! Terminal input, channel events and the stop deadline are awaited in one
//! `tokio::select!`. Every branch runs to completion on this task, so the
//! session only ever sees one event at a time, in arrival order.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use crossterm::event::{
    Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent,
    MouseEventKind,
};
use futures::StreamExt;
use ratatui::backend::Backend;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::{Frame, Terminal};
use tokio::sync::mpsc;
use tokio::time::Instant;
use unicode_width::UnicodeWidthStr;

use webserve_core::{
    ChannelEvent, ClientConfig, Connector, ControlState, DirectorySink, ExchangeId, NoticeLevel,
    Renderer, StreamingSession, WebSocketConnector,
};

use crate::display::DisplayState;
use crate::theme::{Palette, ThemeMode, SUCCESS_GREEN};
use crate::widgets::ConversationView;

/// Input box height (separator plus text lines)
const INPUT_HEIGHT: u16 = 4;

/// Lines scrolled per mouse wheel tick
const WHEEL_LINES: usize = 3;

/// Prompt shown in front of the input
const INPUT_PROMPT: &str = "> ";

/// Main application state
pub struct App<C: Connector> {
    /// Is the app still running?
    running: bool,

    /// The chat session, rendering into the display state
    session: StreamingSession<DisplayState, C>,
    /// Channel events from the connector
    events: mpsc::Receiver<ChannelEvent>,

    /// User input buffer
    input_buffer: String,
    /// Current theme
    theme: ThemeMode,

    /// How long a stop request waits for the server
    stop_grace: Option<Duration>,
    /// Pending stop deadline
    stop_deadline: Option<(ExchangeId, Instant)>,

    /// Where exports are written
    export_sink: DirectorySink,

    /// Terminal size at the last draw
    size: (u16, u16),
}

impl App<WebSocketConnector> {
    /// Create an app talking to the configured server
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(config: &ClientConfig) -> Self {
        let (connector, events) =
            WebSocketConnector::with_event_channel(config.transport.clone());
        Self::new(config, connector, events)
    }
}

impl<C: Connector> App<C> {
    /// Create an app over any connector
    pub fn new(config: &ClientConfig, connector: C, events: mpsc::Receiver<ChannelEvent>) -> Self {
        let session = StreamingSession::new(DisplayState::new(), connector, config.metadata.clone());

        tracing::info!(
            url = %config.transport.url,
            model = %config.metadata.model,
            "Chat client ready"
        );

        Self {
            running: true,
            session,
            events,
            input_buffer: String::new(),
            theme: ThemeMode::from_dark(config.dark_mode),
            stop_grace: config.stop_deadline(),
            stop_deadline: None,
            export_sink: DirectorySink::new(config.export_dir.clone()),
            size: (0, 0),
        }
    }

    /// Main event loop
    pub async fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> anyhow::Result<()> {
        let mut event_stream = EventStream::new();

        terminal.draw(|frame| self.draw(frame))?;

        while self.running {
            let deadline = self.stop_deadline;

            tokio::select! {
                biased;

                maybe_event = event_stream.next() => match maybe_event {
                    Some(Ok(event)) => self.handle_terminal_event(event),
                    Some(Err(e)) => tracing::warn!(error = %e, "Terminal event error"),
                    None => self.running = false,
                },

                Some(event) = self.events.recv() => self.handle_channel_event(event),

                exchange = wait_for_deadline(deadline) => self.stop_deadline_elapsed(exchange),
            }

            // Apply updates that are already queued before drawing
            while let Ok(event) = self.events.try_recv() {
                self.handle_channel_event(event);
            }

            terminal.draw(|frame| self.draw(frame))?;
        }

        Ok(())
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Handle one terminal event
    pub fn handle_terminal_event(&mut self, event: Event) {
        match event {
            // Only handle Press events (not Release or Repeat)
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            Event::Resize(w, h) => self.size = (w, h),
            _ => {}
        }
    }

    /// Handle keyboard input
    pub fn handle_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if ctrl && matches!(key.code, KeyCode::Char('c' | 'q')) {
            self.quit();
            return;
        }

        // The confirmation popup takes every other key
        if self.session.is_confirming_clear() {
            match key.code {
                KeyCode::Char('y' | 'Y') | KeyCode::Enter => {
                    self.session.clear();
                }
                KeyCode::Char('n' | 'N') | KeyCode::Esc => self.session.cancel_clear(),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('l') if ctrl => {
                self.session.request_clear();
            }
            KeyCode::Char('e') if ctrl => self.export(),
            KeyCode::Char('t') if ctrl => self.toggle_theme(),

            KeyCode::Esc => self.stop(),
            KeyCode::Enter => self.submit(),

            KeyCode::Char(c) if !ctrl => self.input_buffer.push(c),
            KeyCode::Backspace => {
                self.input_buffer.pop();
            }

            // Conversation scrolling
            KeyCode::PageUp => {
                let page = self.page_size();
                self.display_mut().scroll_up(page);
            }
            KeyCode::PageDown => {
                let page = self.page_size();
                self.display_mut().scroll_down(page);
            }
            KeyCode::Home if ctrl => self.display_mut().scroll_to_top(),
            KeyCode::End if ctrl => self.display_mut().scroll_to_bottom(),

            _ => {}
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::ScrollUp => self.display_mut().scroll_up(WHEEL_LINES),
            MouseEventKind::ScrollDown => self.display_mut().scroll_down(WHEEL_LINES),
            _ => {}
        }
    }

    fn submit(&mut self) {
        if self.session.state().is_busy() {
            tracing::debug!("Response in progress; keeping input");
            return;
        }
        if self.input_buffer.is_empty() {
            return;
        }

        let text = std::mem::take(&mut self.input_buffer);
        self.display_mut().dismiss_notice();
        self.session.start(&text);
    }

    fn stop(&mut self) {
        if !self.session.request_stop() {
            return;
        }
        if let (Some(grace), Some(exchange)) = (self.stop_grace, self.session.active_exchange()) {
            self.stop_deadline = Some((exchange, Instant::now() + grace));
        }
    }

    fn export(&mut self) {
        match self.session.export_to(&mut self.export_sink, Utc::now()) {
            Ok(Some(path)) => {
                let text = format!("Exported to {}", path.display());
                self.display_mut().show_notice(NoticeLevel::Info, &text);
            }
            Ok(None) => tracing::debug!("Nothing to export"),
            Err(e) => {
                tracing::warn!(error = %e, "Export failed");
                self.display_mut()
                    .show_notice(NoticeLevel::Error, &e.to_string());
            }
        }
    }

    fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        tracing::debug!(theme = self.theme.label(), "Theme toggled");
    }

    fn quit(&mut self) {
        tracing::info!("Quit requested");
        self.running = false;
    }

    fn page_size(&self) -> usize {
        let conversation_height = self.size.1.saturating_sub(INPUT_HEIGHT + 2);
        usize::from((conversation_height / 2).max(1))
    }

    // ========================================================================
    // Session events
    // ========================================================================

    /// Feed one channel event to the session
    pub fn handle_channel_event(&mut self, event: ChannelEvent) {
        self.session.handle_channel_event(event);
        if !self.session.state().is_busy() {
            self.stop_deadline = None;
        }
    }

    /// The stop grace period for `exchange` is over
    pub fn stop_deadline_elapsed(&mut self, exchange: ExchangeId) {
        self.stop_deadline = None;
        self.session.stop_deadline_elapsed(exchange);
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Whether the event loop should keep going
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The session
    pub fn session(&self) -> &StreamingSession<DisplayState, C> {
        &self.session
    }

    /// The session, mutably
    pub fn session_mut(&mut self) -> &mut StreamingSession<DisplayState, C> {
        &mut self.session
    }

    /// What is on screen
    pub fn display(&self) -> &DisplayState {
        self.session.renderer()
    }

    fn display_mut(&mut self) -> &mut DisplayState {
        self.session.renderer_mut()
    }

    /// Current input text
    pub fn input(&self) -> &str {
        &self.input_buffer
    }

    /// Current theme
    pub fn theme(&self) -> ThemeMode {
        self.theme
    }

    /// Exchange with a pending stop deadline
    pub fn pending_stop_deadline(&self) -> Option<ExchangeId> {
        self.stop_deadline.map(|(exchange, _)| exchange)
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Draw one frame
    pub fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        self.size = (area.width, area.height);
        let palette = self.theme.palette();

        frame.render_widget(Block::default().style(palette.base()), area);

        let [header, conversation, input, status] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(INPUT_HEIGHT),
            Constraint::Length(1),
        ])
        .areas(area);

        self.render_header(frame, header, palette);
        self.render_conversation(frame, conversation, palette);
        self.render_input(frame, input, palette);
        self.render_status(frame, status, palette);

        if self.display().confirm_clear {
            render_clear_confirm(frame, area, palette);
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect, palette: Palette) {
        let title = Line::from(vec![
            Span::styled(" webserve ", palette.accent()),
            Span::styled(self.session.metadata().model.clone(), palette.dim()),
        ]);
        frame.render_widget(Paragraph::new(title).style(palette.base()), area);

        let theme = Line::from(Span::styled(
            format!("{} ", self.theme.label()),
            palette.dim(),
        ));
        frame.render_widget(Paragraph::new(theme).alignment(Alignment::Right), area);
    }

    fn render_conversation(&mut self, frame: &mut Frame, area: Rect, palette: Palette) {
        let width = usize::from(area.width.saturating_sub(1));
        let lines = self.display().lines(width);
        self.display_mut()
            .update_layout(lines.len(), usize::from(area.height));

        let view =
            ConversationView::new(&lines, palette).scroll_offset(self.display().scroll_offset());
        frame.render_widget(view, area);
    }

    fn render_input(&self, frame: &mut Frame, area: Rect, palette: Palette) {
        if area.height < 2 || area.width < 4 {
            return;
        }

        let separator = "─".repeat(usize::from(area.width));
        frame.render_widget(
            Paragraph::new(separator).style(palette.dim()),
            Rect { height: 1, ..area },
        );

        let text_area = Rect {
            y: area.y + 1,
            height: area.height - 1,
            ..area
        };
        let text_width = usize::from(text_area.width.saturating_sub(1));
        let text_height = usize::from(text_area.height);

        if self.input_buffer.is_empty() {
            let hint = if self.session.state().is_busy() {
                "Waiting for the response (Esc to stop)"
            } else {
                "Type a message and press Enter"
            };
            let line = Line::from(vec![
                Span::styled(INPUT_PROMPT, palette.user()),
                Span::styled(hint, palette.dim()),
            ]);
            frame.render_widget(Paragraph::new(line), text_area);
            frame.set_cursor_position((text_area.x + INPUT_PROMPT.len() as u16, text_area.y));
            return;
        }

        let full_input = format!("{INPUT_PROMPT}{}", self.input_buffer);
        let wrapped: Vec<String> = textwrap::wrap(&full_input, text_width)
            .into_iter()
            .map(std::borrow::Cow::into_owned)
            .collect();
        let skip = wrapped.len().saturating_sub(text_height);
        let visible: Vec<Line> = wrapped
            .iter()
            .skip(skip)
            .map(|line| Line::from(Span::styled(line.clone(), palette.base())))
            .collect();
        let visible_count = visible.len();
        frame.render_widget(Paragraph::new(visible), text_area);

        // Wrapping drops trailing spaces; the cursor still goes after them
        let last_width = wrapped.last().map_or(0, |line| line.width());
        let trailing = self.input_buffer.len() - self.input_buffer.trim_end_matches(' ').len();
        let cursor_x = (last_width + trailing).min(text_width);
        let cursor_y = visible_count.saturating_sub(1);
        frame.set_cursor_position((
            text_area.x + cursor_x as u16,
            text_area.y + cursor_y as u16,
        ));
    }

    fn render_status(&self, frame: &mut Frame, area: Rect, palette: Palette) {
        let display = self.display();
        let mut spans = Vec::new();

        match &display.notice {
            Some(notice) => {
                let style = match notice.level {
                    NoticeLevel::Info => palette.base().fg(SUCCESS_GREEN),
                    NoticeLevel::Error => palette.error(),
                };
                spans.push(Span::styled(format!(" {} ", notice.text), style));
            }
            None => spans.push(Span::styled(
                format!(" {} ", self.session.state().description()),
                palette.dim(),
            )),
        }

        for hint in control_hints(display.controls) {
            spans.push(Span::styled("| ", palette.dim()));
            spans.push(Span::styled(format!("{hint} "), palette.dim()));
        }

        if display.scroll_offset() > 0 {
            spans.push(Span::styled(
                format!("[^{} lines - PgDn to scroll]", display.scroll_offset()),
                palette.dim(),
            ));
        }

        frame.render_widget(Paragraph::new(Line::from(spans)).style(palette.base()), area);
    }
}

/// Key hints for the visible controls, followed by the ones always offered
pub fn control_hints(controls: ControlState) -> Vec<&'static str> {
    let mut hints = Vec::new();
    if controls.stop {
        hints.push("Esc stop");
    }
    if controls.export {
        hints.push("^E export");
    }
    if controls.clear {
        hints.push("^L clear");
    }
    hints.push("^T theme");
    hints.push("^Q quit");
    hints
}

fn render_clear_confirm(frame: &mut Frame, area: Rect, palette: Palette) {
    let popup = centered_rect(44, 5, area);
    let block = Block::default()
        .title(" Clear conversation ")
        .borders(Borders::ALL)
        .border_style(palette.accent())
        .style(palette.base());
    let text = vec![
        Line::from("Delete every message in this chat?"),
        Line::from(Span::styled("[y] clear   [n] cancel", palette.dim())),
    ];

    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(text)
            .block(block)
            .alignment(Alignment::Center),
        popup,
    );
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

/// Resolves when the stop deadline passes; never when there is none
fn wait_for_deadline(deadline: Option<(ExchangeId, Instant)>) -> impl Future<Output = ExchangeId> {
    async move {
        match deadline {
            Some((exchange, at)) => {
                tokio::time::sleep_until(at).await;
                exchange
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_hints_follow_controls() {
        assert_eq!(
            control_hints(ControlState::streaming()),
            vec!["Esc stop", "^T theme", "^Q quit"]
        );
        assert_eq!(
            control_hints(ControlState::idle(false)),
            vec!["^E export", "^L clear", "^T theme", "^Q quit"]
        );
        assert_eq!(control_hints(ControlState::hidden()), vec!["^T theme", "^Q quit"]);
    }

    #[test]
    fn test_centered_rect() {
        let area = Rect::new(0, 0, 80, 24);
        assert_eq!(centered_rect(40, 4, area), Rect::new(20, 10, 40, 4));
        // Larger than the screen: clamp
        assert_eq!(centered_rect(100, 30, area), area);
    }

    #[tokio::test]
    async fn test_no_deadline_never_resolves() {
        let result =
            tokio::time::timeout(Duration::from_millis(20), wait_for_deadline(None)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_deadline_resolves_with_exchange() {
        let at = Instant::now() + Duration::from_millis(10);
        let exchange = tokio::time::timeout(
            Duration::from_secs(2),
            wait_for_deadline(Some((ExchangeId(4), at))),
        )
        .await
        .unwrap();
        assert_eq!(exchange, ExchangeId(4));
    }
}
