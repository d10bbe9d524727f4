//! Display State
//!
//! The terminal side of the renderer contract. The session tells
//! [`DisplayState`] what changed through [`Renderer`]; the app turns the
//! state into wrapped lines when it draws a frame.
//!
//! # Scrolling
//!
//! `scroll_offset` counts lines from the bottom (0 = latest). The viewport
//! counts as "at the bottom" when it is at most [`NEAR_BOTTOM_LINES`] away,
//! so a single stray wheel tick does not stop auto-scrolling. While the user
//! reads further up, growing content does not move what they are looking at.

use webserve_core::{ControlState, ElementId, NoticeLevel, Renderer};

/// Distance from the bottom (in lines) that still counts as at the bottom
pub const NEAR_BOTTOM_LINES: usize = 1;

/// Trailing cursor shown on a response that is still streaming
const STREAMING_CURSOR: &str = "_";

/// Who a message belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayRole {
    /// User input
    User,
    /// Model response
    Assistant,
}

impl DisplayRole {
    /// Get the prefix for this role
    pub fn prefix(&self) -> &'static str {
        match self {
            DisplayRole::User => "You: ",
            DisplayRole::Assistant => "Assistant: ",
        }
    }
}

/// A rendered conversation message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayMessage {
    /// Who sent this message
    pub role: DisplayRole,
    /// Renderer handle, for assistant elements
    pub element: Option<ElementId>,
    /// The full text
    pub content: String,
    /// Styled as an error
    pub is_error: bool,
    /// Still receiving updates
    pub streaming: bool,
}

/// A status notice shown in the status line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    /// Severity
    pub level: NoticeLevel,
    /// Text
    pub text: String,
}

/// How a wrapped line should be styled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    /// Part of a user turn
    User,
    /// Part of an assistant response
    Assistant,
    /// Part of an error-styled response
    Error,
    /// Gap between messages
    Spacer,
}

/// One wrapped line of the conversation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayLine {
    /// Line text
    pub text: String,
    /// Styling hint
    pub kind: LineKind,
}

/// Everything the conversation area shows
#[derive(Clone, Debug, Default)]
pub struct DisplayState {
    /// Messages, in order
    pub messages: Vec<DisplayMessage>,
    /// Controls currently offered
    pub controls: ControlState,
    /// Clear confirmation popup visible
    pub confirm_clear: bool,
    /// Latest status notice
    pub notice: Option<Notice>,
    scroll_offset: usize,
    total_lines: usize,
    viewport_height: usize,
    next_element: u64,
}

impl DisplayState {
    /// Create an empty display
    pub fn new() -> Self {
        Self::default()
    }

    /// Scroll offset in lines from the bottom
    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    /// Largest useful scroll offset for the last layout
    pub fn max_scroll(&self) -> usize {
        self.total_lines.saturating_sub(self.viewport_height)
    }

    /// Scroll towards older content
    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = (self.scroll_offset + lines).min(self.max_scroll());
    }

    /// Scroll towards newer content
    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    /// Jump to the first line
    pub fn scroll_to_top(&mut self) {
        self.scroll_offset = self.max_scroll();
    }

    /// Record the size of the last layout
    ///
    /// When the user is scrolled up, lines added below push the offset up by
    /// the same amount so the visible lines stay put.
    pub fn update_layout(&mut self, total_lines: usize, viewport_height: usize) {
        let grew = total_lines.saturating_sub(self.total_lines);
        if self.scroll_offset > NEAR_BOTTOM_LINES {
            self.scroll_offset += grew;
        }
        self.total_lines = total_lines;
        self.viewport_height = viewport_height;
        self.scroll_offset = self.scroll_offset.min(self.max_scroll());
    }

    /// Drop the current notice
    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Look up the message for an assistant element
    pub fn message_for(&self, element: ElementId) -> Option<&DisplayMessage> {
        self.messages.iter().find(|m| m.element == Some(element))
    }

    /// Wrap every message to `width` columns
    pub fn lines(&self, width: usize) -> Vec<DisplayLine> {
        let width = width.max(1);
        let mut lines = Vec::new();

        for msg in &self.messages {
            let kind = match (msg.role, msg.is_error) {
                (DisplayRole::User, _) => LineKind::User,
                (DisplayRole::Assistant, true) => LineKind::Error,
                (DisplayRole::Assistant, false) => LineKind::Assistant,
            };

            let content = if msg.streaming {
                format!("{}{}{}", msg.role.prefix(), msg.content, STREAMING_CURSOR)
            } else {
                format!("{}{}", msg.role.prefix(), msg.content)
            };

            for line in textwrap::wrap(&content, width) {
                lines.push(DisplayLine {
                    text: line.into_owned(),
                    kind,
                });
            }
            lines.push(DisplayLine {
                text: String::new(),
                kind: LineKind::Spacer,
            });
        }

        lines
    }
}

impl Renderer for DisplayState {
    fn render_user_turn(&mut self, text: &str) {
        self.messages.push(DisplayMessage {
            role: DisplayRole::User,
            element: None,
            content: text.to_string(),
            is_error: false,
            streaming: false,
        });
    }

    fn create_assistant_element(&mut self) -> ElementId {
        let id = ElementId(self.next_element);
        self.next_element += 1;
        self.messages.push(DisplayMessage {
            role: DisplayRole::Assistant,
            element: Some(id),
            content: String::new(),
            is_error: false,
            streaming: true,
        });
        id
    }

    fn set_assistant_text(&mut self, element: ElementId, text: &str, is_error: bool) {
        match self
            .messages
            .iter_mut()
            .find(|m| m.element == Some(element))
        {
            Some(msg) => {
                msg.content = text.to_string();
                msg.is_error = msg.is_error || is_error;
            }
            None => tracing::debug!(element = %element, "Update for unknown element"),
        }
    }

    fn set_controls(&mut self, controls: ControlState) {
        self.controls = controls;
        if !controls.stop {
            for msg in &mut self.messages {
                msg.streaming = false;
            }
        }
    }

    fn is_viewport_at_bottom(&self) -> bool {
        self.scroll_offset <= NEAR_BOTTOM_LINES
    }

    fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
    }

    fn clear_surface(&mut self) {
        self.messages.clear();
        self.scroll_offset = 0;
        self.total_lines = 0;
    }

    fn set_clear_confirm(&mut self, visible: bool) {
        self.confirm_clear = visible;
    }

    fn show_notice(&mut self, level: NoticeLevel, text: &str) {
        self.notice = Some(Notice {
            level,
            text: text.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts(lines: &[DisplayLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_display_role_prefix() {
        assert_eq!(DisplayRole::User.prefix(), "You: ");
        assert_eq!(DisplayRole::Assistant.prefix(), "Assistant: ");
    }

    #[test]
    fn test_assistant_text_is_replaced() {
        let mut display = DisplayState::new();
        let id = display.create_assistant_element();
        display.set_assistant_text(id, "a", false);
        display.set_assistant_text(id, "ab", false);

        let msg = display.message_for(id).unwrap();
        assert_eq!(msg.content, "ab");
        assert!(msg.streaming);
    }

    #[test]
    fn test_error_style_sticks() {
        let mut display = DisplayState::new();
        let id = display.create_assistant_element();
        display.set_assistant_text(id, "boom", true);
        display.set_assistant_text(id, "recovered", false);
        assert!(display.message_for(id).unwrap().is_error);
    }

    #[test]
    fn test_unknown_element_is_ignored() {
        let mut display = DisplayState::new();
        display.set_assistant_text(ElementId(42), "lost", false);
        assert!(display.messages.is_empty());
    }

    #[test]
    fn test_idle_controls_end_streaming() {
        let mut display = DisplayState::new();
        let id = display.create_assistant_element();
        display.set_controls(ControlState::streaming());
        assert!(display.message_for(id).unwrap().streaming);

        display.set_controls(ControlState::idle(false));
        assert!(!display.message_for(id).unwrap().streaming);
    }

    #[test]
    fn test_lines_wrap_with_prefix() {
        let mut display = DisplayState::new();
        display.render_user_turn("hello there");
        let id = display.create_assistant_element();
        display.set_assistant_text(id, "Hi", false);
        display.set_controls(ControlState::idle(false));

        let lines = display.lines(10);
        assert_eq!(
            texts(&lines),
            vec!["You: hello", "there", "", "Assistant:", "Hi", ""]
        );
        assert_eq!(lines[0].kind, LineKind::User);
        assert_eq!(lines[3].kind, LineKind::Assistant);
        assert_eq!(lines[5].kind, LineKind::Spacer);
    }

    #[test]
    fn test_streaming_cursor_and_error_kind() {
        let mut display = DisplayState::new();
        let id = display.create_assistant_element();
        display.set_assistant_text(id, "CUDA out of memory", true);

        let lines = display.lines(80);
        assert_eq!(lines[0].text, "Assistant: CUDA out of memory_");
        assert_eq!(lines[0].kind, LineKind::Error);
    }

    #[test]
    fn test_multiline_content_keeps_breaks() {
        let mut display = DisplayState::new();
        let id = display.create_assistant_element();
        display.set_assistant_text(id, "one\ntwo", false);
        display.set_controls(ControlState::idle(false));
        assert_eq!(texts(&display.lines(80)), vec!["Assistant: one", "two", ""]);
    }

    #[test]
    fn test_near_bottom_threshold() {
        let mut display = DisplayState::new();
        display.update_layout(100, 20);
        assert!(display.is_viewport_at_bottom());

        display.scroll_up(1);
        assert!(display.is_viewport_at_bottom());

        display.scroll_up(1);
        assert!(!display.is_viewport_at_bottom());

        display.scroll_to_bottom();
        assert_eq!(display.scroll_offset(), 0);
    }

    #[test]
    fn test_scroll_is_clamped() {
        let mut display = DisplayState::new();
        display.update_layout(30, 20);
        display.scroll_up(100);
        assert_eq!(display.scroll_offset(), 10);
        display.scroll_down(100);
        assert_eq!(display.scroll_offset(), 0);
        display.scroll_to_top();
        assert_eq!(display.scroll_offset(), 10);
    }

    #[test]
    fn test_growth_keeps_scrolled_view_anchored() {
        let mut display = DisplayState::new();
        display.update_layout(50, 20);
        display.scroll_up(10);

        display.update_layout(53, 20);
        assert_eq!(display.scroll_offset(), 13);

        // At the bottom nothing is anchored
        display.scroll_to_bottom();
        display.update_layout(60, 20);
        assert_eq!(display.scroll_offset(), 0);
    }

    #[test]
    fn test_clear_surface() {
        let mut display = DisplayState::new();
        display.render_user_turn("hi");
        display.create_assistant_element();
        display.update_layout(40, 10);
        display.scroll_up(5);

        display.clear_surface();
        assert!(display.messages.is_empty());
        assert_eq!(display.scroll_offset(), 0);
        assert!(display.lines(80).is_empty());
    }

    #[test]
    fn test_notice_and_confirm() {
        let mut display = DisplayState::new();
        display.show_notice(NoticeLevel::Error, "Connection failed");
        assert_eq!(
            display.notice,
            Some(Notice {
                level: NoticeLevel::Error,
                text: "Connection failed".to_string()
            })
        );
        display.dismiss_notice();
        assert!(display.notice.is_none());

        display.set_clear_confirm(true);
        assert!(display.confirm_clear);
    }
}
