//! Renderer Contract
//!
//! The narrow interface the session drives to put a conversation on screen.
//! A surface (the TUI, a headless logger, a test) implements [`Renderer`];
//! the session decides *what* changes and *when*, the renderer only draws.
//!
//! # Live assistant element
//!
//! The renderer hands out an [`ElementId`] for every assistant element it
//! creates. The session keeps the id of the single in-progress element and
//! only asks for a new one after a new user turn was sent, so a surface never
//! ends up with two live assistant elements for one exchange.

use std::fmt;

/// Handle to a rendered assistant element
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element-{}", self.0)
    }
}

/// Which session controls are currently offered to the user
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlState {
    /// Export the conversation
    pub export: bool,
    /// Clear the conversation
    pub clear: bool,
    /// Stop the in-flight response
    pub stop: bool,
}

impl ControlState {
    /// Controls while a response is streaming: only stop
    pub fn streaming() -> Self {
        Self {
            export: false,
            clear: false,
            stop: true,
        }
    }

    /// Controls while idle: export and clear, when there is something to act on
    pub fn idle(history_empty: bool) -> Self {
        Self {
            export: !history_empty,
            clear: !history_empty,
            stop: false,
        }
    }

    /// Every control hidden
    pub fn hidden() -> Self {
        Self::default()
    }
}

/// Severity of a status notice
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Informational (e.g. export written)
    Info,
    /// Something failed outside the conversation itself
    Error,
}

/// Surface-side operations the session relies on
pub trait Renderer {
    /// Show a user turn
    fn render_user_turn(&mut self, text: &str);

    /// Create a new, empty assistant element
    fn create_assistant_element(&mut self) -> ElementId;

    /// Replace the whole text of an assistant element
    fn set_assistant_text(&mut self, element: ElementId, text: &str, is_error: bool);

    /// Show exactly the given controls
    fn set_controls(&mut self, controls: ControlState);

    /// Whether the viewport is at (or within a small threshold of) the bottom
    fn is_viewport_at_bottom(&self) -> bool;

    /// Scroll the conversation to the bottom
    fn scroll_to_bottom(&mut self);

    /// Remove every rendered message
    fn clear_surface(&mut self);

    /// Show or hide the clear confirmation
    fn set_clear_confirm(&mut self, visible: bool);

    /// Show a status notice outside the conversation
    fn show_notice(&mut self, level: NoticeLevel, text: &str);
}

/// An assistant element as seen by [`RecordingRenderer`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedElement {
    /// Element handle
    pub id: ElementId,
    /// Current text
    pub text: String,
    /// Whether the element is styled as an error
    pub is_error: bool,
    /// Every text the element displayed, in order
    pub revisions: Vec<String>,
}

/// In-memory renderer for headless drivers and tests
///
/// Records everything the session asks it to do. The viewport position is
/// controlled by the caller through [`RecordingRenderer::set_at_bottom`].
#[derive(Clone, Debug)]
pub struct RecordingRenderer {
    /// User turns, in render order
    pub user_turns: Vec<String>,
    /// Assistant elements, in creation order
    pub elements: Vec<RecordedElement>,
    /// Currently visible controls
    pub controls: ControlState,
    /// Whether the clear confirmation is visible
    pub confirm_visible: bool,
    /// Notices shown
    pub notices: Vec<(NoticeLevel, String)>,
    /// Number of scroll-to-bottom requests
    pub scrolls: usize,
    /// Number of surface clears
    pub clears: usize,
    at_bottom: bool,
    next_id: u64,
}

impl Default for RecordingRenderer {
    fn default() -> Self {
        Self {
            user_turns: Vec::new(),
            elements: Vec::new(),
            controls: ControlState::hidden(),
            confirm_visible: false,
            notices: Vec::new(),
            scrolls: 0,
            clears: 0,
            at_bottom: true,
            next_id: 0,
        }
    }
}

impl RecordingRenderer {
    /// Create a renderer whose viewport starts at the bottom
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend the user scrolled away from (or back to) the bottom
    pub fn set_at_bottom(&mut self, at_bottom: bool) {
        self.at_bottom = at_bottom;
    }

    /// Look up an element
    pub fn element(&self, id: ElementId) -> Option<&RecordedElement> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// Most recently created element
    pub fn last_element(&self) -> Option<&RecordedElement> {
        self.elements.last()
    }
}

impl Renderer for RecordingRenderer {
    fn render_user_turn(&mut self, text: &str) {
        self.user_turns.push(text.to_string());
    }

    fn create_assistant_element(&mut self) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        self.elements.push(RecordedElement {
            id,
            text: String::new(),
            is_error: false,
            revisions: Vec::new(),
        });
        id
    }

    fn set_assistant_text(&mut self, element: ElementId, text: &str, is_error: bool) {
        if let Some(e) = self.elements.iter_mut().find(|e| e.id == element) {
            e.text = text.to_string();
            e.is_error = e.is_error || is_error;
            e.revisions.push(text.to_string());
        }
    }

    fn set_controls(&mut self, controls: ControlState) {
        self.controls = controls;
    }

    fn is_viewport_at_bottom(&self) -> bool {
        self.at_bottom
    }

    fn scroll_to_bottom(&mut self) {
        self.scrolls += 1;
        self.at_bottom = true;
    }

    fn clear_surface(&mut self) {
        self.clears += 1;
        self.user_turns.clear();
        self.elements.clear();
    }

    fn set_clear_confirm(&mut self, visible: bool) {
        self.confirm_visible = visible;
    }

    fn show_notice(&mut self, level: NoticeLevel, text: &str) {
        self.notices.push((level, text.to_string()));
    }
}
