//! Conversation Widget
//!
//! A borderless, bottom-anchored view over pre-wrapped conversation lines.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::widgets::Widget;

use crate::display::{DisplayLine, LineKind};
use crate::theme::Palette;

/// Renders the slice of `lines` that ends `scroll_offset` lines above the
/// last one
pub struct ConversationView<'a> {
    lines: &'a [DisplayLine],
    palette: Palette,
    scroll_offset: usize,
}

impl<'a> ConversationView<'a> {
    /// View over wrapped lines
    pub fn new(lines: &'a [DisplayLine], palette: Palette) -> Self {
        Self {
            lines,
            palette,
            scroll_offset: 0,
        }
    }

    /// Lines from the bottom to skip
    #[must_use]
    pub fn scroll_offset(mut self, offset: usize) -> Self {
        self.scroll_offset = offset;
        self
    }

    fn style_for(&self, kind: LineKind) -> Style {
        match kind {
            LineKind::User => self.palette.user(),
            LineKind::Assistant => self.palette.assistant(),
            LineKind::Error => self.palette.error(),
            LineKind::Spacer => self.palette.base(),
        }
    }
}

impl Widget for ConversationView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        buf.set_style(area, self.palette.base());

        let height = area.height as usize;
        if height == 0 || area.width == 0 {
            return;
        }

        let total = self.lines.len();
        let end = total.saturating_sub(self.scroll_offset);
        let start = end.saturating_sub(height);
        let has_content_above = start > 0;
        let has_content_below = end < total;
        let last_row = (end - start).saturating_sub(1);

        for (i, line) in self.lines[start..end].iter().enumerate() {
            // Fade the edge rows when there is more to scroll to
            let style = if (has_content_above && i == 0) || (has_content_below && i == last_row) {
                self.palette.dim()
            } else {
                self.style_for(line.kind)
            };
            let y = area.y + i as u16;
            buf.set_stringn(area.x, y, &line.text, area.width as usize, style);
        }
    }
}
