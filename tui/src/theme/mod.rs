//! Theme and Colors
//!
//! Two palettes, light and dark, switched at runtime with Ctrl+T.
//! Nothing is persisted; the starting mode comes from configuration.

use ratatui::style::{Color, Modifier, Style};

// ============================================================================
// Light Palette
// ============================================================================

/// Light background
pub const LIGHT_BACKGROUND: Color = Color::Rgb(250, 250, 250);

/// Light foreground text
pub const LIGHT_TEXT: Color = Color::Rgb(33, 33, 33);

/// User turns on light background
pub const LIGHT_USER: Color = Color::Rgb(25, 118, 210);

/// Secondary text on light background
pub const LIGHT_DIM: Color = Color::Rgb(140, 140, 140);

// ============================================================================
// Dark Palette
// ============================================================================

/// Dark background
pub const DARK_BACKGROUND: Color = Color::Rgb(24, 24, 27);

/// Dark foreground text
pub const DARK_TEXT: Color = Color::Rgb(228, 228, 231);

/// User turns on dark background
pub const DARK_USER: Color = Color::Rgb(130, 220, 130);

/// Secondary text on dark background
pub const DARK_DIM: Color = Color::Rgb(100, 100, 100);

// ============================================================================
// Shared
// ============================================================================

/// Error red
pub const ERROR_RED: Color = Color::Rgb(255, 80, 80);

/// Accent for the header and popups
pub const ACCENT: Color = Color::Magenta;

/// Success / info notices
pub const SUCCESS_GREEN: Color = Color::Rgb(120, 200, 120);

/// Light or dark rendering
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ThemeMode {
    /// Dark text on a light background
    #[default]
    Light,
    /// Light text on a dark background
    Dark,
}

impl ThemeMode {
    /// Mode for a `dark_mode` flag
    pub fn from_dark(dark: bool) -> Self {
        if dark {
            Self::Dark
        } else {
            Self::Light
        }
    }

    /// The other mode
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    /// Short label for the header
    pub fn label(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// Colors for this mode
    pub fn palette(&self) -> Palette {
        match self {
            Self::Light => Palette {
                background: LIGHT_BACKGROUND,
                text: LIGHT_TEXT,
                user: LIGHT_USER,
                dim: LIGHT_DIM,
            },
            Self::Dark => Palette {
                background: DARK_BACKGROUND,
                text: DARK_TEXT,
                user: DARK_USER,
                dim: DARK_DIM,
            },
        }
    }
}

/// Resolved colors for one mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette {
    /// Screen background
    pub background: Color,
    /// Assistant text and input
    pub text: Color,
    /// User turns
    pub user: Color,
    /// Status line, separators, hints
    pub dim: Color,
}

impl Palette {
    /// Base style: palette text on palette background
    pub fn base(&self) -> Style {
        Style::default().fg(self.text).bg(self.background)
    }

    /// User turn style
    pub fn user(&self) -> Style {
        self.base().fg(self.user)
    }

    /// Assistant turn style
    pub fn assistant(&self) -> Style {
        self.base()
    }

    /// Error-styled assistant element
    pub fn error(&self) -> Style {
        self.base().fg(ERROR_RED)
    }

    /// Secondary text
    pub fn dim(&self) -> Style {
        self.base().fg(self.dim)
    }

    /// Header and popup accents
    pub fn accent(&self) -> Style {
        self.base().fg(ACCENT).add_modifier(Modifier::BOLD)
    }
}
