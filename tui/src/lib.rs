//! Webserve TUI - Terminal chat client for webserve
//!
//! A full-screen terminal surface for `webserve-core` sessions. Responses
//! stream in place as the server refines them.
//!
//! # Architecture
//!
//! - **App**: Event loop and key bindings over one `StreamingSession`
//! - **Display**: The `Renderer` implementation the session draws into
//! - **Widgets**: Borderless, bottom-anchored conversation view
//! - **Theme**: Light and dark palettes

pub mod app;
pub mod display;
pub mod theme;
pub mod widgets;

pub use app::App;
pub use display::DisplayState;
pub use theme::ThemeMode;
