//! Widgets
//!
//! Terminal widgets that are specific to the chat client.

pub mod conversation;

pub use conversation::ConversationView;
