//! Wire Messages
//!
//! The JSON exchanged with the webserve server over the per-exchange socket.
//!
//! # Protocol
//!
//! ```text
//! client ──► server   [{"role":"user","content":"hello"}, ...]   (once, right after open)
//! server ──► client   {"output":"Hi","completed":false,"error":null}
//! server ──► client   {"output":"Hi there","completed":true,"error":null}
//! client ──► server   Close(1000)
//! ```
//!
//! The request is the *whole* transcript: the server keeps no state between
//! exchanges. Every `output` is the complete assistant text so far and
//! replaces whatever was shown before; it is never a delta.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::history::Turn;

/// Close code sent by the client when it decides an exchange is over
pub const NORMAL_CLOSURE: u16 = 1000;

/// Path of the streaming endpoint on the webserve server
pub const DEFAULT_ENDPOINT_PATH: &str = "/v1/retrieveResponse";

/// Errors from encoding or decoding wire messages
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The transcript could not be serialized
    #[error("Failed to encode transcript: {0}")]
    Encode(#[source] serde_json::Error),

    /// A server frame was not a valid update object
    #[error("Malformed server update: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Encode the request payload: the full transcript as a JSON array
pub fn encode_transcript(turns: &[Turn]) -> Result<String, ProtocolError> {
    serde_json::to_string(turns).map_err(ProtocolError::Encode)
}

/// One update pushed by the server
///
/// Every field is optional and may be `null`. Empty strings count as absent,
/// matching how the server fills unused fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerUpdate {
    /// Full error text, when generation failed
    #[serde(default)]
    pub error: Option<String>,
    /// Cumulative assistant text
    #[serde(default)]
    pub output: Option<String>,
    /// Marks the terminal update of the exchange
    #[serde(default)]
    pub completed: Option<bool>,
}

impl ServerUpdate {
    /// Parse a text frame
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(ProtocolError::Decode)
    }

    /// Update carrying only output text
    pub fn output(text: impl Into<String>) -> Self {
        Self {
            output: Some(text.into()),
            ..Self::default()
        }
    }

    /// Terminal update carrying the final output text
    pub fn completed(text: impl Into<String>) -> Self {
        Self {
            output: Some(text.into()),
            completed: Some(true),
            ..Self::default()
        }
    }

    /// Update carrying only an error
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            error: Some(text.into()),
            ..Self::default()
        }
    }

    /// Error text, if present and non-empty
    pub fn error_text(&self) -> Option<&str> {
        self.error.as_deref().filter(|s| !s.is_empty())
    }

    /// Output text, if present and non-empty
    pub fn output_text(&self) -> Option<&str> {
        self.output.as_deref().filter(|s| !s.is_empty())
    }

    /// Whether this update ends the exchange
    pub fn is_completed(&self) -> bool {
        self.completed.unwrap_or(false)
    }

    /// Encode as a text frame (used by test servers and tooling)
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}
