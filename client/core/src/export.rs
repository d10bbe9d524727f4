//! Conversation Export
//!
//! Serializes the conversation, plus the model id and temperature it was
//! produced with, into a pretty-printed JSON artifact:
//!
//! ```json
//! {
//!   "model": "Qwen/Qwen2.5-7B-Instruct",
//!   "temperature": 0.6,
//!   "messages": [
//!     { "role": "user", "content": "hello" },
//!     { "role": "assistant", "content": "Hi there" }
//!   ]
//! }
//! ```
//!
//! The file name is `<provider>-<suffix>.json`: the part of the model id
//! before the first `/`, lower-cased, and the last 8 base-36 digits of the
//! export time in Unix milliseconds.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::history::{ConversationHistory, Turn};

/// Model id used when none is configured
pub const DEFAULT_MODEL: &str = "webserve";

/// Number of base-36 digits kept in the file name suffix
const SUFFIX_LEN: usize = 8;

/// Errors that can occur while exporting
#[derive(Debug, Error)]
pub enum ExportError {
    /// The document could not be serialized
    #[error("Failed to serialize export: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The artifact could not be written
    #[error("Failed to write export to {path}: {source}")]
    Write {
        /// Target path
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },
}

/// Model settings recorded alongside an exported conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Model identifier, usually `<provider>/<name>`
    pub model: String,
    /// Sampling temperature, when known
    pub temperature: Option<f64>,
}

impl Default for SessionMetadata {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
        }
    }
}

impl SessionMetadata {
    /// Metadata for a model
    pub fn new(model: impl Into<String>, temperature: Option<f64>) -> Self {
        Self {
            model: model.into(),
            temperature,
        }
    }

    /// Provider namespace: the model id before the first `/`, lower-cased
    pub fn provider(&self) -> String {
        self.model
            .split('/')
            .next()
            .unwrap_or_default()
            .to_lowercase()
    }
}

/// The exported document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    /// Model identifier
    pub model: String,
    /// Sampling temperature (`null` when unknown)
    pub temperature: Option<f64>,
    /// The conversation, in order
    pub messages: Vec<Turn>,
}

/// A serialized conversation ready to be saved
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportArtifact {
    /// Suggested file name
    pub filename: String,
    /// JSON text
    pub contents: String,
}

/// Build the export artifact for a conversation
pub fn export(
    history: &ConversationHistory,
    metadata: &SessionMetadata,
    now: DateTime<Utc>,
) -> Result<ExportArtifact, ExportError> {
    let document = ExportDocument {
        model: metadata.model.clone(),
        temperature: metadata.temperature,
        messages: history.snapshot(),
    };
    let contents = serde_json::to_string_pretty(&document)?;
    let filename = export_filename(metadata, now);

    tracing::debug!(
        filename = %filename,
        messages = document.messages.len(),
        "Built export artifact"
    );

    Ok(ExportArtifact { filename, contents })
}

/// File name for an export taken at `now`
pub fn export_filename(metadata: &SessionMetadata, now: DateTime<Utc>) -> String {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
    let digits = to_base36(millis);
    let suffix = &digits[digits.len().saturating_sub(SUFFIX_LEN)..];
    format!("{}-{}.json", metadata.provider(), suffix)
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    out.into_iter().map(char::from).collect()
}

/// Destination for export artifacts
pub trait ExportSink {
    /// Store the artifact, returning where it ended up
    fn write(&mut self, artifact: &ExportArtifact) -> Result<PathBuf, ExportError>;
}

/// Writes artifacts as files in a directory
#[derive(Clone, Debug)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Sink writing into `dir` (created on first write)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ExportSink for DirectorySink {
    fn write(&mut self, artifact: &ExportArtifact) -> Result<PathBuf, ExportError> {
        let path = self.dir.join(&artifact.filename);
        fs::create_dir_all(&self.dir).map_err(|source| ExportError::Write {
            path: self.dir.clone(),
            source,
        })?;
        fs::write(&path, &artifact.contents).map_err(|source| ExportError::Write {
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = ?path, "Conversation exported");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn sample_history() -> ConversationHistory {
        let mut history = ConversationHistory::new();
        history.append(Turn::user("hello"));
        history.append(Turn::assistant("Hi there"));
        history
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_700_000_000_000), "loyw3v28");
    }

    #[test]
    fn test_filename_uses_provider_prefix() {
        let metadata = SessionMetadata::new("Qwen/Qwen2.5-7B-Instruct", Some(0.6));
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        assert_eq!(export_filename(&metadata, now), "qwen-loyw3v28.json");
    }

    #[test]
    fn test_filename_without_namespace() {
        let metadata = SessionMetadata::default();
        let now = Utc.timestamp_millis_opt(36).unwrap();
        assert_eq!(export_filename(&metadata, now), "webserve-10.json");
    }

    #[test]
    fn test_filename_keeps_last_eight_digits() {
        let metadata = SessionMetadata::new("Meta/llama", None);
        // 36^9 renders as "1" followed by nine zeros
        let now = Utc.timestamp_millis_opt(101_559_956_668_416).unwrap();
        assert_eq!(export_filename(&metadata, now), "meta-00000000.json");
    }

    #[test]
    fn test_export_document_shape() {
        let metadata = SessionMetadata::new("Org/model", Some(0.6));
        let artifact = export(&sample_history(), &metadata, Utc::now()).unwrap();

        let expected = r#"{
  "model": "Org/model",
  "temperature": 0.6,
  "messages": [
    {
      "role": "user",
      "content": "hello"
    },
    {
      "role": "assistant",
      "content": "Hi there"
    }
  ]
}"#;
        assert_eq!(artifact.contents, expected);
        assert!(artifact.filename.starts_with("org-"));
        assert!(artifact.filename.ends_with(".json"));
    }

    #[test]
    fn test_export_null_temperature() {
        let artifact = export(
            &ConversationHistory::new(),
            &SessionMetadata::default(),
            Utc::now(),
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&artifact.contents).unwrap();
        assert!(value["temperature"].is_null());
        assert_eq!(value["messages"], serde_json::json!([]));
        assert_eq!(value["model"], "webserve");
    }

    #[test]
    fn test_export_reparses_to_history() {
        let history = sample_history();
        let artifact = export(&history, &SessionMetadata::default(), Utc::now()).unwrap();
        let document: ExportDocument = serde_json::from_str(&artifact.contents).unwrap();
        assert_eq!(document.messages, history.snapshot());
    }

    #[test]
    fn test_directory_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path().join("exports"));
        let artifact = ExportArtifact {
            filename: "webserve-abc.json".to_string(),
            contents: "{}".to_string(),
        };

        let path = sink.write(&artifact).unwrap();
        assert_eq!(path, dir.path().join("exports").join("webserve-abc.json"));
        assert_eq!(fs::read_to_string(path).unwrap(), "{}");
    }

    #[test]
    fn test_directory_sink_reports_write_errors() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();

        // A regular file where the directory should be
        let mut sink = DirectorySink::new(&blocker);
        let artifact = ExportArtifact {
            filename: "a.json".to_string(),
            contents: "{}".to_string(),
        };
        let err = sink.write(&artifact).unwrap_err();
        assert!(matches!(err, ExportError::Write { .. }));
    }
}
