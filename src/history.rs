//! Chat transcript recording.
//!
//! Interactive sessions accumulate question/answer pairs in a
//! [`ChatLog`], which can be exported as pretty-printed JSON for later
//! inspection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::Result;

/// One question/answer exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEntry {
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

/// An ordered transcript of a chat session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatLog {
    entries: Vec<ChatEntry>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an exchange, stamped with the current time.
    pub fn record(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.entries.push(ChatEntry {
            question: question.into(),
            answer: answer.into(),
            asked_at: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pretty-printed JSON form of the transcript.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }

    /// Write the transcript to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), entries = self.entries.len(), "transcript saved");
        Ok(())
    }
}
