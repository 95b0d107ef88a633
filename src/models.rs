//! Core data models used throughout devhelper.
//!
//! These types represent the documents, chunks, and answers that flow
//! through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// A loaded source file or fetched webpage, before chunking.
///
/// Immutable once created. `source_id` is the path relative to the load
/// root for files, or the URL for webpages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub text: String,
    pub source_id: String,
}

impl SourceDocument {
    pub fn new(text: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_id: source_id.into(),
        }
    }
}

/// A bounded slice of one document's text, the unit indexed for retrieval.
///
/// Derived from exactly one [`SourceDocument`]. README chunks may exist in
/// duplicate to bias retrieval toward project documentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_id: String,
    pub sequence_index: usize,
}

/// The answer produced for one question. Ephemeral; the core never
/// persists it (chat-log export is a session concern).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub answer: String,
}

impl QueryResult {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
        }
    }
}
