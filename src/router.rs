//! Question routing: whole-project summary vs. standard retrieval-QA.
//!
//! A question whose lower-cased text contains one of the summary trigger
//! phrases is answered from a fixed "project overview" retrieval with a
//! structured summary prompt; everything else goes through the standard
//! top-k retrieval-QA path. Model failures are terminal and user-visible:
//! they become the answer text rather than a crash.

use tracing::debug;

use crate::config::RetrievalConfig;
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::index::VectorIndex;
use crate::llm::LanguageModel;
use crate::models::{Chunk, QueryResult};

/// Phrases that route a question to summary mode (substring match on the
/// lower-cased question).
const SUMMARY_TRIGGERS: &[&str] = &[
    "readme",
    "project",
    "repo",
    "what this repo",
    "what is this repo",
    "what this codebase",
    "what does this repo do",
    "describe this repository",
    "summary of this repo",
];

/// Fixed retrieval query used to gather material for a summary.
const SUMMARY_RETRIEVAL_QUERY: &str = "project overview";

/// How a question will be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMode {
    Summary,
    Standard,
}

/// Classify a question. Empty or whitespace-only input is an error.
pub fn classify(question: &str) -> Result<RouteMode> {
    if question.trim().is_empty() {
        return Err(Error::EmptyQuery);
    }
    let lower = question.to_lowercase();
    if SUMMARY_TRIGGERS.iter().any(|t| lower.contains(t)) {
        Ok(RouteMode::Summary)
    } else {
        Ok(RouteMode::Standard)
    }
}

/// First `limit` characters of `text` (char-boundary safe).
fn head_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

fn summary_prompt(chunks: &[Chunk], question: &str, snippet_chars: usize) -> String {
    let file_list: Vec<&str> = chunks.iter().map(|c| c.source_id.as_str()).collect();
    let snippets: Vec<String> = chunks
        .iter()
        .map(|c| head_chars(&c.text, snippet_chars))
        .collect();

    format!(
        "You are an expert software assistant.\n\
         \n\
         Below are the main files and key code/documentation snippets from a software project:\n\
         \n\
         Files:\n{}\n\
         \n\
         File Contents:\n{}\n\
         \n\
         User Question:\n{}\n\
         \n\
         Based on the above files and their content, give a clear, practical summary of what \
         this repository or codebase does, what kind of project it is, its main components, \
         and what its main files or code blocks implement. If possible, infer the purpose from \
         the filenames and code. Do not guess; use only the provided code and files.",
        file_list.join("\n"),
        snippets.join("\n\n"),
        question.trim()
    )
}

fn qa_prompt(chunks: &[Chunk], question: &str) -> String {
    let context: Vec<String> = chunks
        .iter()
        .map(|c| format!("[{}]\n{}", c.source_id, c.text))
        .collect();
    format!(
        "Use the following context from the codebase to answer the question. \
         If the context does not contain the answer, say so.\n\
         \n\
         Context:\n{}\n\
         \n\
         Question: {}\n\
         Answer:",
        context.join("\n\n"),
        question.trim()
    )
}

/// Answer a question against an index.
///
/// Returns `EmptyQuery` for blank input before any retrieval or model
/// call. Model invocation failures are converted into a result whose text
/// is a human-readable error message.
pub async fn answer(
    index: &VectorIndex,
    embedder: &dyn Embedder,
    model: &dyn LanguageModel,
    retrieval: &RetrievalConfig,
    question: &str,
) -> Result<QueryResult> {
    let mode = classify(question)?;
    debug!(?mode, "routed question");

    let result = match mode {
        RouteMode::Summary => {
            let chunks = index
                .search(SUMMARY_RETRIEVAL_QUERY, retrieval.summary_limit, embedder)
                .await?;
            if chunks.is_empty() {
                return Ok(QueryResult::new("No files found to summarize."));
            }
            let prompt = summary_prompt(&chunks, question, retrieval.snippet_chars);
            model.generate(&prompt).await
        }
        RouteMode::Standard => {
            let chunks = index
                .search(question, retrieval.top_k, embedder)
                .await?;
            let prompt = qa_prompt(&chunks, question);
            model.generate(&prompt).await
        }
    };

    match result {
        Ok(response) => Ok(QueryResult::new(response.into_text())),
        Err(e) => Ok(QueryResult::new(format!("Error: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbedder;
    use crate::index::fingerprint;
    use crate::llm::{FailingModel, MockModel};

    #[test]
    fn summary_questions_route_to_summary_mode() {
        assert_eq!(classify("what does this repo do?").unwrap(), RouteMode::Summary);
        assert_eq!(classify("Give me a summary of this repo").unwrap(), RouteMode::Summary);
        assert_eq!(classify("Where is the ReadMe?").unwrap(), RouteMode::Summary);
    }

    #[test]
    fn specific_questions_route_to_standard_mode() {
        assert_eq!(classify("how does function foo work?").unwrap(), RouteMode::Standard);
        assert_eq!(classify("where is the config parsed?").unwrap(), RouteMode::Standard);
    }

    #[test]
    fn empty_question_is_rejected() {
        assert!(matches!(classify("").unwrap_err(), Error::EmptyQuery));
        assert!(matches!(classify("   \n\t").unwrap_err(), Error::EmptyQuery));
    }

    #[test]
    fn summary_prompt_caps_snippet_length() {
        let chunks = vec![Chunk {
            text: "x".repeat(5000),
            source_id: "big.rs".to_string(),
            sequence_index: 0,
        }];
        let prompt = summary_prompt(&chunks, "what is this project?", 1500);
        assert!(prompt.contains("big.rs"));
        assert!(!prompt.contains(&"x".repeat(1501)));
        assert!(prompt.contains(&"x".repeat(1500)));
    }

    async fn build_index(dir: &std::path::Path, chunks: Vec<Chunk>) -> VectorIndex {
        let embedder = MockEmbedder::default();
        VectorIndex::build(chunks, &fingerprint("router-test", 400, 50), &embedder, dir, 64)
            .await
            .unwrap()
    }

    fn chunk(text: &str, source_id: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            source_id: source_id.to_string(),
            sequence_index: 0,
        }
    }

    #[tokio::test]
    async fn empty_question_never_reaches_the_model() {
        let dir = tempfile::tempdir().unwrap();
        let index = build_index(dir.path(), vec![chunk("content", "a.rs")]).await;
        let embedder = MockEmbedder::default();
        let model = MockModel::new("should not run");

        let err = answer(&index, &embedder, &model, &RetrievalConfig::default(), "  ")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyQuery));
        assert_eq!(model.invocations(), 0);
    }

    #[tokio::test]
    async fn empty_index_summary_skips_the_model() {
        let dir = tempfile::tempdir().unwrap();
        let index = build_index(dir.path(), vec![]).await;
        let embedder = MockEmbedder::default();
        let model = MockModel::new("should not run");

        let result = answer(
            &index,
            &embedder,
            &model,
            &RetrievalConfig::default(),
            "what does this repo do?",
        )
        .await
        .unwrap();
        assert_eq!(result.answer, "No files found to summarize.");
        assert_eq!(model.invocations(), 0);
    }

    #[tokio::test]
    async fn standard_mode_invokes_the_model_once() {
        let dir = tempfile::tempdir().unwrap();
        let index = build_index(dir.path(), vec![chunk("fn foo() {}", "foo.rs")]).await;
        let embedder = MockEmbedder::default();
        let model = MockModel::new("foo returns unit");

        let result = answer(
            &index,
            &embedder,
            &model,
            &RetrievalConfig::default(),
            "how does function foo work?",
        )
        .await
        .unwrap();
        assert_eq!(result.answer, "foo returns unit");
        assert_eq!(model.invocations(), 1);
    }

    #[tokio::test]
    async fn model_failure_becomes_readable_answer() {
        let dir = tempfile::tempdir().unwrap();
        let index = build_index(dir.path(), vec![chunk("content", "a.rs")]).await;
        let embedder = MockEmbedder::default();

        let result = answer(
            &index,
            &embedder,
            &FailingModel,
            &RetrievalConfig::default(),
            "how does function foo work?",
        )
        .await
        .unwrap();
        assert!(result.answer.starts_with("Error:"));
        assert!(result.answer.contains("backend unreachable"));
    }
}
