//! Typed error taxonomy for the ingestion-and-retrieval pipeline.
//!
//! Per-file load failures are recovered locally in the loader (skip and
//! continue); everything else propagates to the caller and must be rendered
//! as a user-visible message, never silently swallowed.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The given path or URL does not name a loadable source.
    #[error("invalid source: {0}")]
    InvalidSource(String),

    /// A single file could not be read. Logged and skipped, never fatal.
    #[error("failed to load {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    /// The requested embedding backend is not reachable or not configured.
    #[error("embedding engine unavailable: {0}")]
    EmbeddingEngineUnavailable(String),

    /// No persisted index exists for the given fingerprint.
    #[error("no index found for fingerprint '{0}'")]
    IndexNotFound(String),

    /// A chunk (or chunking parameter) is not well-formed.
    #[error("invalid chunk: {0}")]
    InvalidChunk(String),

    /// The question was empty or whitespace-only.
    #[error("question is empty")]
    EmptyQuery,

    /// The language-model backend failed while being invoked.
    #[error("model invocation failed: {0}")]
    ModelInvocation(String),

    /// The repository URL does not match `https://<host>/<owner>/<repo>`.
    #[error("invalid repository URL: {0}")]
    InvalidRepoUrl(String),

    /// The repository metadata lookup (default branch) failed.
    #[error("repository metadata unavailable: {0}")]
    RepoMetadataUnavailable(String),

    /// The snapshot archive could not be downloaded.
    #[error("archive fetch failed: {0}")]
    ArchiveFetchFailed(String),

    /// The snapshot archive could not be extracted.
    #[error("archive extract failed: {0}")]
    ArchiveExtractFailed(String),

    /// A backend was requested that the deployment policy forbids.
    /// Fatal by design: raise rather than silently substitute.
    #[error("deployment policy violation: {0}")]
    PolicyViolation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
