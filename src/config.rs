//! TOML configuration parsing and the deployment policy.
//!
//! All tables are optional: a missing config file (or missing table) falls
//! back to built-in defaults so `devh` works out of the box against a
//! local Ollama or an `OPENAI_API_KEY`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Closed backend selector. Replaces stringly-typed `"openai"`/`"ollama"`
/// selection: the remote hosted backend or the locally-served one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Remote,
    Local,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Remote => write!(f, "remote"),
            EngineKind::Local => write!(f, "local"),
        }
    }
}

/// Explicit deployment policy, passed into the router and index
/// constructors instead of being sniffed from the process environment.
///
/// In a hosted deployment local backends are unavailable, so the policy
/// pins the remote embedding engine unconditionally and rejects an
/// explicit request for the local language model.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DeploymentPolicy {
    #[serde(default)]
    pub hosted: bool,
}

impl DeploymentPolicy {
    /// Effective embedding engine: hosted mode always wins over the
    /// caller's request. This is deployment policy, not a fallback.
    pub fn effective_embedding_engine(&self, requested: EngineKind) -> EngineKind {
        if self.hosted {
            EngineKind::Remote
        } else {
            requested
        }
    }

    /// Effective language-model engine. An explicit request for the local
    /// model under hosted policy is a misconfiguration and must fail
    /// loudly rather than silently substitute.
    pub fn effective_llm_engine(
        &self,
        requested: EngineKind,
    ) -> crate::error::Result<EngineKind> {
        if self.hosted && requested == EngineKind::Local {
            return Err(crate::error::Error::PolicyViolation(
                "the local model is not available in hosted mode; select the remote model"
                    .to_string(),
            ));
        }
        Ok(if self.hosted {
            EngineKind::Remote
        } else {
            requested
        })
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub policy: DeploymentPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory for persisted indexes, one subdirectory per
    /// fingerprint.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    /// Scratch directory for fetched repository snapshots.
    #[serde(default = "default_clone_dir")]
    pub clone_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            clone_dir: default_clone_dir(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./index_store")
}
fn default_clone_dir() -> PathBuf {
    PathBuf::from("./cloned_repo")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// When true, the advisor picks size/overlap from corpus volume
    /// unless the caller passed explicit values.
    #[serde(default = "default_true")]
    pub auto_tune: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            auto_tune: true,
        }
    }
}

fn default_chunk_size() -> usize {
    800
}
fn default_chunk_overlap() -> usize {
    100
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Chunks retrieved for a standard question.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Maximum chunks gathered for a whole-project summary.
    #[serde(default = "default_summary_limit")]
    pub summary_limit: usize,
    /// Per-chunk character cap inside the summary prompt.
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            summary_limit: default_summary_limit(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

fn default_top_k() -> usize {
    4
}
fn default_summary_limit() -> usize {
    12
}
fn default_snippet_chars() -> usize {
    1500
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_remote")]
    pub engine: EngineKind,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_local_embedding_model")]
    pub local_model: String,
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Remote,
            model: default_embedding_model(),
            local_model: default_local_embedding_model(),
            ollama_url: default_ollama_url(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_remote() -> EngineKind {
    EngineKind::Remote
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_local_embedding_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_ollama_url() -> String {
    "http://127.0.0.1:11434".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_remote")]
    pub engine: EngineKind,
    #[serde(default = "default_remote_llm_model")]
    pub model: String,
    #[serde(default = "default_local_llm_model")]
    pub local_model: String,
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Remote,
            model: default_remote_llm_model(),
            local_model: default_local_llm_model(),
            ollama_url: default_ollama_url(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_remote_llm_model() -> String {
    "gpt-4".to_string()
}
fn default_local_llm_model() -> String {
    "llama3".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    120
}

/// Load the config file, falling back to defaults when it does not exist.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be < chunking.chunk_size");
    }
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_config(Path::new("/nonexistent/devhelper.toml")).unwrap();
        assert_eq!(config.chunking.chunk_size, 800);
        assert_eq!(config.retrieval.summary_limit, 12);
        assert!(!config.policy.hosted);
    }

    #[test]
    fn parses_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devhelper.toml");
        std::fs::write(
            &path,
            r#"
[chunking]
chunk_size = 400
chunk_overlap = 50

[policy]
hosted = true
"#,
        )
        .unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.chunking.chunk_size, 400);
        assert!(config.policy.hosted);
        // Untouched tables keep defaults
        assert_eq!(config.embedding.batch_size, 64);
    }

    #[test]
    fn rejects_overlap_not_below_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devhelper.toml");
        std::fs::write(&path, "[chunking]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn hosted_policy_pins_remote_embeddings() {
        let policy = DeploymentPolicy { hosted: true };
        assert_eq!(
            policy.effective_embedding_engine(EngineKind::Local),
            EngineKind::Remote
        );
    }

    #[test]
    fn hosted_policy_rejects_explicit_local_llm() {
        let policy = DeploymentPolicy { hosted: true };
        let err = policy.effective_llm_engine(EngineKind::Local).unwrap_err();
        assert!(matches!(err, crate::error::Error::PolicyViolation(_)));
    }

    #[test]
    fn open_policy_honors_caller_choice() {
        let policy = DeploymentPolicy { hosted: false };
        assert_eq!(
            policy.effective_embedding_engine(EngineKind::Local),
            EngineKind::Local
        );
        assert_eq!(
            policy.effective_llm_engine(EngineKind::Local).unwrap(),
            EngineKind::Local
        );
    }
}
