//! Embedding engine abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and three backends:
//! - **[`OpenAiEmbedder`]** — the remote hosted provider, with batching,
//!   retry, and exponential backoff.
//! - **[`OllamaEmbedder`]** — the locally-served provider (one request per
//!   text; the Ollama embeddings API is single-prompt).
//! - **[`MockEmbedder`]** — deterministic hash-derived vectors for tests
//!   and offline runs.
//!
//! Engine selection goes through [`create_embedder`], which applies the
//! deployment policy: a hosted deployment pins the remote provider
//! regardless of the caller's request.
//!
//! # Retry strategy (remote provider)
//!
//! - HTTP 429 and 5xx → retry with backoff 1s, 2s, 4s, ... (capped at 2^5)
//! - other 4xx → fail immediately
//! - network errors → retry

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::debug;

use crate::config::{DeploymentPolicy, EmbeddingConfig, EngineKind};
use crate::error::{Error, Result};

/// An embedding backend: text in, similarity-searchable vector out.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Vector dimensionality.
    fn dims(&self) -> usize;
}

/// Embed a single query text.
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    let mut vectors = embedder.embed(&[text.to_string()]).await?;
    if vectors.is_empty() {
        return Err(Error::EmbeddingEngineUnavailable(
            "empty embedding response".to_string(),
        ));
    }
    Ok(vectors.remove(0))
}

/// Instantiate the embedding engine for `requested`, after the deployment
/// policy has its say. Hosted mode silently pins the remote provider —
/// that is deployment policy, not a fallback.
pub fn create_embedder(
    config: &EmbeddingConfig,
    policy: &DeploymentPolicy,
    requested: EngineKind,
) -> Result<Box<dyn Embedder>> {
    match policy.effective_embedding_engine(requested) {
        EngineKind::Remote => Ok(Box::new(OpenAiEmbedder::new(config)?)),
        EngineKind::Local => Ok(Box::new(OllamaEmbedder::new(config))),
    }
}

// ============ Remote (OpenAI) ============

/// Remote embedding engine calling `POST /v1/embeddings`.
///
/// Requires `OPENAI_API_KEY` in the environment. Batches are sized by the
/// caller; this type sends one request per `embed` call.
pub struct OpenAiEmbedder {
    model: String,
    api_key: String,
    api_base: String,
    max_retries: u32,
    timeout_secs: u64,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            Error::EmbeddingEngineUnavailable(
                "OPENAI_API_KEY environment variable not set".to_string(),
            )
        })?;
        Ok(Self {
            model: config.model.clone(),
            api_key,
            api_base: "https://api.openai.com".to_string(),
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| Error::EmbeddingEngineUnavailable(e.to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post(format!("{}/v1/embeddings", self.api_base))
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await.map_err(|e| {
                            Error::EmbeddingEngineUnavailable(e.to_string())
                        })?;
                        return parse_openai_response(&json);
                    }

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let text = response.text().await.unwrap_or_default();
                        last_err = Some(Error::EmbeddingEngineUnavailable(format!(
                            "OpenAI API error {status}: {text}"
                        )));
                        continue;
                    }

                    // Other client errors are not retryable
                    let text = response.text().await.unwrap_or_default();
                    return Err(Error::EmbeddingEngineUnavailable(format!(
                        "OpenAI API error {status}: {text}"
                    )));
                }
                Err(e) => {
                    last_err = Some(Error::EmbeddingEngineUnavailable(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            Error::EmbeddingEngineUnavailable("embedding failed after retries".to_string())
        }))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        1536
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json.get("data").and_then(|d| d.as_array()).ok_or_else(|| {
        Error::EmbeddingEngineUnavailable("invalid response: missing data array".to_string())
    })?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                Error::EmbeddingEngineUnavailable(
                    "invalid response: missing embedding".to_string(),
                )
            })?;
        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vec);
    }

    Ok(embeddings)
}

// ============ Local (Ollama) ============

#[derive(Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

/// Local embedding engine calling the Ollama embeddings API.
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    timeout_secs: u64,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
            model: config.local_model.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| Error::EmbeddingEngineUnavailable(e.to_string()))?;

        let url = format!("{}/api/embeddings", self.base_url);
        let mut vectors = Vec::with_capacity(texts.len());

        for text in texts {
            let request = OllamaEmbeddingRequest {
                model: &self.model,
                prompt: text,
            };
            let response = client.post(&url).json(&request).send().await.map_err(|e| {
                Error::EmbeddingEngineUnavailable(format!(
                    "failed to connect to Ollama at {}: {e}",
                    self.base_url
                ))
            })?;

            if !response.status().is_success() {
                return Err(Error::EmbeddingEngineUnavailable(format!(
                    "Ollama API returned {}",
                    response.status()
                )));
            }

            let parsed: OllamaEmbeddingResponse = response.json().await.map_err(|e| {
                Error::EmbeddingEngineUnavailable(format!(
                    "failed to parse Ollama embedding response: {e}"
                ))
            })?;

            if parsed.embedding.is_empty() {
                return Err(Error::EmbeddingEngineUnavailable(
                    "Ollama returned an empty embedding".to_string(),
                ));
            }
            vectors.push(parsed.embedding);
        }

        debug!(count = vectors.len(), model = %self.model, "embedded batch via ollama");
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        768
    }
}

// ============ Mock ============

/// Deterministic offline embedder: vectors are derived from a SHA-256 of
/// the text, so identical texts always embed identically. Useful for
/// tests and dry runs; similarity is meaningless but stable.
pub struct MockEmbedder {
    dims: usize,
}

impl MockEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(16)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let digest = Sha256::digest(text.as_bytes());
                (0..self.dims)
                    .map(|i| f32::from(digest[i % digest.len()]) / 255.0)
                    .collect()
            })
            .collect())
    }

    fn model_name(&self) -> &str {
        "mock"
    }

    fn dims(&self) -> usize {
        self.dims
    }
}

// ============ Vector math ============

/// Cosine similarity between two embedding vectors, in `[-1.0, 1.0]`.
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[tokio::test]
    async fn mock_embedder_is_deterministic() {
        let embedder = MockEmbedder::default();
        let a = embedder.embed(&["hello".to_string()]).await.unwrap();
        let b = embedder.embed(&["hello".to_string()]).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), embedder.dims());
    }

    #[tokio::test]
    async fn mock_embedder_distinguishes_texts() {
        let embedder = MockEmbedder::default();
        let vecs = embedder
            .embed(&["alpha".to_string(), "beta".to_string()])
            .await
            .unwrap();
        assert_ne!(vecs[0], vecs[1]);
    }

    #[test]
    fn hosted_policy_forces_remote_engine() {
        // Without an API key the remote provider cannot be constructed,
        // which is exactly the visible failure we want under hosted policy.
        let policy = DeploymentPolicy { hosted: true };
        assert_eq!(
            policy.effective_embedding_engine(EngineKind::Local),
            EngineKind::Remote
        );
    }

    #[tokio::test]
    async fn ollama_embedder_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "embedding": [0.1, 0.2, 0.3] })),
            )
            .mount(&server)
            .await;

        let config = EmbeddingConfig {
            ollama_url: server.uri(),
            ..Default::default()
        };
        let embedder = OllamaEmbedder::new(&config);
        let vecs = embedder.embed(&["some text".to_string()]).await.unwrap();
        assert_eq!(vecs, vec![vec![0.1, 0.2, 0.3]]);
    }

    #[tokio::test]
    async fn ollama_error_status_is_engine_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let config = EmbeddingConfig {
            ollama_url: server.uri(),
            ..Default::default()
        };
        let embedder = OllamaEmbedder::new(&config);
        let err = embedder.embed(&["x".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingEngineUnavailable(_)));
    }

    #[tokio::test]
    async fn openai_embedder_parses_batched_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    { "embedding": [1.0, 0.0] },
                    { "embedding": [0.0, 1.0] }
                ]
            })))
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder {
            model: "text-embedding-3-small".to_string(),
            api_key: "test-key".to_string(),
            api_base: server.uri(),
            max_retries: 0,
            timeout_secs: 5,
        };
        let vecs = embedder
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vecs.len(), 2);
        assert_eq!(vecs[0], vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn openai_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder {
            model: "text-embedding-3-small".to_string(),
            api_key: "bad-key".to_string(),
            api_base: server.uri(),
            max_retries: 3,
            timeout_secs: 5,
        };
        let err = embedder.embed(&["a".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingEngineUnavailable(_)));
    }
}
