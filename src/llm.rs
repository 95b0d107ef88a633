//! Language-model backend abstraction.
//!
//! [`LanguageModel`] is implemented by the remote hosted model
//! ([`OpenAiModel`], chat completions) and the locally-served model
//! ([`OllamaModel`]). Both normalize their wire responses into a single
//! typed [`ModelResponse`] with one canonical text accessor, so callers
//! never inspect response shapes themselves.
//!
//! Selection goes through [`create_model`]: under a hosted deployment
//! policy the remote model is pinned, and an explicit request for the
//! local model is a fatal configuration error.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::{DeploymentPolicy, EngineKind, LlmConfig};
use crate::error::{Error, Result};

/// The model's reply, reduced to one canonical text form at the backend
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResponse {
    text: String,
}

impl ModelResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The canonical plain-text content of the reply.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Normalize the shapes a model backend may hand back: a plain string, an
/// object with a `content` or `answer` key, or a nested chat payload.
pub fn normalize_response(value: &serde_json::Value) -> Option<String> {
    if let Some(s) = value.as_str() {
        return Some(s.to_string());
    }
    if let Some(s) = value.get("content").and_then(|v| v.as_str()) {
        return Some(s.to_string());
    }
    if let Some(s) = value.get("answer").and_then(|v| v.as_str()) {
        return Some(s.to_string());
    }
    // OpenAI chat shape: choices[0].message.content
    if let Some(s) = value
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
    {
        return Some(s.to_string());
    }
    // Ollama generate shape: response
    if let Some(s) = value.get("response").and_then(|v| v.as_str()) {
        return Some(s.to_string());
    }
    None
}

/// A text-generation backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<ModelResponse>;

    /// Model identifier (e.g. `"gpt-4"`, `"llama3"`).
    fn model_name(&self) -> &str;
}

/// Instantiate the language model for `requested`, enforcing the
/// deployment policy. Requesting the local model under hosted policy is
/// fatal by design.
pub fn create_model(
    config: &LlmConfig,
    policy: &DeploymentPolicy,
    requested: EngineKind,
) -> Result<Box<dyn LanguageModel>> {
    match policy.effective_llm_engine(requested)? {
        EngineKind::Remote => Ok(Box::new(OpenAiModel::new(config)?)),
        EngineKind::Local => Ok(Box::new(OllamaModel::new(config))),
    }
}

// ============ Remote (OpenAI chat completions) ============

/// Remote hosted model via `POST /v1/chat/completions`, temperature 0.
pub struct OpenAiModel {
    model: String,
    api_key: String,
    api_base: String,
    timeout_secs: u64,
}

impl OpenAiModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            Error::ModelInvocation("OPENAI_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self {
            model: config.model.clone(),
            api_key,
            api_base: "https://api.openai.com".to_string(),
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn generate(&self, prompt: &str) -> Result<ModelResponse> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| Error::ModelInvocation(e.to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = client
            .post(format!("{}/v1/chat/completions", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::ModelInvocation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::ModelInvocation(format!(
                "OpenAI API error {status}: {text}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::ModelInvocation(e.to_string()))?;

        normalize_response(&json)
            .map(ModelResponse::new)
            .ok_or_else(|| {
                Error::ModelInvocation("response contained no textual content".to_string())
            })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ============ Local (Ollama) ============

/// Locally-served model via the Ollama generate API.
pub struct OllamaModel {
    base_url: String,
    model: String,
    timeout_secs: u64,
}

impl OllamaModel {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
            model: config.local_model.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    async fn generate(&self, prompt: &str) -> Result<ModelResponse> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| Error::ModelInvocation(e.to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let response = client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                Error::ModelInvocation(format!(
                    "failed to connect to Ollama at {}: {e}",
                    self.base_url
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ModelInvocation(format!(
                "Ollama API returned {status}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::ModelInvocation(e.to_string()))?;

        normalize_response(&json)
            .map(ModelResponse::new)
            .ok_or_else(|| {
                Error::ModelInvocation("response contained no textual content".to_string())
            })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ============ Mock ============

/// Canned-reply model with an invocation counter. Lets tests assert that
/// certain paths never reach the model.
pub struct MockModel {
    reply: String,
    invocations: AtomicU64,
}

impl MockModel {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            invocations: AtomicU64::new(0),
        }
    }

    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn generate(&self, _prompt: &str) -> Result<ModelResponse> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(ModelResponse::new(self.reply.clone()))
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

/// A model that always fails, for exercising error conversion paths.
pub struct FailingModel;

#[async_trait]
impl LanguageModel for FailingModel {
    async fn generate(&self, _prompt: &str) -> Result<ModelResponse> {
        Err(Error::ModelInvocation("backend unreachable".to_string()))
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}
