//! The Backend protocol — a uniform LLM interface.
//!
//! Providers and middleware both implement [`Backend`]. Middleware wraps an
//! inner `Arc<dyn Backend>` and preserves the contract, so retry, throttle,
//! timeout, breaker, and logging layers compose in any order.

use crate::error::BackendError;
use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;

/// A completion request.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// The prompt text.
    pub prompt: String,
    /// Model override (None = backend default).
    pub model: Option<String>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Per-call deadline in milliseconds, honored by the timeout wrapper.
    pub timeout_ms: Option<u64>,
    /// Provider-specific extras, passed through opaquely.
    #[serde(default)]
    pub extra: Value,
}

impl GenerateRequest {
    /// A request with defaults for everything but the prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            max_tokens: None,
            temperature: None,
            timeout_ms: None,
            extra: Value::Null,
        }
    }
}

/// Token accounting for a completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub input_tokens: u64,
    /// Tokens generated.
    pub output_tokens: u64,
}

/// A completed generation.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    /// The generated text.
    pub text: String,
    /// Token usage, when the provider reports it.
    pub usage: Option<TokenUsage>,
    /// The model that produced the text.
    pub model: String,
}

impl Generation {
    /// A generation carrying only text.
    pub fn text_only(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
            model: model.into(),
        }
    }

    /// A generation carrying text, usage, and model.
    pub fn new(text: impl Into<String>, usage: Option<TokenUsage>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage,
            model: model.into(),
        }
    }
}

/// An embedding request.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedRequest {
    /// The text to embed.
    pub text: String,
    /// Model override (None = backend default).
    pub model: Option<String>,
}

impl EmbedRequest {
    /// A request with the backend's default model.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: None,
        }
    }
}

/// An embedding vector.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    /// The vector components.
    pub vector: Vec<f32>,
}

impl Embedding {
    /// An embedding with the given vector components.
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }
}

/// One streamed fragment of a generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// The text delta.
    pub delta: String,
}

/// A stream of generation chunks.
pub type GenerationStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, BackendError>> + Send>>;

/// Uniform LLM interface.
///
/// Object-safe by design: middleware holds `Arc<dyn Backend>` and the
/// module runtime threads one shared backend through execution.
/// `stream` is optional — the default signals unsupported, which callers
/// treat as "fall back to `generate`".
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name used in logs and events.
    fn name(&self) -> &str;

    /// Complete a prompt.
    async fn generate(&self, request: GenerateRequest) -> Result<Generation, BackendError>;

    /// Embed a text.
    async fn embed(&self, request: EmbedRequest) -> Result<Embedding, BackendError>;

    /// Stream a completion. Backends that cannot stream keep the default.
    async fn stream(&self, request: GenerateRequest) -> Result<GenerationStream, BackendError> {
        let _ = request;
        Err(BackendError::Unsupported(format!(
            "{} does not support streaming",
            self.name()
        )))
    }
}
