//! A deterministic local backend for demos and smoke tests.

use async_trait::async_trait;
use braid_core::backend::{
    Backend, EmbedRequest, Embedding, GenerateRequest, Generation, GenerationStream, StreamChunk,
    TokenUsage,
};
use braid_core::error::BackendError;
use futures_util::stream;

/// Echoes prompts back as completions.
///
/// `generate` returns the prompt text unchanged, `embed` produces a small
/// deterministic vector derived from the text bytes, and `stream` yields
/// the prompt split on whitespace. Useful for wiring checks and for
/// exercising middleware without a provider.
#[derive(Debug, Clone)]
pub struct EchoBackend {
    model: String,
}

impl EchoBackend {
    /// Create an echo backend reporting the given model name.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

impl Default for EchoBackend {
    fn default() -> Self {
        Self::new("echo-1")
    }
}

const EMBED_DIMS: usize = 8;

#[async_trait]
impl Backend for EchoBackend {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Generation, BackendError> {
        let tokens = request.prompt.split_whitespace().count() as u64;
        Ok(Generation::new(
            request.prompt,
            Some(TokenUsage {
                input_tokens: tokens,
                output_tokens: tokens,
            }),
            request.model.unwrap_or_else(|| self.model.clone()),
        ))
    }

    async fn embed(&self, request: EmbedRequest) -> Result<Embedding, BackendError> {
        let mut vector = vec![0.0f32; EMBED_DIMS];
        for (i, byte) in request.text.bytes().enumerate() {
            vector[i % EMBED_DIMS] += f32::from(byte) / 255.0;
        }
        Ok(Embedding::new(vector))
    }

    async fn stream(&self, request: GenerateRequest) -> Result<GenerationStream, BackendError> {
        let chunks: Vec<Result<StreamChunk, BackendError>> = request
            .prompt
            .split_whitespace()
            .map(|word| {
                Ok(StreamChunk {
                    delta: word.to_string(),
                })
            })
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}
