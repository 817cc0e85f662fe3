//! Structured request/response logging and instrumentation events.

use async_trait::async_trait;
use braid_core::backend::{
    Backend, EmbedRequest, Embedding, GenerateRequest, Generation, GenerationStream,
};
use braid_core::error::BackendError;
use braid_core::event::{EventKind, emit};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

/// Emits `backend/request` and `backend/response` events around every
/// call, plus `tracing` lines with elapsed time. Transparent otherwise.
pub struct LoggingBackend {
    inner: Arc<dyn Backend>,
}

impl LoggingBackend {
    /// Wrap `inner` with logging.
    pub fn new(inner: Arc<dyn Backend>) -> Self {
        Self { inner }
    }

    fn request_event(&self, op: &str, model: Option<&str>) {
        emit(
            EventKind::BackendRequest,
            json!({
                "backend": self.inner.name(),
                "op": op,
                "model": model,
            }),
        );
    }

    fn response_event(&self, op: &str, elapsed_ms: u64, error: Option<&BackendError>) {
        emit(
            EventKind::BackendResponse,
            json!({
                "backend": self.inner.name(),
                "op": op,
                "elapsed_ms": elapsed_ms,
                "ok": error.is_none(),
                "error": error.map(|e| e.to_string()),
            }),
        );
        match error {
            None => {
                tracing::debug!(backend = self.inner.name(), op, elapsed_ms, "backend call ok")
            }
            Some(error) => tracing::warn!(
                backend = self.inner.name(),
                op,
                elapsed_ms,
                error = %error,
                "backend call failed"
            ),
        }
    }
}

#[async_trait]
impl Backend for LoggingBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Generation, BackendError> {
        self.request_event("generate", request.model.as_deref());
        let start = Instant::now();
        let result = self.inner.generate(request).await;
        self.response_event(
            "generate",
            start.elapsed().as_millis() as u64,
            result.as_ref().err(),
        );
        result
    }

    async fn embed(&self, request: EmbedRequest) -> Result<Embedding, BackendError> {
        self.request_event("embed", request.model.as_deref());
        let start = Instant::now();
        let result = self.inner.embed(request).await;
        self.response_event(
            "embed",
            start.elapsed().as_millis() as u64,
            result.as_ref().err(),
        );
        result
    }

    async fn stream(&self, request: GenerateRequest) -> Result<GenerationStream, BackendError> {
        self.request_event("stream", request.model.as_deref());
        let start = Instant::now();
        let result = self.inner.stream(request).await;
        self.response_event(
            "stream",
            start.elapsed().as_millis() as u64,
            result.as_ref().err(),
        );
        result
    }
}
