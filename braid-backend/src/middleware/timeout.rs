//! Per-call deadlines.

use async_trait::async_trait;
use braid_core::backend::{
    Backend, EmbedRequest, Embedding, GenerateRequest, Generation, GenerationStream,
};
use braid_core::error::BackendError;
use std::sync::Arc;

/// Timeout configuration.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutConfig {
    /// Deadline applied when the request carries no `timeout_ms`.
    pub default_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { default_ms: 30_000 }
    }
}

/// Fails calls that outlive their deadline with [`BackendError::Timeout`].
///
/// A request's own `timeout_ms` overrides the wrapper default. When a call
/// times out its future is dropped, which cancels the in-flight work and
/// closes any owned stream.
pub struct TimeoutBackend {
    inner: Arc<dyn Backend>,
    config: TimeoutConfig,
}

impl TimeoutBackend {
    /// Wrap `inner` with the given deadlines.
    pub fn new(inner: Arc<dyn Backend>, config: TimeoutConfig) -> Self {
        Self { inner, config }
    }

    fn deadline_for(&self, request: &GenerateRequest) -> u64 {
        request.timeout_ms.unwrap_or(self.config.default_ms)
    }
}

#[async_trait]
impl Backend for TimeoutBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Generation, BackendError> {
        let deadline = self.deadline_for(&request);
        braid_runtime::timeout(deadline, self.inner.generate(request))
            .await
            .map_err(|_| BackendError::Timeout)?
    }

    async fn embed(&self, request: EmbedRequest) -> Result<Embedding, BackendError> {
        braid_runtime::timeout(self.config.default_ms, self.inner.embed(request))
            .await
            .map_err(|_| BackendError::Timeout)?
    }

    async fn stream(&self, request: GenerateRequest) -> Result<GenerationStream, BackendError> {
        let deadline = self.deadline_for(&request);
        braid_runtime::timeout(deadline, self.inner.stream(request))
            .await
            .map_err(|_| BackendError::Timeout)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::echo::EchoBackend;
    use braid_core::backend::TokenUsage;

    struct SlowBackend {
        delay_ms: u64,
    }

    #[async_trait]
    impl Backend for SlowBackend {
        fn name(&self) -> &str {
            "slow"
        }
        async fn generate(&self, request: GenerateRequest) -> Result<Generation, BackendError> {
            braid_runtime::delay(self.delay_ms).await;
            Ok(Generation::new(
                request.prompt,
                Some(TokenUsage::default()),
                "slow-1",
            ))
        }
        async fn embed(&self, _request: EmbedRequest) -> Result<Embedding, BackendError> {
            braid_runtime::delay(self.delay_ms).await;
            Ok(Embedding::new(vec![]))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let backend = TimeoutBackend::new(
            Arc::new(SlowBackend { delay_ms: 1_000 }),
            TimeoutConfig { default_ms: 50 },
        );
        let err = backend.generate(GenerateRequest::new("p")).await.unwrap_err();
        assert!(matches!(err, BackendError::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn request_deadline_overrides_default() {
        let backend = TimeoutBackend::new(
            Arc::new(SlowBackend { delay_ms: 100 }),
            TimeoutConfig { default_ms: 10 },
        );
        let mut request = GenerateRequest::new("p");
        request.timeout_ms = Some(5_000);
        let generation = backend.generate(request).await.unwrap();
        assert_eq!(generation.text, "p");
    }

    #[tokio::test]
    async fn zero_deadline_fails_pending_work_immediately() {
        let backend = TimeoutBackend::new(
            Arc::new(SlowBackend { delay_ms: 10_000 }),
            TimeoutConfig { default_ms: 0 },
        );
        let err = backend.embed(EmbedRequest::new("t")).await.unwrap_err();
        assert!(matches!(err, BackendError::Timeout));
    }

    #[tokio::test]
    async fn fast_call_passes_through() {
        let backend =
            TimeoutBackend::new(Arc::new(EchoBackend::default()), TimeoutConfig::default());
        let generation = backend.generate(GenerateRequest::new("ok")).await.unwrap();
        assert_eq!(generation.text, "ok");
    }
}
