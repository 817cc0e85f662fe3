//! Retries with exponential backoff and jitter.

use async_trait::async_trait;
use braid_core::backend::{
    Backend, EmbedRequest, Embedding, GenerateRequest, Generation, GenerationStream,
};
use braid_core::error::BackendError;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;

/// Classifies which errors are worth retrying.
pub type RetryPredicate = Arc<dyn Fn(&BackendError) -> bool + Send + Sync>;

/// Retry configuration.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Backoff before the first retry, in milliseconds.
    pub initial_ms: u64,
    /// Multiplier applied to the backoff after each retry.
    pub factor: f64,
    /// Backoff ceiling in milliseconds.
    pub max_ms: u64,
    /// Whether to add jitter (up to half the base backoff) to each wait.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_ms: 100,
            factor: 2.0,
            max_ms: 10_000,
            jitter: true,
        }
    }
}

/// Retries failed calls against the inner backend.
///
/// Backoff grows geometrically from `initial_ms` by `factor` up to
/// `max_ms`; jitter adds up to 50% of the base so synchronized callers
/// spread out. The waits are additive-jittered rather than scaled, so
/// successive backoffs never shrink. Delays are scheduled on the timer
/// wheel, never slept.
pub struct RetryBackend {
    inner: Arc<dyn Backend>,
    config: RetryConfig,
    retryable: RetryPredicate,
}

impl RetryBackend {
    /// Wrap `inner`, retrying errors that [`BackendError::is_retryable`]
    /// classifies as transient.
    pub fn new(inner: Arc<dyn Backend>, config: RetryConfig) -> Self {
        Self {
            inner,
            config,
            retryable: Arc::new(BackendError::is_retryable),
        }
    }

    /// Wrap `inner` with a caller-supplied retry classification.
    pub fn with_predicate(
        inner: Arc<dyn Backend>,
        config: RetryConfig,
        retryable: RetryPredicate,
    ) -> Self {
        Self {
            inner,
            config,
            retryable,
        }
    }

    fn backoff_ms(&self, attempt: u32) -> u64 {
        let base = (self.config.initial_ms as f64 * self.config.factor.powi(attempt as i32))
            .min(self.config.max_ms as f64);
        let jitter = if self.config.jitter && base >= 1.0 {
            rand::thread_rng().gen_range(0.0..=base / 2.0)
        } else {
            0.0
        };
        (base + jitter).round() as u64
    }

    async fn run<T, Fut>(&self, mut call: impl FnMut() -> Fut) -> Result<T, BackendError>
    where
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if attempt >= self.config.max_retries || !(self.retryable)(&error) {
                        return Err(error);
                    }
                    let wait = self.backoff_ms(attempt);
                    tracing::debug!(
                        backend = self.inner.name(),
                        attempt,
                        wait_ms = wait,
                        error = %error,
                        "retrying backend call"
                    );
                    braid_runtime::delay(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl Backend for RetryBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Generation, BackendError> {
        self.run(|| self.inner.generate(request.clone())).await
    }

    async fn embed(&self, request: EmbedRequest) -> Result<Embedding, BackendError> {
        self.run(|| self.inner.embed(request.clone())).await
    }

    async fn stream(&self, request: GenerateRequest) -> Result<GenerationStream, BackendError> {
        self.run(|| self.inner.stream(request.clone())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ScriptedBackend;

    fn no_jitter(max_retries: u32, initial_ms: u64) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_ms,
            factor: 2.0,
            max_ms: 10_000,
            jitter: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let script = ScriptedBackend::new();
        script.push_error(BackendError::Retriable("reset".into()));
        script.push_error(BackendError::RateLimited);
        script.push_text("third time lucky");

        let backend = RetryBackend::new(Arc::new(script.clone()), no_jitter(3, 5));
        let generation = backend.generate(GenerateRequest::new("p")).await.unwrap();
        assert_eq!(generation.text, "third time lucky");
        assert_eq!(script.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_grows_between_attempts() {
        let script = ScriptedBackend::new();
        script.push_error(BackendError::Retriable("one".into()));
        script.push_error(BackendError::Retriable("two".into()));
        script.push_text("done");

        let backend = RetryBackend::new(Arc::new(script), no_jitter(3, 5));
        let start = tokio::time::Instant::now();
        backend.generate(GenerateRequest::new("p")).await.unwrap();
        // 5 ms after the first failure + 10 ms after the second.
        assert!(start.elapsed().as_millis() >= 15);
    }

    #[tokio::test]
    async fn non_retryable_errors_surface_immediately() {
        let script = ScriptedBackend::new();
        script.push_error(BackendError::Provider("bad key".into()));
        script.push_text("unreachable");

        let backend = RetryBackend::new(Arc::new(script.clone()), no_jitter(3, 1));
        let err = backend.generate(GenerateRequest::new("p")).await.unwrap_err();
        assert!(matches!(err, BackendError::Provider(_)));
        assert_eq!(script.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_last_error() {
        let script = ScriptedBackend::new();
        for _ in 0..3 {
            script.push_error(BackendError::RateLimited);
        }
        let backend = RetryBackend::new(Arc::new(script.clone()), no_jitter(2, 1));
        let err = backend.generate(GenerateRequest::new("p")).await.unwrap_err();
        assert!(matches!(err, BackendError::RateLimited));
        assert_eq!(script.call_count(), 3);
    }

    #[tokio::test]
    async fn custom_predicate_overrides_default() {
        let script = ScriptedBackend::new();
        script.push_error(BackendError::RateLimited);
        script.push_text("unreachable");

        let never: RetryPredicate = Arc::new(|_| false);
        let backend =
            RetryBackend::with_predicate(Arc::new(script.clone()), no_jitter(3, 1), never);
        assert!(backend.generate(GenerateRequest::new("p")).await.is_err());
        assert_eq!(script.call_count(), 1);
    }

    #[test]
    fn jittered_backoff_never_shrinks_across_attempts() {
        let backend = RetryBackend::new(
            Arc::new(ScriptedBackend::new()),
            RetryConfig {
                max_retries: 3,
                initial_ms: 5,
                factor: 2.0,
                max_ms: 10_000,
                jitter: true,
            },
        );
        for _ in 0..100 {
            let first = backend.backoff_ms(0);
            let second = backend.backoff_ms(1);
            // first ∈ [5, 7.5], second ∈ [10, 15]
            assert!(second >= first);
        }
    }
}
