//! Circuit breaker — fail fast through provider error storms.

use async_trait::async_trait;
use braid_core::backend::{
    Backend, EmbedRequest, Embedding, GenerateRequest, Generation, GenerationStream,
};
use braid_core::error::BackendError;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before admitting a probe.
    pub cooldown_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_ms: 30_000,
        }
    }
}

/// Breaker state, observable for tests and operational introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation.
    Closed,
    /// Failing fast; calls are rejected without reaching the backend.
    Open,
    /// Cooldown elapsed; the next calls probe the backend.
    HalfOpen,
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Opens after `failure_threshold` consecutive failures, fails fast with
/// [`BackendError::CircuitOpen`] while open, and transitions to half-open
/// after the cooldown. A single successful probe closes the circuit; a
/// failed probe reopens it and restarts the cooldown.
pub struct CircuitBreakerBackend {
    inner: Arc<dyn Backend>,
    config: BreakerConfig,
    breaker: Mutex<BreakerInner>,
}

impl CircuitBreakerBackend {
    /// Wrap `inner` with the given breaker.
    pub fn new(inner: Arc<dyn Backend>, config: BreakerConfig) -> Self {
        Self {
            inner,
            config,
            breaker: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    /// The breaker's current state.
    pub fn state(&self) -> CircuitState {
        self.breaker.lock().expect("breaker state poisoned").state
    }

    fn admit(&self) -> Result<(), BackendError> {
        let mut breaker = self.breaker.lock().expect("breaker state poisoned");
        match breaker.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let cooled = breaker
                    .opened_at
                    .is_some_and(|at| at.elapsed().as_millis() as u64 >= self.config.cooldown_ms);
                if cooled {
                    breaker.state = CircuitState::HalfOpen;
                    Ok(())
                } else {
                    Err(BackendError::CircuitOpen)
                }
            }
        }
    }

    fn record_success(&self) {
        let mut breaker = self.breaker.lock().expect("breaker state poisoned");
        breaker.consecutive_failures = 0;
        breaker.opened_at = None;
        breaker.state = CircuitState::Closed;
    }

    fn record_failure(&self) {
        let mut breaker = self.breaker.lock().expect("breaker state poisoned");
        match breaker.state {
            CircuitState::HalfOpen => {
                breaker.state = CircuitState::Open;
                breaker.opened_at = Some(Instant::now());
            }
            CircuitState::Closed => {
                breaker.consecutive_failures += 1;
                if breaker.consecutive_failures >= self.config.failure_threshold {
                    breaker.state = CircuitState::Open;
                    breaker.opened_at = Some(Instant::now());
                    tracing::warn!(
                        backend = self.inner.name(),
                        failures = breaker.consecutive_failures,
                        "circuit opened"
                    );
                }
            }
            CircuitState::Open => {}
        }
    }

    async fn guard<T, Fut>(&self, call: impl FnOnce() -> Fut) -> Result<T, BackendError>
    where
        Fut: Future<Output = Result<T, BackendError>>,
    {
        self.admit()?;
        match call().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                self.record_failure();
                Err(error)
            }
        }
    }
}

#[async_trait]
impl Backend for CircuitBreakerBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Generation, BackendError> {
        self.guard(|| self.inner.generate(request)).await
    }

    async fn embed(&self, request: EmbedRequest) -> Result<Embedding, BackendError> {
        self.guard(|| self.inner.embed(request)).await
    }

    async fn stream(&self, request: GenerateRequest) -> Result<GenerationStream, BackendError> {
        self.guard(|| self.inner.stream(request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ScriptedBackend;

    fn breaker(script: &ScriptedBackend, threshold: u32, cooldown_ms: u64) -> CircuitBreakerBackend {
        CircuitBreakerBackend::new(
            Arc::new(script.clone()),
            BreakerConfig {
                failure_threshold: threshold,
                cooldown_ms,
            },
        )
    }

    #[tokio::test]
    async fn opens_after_threshold_and_fails_fast() {
        let script = ScriptedBackend::new();
        script.push_error(BackendError::Retriable("a".into()));
        script.push_error(BackendError::Retriable("b".into()));
        let backend = breaker(&script, 2, 60_000);

        assert!(backend.generate(GenerateRequest::new("p")).await.is_err());
        assert_eq!(backend.state(), CircuitState::Closed);
        assert!(backend.generate(GenerateRequest::new("p")).await.is_err());
        assert_eq!(backend.state(), CircuitState::Open);

        // Fails fast without consuming script responses.
        let before = script.call_count();
        let err = backend.generate(GenerateRequest::new("p")).await.unwrap_err();
        assert!(matches!(err, BackendError::CircuitOpen));
        assert_eq!(script.call_count(), before);
    }

    #[tokio::test]
    async fn single_probe_success_closes() {
        let script = ScriptedBackend::new();
        script.push_error(BackendError::Retriable("a".into()));
        script.push_text("recovered");
        script.push_text("steady");
        let backend = breaker(&script, 1, 0);

        assert!(backend.generate(GenerateRequest::new("p")).await.is_err());
        assert_eq!(backend.state(), CircuitState::Open);

        // Zero cooldown: next call probes and succeeds.
        let generation = backend.generate(GenerateRequest::new("p")).await.unwrap();
        assert_eq!(generation.text, "recovered");
        assert_eq!(backend.state(), CircuitState::Closed);
        assert!(backend.generate(GenerateRequest::new("p")).await.is_ok());
    }

    #[tokio::test]
    async fn failed_probe_reopens() {
        let script = ScriptedBackend::new();
        script.push_error(BackendError::Retriable("a".into()));
        script.push_error(BackendError::Retriable("probe fails".into()));
        let backend = breaker(&script, 1, 0);

        assert!(backend.generate(GenerateRequest::new("p")).await.is_err());
        assert!(backend.generate(GenerateRequest::new("p")).await.is_err());
        assert_eq!(backend.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn success_resets_failure_streak() {
        let script = ScriptedBackend::new();
        script.push_error(BackendError::Retriable("a".into()));
        script.push_text("ok");
        script.push_error(BackendError::Retriable("b".into()));
        let backend = breaker(&script, 2, 60_000);

        assert!(backend.generate(GenerateRequest::new("p")).await.is_err());
        assert!(backend.generate(GenerateRequest::new("p")).await.is_ok());
        assert!(backend.generate(GenerateRequest::new("p")).await.is_err());
        // Streak restarted after the success; still closed.
        assert_eq!(backend.state(), CircuitState::Closed);
    }
}
