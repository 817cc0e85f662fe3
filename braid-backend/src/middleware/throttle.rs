//! Token-bucket request throttling.

use async_trait::async_trait;
use braid_core::backend::{
    Backend, EmbedRequest, Embedding, GenerateRequest, Generation, GenerationStream,
};
use braid_core::error::BackendError;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// Throttle configuration.
#[derive(Debug, Clone, Copy)]
pub struct ThrottleConfig {
    /// Sustained admission rate, requests per second. Must be > 0.
    pub rps: f64,
    /// Extra requests admitted in a burst before spacing kicks in.
    /// `None` means no burst allowance beyond a single token.
    pub burst: Option<u32>,
}

impl ThrottleConfig {
    /// A throttle at the given sustained rate with no burst allowance.
    pub fn per_second(rps: f64) -> Self {
        Self { rps, burst: None }
    }

    fn capacity(&self) -> f64 {
        f64::from(self.burst.unwrap_or(1).max(1))
    }
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket rate limiter over all three backend operations.
///
/// Admission is FIFO: callers queue on a fair async mutex, and a caller
/// that finds the bucket empty *reserves* its token (the balance goes
/// negative) and then waits out its computed delay on the timer wheel.
/// Later callers therefore wait behind it, never around it.
pub struct ThrottleBackend {
    inner: Arc<dyn Backend>,
    config: ThrottleConfig,
    bucket: Mutex<Bucket>,
}

impl ThrottleBackend {
    /// Wrap `inner` with the given throttle.
    pub fn new(inner: Arc<dyn Backend>, config: ThrottleConfig) -> Self {
        let tokens = config.capacity();
        Self {
            inner,
            config,
            bucket: Mutex::new(Bucket {
                tokens,
                last_refill: Instant::now(),
            }),
        }
    }

    async fn admit(&self) {
        let rate_per_ms = (self.config.rps / 1_000.0).max(f64::MIN_POSITIVE);
        let wait_ms = {
            let mut bucket = self.bucket.lock().await;
            let now = Instant::now();
            let elapsed_ms = now.duration_since(bucket.last_refill).as_secs_f64() * 1_000.0;
            bucket.last_refill = now;
            bucket.tokens =
                (bucket.tokens + elapsed_ms * rate_per_ms).min(self.config.capacity());
            bucket.tokens -= 1.0;
            if bucket.tokens >= 0.0 {
                0.0
            } else {
                -bucket.tokens / rate_per_ms
            }
        };
        if wait_ms > 0.0 {
            braid_runtime::delay(wait_ms.ceil() as u64).await;
        }
    }
}

#[async_trait]
impl Backend for ThrottleBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Generation, BackendError> {
        self.admit().await;
        self.inner.generate(request).await
    }

    async fn embed(&self, request: EmbedRequest) -> Result<Embedding, BackendError> {
        self.admit().await;
        self.inner.embed(request).await
    }

    async fn stream(&self, request: GenerateRequest) -> Result<GenerationStream, BackendError> {
        self.admit().await;
        self.inner.stream(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::echo::EchoBackend;

    fn throttled(rps: f64, burst: Option<u32>) -> ThrottleBackend {
        ThrottleBackend::new(Arc::new(EchoBackend::default()), ThrottleConfig { rps, burst })
    }

    #[tokio::test]
    async fn first_call_is_immediate() {
        let backend = throttled(1.0, None);
        let start = Instant::now();
        backend.generate(GenerateRequest::new("p")).await.unwrap();
        assert!(start.elapsed().as_millis() < 100);
    }

    #[tokio::test(start_paused = true)]
    async fn sustained_calls_are_spaced() {
        let backend = throttled(100.0, None);
        let mut stamps = Vec::new();
        for _ in 0..5 {
            backend.generate(GenerateRequest::new("p")).await.unwrap();
            stamps.push(tokio::time::Instant::now());
        }
        // 100 rps → 10 ms spacing after the initial token.
        for pair in stamps.windows(2) {
            let gap = pair[1].duration_since(pair[0]).as_millis();
            assert!(gap >= 5, "gap was {gap} ms");
        }
        let total = stamps[4].duration_since(stamps[0]).as_millis();
        assert!(total >= 36, "total was {total} ms");
    }

    #[tokio::test(start_paused = true)]
    async fn burst_admits_up_front() {
        let backend = throttled(10.0, Some(3));
        let start = tokio::time::Instant::now();
        for _ in 0..3 {
            backend.generate(GenerateRequest::new("p")).await.unwrap();
        }
        // All three fit the burst allowance; no spacing yet.
        assert!(start.elapsed().as_millis() < 50);
        backend.generate(GenerateRequest::new("p")).await.unwrap();
        assert!(start.elapsed().as_millis() >= 90);
    }
}
