//! A backend that replays a queue of canned responses.
//!
//! The test fixture for everything above the backend boundary: reasoning
//! loops, evaluation, optimization. Clones share the same queue, so a
//! module under test and the asserting test body can hold the same script.

use async_trait::async_trait;
use braid_core::backend::{
    Backend, EmbedRequest, Embedding, GenerateRequest, Generation, TokenUsage,
};
use braid_core::error::BackendError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

enum Scripted {
    Text(String),
    Fail(BackendError),
}

struct Inner {
    responses: Mutex<VecDeque<Scripted>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    model: String,
}

/// Replays queued responses in order; records the prompts it was given.
///
/// An exhausted script fails with [`BackendError::InvalidResponse`], which
/// makes a test that consumes more turns than it queued fail loudly rather
/// than loop.
#[derive(Clone)]
pub struct ScriptedBackend {
    inner: Arc<Inner>,
}

impl ScriptedBackend {
    /// An empty script. Queue responses with [`push_text`](Self::push_text)
    /// and [`push_error`](Self::push_error).
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                responses: Mutex::new(VecDeque::new()),
                prompts: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
                model: "scripted-1".into(),
            }),
        }
    }

    /// A script preloaded with text responses, replied in order.
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backend = Self::new();
        for response in responses {
            backend.push_text(response);
        }
        backend
    }

    /// Queue a text response.
    pub fn push_text(&self, text: impl Into<String>) {
        self.inner
            .responses
            .lock()
            .expect("script queue poisoned")
            .push_back(Scripted::Text(text.into()));
    }

    /// Queue a failure.
    pub fn push_error(&self, error: BackendError) {
        self.inner
            .responses
            .lock()
            .expect("script queue poisoned")
            .push_back(Scripted::Fail(error));
    }

    /// Number of `generate` calls observed so far.
    pub fn call_count(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// The prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.inner
            .prompts
            .lock()
            .expect("script prompts poisoned")
            .clone()
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Generation, BackendError> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .prompts
            .lock()
            .expect("script prompts poisoned")
            .push(request.prompt);
        let next = self
            .inner
            .responses
            .lock()
            .expect("script queue poisoned")
            .pop_front();
        match next {
            Some(Scripted::Text(text)) => Ok(Generation::new(
                text,
                Some(TokenUsage::default()),
                request.model.unwrap_or_else(|| self.inner.model.clone()),
            )),
            Some(Scripted::Fail(error)) => Err(error),
            None => Err(BackendError::InvalidResponse(
                "scripted backend exhausted".into(),
            )),
        }
    }

    async fn embed(&self, _request: EmbedRequest) -> Result<Embedding, BackendError> {
        Ok(Embedding::new(vec![0.0]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_in_order_then_exhausts() {
        let backend = ScriptedBackend::with_responses(["first", "second"]);
        let a = backend.generate(GenerateRequest::new("p1")).await.unwrap();
        let b = backend.generate(GenerateRequest::new("p2")).await.unwrap();
        assert_eq!(a.text, "first");
        assert_eq!(b.text, "second");

        let err = backend.generate(GenerateRequest::new("p3")).await;
        assert!(matches!(err, Err(BackendError::InvalidResponse(_))));
        assert_eq!(backend.call_count(), 3);
        assert_eq!(backend.prompts(), vec!["p1", "p2", "p3"]);
    }

    #[tokio::test]
    async fn clones_share_the_queue() {
        let backend = ScriptedBackend::with_responses(["only"]);
        let clone = backend.clone();
        clone.generate(GenerateRequest::new("p")).await.unwrap();
        assert_eq!(backend.call_count(), 1);
        assert!(backend.generate(GenerateRequest::new("p")).await.is_err());
    }

    #[tokio::test]
    async fn queued_errors_surface() {
        let backend = ScriptedBackend::new();
        backend.push_error(BackendError::RateLimited);
        backend.push_text("after");
        assert!(matches!(
            backend.generate(GenerateRequest::new("p")).await,
            Err(BackendError::RateLimited)
        ));
        assert_eq!(
            backend
                .generate(GenerateRequest::new("p"))
                .await
                .unwrap()
                .text,
            "after"
        );
    }
}
