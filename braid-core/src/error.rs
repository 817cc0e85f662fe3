//! Error types for each protocol.
//!
//! The canonical kind names (`Timeout`, `RateLimited`, `CircuitOpen`,
//! `PipelineCycle`, …) are stable and intended for pattern matching by
//! callers; new variants may be added, so every enum is `#[non_exhaustive]`.

use thiserror::Error;

/// Errors from LLM backends and their middleware wrappers.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BackendError {
    /// The call exceeded its deadline.
    #[error("timed out")]
    Timeout,

    /// The provider (or the throttle wrapper) rejected the call for rate.
    #[error("rate limited")]
    RateLimited,

    /// A transient transport failure; retrying may succeed.
    #[error("retriable: {0}")]
    Retriable(String),

    /// The circuit breaker is open; the call was not attempted.
    #[error("circuit open")]
    CircuitOpen,

    /// The backend does not support the requested operation or provider.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The provider returned an error that retrying won't fix.
    #[error("provider error: {0}")]
    Provider(String),

    /// The provider's response could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Catch-all. Include context.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl BackendError {
    /// Whether retrying this call might succeed.
    ///
    /// This is the default classification used by the retry middleware;
    /// callers can substitute their own predicate.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BackendError::Timeout | BackendError::RateLimited | BackendError::Retriable(_)
        )
    }
}

/// Errors from signature definition.
///
/// Runtime validation of values against a signature never produces an
/// error — it returns `false` or a [`crate::SignatureDiagnosis`]. This enum
/// covers malformed signature *definitions*.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SignatureError {
    /// A field name is not identifier-like.
    #[error("invalid field name: {0:?}")]
    InvalidFieldName(String),

    /// The same field name appears on both sides of the signature.
    #[error("field on both sides of signature: {0}")]
    FieldOverlap(String),
}

/// Module execution errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The input (or output) map did not satisfy the module's signature.
    #[error("signature validation failed for {signature}: {explain}")]
    SignatureValidation {
        /// Name of the violated signature.
        signature: String,
        /// Human-readable diagnosis of the mismatch.
        explain: String,
    },

    /// A backend call inside the module failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// A pipeline-structured module failed.
    #[error("pipeline error: {0}")]
    Pipeline(Box<PipelineError>),

    /// Catch-all. Include context.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl From<PipelineError> for ModuleError {
    fn from(e: PipelineError) -> Self {
        ModuleError::Pipeline(Box::new(e))
    }
}

/// Pipeline compilation and execution errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage id appeared more than once.
    #[error("duplicate stage id: {0}")]
    DuplicateStage(String),

    /// A stage depends on a stage that does not exist.
    #[error("stage {stage} depends on missing stage {missing}")]
    MissingDependency {
        /// The stage declaring the dependency.
        stage: String,
        /// The dependency that was not found.
        missing: String,
    },

    /// The dependency graph contains a cycle.
    #[error("dependency cycle among stages: {remaining:?}")]
    Cycle {
        /// Stages that could not be topologically ordered.
        remaining: Vec<String>,
    },

    /// A stage's module failed during execution.
    #[error("stage {stage} failed: {source}")]
    ExecutionFailed {
        /// Id of the failed stage.
        stage: String,
        /// The underlying module error.
        #[source]
        source: Box<ModuleError>,
    },
}

/// Storage errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store could not be opened or reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Serialization or deserialization of a persisted blob failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A read or write failed.
    #[error("io error: {0}")]
    Io(String),

    /// Catch-all. Include context.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Evaluation errors.
///
/// Per-example failures never surface here — they degrade to a zero score
/// in the result detail list. This enum covers invalid evaluation *inputs*.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EvalError {
    /// The dataset was empty or an entry had an unrecognized shape.
    #[error("invalid trainset: {0}")]
    InvalidTrainset(String),

    /// The evaluation options were inconsistent.
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

/// Optimization errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum OptimizeError {
    /// No strategy is registered under the requested name.
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    /// The trainset was rejected before any backend call.
    #[error("invalid trainset: {0}")]
    InvalidTrainset(String),

    /// The optimization options were inconsistent.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// A storage operation failed during checkpoint or resume.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// An evaluation-input error propagated from the evaluation engine.
    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),

    /// Catch-all. Include context.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
