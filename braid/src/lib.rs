#![deny(missing_docs)]
//! # braid — umbrella crate
//!
//! Provides a single import surface for braid. Re-exports the protocol
//! crate and key implementations behind feature flags, plus a `prelude`
//! for the happy path.

pub use braid_core;
pub use braid_runtime;

#[cfg(feature = "backend")]
pub use braid_backend;
#[cfg(feature = "eval")]
pub use braid_eval;
#[cfg(feature = "op-cot")]
pub use braid_op_cot;
#[cfg(feature = "op-react")]
pub use braid_op_react;
#[cfg(feature = "optimize")]
pub use braid_optimize;
#[cfg(feature = "pipeline")]
pub use braid_pipeline;
#[cfg(feature = "storage")]
pub use braid_storage;
#[cfg(feature = "tool")]
pub use braid_tool;

/// Install a process-wide `tracing` subscriber honoring `LOG_LEVEL`.
///
/// `LOG_LEVEL` takes the usual `trace`/`debug`/`info`/`warn`/`error`
/// values (or any `EnvFilter` directive); unset means `info`. Intended
/// for binaries and tests — the library crates only emit, never install.
/// Calling this twice is harmless; the second install is ignored.
pub fn init_logging() {
    let filter = std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|raw| raw.parse::<tracing_subscriber::EnvFilter>().ok())
        .unwrap_or_else(|| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Happy-path imports for composing braid programs.
pub mod prelude {
    pub use braid_core::{
        Backend, BackendError, Example, GenerateRequest, Generation, IoMap, Metric, MetricRow,
        Module, ModuleError, PipelineError, Signature, Storage, StorageError,
    };
    pub use braid_core::signature::{FieldSpec, FieldType, define, lookup};

    #[cfg(feature = "backend")]
    pub use braid_backend::{
        BackendConfig, BreakerConfig, CircuitBreakerBackend, EchoBackend, LoggingBackend,
        RetryBackend, RetryConfig, ScriptedBackend, ThrottleBackend, ThrottleConfig,
        TimeoutBackend, TimeoutConfig, create_backend,
    };

    #[cfg(feature = "pipeline")]
    pub use braid_pipeline::{Fanout, FnModule, Pipeline, Sequential, Stage};

    #[cfg(feature = "tool")]
    pub use braid_tool::{
        FnTool, InvokeOptions, ToolContext, ToolDyn, ToolError, ToolRegistry, invoke_tool,
    };

    #[cfg(feature = "op-cot")]
    pub use braid_op_cot::ChainOfThought;

    #[cfg(feature = "op-react")]
    pub use braid_op_react::{React, ReactConfig};

    #[cfg(feature = "storage")]
    pub use braid_storage::{FsStorage, MemoryStorage, SqliteStorage, make_storage};

    #[cfg(feature = "eval")]
    pub use braid_eval::{EvalOptions, evaluate, exact_match, normalize_dataset, passage_match};

    #[cfg(feature = "optimize")]
    pub use braid_optimize::{
        BeamOptions, Candidate, OptimizationResult, OptimizeOptions, compile_strategy, optimize,
    };
}
