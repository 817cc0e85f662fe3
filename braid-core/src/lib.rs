//! # braid-core — protocol traits for declarative LLM pipelines
//!
//! This crate defines the protocol boundaries that compose into a braid
//! program: typed signatures, the module capability, the backend contract,
//! and the storage contract, plus the shared data model (examples, metric
//! rows) and the instrumentation event stream.
//!
//! ## The Protocols
//!
//! | Protocol | Trait | What it does |
//! |----------|-------|-------------|
//! | Module | [`Module`] | One typed step: `call(input_map) -> output_map` |
//! | Backend | [`Backend`] | Uniform LLM interface (`generate`/`embed`/`stream`) |
//! | Storage | [`Storage`] | Persist optimization runs and per-iteration metrics |
//!
//! ## Design Principle
//!
//! Every trait is operation-defined, not mechanism-defined. [`Module::call`]
//! means "transform this input map into an output map" — not "render a
//! prompt" or "walk a DAG." A function wrapper, a reasoning loop, and a
//! compiled pipeline all implement the same trait, which is what lets the
//! optimizer treat candidate programs uniformly.
//!
//! ## Dependency Notes
//!
//! Input and output maps are `serde_json::Map<String, Value>`. JSON is the
//! interchange format throughout: tool payloads, pipeline snapshots, and
//! persisted metric payloads all round-trip through `serde_json`.

#![deny(missing_docs)]

pub mod backend;
pub mod dataset;
pub mod error;
pub mod event;
pub mod io;
pub mod module;
pub mod signature;
pub mod storage;

// Re-exports for convenience
pub use backend::{
    Backend, EmbedRequest, Embedding, GenerateRequest, Generation, GenerationStream, StreamChunk,
    TokenUsage,
};
pub use dataset::{Example, Metric};
pub use error::{
    BackendError, EvalError, ModuleError, OptimizeError, PipelineError, SignatureError,
    StorageError,
};
pub use event::{Event, EventKind, emit, subscribe};
pub use io::{IoMap, merge_maps};
pub use module::Module;
pub use signature::{FieldSpec, FieldType, Signature, SignatureDiagnosis};
pub use storage::{MetricRow, Storage};
