#![deny(missing_docs)]
//! Tool contract and registries for braid.
//!
//! Defines the [`ToolDyn`] trait for object-safe tool abstraction,
//! [`ToolRegistry`] for managing collections of tools, the process-wide
//! registry, and [`ToolContext`] — the per-invocation binding a reasoning
//! module looks tools up in. Validation and timeout handling live in
//! [`invoke`]; per-tool counters live in [`stats`].
//!
//! A tool's contract is a [`braid_core::Signature`]: the input side
//! describes the argument object, the output side the result object, and
//! both sides are checked at invocation.

pub mod invoke;
pub mod stats;

pub use invoke::{InvokeOptions, invoke_tool};
pub use stats::{ToolCounters, ToolStats, global_stats, invoke_monitored};

use braid_core::signature::Signature;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock, RwLock};
use thiserror::Error;

/// Errors from tool operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool was not found.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// The input did not satisfy the tool's input schema.
    #[error("invalid input for {name}: {explain}")]
    InputInvalid {
        /// Name of the tool.
        name: String,
        /// Diagnosis of the mismatch.
        explain: String,
    },

    /// The tool's result did not satisfy its output schema.
    #[error("invalid output from {name}: {explain}")]
    OutputInvalid {
        /// Name of the tool.
        name: String,
        /// Diagnosis of the mismatch.
        explain: String,
    },

    /// Tool execution failed.
    #[error("tool {name} failed: {message}")]
    ExecutionFailed {
        /// Name of the tool.
        name: String,
        /// The underlying failure.
        message: String,
    },

    /// The tool outlived its invocation deadline.
    #[error("tool {0} timed out")]
    Timeout(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Object-safe trait for tool implementations.
///
/// Any tool source (local function, subprocess, HTTP endpoint) implements
/// this trait. Tools are stored as `Arc<dyn ToolDyn>` in registries and
/// contexts.
pub trait ToolDyn: Send + Sync {
    /// The tool's unique name.
    fn name(&self) -> &str;

    /// Human-readable description of what the tool does.
    fn description(&self) -> &str;

    /// The tool's typed contract: inputs describe the argument object,
    /// outputs the result object.
    fn signature(&self) -> Arc<Signature>;

    /// Execute the tool with the given input.
    fn call(
        &self,
        input: Value,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + '_>>;
}

type SyncToolFn = Arc<dyn Fn(Value) -> Result<Value, ToolError> + Send + Sync>;

/// A tool wrapping a synchronous closure. The simplest tool source.
pub struct FnTool {
    name: String,
    description: String,
    signature: Arc<Signature>,
    f: SyncToolFn,
}

impl FnTool {
    /// Build a tool from a name, description, contract, and closure.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        signature: Arc<Signature>,
        f: impl Fn(Value) -> Result<Value, ToolError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            signature,
            f: Arc::new(f),
        }
    }
}

impl ToolDyn for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn signature(&self) -> Arc<Signature> {
        Arc::clone(&self.signature)
    }

    fn call(
        &self,
        input: Value,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + '_>> {
        let result = (self.f)(input);
        Box::pin(async move { result })
    }
}

/// Registry of tools.
///
/// Holds tools as `Arc<dyn ToolDyn>` keyed by name. Reasoning modules
/// usually consume a [`ToolContext`] built from a registry snapshot.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolDyn>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Overwrites any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn ToolDyn>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Remove a tool by name. Returns the tool if it was present.
    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn ToolDyn>> {
        self.tools.remove(name)
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolDyn>> {
        self.tools.get(name)
    }

    /// Registered tool names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Iterate over all registered tools.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ToolDyn>> {
        self.tools.values()
    }

    /// All registered tools, cloned out.
    pub fn get_all(&self) -> Vec<Arc<dyn ToolDyn>> {
        self.tools.values().cloned().collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PROCESS-WIDE REGISTRY
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn global() -> &'static RwLock<HashMap<String, Arc<dyn ToolDyn>>> {
    static GLOBAL: OnceLock<RwLock<HashMap<String, Arc<dyn ToolDyn>>>> = OnceLock::new();
    GLOBAL.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register a tool process-wide. Overwrites by name.
pub fn register_global(tool: Arc<dyn ToolDyn>) {
    global()
        .write()
        .expect("tool registry poisoned")
        .insert(tool.name().to_string(), tool);
}

/// Remove a process-wide tool by name.
pub fn unregister_global(name: &str) -> Option<Arc<dyn ToolDyn>> {
    global().write().expect("tool registry poisoned").remove(name)
}

/// Snapshot of all process-wide tools.
pub fn global_tools() -> Vec<Arc<dyn ToolDyn>> {
    global()
        .read()
        .expect("tool registry poisoned")
        .values()
        .cloned()
        .collect()
}

/// Clear the process-wide registry. Test hook.
pub fn reset_global() {
    global().write().expect("tool registry poisoned").clear();
}

/// Per-invocation binding of tools plus caller metadata.
///
/// A reasoning module resolves tool names against its context, not
/// against any registry directly, so two concurrent invocations can see
/// different tool sets. Iteration order is name-sorted, which keeps
/// generated tool catalogs deterministic.
#[derive(Clone, Default)]
pub struct ToolContext {
    tools: BTreeMap<String, Arc<dyn ToolDyn>>,
    /// Opaque caller metadata, passed through to tools that want it.
    pub metadata: Value,
}

impl ToolContext {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind every tool in a registry.
    pub fn from_registry(registry: &ToolRegistry) -> Self {
        Self::from_tools(registry.get_all())
    }

    /// Bind an explicit list of tools.
    pub fn from_tools(tools: Vec<Arc<dyn ToolDyn>>) -> Self {
        let tools = tools
            .into_iter()
            .map(|tool| (tool.name().to_string(), tool))
            .collect();
        Self {
            tools,
            metadata: Value::Null,
        }
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Look up a bound tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolDyn>> {
        self.tools.get(name)
    }

    /// Iterate over bound tools in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ToolDyn>> {
        self.tools.values()
    }

    /// Number of bound tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the context has no tools.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
