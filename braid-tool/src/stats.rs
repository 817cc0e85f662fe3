//! Per-tool invocation counters.

use crate::invoke::{InvokeOptions, invoke_tool};
use crate::{ToolDyn, ToolError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

/// Counters for one tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolCounters {
    /// Total invocations, successful or not.
    pub invocations: u64,
    /// Invocations that ended in an error.
    pub errors: u64,
    /// Total wall-clock time spent in the tool, in milliseconds.
    pub total_time_ms: u64,
}

/// Per-tool invocation statistics, keyed by tool name.
///
/// Writes go through [`invoke_monitored`]; reads are snapshots. A
/// process-wide instance is available via [`global_stats`].
#[derive(Default)]
pub struct ToolStats {
    counters: Mutex<HashMap<String, ToolCounters>>,
}

impl ToolStats {
    /// Empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, name: &str, elapsed_ms: u64, failed: bool) {
        let mut counters = self.counters.lock().expect("tool stats poisoned");
        let entry = counters.entry(name.to_string()).or_default();
        entry.invocations += 1;
        entry.total_time_ms += elapsed_ms;
        if failed {
            entry.errors += 1;
        }
    }

    /// Counters for one tool, if it has been invoked.
    pub fn get(&self, name: &str) -> Option<ToolCounters> {
        self.counters
            .lock()
            .expect("tool stats poisoned")
            .get(name)
            .copied()
    }

    /// A snapshot of every tool's counters.
    pub fn snapshot(&self) -> HashMap<String, ToolCounters> {
        self.counters.lock().expect("tool stats poisoned").clone()
    }

    /// Zero everything.
    pub fn reset(&self) {
        self.counters.lock().expect("tool stats poisoned").clear();
    }
}

/// The process-wide statistics instance.
pub fn global_stats() -> &'static ToolStats {
    static STATS: OnceLock<ToolStats> = OnceLock::new();
    STATS.get_or_init(ToolStats::new)
}

/// [`invoke_tool`], recording counters into `stats`.
pub async fn invoke_monitored(
    stats: &ToolStats,
    tool: &dyn ToolDyn,
    input: Value,
    options: &InvokeOptions,
) -> Result<Value, ToolError> {
    let start = Instant::now();
    let result = invoke_tool(tool, input, options).await;
    stats.record(
        tool.name(),
        start.elapsed().as_millis() as u64,
        result.is_err(),
    );
    result
}
