#![deny(missing_docs)]
//! Optimization engine for braid.
//!
//! Searches the space of pipeline variants for the one that maximizes a
//! metric over a trainset. Strategies are compiled by name:
//!
//! - `identity` — evaluates the seed once; history of length 1
//! - `beam` — the production strategy: mutate, score, keep the top-k
//! - anything else fails fast with `UnknownStrategy` (including the
//!   reserved `random`)
//!
//! Long searches checkpoint per-iteration metric rows into a
//! [`braid_core::Storage`] and resume from the latest committed row.
//!
//! Candidates pair an executable module with a serializable snapshot.
//! Mutators are opaque `Candidate -> Vec<Candidate>` functions — the
//! engine never looks inside; the shipped default is the empty set, so
//! the beam carries the seed forward unchanged.

pub mod beam;
pub mod identity;

pub use beam::BeamOptions;
pub use braid_core::error::OptimizeError;

use braid_core::dataset::{Example, Metric};
use braid_core::module::Module;
use braid_core::storage::{MetricRow, Storage};
use braid_eval::EvalOptions;
use serde_json::Value;
use std::sync::Arc;

/// An executable pipeline variant plus its serializable description.
///
/// The snapshot is what gets persisted in runs and metric payloads; it
/// records the module graph, it does not reconstruct it.
#[derive(Clone)]
pub struct Candidate {
    /// The executable program.
    pub module: Arc<dyn Module>,
    /// Serializable description of the program.
    pub snapshot: Value,
}

impl std::fmt::Debug for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Candidate")
            .field("module", &self.module.name())
            .field("snapshot", &self.snapshot)
            .finish()
    }
}

impl Candidate {
    /// Pair a module with its snapshot.
    pub fn new(module: Arc<dyn Module>, snapshot: Value) -> Self {
        Self { module, snapshot }
    }
}

/// An opaque pipeline transformer used to generate beam candidates.
pub type Mutator = Arc<dyn Fn(&Candidate) -> Vec<Candidate> + Send + Sync>;

/// Options shared by every optimization strategy.
#[derive(Clone)]
pub struct OptimizeOptions {
    /// Beam-search knobs.
    pub beam: BeamOptions,
    /// Per-example evaluation settings.
    pub eval: EvalOptions,
    /// Where to persist the run; `None` disables persistence.
    pub storage: Option<Arc<dyn Storage>>,
    /// Resume this run id from its latest committed row.
    pub resume_run_id: Option<String>,
    /// Candidate generators applied to each beam member per iteration.
    pub mutators: Vec<Mutator>,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            beam: BeamOptions::default(),
            eval: EvalOptions::default(),
            storage: None,
            resume_run_id: None,
            mutators: Vec::new(),
        }
    }
}

/// The outcome of an optimization run.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// The best candidate found (the seed when nothing ran).
    pub best: Candidate,
    /// The best score, in `[0, 1]`.
    pub best_score: f64,
    /// Per-iteration metric rows, ascending by iteration.
    pub history: Vec<MetricRow>,
    /// Iterations with a recorded row (including resumed ones).
    pub total_iterations: u64,
    /// Wall-clock time spent in this call, in milliseconds.
    pub total_time_ms: u64,
    /// Whether the convergence rule stopped the search.
    pub converged: bool,
    /// The persisted run id, when storage was configured.
    pub run_id: Option<String>,
}

/// A compiled optimization strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Evaluate the seed once and return it.
    Identity,
    /// Beam search.
    Beam,
}

impl Strategy {
    /// Run the strategy.
    pub async fn run(
        &self,
        seed: Candidate,
        trainset: Vec<Example>,
        metric: Metric,
        options: OptimizeOptions,
    ) -> Result<OptimizationResult, OptimizeError> {
        match self {
            Strategy::Identity => identity::run(seed, trainset, metric, options).await,
            Strategy::Beam => beam::run(seed, trainset, metric, options).await,
        }
    }
}

/// Look up a strategy by name. Unknown names — including the reserved
/// `random` — fail fast.
pub fn compile_strategy(name: &str) -> Result<Strategy, OptimizeError> {
    match name {
        "identity" => Ok(Strategy::Identity),
        "beam" => Ok(Strategy::Beam),
        other => Err(OptimizeError::UnknownStrategy(other.into())),
    }
}

/// Compile and run a strategy in one call.
pub async fn optimize(
    strategy: &str,
    seed: Candidate,
    trainset: Vec<Example>,
    metric: Metric,
    options: OptimizeOptions,
) -> Result<OptimizationResult, OptimizeError> {
    compile_strategy(strategy)?
        .run(seed, trainset, metric, options)
        .await
}

pub(crate) fn validate_trainset(trainset: &[Example]) -> Result<(), OptimizeError> {
    if trainset.is_empty() {
        return Err(OptimizeError::InvalidTrainset("trainset is empty".into()));
    }
    Ok(())
}

pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
