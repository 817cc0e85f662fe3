//! The stage DAG — compile-time validation and batched execution.

use async_trait::async_trait;
use braid_core::error::{ModuleError, PipelineError};
use braid_core::event::{EventKind, emit};
use braid_core::io::{IoMap, merge_maps};
use braid_core::module::Module;
use futures_util::future::try_join_all;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// One node of a pipeline: a module plus the stages it depends on.
pub struct Stage {
    /// Unique stage id within the pipeline.
    pub id: String,
    /// The module executed at this stage.
    pub module: Arc<dyn Module>,
    /// Ids of stages whose outputs this stage needs.
    pub deps: Vec<String>,
}

impl Stage {
    /// A stage with no dependencies.
    pub fn new(id: impl Into<String>, module: Arc<dyn Module>) -> Self {
        Self {
            id: id.into(),
            module,
            deps: vec![],
        }
    }

    /// A stage depending on earlier stages.
    pub fn after<I, S>(id: impl Into<String>, module: Arc<dyn Module>, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            module,
            deps: deps.into_iter().map(Into::into).collect(),
        }
    }
}

/// A compiled DAG of stages. Itself a [`Module`].
///
/// Compilation validates the graph (unique ids, resolvable deps, no
/// cycles) and fixes the execution plan: an ordered list of batches,
/// each the maximal set of stages whose dependencies are already
/// satisfied. Execution runs batches sequentially and the stages inside
/// a batch concurrently.
pub struct Pipeline {
    stages: Vec<Stage>,
    index: HashMap<String, usize>,
    batches: Vec<Vec<String>>,
    // Per stage: its dependency closure in execution order, so dependency
    // outputs merge deterministically.
    closure: HashMap<String, Vec<String>>,
    metadata: Value,
    name: String,
}

impl Pipeline {
    /// Validate the stage graph and fix the execution plan.
    pub fn compile(stages: Vec<Stage>, metadata: Value) -> Result<Self, PipelineError> {
        let mut index = HashMap::new();
        for (i, stage) in stages.iter().enumerate() {
            if index.insert(stage.id.clone(), i).is_some() {
                return Err(PipelineError::DuplicateStage(stage.id.clone()));
            }
        }
        for stage in &stages {
            for dep in &stage.deps {
                if !index.contains_key(dep) {
                    return Err(PipelineError::MissingDependency {
                        stage: stage.id.clone(),
                        missing: dep.clone(),
                    });
                }
            }
        }

        // Kahn-style layering: each batch is every remaining stage whose
        // deps are all satisfied. No progress with stages left = a cycle.
        let mut batches: Vec<Vec<String>> = Vec::new();
        let mut done: HashSet<String> = HashSet::new();
        let mut remaining: Vec<&Stage> = stages.iter().collect();
        while !remaining.is_empty() {
            let (ready, blocked): (Vec<&Stage>, Vec<&Stage>) = remaining
                .into_iter()
                .partition(|stage| stage.deps.iter().all(|d| done.contains(d)));
            if ready.is_empty() {
                return Err(PipelineError::Cycle {
                    remaining: blocked.iter().map(|s| s.id.clone()).collect(),
                });
            }
            for stage in &ready {
                done.insert(stage.id.clone());
            }
            batches.push(ready.iter().map(|s| s.id.clone()).collect());
            remaining = blocked;
        }

        // Dependency closures, built in execution order so every dep's
        // own closure is already known.
        let mut closure: HashMap<String, Vec<String>> = HashMap::new();
        for batch in &batches {
            for id in batch {
                let stage = &stages[index[id.as_str()]];
                let mut seen: HashSet<&str> = HashSet::new();
                let mut ordered: Vec<String> = Vec::new();
                for dep in &stage.deps {
                    for upstream in &closure[dep.as_str()] {
                        if seen.insert(upstream.as_str()) {
                            ordered.push(upstream.clone());
                        }
                    }
                    if seen.insert(dep.as_str()) {
                        ordered.push(dep.clone());
                    }
                }
                closure.insert(id.clone(), ordered);
            }
        }

        let name = metadata
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("pipeline")
            .to_string();
        Ok(Self {
            stages,
            index,
            batches,
            closure,
            metadata,
            name,
        })
    }

    /// The batched execution plan, in run order.
    pub fn execution_plan(&self) -> &[Vec<String>] {
        &self.batches
    }

    /// Pipeline metadata as supplied at compile time.
    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    /// A serializable description of this pipeline: stage ids, deps,
    /// module names, metadata, and the execution plan. This is what the
    /// optimizer persists as the run's pipeline snapshot.
    pub fn snapshot(&self) -> Value {
        json!({
            "name": self.name,
            "metadata": self.metadata,
            "stages": self.stages.iter().map(|stage| json!({
                "id": stage.id,
                "module": stage.module.name(),
                "deps": stage.deps,
            })).collect::<Vec<_>>(),
            "plan": self.batches,
        })
    }
}

#[async_trait]
impl Module for Pipeline {
    async fn call(&self, input: IoMap) -> Result<IoMap, ModuleError> {
        let mut outputs: HashMap<String, IoMap> = HashMap::new();

        for batch in &self.batches {
            let calls = batch.iter().map(|id| {
                let stage = &self.stages[self.index[id.as_str()]];
                let mut stage_input = input.clone();
                for dep in &self.closure[id.as_str()] {
                    if let Some(dep_output) = outputs.get(dep) {
                        stage_input = merge_maps(&stage_input, dep_output);
                    }
                }
                let pipeline_name = self.name.as_str();
                async move {
                    let start = Instant::now();
                    let result = stage.module.call(stage_input).await;
                    emit(
                        EventKind::ModuleExec,
                        json!({
                            "pipeline": pipeline_name,
                            "stage": stage.id,
                            "module": stage.module.name(),
                            "elapsed_ms": start.elapsed().as_millis() as u64,
                            "ok": result.is_ok(),
                        }),
                    );
                    match result {
                        Ok(output) => Ok((stage.id.clone(), output)),
                        Err(source) => Err(PipelineError::ExecutionFailed {
                            stage: stage.id.clone(),
                            source: Box::new(source),
                        }),
                    }
                }
            });
            for (id, output) in try_join_all(calls).await? {
                outputs.insert(id, output);
            }
        }

        let mut merged = input;
        for batch in &self.batches {
            for id in batch {
                if let Some(output) = outputs.get(id) {
                    merged = merge_maps(&merged, output);
                }
            }
        }
        Ok(merged)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
