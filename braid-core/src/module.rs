//! The Module protocol — one typed step of an LLM program.

use crate::error::ModuleError;
use crate::io::IoMap;
use crate::signature::Signature;
use async_trait::async_trait;
use std::sync::Arc;

/// A unit of computation over value maps.
///
/// Implementations:
/// - function wrappers around pure mappings
/// - sequential and fan-out compositions
/// - reasoning modules (Chain-of-Thought, ReAct)
/// - compiled pipelines (a pipeline is itself a module)
///
/// The trait is intentionally one operation. A module is atomic from the
/// outside — you pass an input map, you get an output map. How many backend
/// calls, tool invocations, or inner stages that takes is the
/// implementation's concern.
#[async_trait]
pub trait Module: Send + Sync {
    /// Transform the input map into an output map.
    async fn call(&self, input: IoMap) -> Result<IoMap, ModuleError>;

    /// The signature this module enforces, if any.
    fn signature(&self) -> Option<Arc<Signature>> {
        None
    }

    /// Short name used in logs and `module/exec` events.
    fn name(&self) -> &str {
        "module"
    }
}

#[async_trait]
impl<M: Module + ?Sized> Module for Arc<M> {
    async fn call(&self, input: IoMap) -> Result<IoMap, ModuleError> {
        (**self).call(input).await
    }

    fn signature(&self) -> Option<Arc<Signature>> {
        (**self).signature()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
