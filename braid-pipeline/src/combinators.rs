//! Function wrappers and module composition.

use async_trait::async_trait;
use braid_core::error::ModuleError;
use braid_core::io::{IoMap, merge_maps};
use braid_core::module::Module;
use braid_core::signature::Signature;
use futures_util::future::try_join_all;
use std::sync::Arc;

type MapFn = Arc<dyn Fn(IoMap) -> Result<IoMap, ModuleError> + Send + Sync>;

/// A module wrapping a pure mapping.
///
/// With a signature attached, the input map is validated before the
/// function runs; a mismatch fails with
/// [`ModuleError::SignatureValidation`] carrying the diagnosis.
pub struct FnModule {
    name: String,
    signature: Option<Arc<Signature>>,
    f: MapFn,
}

impl FnModule {
    /// Wrap an infallible mapping.
    pub fn new(
        name: impl Into<String>,
        f: impl Fn(IoMap) -> IoMap + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            signature: None,
            f: Arc::new(move |input| Ok(f(input))),
        }
    }

    /// Wrap a fallible mapping.
    pub fn fallible(
        name: impl Into<String>,
        f: impl Fn(IoMap) -> Result<IoMap, ModuleError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            signature: None,
            f: Arc::new(f),
        }
    }

    /// Attach a signature; inputs are validated on every call.
    pub fn with_signature(mut self, signature: Arc<Signature>) -> Self {
        self.signature = Some(signature);
        self
    }
}

#[async_trait]
impl Module for FnModule {
    async fn call(&self, input: IoMap) -> Result<IoMap, ModuleError> {
        if let Some(signature) = &self.signature {
            let diagnosis = signature.explain_input(&input);
            if !diagnosis.ok() {
                braid_core::event::emit(
                    braid_core::event::EventKind::ValidationError,
                    serde_json::json!({
                        "module": self.name,
                        "signature": signature.name,
                        "explain": diagnosis.to_string(),
                    }),
                );
                return Err(ModuleError::SignatureValidation {
                    signature: signature.name.clone(),
                    explain: diagnosis.to_string(),
                });
            }
        }
        (self.f)(input)
    }

    fn signature(&self) -> Option<Arc<Signature>> {
        self.signature.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Chains two modules: the first's output map becomes the second's input.
pub struct Sequential {
    first: Arc<dyn Module>,
    second: Arc<dyn Module>,
    name: String,
}

impl Sequential {
    /// Compose `first` then `second`.
    pub fn new(first: Arc<dyn Module>, second: Arc<dyn Module>) -> Self {
        let name = format!("{}>>{}", first.name(), second.name());
        Self {
            first,
            second,
            name,
        }
    }
}

#[async_trait]
impl Module for Sequential {
    async fn call(&self, input: IoMap) -> Result<IoMap, ModuleError> {
        let intermediate = self.first.call(input).await?;
        self.second.call(intermediate).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Fans identical input out to N modules and merges their outputs.
///
/// Children run concurrently; outputs merge in child order, so on a key
/// collision the *last* child's value wins. Callers relying on key
/// uniqueness should give children disjoint output fields.
pub struct Fanout {
    children: Vec<Arc<dyn Module>>,
    name: String,
}

impl Fanout {
    /// Fan out to the given modules.
    pub fn new(children: Vec<Arc<dyn Module>>) -> Self {
        Self {
            children,
            name: "fanout".into(),
        }
    }
}

#[async_trait]
impl Module for Fanout {
    async fn call(&self, input: IoMap) -> Result<IoMap, ModuleError> {
        let calls = self
            .children
            .iter()
            .map(|child| child.call(input.clone()));
        let outputs = try_join_all(calls).await?;
        let mut merged = IoMap::new();
        for output in outputs {
            merged = merge_maps(&merged, &output);
        }
        Ok(merged)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
