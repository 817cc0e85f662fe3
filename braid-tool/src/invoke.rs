//! Validated, timeout-guarded tool invocation.

use crate::{ToolDyn, ToolError};
use braid_core::io::IoMap;
use serde_json::Value;

/// Options for [`invoke_tool`].
#[derive(Debug, Clone, Copy)]
pub struct InvokeOptions {
    /// Check the input against the tool's input schema first.
    pub validate_input: bool,
    /// Check the result against the tool's output schema afterwards.
    pub validate_output: bool,
    /// Invocation deadline in milliseconds.
    pub timeout_ms: u64,
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self {
            validate_input: true,
            validate_output: true,
            timeout_ms: 30_000,
        }
    }
}

fn as_object<'a>(value: &'a Value, tool: &str, side: &str) -> Result<&'a IoMap, ToolError> {
    value.as_object().ok_or_else(|| match side {
        "input" => ToolError::InputInvalid {
            name: tool.into(),
            explain: format!("{side} must be an object"),
        },
        _ => ToolError::OutputInvalid {
            name: tool.into(),
            explain: format!("{side} must be an object"),
        },
    })
}

/// Invoke a tool with schema validation on both sides and a deadline.
///
/// Sequence: input check (when enabled) → timeout-wrapped execution,
/// failures wrapped as [`ToolError::ExecutionFailed`] → output check
/// (when enabled). Validation failures carry the structured diagnosis
/// rendered by the signature machinery.
pub async fn invoke_tool(
    tool: &dyn ToolDyn,
    input: Value,
    options: &InvokeOptions,
) -> Result<Value, ToolError> {
    let signature = tool.signature();

    if options.validate_input {
        let map = as_object(&input, tool.name(), "input")?;
        let diagnosis = signature.explain_input(map);
        if !diagnosis.ok() {
            braid_core::event::emit(
                braid_core::event::EventKind::ValidationError,
                serde_json::json!({
                    "tool": tool.name(),
                    "side": "input",
                    "explain": diagnosis.to_string(),
                }),
            );
            return Err(ToolError::InputInvalid {
                name: tool.name().into(),
                explain: diagnosis.to_string(),
            });
        }
    }

    let output = match braid_runtime::timeout(options.timeout_ms, tool.call(input)).await {
        Err(_) => return Err(ToolError::Timeout(tool.name().into())),
        Ok(Err(error)) => {
            return Err(match error {
                already @ (ToolError::InputInvalid { .. }
                | ToolError::OutputInvalid { .. }
                | ToolError::ExecutionFailed { .. }) => already,
                other => ToolError::ExecutionFailed {
                    name: tool.name().into(),
                    message: other.to_string(),
                },
            });
        }
        Ok(Ok(output)) => output,
    };
    tracing::debug!(tool = tool.name(), "tool invocation completed");

    if options.validate_output {
        let map = as_object(&output, tool.name(), "output")?;
        let diagnosis = signature.explain_output(map);
        if !diagnosis.ok() {
            return Err(ToolError::OutputInvalid {
                name: tool.name().into(),
                explain: diagnosis.to_string(),
            });
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FnTool;
    use braid_core::signature::{FieldSpec, FieldType, Signature};
    use serde_json::json;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;

    fn adder() -> FnTool {
        let sig = Arc::new(
            Signature::new(
                "add",
                vec![
                    FieldSpec::typed("a", FieldType::Number),
                    FieldSpec::typed("b", FieldType::Number),
                ],
                vec![FieldSpec::typed("sum", FieldType::Number)],
            )
            .unwrap(),
        );
        FnTool::new("add", "Adds two numbers", sig, |input| {
            let a = input["a"].as_f64().unwrap_or(0.0);
            let b = input["b"].as_f64().unwrap_or(0.0);
            Ok(json!({"sum": a + b}))
        })
    }

    #[tokio::test]
    async fn happy_path_validates_both_sides() {
        let out = invoke_tool(&adder(), json!({"a": 2, "b": 3}), &InvokeOptions::default())
            .await
            .unwrap();
        assert_eq!(out, json!({"sum": 5.0}));
    }

    #[tokio::test]
    async fn bad_input_rejected_before_execution() {
        let err = invoke_tool(
            &adder(),
            json!({"a": "two", "b": 3}),
            &InvokeOptions::default(),
        )
        .await
        .unwrap_err();
        match err {
            ToolError::InputInvalid { name, explain } => {
                assert_eq!(name, "add");
                assert!(explain.contains("expected number"));
            }
            other => panic!("expected InputInvalid, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_object_input_rejected() {
        let err = invoke_tool(&adder(), json!(41), &InvokeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InputInvalid { .. }));
    }

    #[tokio::test]
    async fn bad_output_rejected() {
        let sig = Arc::new(
            Signature::new(
                "liar",
                vec![],
                vec![FieldSpec::typed("truth", FieldType::Bool)],
            )
            .unwrap(),
        );
        let liar = FnTool::new("liar", "Returns the wrong shape", sig, |_| {
            Ok(json!({"lies": 1}))
        });
        let err = invoke_tool(&liar, json!({}), &InvokeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::OutputInvalid { .. }));
    }

    #[tokio::test]
    async fn validation_can_be_disabled() {
        let options = InvokeOptions {
            validate_input: false,
            validate_output: false,
            timeout_ms: 30_000,
        };
        let out = invoke_tool(&adder(), json!({"a": "two", "b": 3}), &options)
            .await
            .unwrap();
        // The tool coerced the bad field to 0 and ran anyway.
        assert_eq!(out, json!({"sum": 3.0}));
    }

    #[tokio::test]
    async fn execution_failure_is_wrapped() {
        let sig = Arc::new(Signature::new("boom", vec![], vec![]).unwrap());
        let boom = FnTool::new("boom", "Always fails", sig, |_| {
            Err(ToolError::Other("disk on fire".into()))
        });
        let err = invoke_tool(&boom, json!({}), &InvokeOptions::default())
            .await
            .unwrap_err();
        match err {
            ToolError::ExecutionFailed { name, message } => {
                assert_eq!(name, "boom");
                assert!(message.contains("disk on fire"));
            }
            other => panic!("expected ExecutionFailed, got {other:?}"),
        }
    }

    struct SlowTool {
        signature: Arc<Signature>,
    }

    impl crate::ToolDyn for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "Sleeps past every deadline"
        }
        fn signature(&self) -> Arc<Signature> {
            Arc::clone(&self.signature)
        }
        fn call(
            &self,
            _input: Value,
        ) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + '_>> {
            Box::pin(async {
                braid_runtime::delay(60_000).await;
                Ok(json!({}))
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_produces_timeout() {
        let slow = SlowTool {
            signature: Arc::new(Signature::new("slow", vec![], vec![]).unwrap()),
        };
        let options = InvokeOptions {
            timeout_ms: 50,
            ..InvokeOptions::default()
        };
        let err = invoke_tool(&slow, json!({}), &options).await.unwrap_err();
        assert!(matches!(err, ToolError::Timeout(name) if name == "slow"));
    }
}
