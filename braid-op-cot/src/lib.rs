#![deny(missing_docs)]
//! Chain-of-Thought module — elicit reasoning before the answer.
//!
//! Given a base signature `(inputs) => (out1, out2, …)`, [`ChainOfThought`]
//! derives `(inputs) => (rationale, out1, …)` and prompts the backend to
//! think step-by-step. The response contract is two line-leading anchors,
//! `Reasoning:` and `Answer:` — the instruction phrasing is free to
//! change, the anchors are not.

use async_trait::async_trait;
use braid_core::backend::{Backend, GenerateRequest};
use braid_core::error::{ModuleError, SignatureError};
use braid_core::io::IoMap;
use braid_core::module::Module;
use braid_core::signature::{FieldSpec, FieldType, Signature};
use serde_json::Value;
use std::sync::Arc;

const REASONING_ANCHOR: &str = "Reasoning:";
const ANSWER_ANCHOR: &str = "Answer:";

/// A module that rewrites its signature to demand a rationale.
///
/// Output maps always carry `rationale` plus every output field of the
/// base signature; outputs beyond the first default to the empty string,
/// since the anchored format names only one answer.
pub struct ChainOfThought {
    backend: Arc<dyn Backend>,
    base: Arc<Signature>,
    derived: Arc<Signature>,
}

impl ChainOfThought {
    /// Wrap a backend with the derived signature of `base`.
    pub fn new(backend: Arc<dyn Backend>, base: Arc<Signature>) -> Result<Self, SignatureError> {
        let derived = Arc::new(base.with_output_prepended(
            format!("{}_cot", base.name),
            FieldSpec::typed("rationale", FieldType::String),
        )?);
        Ok(Self {
            backend,
            base,
            derived,
        })
    }

    /// The derived signature (`rationale` prepended to the outputs).
    pub fn derived_signature(&self) -> Arc<Signature> {
        Arc::clone(&self.derived)
    }

    fn build_prompt(&self, input: &IoMap) -> String {
        let mut prompt = String::from(
            "Think step-by-step to solve the task below. \
             Write your reasoning on a line starting with \"Reasoning:\", \
             then give your final result on a line starting with \"Answer:\".\n\n",
        );
        for field in &self.base.inputs {
            let rendered = match input.get(&field.name) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            prompt.push_str(&format!("{}: {}\n", field.name, rendered));
        }
        if let Some(first_output) = self.base.outputs.first() {
            prompt.push_str(&format!(
                "\nReasoning: <your step-by-step thinking>\nAnswer: <{}>\n",
                first_output.name
            ));
        }
        prompt
    }
}

/// Split `text` on the `Reasoning:`/`Answer:` anchors.
///
/// Anchors are case-sensitive and must start a line; a segment extends
/// until the next anchor. Non-anchor lines before any anchor belong to
/// neither segment.
fn parse_anchored(text: &str) -> (Option<String>, Option<String>) {
    enum Segment {
        Preamble,
        Reasoning,
        Answer,
    }
    let mut segment = Segment::Preamble;
    let mut reasoning: Option<Vec<String>> = None;
    let mut answer: Option<Vec<String>> = None;

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix(REASONING_ANCHOR) {
            reasoning
                .get_or_insert_with(Vec::new)
                .push(rest.trim_start().to_string());
            segment = Segment::Reasoning;
        } else if let Some(rest) = line.strip_prefix(ANSWER_ANCHOR) {
            answer
                .get_or_insert_with(Vec::new)
                .push(rest.trim_start().to_string());
            segment = Segment::Answer;
        } else {
            match segment {
                Segment::Reasoning => {
                    if let Some(lines) = reasoning.as_mut() {
                        lines.push(line.to_string());
                    }
                }
                Segment::Answer => {
                    if let Some(lines) = answer.as_mut() {
                        lines.push(line.to_string());
                    }
                }
                Segment::Preamble => {}
            }
        }
    }

    let join = |lines: Vec<String>| lines.join("\n").trim().to_string();
    (reasoning.map(join), answer.map(join))
}

#[async_trait]
impl Module for ChainOfThought {
    async fn call(&self, input: IoMap) -> Result<IoMap, ModuleError> {
        let diagnosis = self.base.explain_input(&input);
        if !diagnosis.ok() {
            return Err(ModuleError::SignatureValidation {
                signature: self.base.name.clone(),
                explain: diagnosis.to_string(),
            });
        }

        let prompt = self.build_prompt(&input);
        let generation = self.backend.generate(GenerateRequest::new(prompt)).await?;
        let (reasoning, answer) = parse_anchored(&generation.text);
        tracing::debug!(
            signature = %self.base.name,
            has_reasoning = reasoning.is_some(),
            has_answer = answer.is_some(),
            "chain-of-thought response parsed"
        );

        let mut output = IoMap::new();
        output.insert(
            "rationale".into(),
            Value::String(reasoning.unwrap_or_else(|| generation.text.trim().to_string())),
        );
        for (position, field) in self.base.outputs.iter().enumerate() {
            let value = if position == 0 {
                answer
                    .clone()
                    .unwrap_or_else(|| generation.text.trim().to_string())
            } else {
                String::new()
            };
            output.insert(field.name.clone(), Value::String(value));
        }
        Ok(output)
    }

    fn signature(&self) -> Option<Arc<Signature>> {
        Some(Arc::clone(&self.derived))
    }

    fn name(&self) -> &str {
        "chain_of_thought"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_backend::ScriptedBackend;
    use braid_core::io::map_of;
    use serde_json::json;

    fn qa_signature() -> Arc<Signature> {
        Arc::new(
            Signature::new(
                "qa",
                vec![FieldSpec::typed("question", FieldType::String)],
                vec![FieldSpec::typed("answer", FieldType::String)],
            )
            .unwrap(),
        )
    }

    fn cot_with(script: &ScriptedBackend) -> ChainOfThought {
        ChainOfThought::new(Arc::new(script.clone()), qa_signature()).unwrap()
    }

    #[tokio::test]
    async fn parses_reasoning_and_answer() {
        let script = ScriptedBackend::with_responses(["Reasoning: 2+2 equals 4\nAnswer: 4"]);
        let cot = cot_with(&script);
        let out = cot
            .call(map_of([("question", json!("What is 2+2?"))]))
            .await
            .unwrap();
        assert_eq!(out["rationale"], json!("2+2 equals 4"));
        assert_eq!(out["answer"], json!("4"));
    }

    #[tokio::test]
    async fn prompt_names_fields_and_anchors() {
        let script = ScriptedBackend::with_responses(["Answer: x"]);
        let cot = cot_with(&script);
        cot.call(map_of([("question", json!("Why?"))])).await.unwrap();
        let prompt = script.prompts().remove(0);
        assert!(prompt.contains("question: Why?"));
        assert!(prompt.contains("Reasoning:"));
        assert!(prompt.contains("<answer>"));
    }

    #[tokio::test]
    async fn missing_reasoning_defaults_to_full_text() {
        let script = ScriptedBackend::with_responses(["Answer: 42"]);
        let cot = cot_with(&script);
        let out = cot
            .call(map_of([("question", json!("meaning of life"))]))
            .await
            .unwrap();
        assert_eq!(out["rationale"], json!("Answer: 42"));
        assert_eq!(out["answer"], json!("42"));
    }

    #[tokio::test]
    async fn missing_answer_defaults_to_full_text() {
        let script = ScriptedBackend::with_responses(["I am not sure about this one."]);
        let cot = cot_with(&script);
        let out = cot
            .call(map_of([("question", json!("hard question"))]))
            .await
            .unwrap();
        assert_eq!(out["answer"], json!("I am not sure about this one."));
        assert_eq!(out["rationale"], json!("I am not sure about this one."));
    }

    #[tokio::test]
    async fn multiline_segments_extend_to_next_anchor() {
        let script = ScriptedBackend::with_responses([
            "Reasoning: first\nsecond line\nAnswer: final\nwith detail",
        ]);
        let cot = cot_with(&script);
        let out = cot
            .call(map_of([("question", json!("q"))]))
            .await
            .unwrap();
        assert_eq!(out["rationale"], json!("first\nsecond line"));
        assert_eq!(out["answer"], json!("final\nwith detail"));
    }

    #[tokio::test]
    async fn anchors_must_start_the_line() {
        let script =
            ScriptedBackend::with_responses(["The Answer: embedded does not count\nAnswer: real"]);
        let cot = cot_with(&script);
        let out = cot.call(map_of([("question", json!("q"))])).await.unwrap();
        assert_eq!(out["answer"], json!("real"));
    }

    #[tokio::test]
    async fn secondary_outputs_default_to_empty() {
        let sig = Arc::new(
            Signature::new(
                "multi_out",
                vec![FieldSpec::typed("question", FieldType::String)],
                vec![
                    FieldSpec::typed("answer", FieldType::String),
                    FieldSpec::typed("confidence", FieldType::String),
                ],
            )
            .unwrap(),
        );
        let script = ScriptedBackend::with_responses(["Reasoning: r\nAnswer: a"]);
        let cot = ChainOfThought::new(Arc::new(script), sig).unwrap();
        let out = cot.call(map_of([("question", json!("q"))])).await.unwrap();
        assert_eq!(out["answer"], json!("a"));
        assert_eq!(out["confidence"], json!(""));
    }

    #[tokio::test]
    async fn invalid_input_rejected_without_backend_call() {
        let script = ScriptedBackend::new();
        let cot = cot_with(&script);
        let err = cot.call(map_of([("question", json!(5))])).await.unwrap_err();
        assert!(matches!(err, ModuleError::SignatureValidation { .. }));
        assert_eq!(script.call_count(), 0);
    }

    #[test]
    fn derived_signature_prepends_rationale() {
        let cot = cot_with(&ScriptedBackend::new());
        let derived = cot.derived_signature();
        assert_eq!(derived.output_names(), vec!["rationale", "answer"]);
    }
}
