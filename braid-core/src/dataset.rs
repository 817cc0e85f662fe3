//! Labeled examples, dataset normalization, and the metric contract.

use crate::error::EvalError;
use crate::io::IoMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// A labeled training pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    /// The input map presented to the program.
    pub input: IoMap,
    /// The expected output map the metric scores against.
    pub expected: IoMap,
}

impl Example {
    /// Create an example from already-canonical maps.
    pub fn new(input: IoMap, expected: IoMap) -> Self {
        Self { input, expected }
    }

    /// A question/answer example — the most common shape.
    pub fn qa(question: impl Into<String>, answer: impl Into<String>) -> Self {
        let mut input = IoMap::new();
        input.insert("question".into(), Value::String(question.into()));
        let mut expected = IoMap::new();
        expected.insert("answer".into(), Value::String(answer.into()));
        Self { input, expected }
    }
}

/// A scorer: `(actual, expected) -> [0, 1]`.
pub type Metric = Arc<dyn Fn(&IoMap, &IoMap) -> f64 + Send + Sync>;

/// Normalize one dataset entry into the canonical [`Example`] form.
///
/// Accepted source shapes:
/// - `{"input": {...}, "expected": {...}}` — already canonical
/// - `{"question": ..., "answer": ...}` — QA pair
/// - `{"input": ..., "output": ...}` where the values are not both maps —
///   generic single-field pair
/// - `[q, a]` — positional pair, treated as question/answer
pub fn normalize_example(value: &Value) -> Result<Example, EvalError> {
    if let Some(obj) = value.as_object() {
        if let (Some(Value::Object(input)), Some(Value::Object(expected))) =
            (obj.get("input"), obj.get("expected"))
        {
            return Ok(Example::new(input.clone(), expected.clone()));
        }
        if let (Some(q), Some(a)) = (obj.get("question"), obj.get("answer")) {
            let mut input = IoMap::new();
            input.insert("question".into(), q.clone());
            let mut expected = IoMap::new();
            expected.insert("answer".into(), a.clone());
            return Ok(Example::new(input, expected));
        }
        if let (Some(i), Some(o)) = (obj.get("input"), obj.get("output")) {
            let mut input = IoMap::new();
            input.insert("input".into(), i.clone());
            let mut expected = IoMap::new();
            expected.insert("output".into(), o.clone());
            return Ok(Example::new(input, expected));
        }
        return Err(EvalError::InvalidTrainset(format!(
            "unrecognized example shape with keys {:?}",
            obj.keys().collect::<Vec<_>>()
        )));
    }
    if let Some(pair) = value.as_array() {
        if pair.len() == 2 {
            let mut input = IoMap::new();
            input.insert("question".into(), pair[0].clone());
            let mut expected = IoMap::new();
            expected.insert("answer".into(), pair[1].clone());
            return Ok(Example::new(input, expected));
        }
        return Err(EvalError::InvalidTrainset(format!(
            "pair example must have exactly 2 elements, got {}",
            pair.len()
        )));
    }
    Err(EvalError::InvalidTrainset(
        "example must be an object or a 2-element array".into(),
    ))
}

/// Normalize a whole dataset. Empty datasets are rejected here so no
/// backend call is ever made for them.
pub fn normalize_dataset(values: &[Value]) -> Result<Vec<Example>, EvalError> {
    if values.is_empty() {
        return Err(EvalError::InvalidTrainset("dataset is empty".into()));
    }
    values.iter().map(normalize_example).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_question_answer() {
        let ex = normalize_example(&json!({"question": "2+2?", "answer": "4"})).unwrap();
        assert_eq!(ex.input["question"], json!("2+2?"));
        assert_eq!(ex.expected["answer"], json!("4"));
    }

    #[test]
    fn normalizes_input_output() {
        let ex = normalize_example(&json!({"input": "abc", "output": "ABC"})).unwrap();
        assert_eq!(ex.input["input"], json!("abc"));
        assert_eq!(ex.expected["output"], json!("ABC"));
    }

    #[test]
    fn normalizes_positional_pair() {
        let ex = normalize_example(&json!(["2+2?", "4"])).unwrap();
        assert_eq!(ex, Example::qa("2+2?", "4"));
    }

    #[test]
    fn canonical_form_passes_through() {
        let ex = normalize_example(&json!({
            "input": {"text": "hello"},
            "expected": {"word_count": 1}
        }))
        .unwrap();
        assert_eq!(ex.input["text"], json!("hello"));
        assert_eq!(ex.expected["word_count"], json!(1));
    }

    #[test]
    fn rejects_unknown_shapes() {
        assert!(normalize_example(&json!({"prompt": "x"})).is_err());
        assert!(normalize_example(&json!(["only one"])).is_err());
        assert!(normalize_example(&json!("scalar")).is_err());
    }

    #[test]
    fn empty_dataset_rejected() {
        let err = normalize_dataset(&[]).unwrap_err();
        assert!(matches!(err, EvalError::InvalidTrainset(_)));
    }
}
