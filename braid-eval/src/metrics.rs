//! Built-in metrics.
//!
//! Every metric maps `(actual, expected)` to a score in `[0, 1]`. The
//! built-ins are binary; custom metrics are free to return fractions.

use braid_core::dataset::Metric;
use braid_core::io::{IoMap, get_str};
use std::sync::Arc;

fn canonical(text: &str) -> String {
    text.trim().to_lowercase()
}

/// `1.0` iff `actual.answer` equals `expected.answer` after trimming and
/// lower-casing; `0.0` otherwise (including when either field is absent).
pub fn exact_match(actual: &IoMap, expected: &IoMap) -> f64 {
    match (get_str(actual, "answer"), get_str(expected, "answer")) {
        (Some(a), Some(b)) if canonical(a) == canonical(b) => 1.0,
        _ => 0.0,
    }
}

/// `1.0` iff `actual.answer` appears as a substring of
/// `expected.passage` (or `expected.context`), case-insensitively.
pub fn passage_match(actual: &IoMap, expected: &IoMap) -> f64 {
    let answer = match get_str(actual, "answer") {
        Some(answer) => canonical(answer),
        None => return 0.0,
    };
    let passage = get_str(expected, "passage").or_else(|| get_str(expected, "context"));
    match passage {
        Some(passage) if canonical(passage).contains(&answer) => 1.0,
        _ => 0.0,
    }
}

/// Semantic F1 between `actual.answer` and `expected.answer`.
///
/// // TODO: real semantic scoring needs an embedding backend; until one
/// // is wired through, this falls back to exact match.
pub fn semantic_f1(actual: &IoMap, expected: &IoMap) -> f64 {
    exact_match(actual, expected)
}

/// Look up a built-in metric by name.
pub fn builtin(name: &str) -> Option<Metric> {
    let metric: Metric = match name {
        "exact_match" => Arc::new(exact_match),
        "passage_match" => Arc::new(passage_match),
        "semantic_f1" => Arc::new(semantic_f1),
        _ => return None,
    };
    Some(metric)
}
