//! Line-anchored parsing of ReAct responses.

use serde::{Deserialize, Serialize};

/// The step kinds a model response can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Free-form reasoning.
    Thought,
    /// Name of the tool to invoke.
    Action,
    /// Arguments for the tool, as a JSON object literal.
    ActionInput,
    /// Result fed back to the model (usually synthesized by the loop).
    Observation,
    /// The final answer; ends the loop.
    Answer,
}

/// One parsed step: an anchor plus the block of text that followed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactStep {
    /// Which anchor opened the block.
    pub kind: StepKind,
    /// The block content, trimmed.
    pub text: String,
}

impl ReactStep {
    /// Build a step.
    pub fn new(kind: StepKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

// `Action Input:` must be probed before `Action:` — it shares the prefix.
const ANCHORS: &[(&str, StepKind)] = &[
    ("Thought:", StepKind::Thought),
    ("Action Input:", StepKind::ActionInput),
    ("Action:", StepKind::Action),
    ("Observation:", StepKind::Observation),
    ("Answer:", StepKind::Answer),
];

/// Parse a response into its ordered steps.
///
/// Anchors are case-sensitive, exact, and line-leading. A block runs
/// until the next anchor; non-anchor lines extend the current block.
/// Lines before the first anchor belong to no step and are dropped.
pub fn parse_steps(text: &str) -> Vec<ReactStep> {
    let mut steps: Vec<(StepKind, Vec<String>)> = Vec::new();

    'lines: for line in text.lines() {
        for (anchor, kind) in ANCHORS {
            if let Some(rest) = line.strip_prefix(anchor) {
                steps.push((*kind, vec![rest.trim_start().to_string()]));
                continue 'lines;
            }
        }
        if let Some((_, block)) = steps.last_mut() {
            block.push(line.to_string());
        }
    }

    steps
        .into_iter()
        .map(|(kind, block)| ReactStep::new(kind, block.join("\n").trim().to_string()))
        .collect()
}
