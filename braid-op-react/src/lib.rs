#![deny(missing_docs)]
//! ReAct module — model + tools in a bounded reasoning loop.
//!
//! Implements [`braid_core::Module`] by running the Reason-Act-Observe
//! cycle: prompt the backend, parse the anchored steps out of its reply,
//! execute the requested tool, feed the observation back, repeat until an
//! `Answer:` appears or the iteration cap is hit. Tool failures never end
//! the loop — they become `Observation: Error - …` lines the model can
//! react to.

pub mod parse;

pub use parse::{ReactStep, StepKind, parse_steps};

use async_trait::async_trait;
use braid_core::backend::{Backend, GenerateRequest};
use braid_core::error::ModuleError;
use braid_core::io::IoMap;
use braid_core::module::Module;
use braid_core::signature::{FieldSpec, FieldType, Signature};
use braid_tool::invoke::{InvokeOptions, invoke_tool};
use braid_tool::{ToolContext, ToolDyn};
use serde_json::Value;
use std::sync::Arc;

/// Static configuration for a [`React`] instance.
#[derive(Debug, Clone, Copy)]
pub struct ReactConfig {
    /// Reason-act cycles before giving up.
    pub max_iterations: u32,
    /// Prepend a canned example dialogue to the prompt.
    pub include_examples: bool,
    /// Deadline for each tool invocation, in milliseconds.
    pub tool_timeout_ms: u64,
}

impl Default for ReactConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            include_examples: false,
            tool_timeout_ms: 30_000,
        }
    }
}

fn default_signature() -> Arc<Signature> {
    // The constructor arguments are statically valid, so this cannot fail.
    Arc::new(
        Signature::new(
            "react",
            vec![FieldSpec::typed("question", FieldType::String)],
            vec![FieldSpec::typed("answer", FieldType::String)],
        )
        .unwrap_or_else(|_| unreachable!("static signature is valid")),
    )
}

/// The ReAct loop as a module.
///
/// Output maps carry `answer` plus the trace: `react_steps` (every parsed
/// step, in order), `react_conversation` (the transcript lines), and
/// `react_truncated` (whether the iteration cap fired).
pub struct React {
    backend: Arc<dyn Backend>,
    tools: ToolContext,
    signature: Arc<Signature>,
    config: ReactConfig,
}

impl React {
    /// A ReAct module over the default `(question) => (answer)` signature.
    pub fn new(backend: Arc<dyn Backend>, tools: ToolContext) -> Self {
        Self {
            backend,
            tools,
            signature: default_signature(),
            config: ReactConfig::default(),
        }
    }

    /// Override the configuration.
    pub fn with_config(mut self, config: ReactConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom signature. The first input field carries the question.
    pub fn with_signature(mut self, signature: Arc<Signature>) -> Self {
        self.signature = signature;
        self
    }

    fn tool_catalog(&self) -> String {
        if self.tools.is_empty() {
            return "You have no tools available; answer directly.\n".into();
        }
        let mut catalog = String::from("You can use the following tools:\n");
        for tool in self.tools.iter() {
            let fields: Vec<String> = tool
                .signature()
                .inputs
                .iter()
                .map(|f| {
                    let ty = format!("{:?}", f.ty).to_lowercase();
                    format!("\"{}\": <{ty}>", f.name)
                })
                .collect();
            catalog.push_str(&format!(
                "- {name}: {description}\n  Action: {name}\n  Action Input: {{{fields}}}\n",
                name = tool.name(),
                description = tool.description(),
                fields = fields.join(", "),
            ));
        }
        catalog
    }

    fn example_dialogue(&self) -> String {
        let tool_name = self
            .tools
            .iter()
            .next()
            .map(|tool| tool.name())
            .unwrap_or("some-tool");
        format!(
            "Example:\n\
             Question: What is 1+1?\n\
             Thought: I should use a tool to be sure.\n\
             Action: {tool_name}\n\
             Action Input: {{\"expression\": \"1+1\"}}\n\
             Observation: {{\"result\": 2}}\n\
             Thought: The result is 2.\n\
             Answer: 2\n\n"
        )
    }

    fn preamble(&self) -> String {
        let mut preamble = self.tool_catalog();
        preamble.push_str(
            "\nUse this format:\n\
             Thought: reason about what to do next\n\
             Action: <tool name>\n\
             Action Input: <JSON object with the tool's input fields>\n\
             Observation: <tool result, provided for you>\n\
             (repeat as needed)\n\
             Answer: <the final answer>\n\n",
        );
        if self.config.include_examples {
            preamble.push_str(&self.example_dialogue());
        }
        preamble
    }

    /// Resolve the first `Action`/`Action Input` pair into an observation.
    async fn perform_action(&self, steps: &[ReactStep]) -> String {
        let action_at = match steps.iter().position(|s| s.kind == StepKind::Action) {
            Some(position) => position,
            None => return "Error - no action or answer in response".into(),
        };
        let tool_name = steps[action_at].text.trim().to_string();
        let raw_input = steps[action_at + 1..]
            .iter()
            .find(|s| s.kind == StepKind::ActionInput)
            .map(|s| s.text.clone());

        let raw_input = match raw_input {
            Some(raw) => raw,
            None => return format!("Error - missing action input for {tool_name}"),
        };
        let input: Value = match serde_json::from_str(&raw_input) {
            Ok(value) => value,
            Err(error) => return format!("Error - parse failed: {error}"),
        };

        let tool = match self.tools.get(&tool_name) {
            Some(tool) => Arc::clone(tool),
            None => return format!("Error - Tool not found: {tool_name}"),
        };

        let options = InvokeOptions {
            timeout_ms: self.config.tool_timeout_ms,
            ..InvokeOptions::default()
        };
        match invoke_tool(tool.as_ref(), input, &options).await {
            Ok(output) => serde_json::to_string(&output)
                .unwrap_or_else(|_| "Error - unserializable tool output".into()),
            Err(error) => format!("Error - {error}"),
        }
    }

    fn finish(
        answer: String,
        truncated: bool,
        steps: Vec<ReactStep>,
        conversation: Vec<String>,
    ) -> IoMap {
        let mut output = IoMap::new();
        output.insert("answer".into(), Value::String(answer));
        output.insert(
            "react_steps".into(),
            serde_json::to_value(&steps).unwrap_or(Value::Null),
        );
        output.insert(
            "react_conversation".into(),
            Value::Array(conversation.into_iter().map(Value::String).collect()),
        );
        output.insert("react_truncated".into(), Value::Bool(truncated));
        output
    }
}

#[async_trait]
impl Module for React {
    async fn call(&self, input: IoMap) -> Result<IoMap, ModuleError> {
        let diagnosis = self.signature.explain_input(&input);
        if !diagnosis.ok() {
            return Err(ModuleError::SignatureValidation {
                signature: self.signature.name.clone(),
                explain: diagnosis.to_string(),
            });
        }

        let question = self
            .signature
            .inputs
            .first()
            .and_then(|field| input.get(&field.name))
            .map(|value| match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();

        let preamble = self.preamble();
        let mut conversation: Vec<String> = vec![format!("Question: {question}")];
        let mut all_steps: Vec<ReactStep> = Vec::new();

        for iteration in 0..self.config.max_iterations {
            let prompt = format!("{preamble}{}", conversation.join("\n"));
            let generation = self.backend.generate(GenerateRequest::new(prompt)).await?;
            let steps = parse_steps(&generation.text);
            tracing::debug!(iteration, steps = steps.len(), "react turn parsed");

            conversation.push(generation.text.trim().to_string());
            all_steps.extend(steps.iter().cloned());

            if let Some(answer) = steps.iter().find(|s| s.kind == StepKind::Answer) {
                return Ok(Self::finish(
                    answer.text.trim().to_string(),
                    false,
                    all_steps,
                    conversation,
                ));
            }

            let observation = self.perform_action(&steps).await;
            let observation_line = format!("Observation: {observation}");
            all_steps.push(ReactStep::new(StepKind::Observation, observation.clone()));
            conversation.push(observation_line);
        }

        Ok(Self::finish(
            format!(
                "Maximum iterations reached ({}) without a final answer",
                self.config.max_iterations
            ),
            true,
            all_steps,
            conversation,
        ))
    }

    fn signature(&self) -> Option<Arc<Signature>> {
        Some(Arc::clone(&self.signature))
    }

    fn name(&self) -> &str {
        "react"
    }
}
