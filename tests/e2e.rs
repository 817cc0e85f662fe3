//! Workspace-level integration tests: end-to-end scenarios that cross
//! crate boundaries the way real programs do.

use braid_backend::{RetryBackend, RetryConfig, ScriptedBackend, ThrottleBackend, ThrottleConfig};
use braid_core::backend::{
    Backend, EmbedRequest, Embedding, GenerateRequest, Generation, TokenUsage,
};
use braid_core::error::BackendError;
use braid_core::io::{IoMap, map_of};
use braid_core::module::Module;
use braid_core::signature::{FieldSpec, FieldType, Signature};
use braid_core::storage::Storage as _;
use braid_eval::{EvalOptions, Example};
use braid_op_cot::ChainOfThought;
use braid_op_react::React;
use braid_optimize::{Candidate, OptimizeOptions, optimize};
use braid_pipeline::{FnModule, Pipeline, Stage};
use braid_storage::make_storage;
use braid_tool::{FnTool, ToolContext, ToolDyn};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Instant;

// ── 1. Chain-of-Thought parsing ─────────────────────────────────────

#[tokio::test]
async fn cot_parses_reasoning_and_answer() {
    let signature = Arc::new(
        Signature::new(
            "qa",
            vec![FieldSpec::typed("question", FieldType::String)],
            vec![FieldSpec::typed("answer", FieldType::String)],
        )
        .unwrap(),
    );
    let backend = ScriptedBackend::with_responses(["Reasoning: 2+2 equals 4\nAnswer: 4"]);
    let cot = ChainOfThought::new(Arc::new(backend), signature).unwrap();

    let out = cot
        .call(map_of([("question", json!("What is 2+2?"))]))
        .await
        .unwrap();
    assert_eq!(out["rationale"], json!("2+2 equals 4"));
    assert_eq!(out["answer"], json!("4"));
}

// ── 2. Pipeline DAG ─────────────────────────────────────────────────

fn word_pipeline() -> Pipeline {
    let tok = FnModule::new("tok", |input| {
        let text = input.get("text").and_then(Value::as_str).unwrap_or("");
        let tokens: Vec<Value> = text
            .split_whitespace()
            .map(|w| Value::String(w.into()))
            .collect();
        map_of([("tokens", Value::Array(tokens))])
    });
    let count = FnModule::new("count", |input| {
        let n = input
            .get("tokens")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        map_of([("word_count", json!(n))])
    });
    let upper = FnModule::new("upper", |input| {
        let upper: Vec<Value> = input
            .get("tokens")
            .and_then(Value::as_array)
            .map(|tokens| {
                tokens
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|w| Value::String(w.to_uppercase()))
                    .collect()
            })
            .unwrap_or_default();
        map_of([("upper_tokens", Value::Array(upper))])
    });
    let fmt = FnModule::new("fmt", |input| {
        let n = input.get("word_count").and_then(Value::as_u64).unwrap_or(0);
        let joined = input
            .get("upper_tokens")
            .and_then(Value::as_array)
            .map(|tokens| {
                tokens
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();
        map_of([
            ("summary", json!(format!("Processed {n} words"))),
            ("result", json!(joined)),
        ])
    });

    Pipeline::compile(
        vec![
            Stage::new("tok", Arc::new(tok)),
            Stage::after("count", Arc::new(count), ["tok"]),
            Stage::after("upper", Arc::new(upper), ["tok"]),
            Stage::after("fmt", Arc::new(fmt), ["count", "upper"]),
        ],
        json!({"name": "words"}),
    )
    .unwrap()
}

#[tokio::test]
async fn dag_runs_batches_in_dependency_order() {
    let out = word_pipeline()
        .call(map_of([("text", json!("hello world clojure"))]))
        .await
        .unwrap();
    assert_eq!(out["word_count"], json!(3));
    assert_eq!(out["summary"], json!("Processed 3 words"));
    assert_eq!(out["result"], json!("HELLO WORLD CLOJURE"));
}

// ── 3. Rate limiter spacing ─────────────────────────────────────────

#[tokio::test]
async fn throttle_spaces_a_tight_loop() {
    let backend = ThrottleBackend::new(
        Arc::new(braid_backend::EchoBackend::default()),
        ThrottleConfig::per_second(100.0),
    );

    let mut stamps = Vec::new();
    let started = Instant::now();
    for _ in 0..10 {
        backend.generate(GenerateRequest::new("p")).await.unwrap();
        stamps.push(started.elapsed());
    }

    let gaps: Vec<u128> = stamps
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).as_millis())
        .collect();
    let wide_enough = gaps.iter().filter(|gap| **gap >= 5).count();
    assert!(
        wide_enough > gaps.len() / 2,
        "most gaps should be >= 5 ms, got {gaps:?}"
    );
    assert!(
        stamps.last().unwrap().as_millis() >= 90,
        "10 calls at 100 rps should span >= 90 ms"
    );
}

// ── 4. Retry backoff ────────────────────────────────────────────────

struct FlakyTimed {
    attempts: Mutex<Vec<Instant>>,
    failures_before_success: usize,
}

#[async_trait::async_trait]
impl Backend for FlakyTimed {
    fn name(&self) -> &str {
        "flaky-timed"
    }
    async fn generate(&self, request: GenerateRequest) -> Result<Generation, BackendError> {
        let mut attempts = self.attempts.lock().unwrap();
        attempts.push(Instant::now());
        if attempts.len() <= self.failures_before_success {
            return Err(BackendError::Retriable("transient".into()));
        }
        Ok(Generation::new(
            request.prompt,
            Some(TokenUsage::default()),
            "flaky-1",
        ))
    }
    async fn embed(&self, _request: EmbedRequest) -> Result<Embedding, BackendError> {
        Ok(Embedding::new(vec![]))
    }
}

#[tokio::test]
async fn retry_backoff_grows_between_attempts() {
    let flaky = Arc::new(FlakyTimed {
        attempts: Mutex::new(Vec::new()),
        failures_before_success: 2,
    });
    let backend = RetryBackend::new(
        Arc::clone(&flaky) as Arc<dyn Backend>,
        RetryConfig {
            max_retries: 3,
            initial_ms: 5,
            factor: 2.0,
            max_ms: 1_000,
            jitter: false,
        },
    );

    let generation = backend.generate(GenerateRequest::new("ok")).await.unwrap();
    assert_eq!(generation.text, "ok");

    let attempts = flaky.attempts.lock().unwrap();
    assert_eq!(attempts.len(), 3);
    let gap1 = attempts[1] - attempts[0];
    let gap2 = attempts[2] - attempts[1];
    assert!(
        gap2 >= gap1,
        "backoff must not shrink: {gap1:?} then {gap2:?}"
    );
}

// ── 5. ReAct tool loop ──────────────────────────────────────────────

#[tokio::test]
async fn react_runs_tool_then_answers() {
    let math_sig = Arc::new(
        Signature::new(
            "math_tool",
            vec![FieldSpec::typed("expression", FieldType::String)],
            vec![FieldSpec::typed("result", FieldType::Number)],
        )
        .unwrap(),
    );
    let math: Arc<dyn ToolDyn> = Arc::new(FnTool::new(
        "math-tool",
        "Evaluates an arithmetic expression",
        math_sig,
        |_input| Ok(json!({"result": 4})),
    ));

    let backend = ScriptedBackend::with_responses([
        "Thought: I need to calculate 2+2.\nAction: math-tool\nAction Input: {\"expression\": \"2+2\"}",
        "Thought: The result is 4.\nAnswer: 4",
    ]);
    let react = React::new(Arc::new(backend), ToolContext::from_tools(vec![math]));

    let out = react
        .call(map_of([("question", json!("What is 2+2?"))]))
        .await
        .unwrap();

    assert_eq!(out["answer"], json!("4"));
    assert_eq!(out["react_truncated"], json!(false));
    let conversation = out["react_conversation"].to_string();
    assert!(
        conversation.contains("Observation: {\\\"result\\\":4}")
            || conversation.contains("Observation: {\"result\":4}"),
        "conversation must carry the tool observation: {conversation}"
    );
}

// ── 6. Optimization + storage ───────────────────────────────────────

#[tokio::test]
async fn identity_strategy_persists_history() {
    let storage = make_storage(Some("sqlite://:memory:")).unwrap();

    // A program that answers with the question itself; the trainset
    // expects exactly that, so exact-match scores 1.0.
    let passthrough = FnModule::new("passthrough", |input| {
        let mut out = IoMap::new();
        if let Some(question) = input.get("question") {
            out.insert("answer".into(), question.clone());
        }
        out
    });
    let seed = Candidate::new(Arc::new(passthrough), json!({"name": "passthrough"}));
    let trainset = vec![
        Example::qa("alpha", "alpha"),
        Example::qa("beta", "beta"),
        Example::qa("gamma", "gamma"),
    ];

    let result = optimize(
        "identity",
        seed,
        trainset,
        Arc::new(braid_eval::exact_match),
        OptimizeOptions {
            storage: Some(Arc::clone(&storage)),
            eval: EvalOptions::default(),
            ..OptimizeOptions::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(result.best_score, 1.0);
    assert!(!result.history.is_empty());

    let run_id = result.run_id.unwrap();
    let history = storage.load_history(&run_id).await.unwrap();
    assert_eq!(history.len(), result.history.len());
    assert!(history.windows(2).all(|pair| pair[0].iter < pair[1].iter));
    assert_eq!(history[0].score, 1.0);
    assert_eq!(
        storage.load_run(&run_id).await.unwrap(),
        Some(json!({"name": "passthrough"}))
    );
}

#[tokio::test]
async fn file_tree_storage_round_trips_through_the_factory() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("file://{}", dir.path().display());
    let storage = make_storage(Some(&url)).unwrap();

    let run_id = storage.create_run(json!({"name": "p"})).await.unwrap();
    storage
        .append_metric(&run_id, 0, 0.25, json!({"at_ms": 1}))
        .await
        .unwrap();
    storage
        .append_metric(&run_id, 1, 0.75, json!({"at_ms": 2}))
        .await
        .unwrap();

    assert!(dir.path().join(&run_id).join("pipeline.json").is_file());
    assert!(dir.path().join(&run_id).join("history.json").is_file());

    let history = storage.load_history(&run_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].score, 0.25);
    assert_eq!(history[1].payload, json!({"at_ms": 2}));
}

// ── Cross-cutting: unknown strategy fails fast ──────────────────────

#[tokio::test]
async fn unknown_strategy_fails_before_any_work() {
    let err = braid_optimize::compile_strategy("random").unwrap_err();
    assert!(matches!(
        err,
        braid_optimize::OptimizeError::UnknownStrategy(name) if name == "random"
    ));
}
