//! End-to-end flow tests driven by a scripted chat provider.
//!
//! No network or database is required: the provider replays canned
//! responses, the conversation runner executes mock tools in-process, and
//! the orchestrator runs without persistence.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use anchorlab::classifier::{Classification, Classifier};
use anchorlab::experiment::{ExperimentOrchestrator, ExperimentPlan};
use anchorlab::generator::{format_brl, PromptGenerator};
use anchorlab::runner::{ChatProvider, ChatRequest, ChatResponse, ConversationRunner, RunOptions};
use anchorlab::scenario::{
    AdversarialVariant, ContextPlacement, Difficulty, Scenario, ToolSetKind,
};
use anchorlab::tools::ToolRegistry;
use anchorlab::RunnerError;

fn text_response(text: &str) -> Value {
    json!({
        "choices": [{
            "index": 0,
            "message": { "content": text },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 900, "completion_tokens": 40, "total_tokens": 940 }
    })
}

fn tool_call_response(name: &str, arguments: &str) -> Value {
    json!({
        "choices": [{
            "index": 0,
            "message": {
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": { "name": name, "arguments": arguments }
                }]
            },
            "finish_reason": "tool_calls"
        }],
        "usage": { "prompt_tokens": 900, "completion_tokens": 25, "total_tokens": 925 }
    })
}

/// Replays a fixed sequence of responses, one per request.
struct ScriptedProvider {
    responses: Mutex<VecDeque<Value>>,
    requests_seen: AtomicU32,
}

impl ScriptedProvider {
    fn new(responses: Vec<Value>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests_seen: AtomicU32::new(0),
        }
    }

    fn requests_seen(&self) -> u32 {
        self.requests_seen.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, RunnerError> {
        self.requests_seen.fetch_add(1, Ordering::SeqCst);
        let next = self
            .responses
            .lock()
            .expect("script lock")
            .pop_front()
            .expect("script ran out of responses");
        Ok(serde_json::from_value(next).expect("scripted response should deserialize"))
    }
}

/// Answers every conversation the same way: one target-tool call, then a
/// final text that reports the tool's price. Robust to request ordering,
/// unlike a fixed queue.
struct TwoRoundProvider {
    final_text: String,
    requests_seen: AtomicU32,
}

impl TwoRoundProvider {
    fn new(final_text: impl Into<String>) -> Self {
        Self {
            final_text: final_text.into(),
            requests_seen: AtomicU32::new(0),
        }
    }

    fn requests_seen(&self) -> u32 {
        self.requests_seen.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatProvider for TwoRoundProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, RunnerError> {
        self.requests_seen.fetch_add(1, Ordering::SeqCst);
        let has_tool_result = request.messages.iter().any(|m| m.role == "tool");
        let body = if has_tool_result {
            text_response(&self.final_text)
        } else {
            tool_call_response("get_stock_price", r#"{"ticker": "PETR4"}"#)
        };
        Ok(serde_json::from_value(body).expect("scripted response should deserialize"))
    }
}

#[tokio::test]
async fn anchored_answer_without_tools_classifies_as_fnc() {
    let scenario = Scenario::new(
        80,
        Difficulty::Adversarial,
        ToolSetKind::Base,
        ContextPlacement::User,
        Some(AdversarialVariant::WithTimestamp),
    )
    .expect("scenario should be valid");
    let prompt = PromptGenerator::new()
        .generate(&scenario, 42)
        .expect("prompt should generate");

    // The model trusts the planted report instead of calling anything.
    let provider = ScriptedProvider::new(vec![text_response(&format!(
        "Conforme o relatório fornecido, o preço atual da ação PETR4 é R$ {}.",
        format_brl(prompt.trap_value)
    ))]);
    let registry = ToolRegistry::for_set(scenario.tool_set());
    let runner = ConversationRunner::new(
        &provider,
        &registry,
        RunOptions::new("scripted").with_seed(prompt.seed),
    );

    let transcript = runner
        .run(&prompt.system_message, &prompt.user_message)
        .await
        .expect("run should succeed");
    assert!(transcript.tool_calls.is_empty(), "no tool should have run");
    assert_eq!(transcript.rounds, 1);

    let verdict = Classifier::new()
        .expect("classifier should build")
        .classify(&transcript, prompt.expected_value, prompt.trap_value);

    assert_eq!(verdict.classification, Classification::Fnc);
    assert!(verdict.anchored_on_context);
    assert!(!verdict.called_any_tool);
    assert_eq!(verdict.extracted_value, Some(prompt.trap_value));
}

#[tokio::test]
async fn target_tool_flow_classifies_as_stc() {
    let scenario = Scenario::new(
        80,
        Difficulty::Adversarial,
        ToolSetKind::Base,
        ContextPlacement::User,
        Some(AdversarialVariant::WithTimestamp),
    )
    .expect("scenario should be valid");
    let prompt = PromptGenerator::new()
        .generate(&scenario, 42)
        .expect("prompt should generate");

    let provider = ScriptedProvider::new(vec![
        tool_call_response("get_stock_price", r#"{"ticker": "PETR4"}"#),
        text_response(&format!(
            "O preço atual da ação PETR4 é R$ {}.",
            format_brl(prompt.expected_value)
        )),
    ]);
    let registry = ToolRegistry::for_set(scenario.tool_set());
    let runner = ConversationRunner::new(
        &provider,
        &registry,
        RunOptions::new("scripted").with_seed(prompt.seed),
    );

    let transcript = runner
        .run(&prompt.system_message, &prompt.user_message)
        .await
        .expect("run should succeed");
    assert_eq!(transcript.tool_calls.len(), 1);
    assert!(transcript.called_target_tool());
    assert_eq!(transcript.target_tool_price(), Some(prompt.expected_value));
    assert_eq!(transcript.rounds, 2);

    let verdict = Classifier::new()
        .expect("classifier should build")
        .classify(&transcript, prompt.expected_value, prompt.trap_value);

    assert_eq!(verdict.classification, Classification::Stc);
    assert!(verdict.used_tool_result);
    assert!(!verdict.anchored_on_context);
    assert_eq!(provider.requests_seen(), 2);
}

#[tokio::test]
async fn wrong_tool_flow_classifies_as_fwt() {
    let scenario = Scenario::new(
        60,
        Difficulty::Counterfactual,
        ToolSetKind::Base,
        ContextPlacement::User,
        None,
    )
    .expect("scenario should be valid");
    let prompt = PromptGenerator::new()
        .generate(&scenario, 7)
        .expect("prompt should generate");

    // Consults the company profile, never the price tool.
    let provider = ScriptedProvider::new(vec![
        tool_call_response("get_company_profile", r#"{"ticker": "PETR4"}"#),
        text_response("A Petrobras é uma empresa de energia sediada no Rio de Janeiro."),
    ]);
    let registry = ToolRegistry::for_set(scenario.tool_set());
    let runner = ConversationRunner::new(
        &provider,
        &registry,
        RunOptions::new("scripted").with_seed(prompt.seed),
    );

    let transcript = runner
        .run(&prompt.system_message, &prompt.user_message)
        .await
        .expect("run should succeed");
    assert!(transcript.called_any_tool());
    assert!(!transcript.called_target_tool());

    let verdict = Classifier::new()
        .expect("classifier should build")
        .classify(&transcript, prompt.expected_value, prompt.trap_value);

    assert_eq!(verdict.classification, Classification::Fwt);
    assert!(!verdict.used_tool_result);
}

#[tokio::test]
async fn orchestrator_aggregates_scripted_runs_without_persistence() {
    let plan = ExperimentPlan::new("flow-test")
        .with_models(vec!["scripted".to_string()])
        .with_pollution_levels(vec![80])
        .with_difficulties(vec![Difficulty::Adversarial])
        .with_tool_sets(vec![ToolSetKind::Base])
        .with_placements(vec![ContextPlacement::User])
        .with_variants(vec![AdversarialVariant::WithTimestamp])
        .with_iterations(3)
        .with_master_seed(42)
        .without_persistence();

    // 38,50 is what the price mock reports for PETR4.
    let provider = Arc::new(TwoRoundProvider::new(
        "O preço atual da ação PETR4 é R$ 38,50.",
    ));
    let orchestrator = ExperimentOrchestrator::with_provider(plan, provider.clone())
        .expect("orchestrator should build");

    let summary = orchestrator.run_all().await.expect("run should succeed");

    assert!(summary.experiment_id.is_none(), "nothing should persist");
    assert_eq!(summary.cell_count, 1);
    assert_eq!(summary.total_executions, 3);

    let totals = summary.stats.totals();
    assert_eq!(totals.stc, 3);
    assert_eq!(totals.failed, 0);
    assert!((totals.success_rate() - 1.0).abs() < f64::EPSILON);

    // Two rounds per iteration: the tool call, then the final answer.
    assert_eq!(provider.requests_seen(), 6);
}

#[tokio::test]
async fn identical_seeds_produce_identical_prompts_across_models() {
    let scenario = Scenario::new(
        100,
        Difficulty::Adversarial,
        ToolSetKind::Expanded,
        ContextPlacement::System,
        Some(AdversarialVariant::WithoutTimestamp),
    )
    .expect("scenario should be valid");

    let generator = PromptGenerator::new();
    let first = generator
        .generate(&scenario, 1234)
        .expect("prompt should generate");
    let second = generator
        .generate(&scenario, 1234)
        .expect("prompt should generate");

    assert_eq!(first.prompt_hash, second.prompt_hash);
    assert_eq!(first.system_message, second.system_message);
    assert_eq!(first.user_message, second.user_message);
}
