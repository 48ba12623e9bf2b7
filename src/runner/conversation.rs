//! The tool-call conversation loop.
//!
//! Drives one execution end to end: send the message pair plus tool schemas,
//! execute every tool call the model requests against the mock registry,
//! feed results back, and stop when the model answers in text or the call
//! budget runs out. Every call is recorded in arrival order, including calls
//! to unknown tools and calls with malformed arguments; those are data
//! points about the model, not errors.

use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::RunnerError;
use crate::runner::client::{
    ApiToolCall, ChatMessage, ChatProvider, ChatRequest, ChatResponse,
};
use crate::tools::{mocks, ToolRegistry, TARGET_TOOL};

/// Hard ceiling on tool calls per execution.
pub const DEFAULT_MAX_TOOL_CALLS: u32 = 8;

/// Transport retries per chat round.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay doubled on each retry.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

/// Generation parameters for one execution.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Model identifier sent to the endpoint.
    pub model: String,
    /// Sampling temperature; 0.0 for deterministic generation.
    pub temperature: f64,
    /// Generation seed forwarded to the endpoint.
    pub seed: Option<u64>,
    /// Tool-call budget across all rounds of the conversation.
    pub max_tool_calls: u32,
    /// Retries per chat round on transport-level failures.
    pub max_retries: u32,
    /// Base backoff delay, doubled per retry.
    pub retry_backoff_ms: u64,
}

impl RunOptions {
    /// Create options with the deterministic defaults.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.0,
            seed: None,
            max_tool_calls: DEFAULT_MAX_TOOL_CALLS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }

    /// Set the generation seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the tool-call budget.
    pub fn with_max_tool_calls(mut self, max_tool_calls: u32) -> Self {
        self.max_tool_calls = max_tool_calls;
        self
    }

    /// Set the retry policy.
    pub fn with_retries(mut self, max_retries: u32, retry_backoff_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff_ms = retry_backoff_ms;
        self
    }
}

/// One tool call as observed during a conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRecord {
    /// Arrival position across the whole conversation, starting at 1.
    pub sequence_order: i32,
    pub tool_name: String,
    /// Parsed arguments, or `{"raw": ...}` when the model emitted
    /// unparsable JSON.
    pub arguments: Value,
    /// Mock result or error payload handed back to the model.
    pub result: Value,
    pub execution_success: bool,
    /// Whether this call named the target tool, independent of whether the
    /// arguments were usable.
    pub is_target: bool,
}

/// Everything observed while running one execution.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    pub tool_calls: Vec<ToolCallRecord>,
    /// The model's final text answer; empty if it never produced one.
    pub final_text: String,
    pub latency_ms: u64,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Chat rounds performed (1 = answered without tools).
    pub rounds: u32,
    /// True when the loop stopped because the call budget ran out.
    pub budget_exhausted: bool,
}

impl Transcript {
    pub fn called_any_tool(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn called_target_tool(&self) -> bool {
        self.tool_calls.iter().any(|call| call.is_target)
    }

    pub fn called_non_target_tool(&self) -> bool {
        self.tool_calls.iter().any(|call| !call.is_target)
    }

    /// Price returned by the first successful target-tool call, if any.
    pub fn target_tool_price(&self) -> Option<f64> {
        self.tool_calls
            .iter()
            .find(|call| call.is_target && call.execution_success)
            .and_then(|call| mocks::price_of(&call.result))
    }

    /// Tool names in arrival order, for persistence and summaries.
    pub fn call_sequence(&self) -> Vec<String> {
        self.tool_calls
            .iter()
            .map(|call| call.tool_name.clone())
            .collect()
    }
}

/// Runs tool-calling conversations against a chat provider.
pub struct ConversationRunner<'a> {
    provider: &'a dyn ChatProvider,
    registry: &'a ToolRegistry,
    options: RunOptions,
}

impl<'a> ConversationRunner<'a> {
    pub fn new(provider: &'a dyn ChatProvider, registry: &'a ToolRegistry, options: RunOptions) -> Self {
        Self {
            provider,
            registry,
            options,
        }
    }

    /// Run one conversation to completion.
    ///
    /// Transport failures are retried per round; a round that still fails
    /// after the retry budget surfaces as an error so the caller can record
    /// a failed execution.
    pub async fn run(
        &self,
        system_message: &str,
        user_message: &str,
    ) -> Result<Transcript, RunnerError> {
        let start = Instant::now();
        let tools = self.registry.schemas();

        let mut messages = vec![
            ChatMessage::system(system_message),
            ChatMessage::user(user_message),
        ];
        let mut transcript = Transcript::default();

        loop {
            transcript.rounds += 1;

            let mut request = ChatRequest::new(&self.options.model, messages.clone())
                .with_tools(tools.clone())
                .with_temperature(self.options.temperature);
            request.seed = self.options.seed;

            let response = self.chat_with_retry(request).await?;
            if let Some(usage) = response.usage {
                transcript.input_tokens += usage.prompt_tokens;
                transcript.output_tokens += usage.completion_tokens;
            }

            let message = response.first_message()?;
            let content = message.content.clone();
            let calls = message.requested_calls().to_vec();

            if calls.is_empty() {
                transcript.final_text = content.unwrap_or_default();
                break;
            }

            messages.push(ChatMessage::assistant(content.clone(), Some(calls.clone())));

            for call in &calls {
                let record = self.execute_call(call, transcript.tool_calls.len() as i32 + 1);
                debug!(
                    "Tool call #{} {} (success: {})",
                    record.sequence_order, record.tool_name, record.execution_success
                );
                messages.push(ChatMessage::tool(&call.id, record.result.to_string()));
                transcript.tool_calls.push(record);
            }

            if transcript.tool_calls.len() as u32 >= self.options.max_tool_calls {
                warn!(
                    "Tool-call budget of {} exhausted after {} round(s)",
                    self.options.max_tool_calls, transcript.rounds
                );
                transcript.budget_exhausted = true;
                transcript.final_text = content.unwrap_or_default();
                break;
            }
        }

        transcript.latency_ms = start.elapsed().as_millis() as u64;
        Ok(transcript)
    }

    /// Execute a single requested call against the mock registry.
    fn execute_call(&self, call: &ApiToolCall, sequence_order: i32) -> ToolCallRecord {
        let name = call.function.name.clone();
        let is_target = name == TARGET_TOOL;

        let (arguments, result, execution_success) =
            match serde_json::from_str::<Value>(&call.function.arguments) {
                Ok(arguments) => match self.registry.execute(&name, &arguments) {
                    Some(result) => (arguments, result, true),
                    None => (
                        arguments,
                        json!({"error": format!("Ferramenta desconhecida: {name}")}),
                        false,
                    ),
                },
                Err(e) => (
                    json!({"raw": call.function.arguments}),
                    json!({"error": format!("Argumentos inválidos: {e}")}),
                    false,
                ),
            };

        ToolCallRecord {
            sequence_order,
            tool_name: name,
            arguments,
            result,
            execution_success,
            is_target,
        }
    }

    async fn chat_with_retry(&self, request: ChatRequest) -> Result<ChatResponse, RunnerError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.provider.chat(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) if attempt <= self.options.max_retries && is_retryable(&err) => {
                    let delay = self.options.retry_backoff_ms * 2u64.pow(attempt - 1);
                    warn!(
                        "Chat attempt {} failed ({}), retrying in {}ms",
                        attempt, err, delay
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(err) => return Err(with_attempts(err, attempt)),
            }
        }
    }
}

/// Transport problems and server-side hiccups are worth retrying; client
/// errors and parse failures are not.
fn is_retryable(err: &RunnerError) -> bool {
    match err {
        RunnerError::Transport { .. } | RunnerError::RateLimited(_) => true,
        RunnerError::ApiError { code, .. } => *code >= 500,
        _ => false,
    }
}

fn with_attempts(err: RunnerError, attempts: u32) -> RunnerError {
    match err {
        RunnerError::Transport { message, .. } => RunnerError::Transport { attempts, message },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ToolSetKind;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted provider that pops canned steps and records every request.
    struct ScriptedProvider {
        steps: Mutex<VecDeque<Result<ChatResponse, RunnerError>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedProvider {
        fn new(steps: Vec<Result<ChatResponse, RunnerError>>) -> Self {
            Self {
                steps: Mutex::new(steps.into_iter().collect()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn request(&self, index: usize) -> ChatRequest {
            self.requests.lock().unwrap()[index].clone()
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, RunnerError> {
            self.requests.lock().unwrap().push(request);
            self.steps
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(RunnerError::EmptyResponse))
        }
    }

    fn text_response(text: &str) -> Result<ChatResponse, RunnerError> {
        Ok(serde_json::from_value(json!({
            "choices": [{
                "message": {"content": text},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 100, "completion_tokens": 20, "total_tokens": 120}
        }))
        .unwrap())
    }

    fn tool_call_response(calls: &[(&str, &str, &str)]) -> Result<ChatResponse, RunnerError> {
        let tool_calls: Vec<Value> = calls
            .iter()
            .map(|(id, name, arguments)| {
                json!({
                    "id": id,
                    "type": "function",
                    "function": {"name": name, "arguments": arguments}
                })
            })
            .collect();
        Ok(serde_json::from_value(json!({
            "choices": [{
                "message": {"content": null, "tool_calls": tool_calls},
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 150, "completion_tokens": 30, "total_tokens": 180}
        }))
        .unwrap())
    }

    fn transport_error() -> Result<ChatResponse, RunnerError> {
        Err(RunnerError::Transport {
            attempts: 1,
            message: "connection refused".to_string(),
        })
    }

    fn runner_options() -> RunOptions {
        RunOptions::new("qwen2.5:7b").with_retries(2, 1)
    }

    #[tokio::test]
    async fn test_direct_text_answer() {
        let provider = ScriptedProvider::new(vec![text_response("O preço é R$ 38,50.")]);
        let registry = ToolRegistry::for_set(ToolSetKind::Base);
        let runner = ConversationRunner::new(&provider, &registry, runner_options());

        let transcript = runner.run("sistema", "pergunta").await.unwrap();
        assert_eq!(transcript.final_text, "O preço é R$ 38,50.");
        assert!(!transcript.called_any_tool());
        assert_eq!(transcript.rounds, 1);
        assert_eq!(transcript.input_tokens, 100);
        assert_eq!(transcript.output_tokens, 20);
        assert!(!transcript.budget_exhausted);
    }

    #[tokio::test]
    async fn test_tool_call_loop_feeds_result_back() {
        let provider = ScriptedProvider::new(vec![
            tool_call_response(&[("call_1", "get_stock_price", r#"{"ticker": "PETR4"}"#)]),
            text_response("O preço atual de PETR4 é R$ 38,50."),
        ]);
        let registry = ToolRegistry::for_set(ToolSetKind::Base);
        let runner = ConversationRunner::new(&provider, &registry, runner_options());

        let transcript = runner.run("sistema", "pergunta").await.unwrap();
        assert_eq!(transcript.tool_calls.len(), 1);
        let record = &transcript.tool_calls[0];
        assert_eq!(record.sequence_order, 1);
        assert!(record.is_target);
        assert!(record.execution_success);
        assert_eq!(record.result["price"], json!(38.50));
        assert_eq!(transcript.target_tool_price(), Some(38.50));
        assert_eq!(transcript.rounds, 2);

        // The second request must carry the assistant turn and the tool
        // result addressed to the original call id.
        let followup = provider.request(1);
        assert_eq!(followup.messages.len(), 4);
        assert_eq!(followup.messages[2].role, "assistant");
        assert_eq!(followup.messages[3].role, "tool");
        assert_eq!(followup.messages[3].tool_call_id.as_deref(), Some("call_1"));
    }

    #[tokio::test]
    async fn test_multiple_calls_in_one_round_keep_order() {
        let provider = ScriptedProvider::new(vec![
            tool_call_response(&[
                ("call_1", "get_company_profile", r#"{"ticker": "PETR4"}"#),
                ("call_2", "get_stock_price", r#"{"ticker": "PETR4"}"#),
            ]),
            text_response("R$ 38,50"),
        ]);
        let registry = ToolRegistry::for_set(ToolSetKind::Base);
        let runner = ConversationRunner::new(&provider, &registry, runner_options());

        let transcript = runner.run("sistema", "pergunta").await.unwrap();
        assert_eq!(transcript.tool_calls.len(), 2);
        assert_eq!(transcript.tool_calls[0].sequence_order, 1);
        assert_eq!(transcript.tool_calls[1].sequence_order, 2);
        assert_eq!(
            transcript.call_sequence(),
            vec!["get_company_profile", "get_stock_price"]
        );
        assert!(transcript.called_target_tool());
        assert!(transcript.called_non_target_tool());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_recorded_not_fatal() {
        let provider = ScriptedProvider::new(vec![
            tool_call_response(&[("call_1", "get_weather", r#"{"city": "SP"}"#)]),
            text_response("Não consegui obter o preço."),
        ]);
        let registry = ToolRegistry::for_set(ToolSetKind::Base);
        let runner = ConversationRunner::new(&provider, &registry, runner_options());

        let transcript = runner.run("sistema", "pergunta").await.unwrap();
        let record = &transcript.tool_calls[0];
        assert_eq!(record.tool_name, "get_weather");
        assert!(!record.execution_success);
        assert!(!record.is_target);
        assert!(record.result["error"]
            .as_str()
            .unwrap()
            .contains("Ferramenta desconhecida"));
    }

    #[tokio::test]
    async fn test_expanded_tool_outside_base_set_fails() {
        // get_analyst_rating exists in the catalog but not in the base set.
        let provider = ScriptedProvider::new(vec![
            tool_call_response(&[("call_1", "get_analyst_rating", r#"{"ticker": "PETR4"}"#)]),
            text_response("sem resposta"),
        ]);
        let registry = ToolRegistry::for_set(ToolSetKind::Base);
        let runner = ConversationRunner::new(&provider, &registry, runner_options());

        let transcript = runner.run("sistema", "pergunta").await.unwrap();
        assert!(!transcript.tool_calls[0].execution_success);
    }

    #[tokio::test]
    async fn test_malformed_arguments_are_a_data_point() {
        let provider = ScriptedProvider::new(vec![
            tool_call_response(&[("call_1", "get_stock_price", "{not json")]),
            text_response("erro"),
        ]);
        let registry = ToolRegistry::for_set(ToolSetKind::Base);
        let runner = ConversationRunner::new(&provider, &registry, runner_options());

        let transcript = runner.run("sistema", "pergunta").await.unwrap();
        let record = &transcript.tool_calls[0];
        assert!(!record.execution_success);
        assert!(record.is_target);
        assert_eq!(record.arguments["raw"], json!("{not json"));
        assert!(transcript.target_tool_price().is_none());
    }

    #[tokio::test]
    async fn test_budget_stops_the_loop() {
        let call = ("call_1", "get_stock_price", r#"{"ticker": "PETR4"}"#);
        let provider = ScriptedProvider::new(vec![
            tool_call_response(&[call]),
            tool_call_response(&[call]),
            tool_call_response(&[call]),
        ]);
        let registry = ToolRegistry::for_set(ToolSetKind::Base);
        let options = runner_options().with_max_tool_calls(2);
        let runner = ConversationRunner::new(&provider, &registry, options);

        let transcript = runner.run("sistema", "pergunta").await.unwrap();
        assert_eq!(transcript.tool_calls.len(), 2);
        assert!(transcript.budget_exhausted);
        assert_eq!(provider.request_count(), 2);
        assert_eq!(transcript.final_text, "");
    }

    #[tokio::test]
    async fn test_transport_retry_then_success() {
        let provider =
            ScriptedProvider::new(vec![transport_error(), text_response("R$ 38,50")]);
        let registry = ToolRegistry::for_set(ToolSetKind::Base);
        let runner = ConversationRunner::new(&provider, &registry, runner_options());

        let transcript = runner.run("sistema", "pergunta").await.unwrap();
        assert_eq!(transcript.final_text, "R$ 38,50");
        assert_eq!(provider.request_count(), 2);
    }

    #[tokio::test]
    async fn test_transport_retries_exhausted() {
        let provider = ScriptedProvider::new(vec![
            transport_error(),
            transport_error(),
            transport_error(),
        ]);
        let registry = ToolRegistry::for_set(ToolSetKind::Base);
        let runner = ConversationRunner::new(&provider, &registry, runner_options());

        let err = runner.run("sistema", "pergunta").await.unwrap_err();
        match err {
            RunnerError::Transport { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected transport error, got {other:?}"),
        }
        assert_eq!(provider.request_count(), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let provider = ScriptedProvider::new(vec![Err(RunnerError::ApiError {
            code: 400,
            message: "bad request".to_string(),
        })]);
        let registry = ToolRegistry::for_set(ToolSetKind::Base);
        let runner = ConversationRunner::new(&provider, &registry, runner_options());

        let err = runner.run("sistema", "pergunta").await.unwrap_err();
        assert!(matches!(err, RunnerError::ApiError { code: 400, .. }));
        assert_eq!(provider.request_count(), 1);
    }

    #[test]
    fn test_run_options_builder() {
        let options = RunOptions::new("llama3.1:8b")
            .with_seed(42)
            .with_max_tool_calls(4)
            .with_retries(1, 100);
        assert_eq!(options.model, "llama3.1:8b");
        assert_eq!(options.temperature, 0.0);
        assert_eq!(options.seed, Some(42));
        assert_eq!(options.max_tool_calls, 4);
        assert_eq!(options.max_retries, 1);
        assert_eq!(options.retry_backoff_ms, 100);
    }
}
