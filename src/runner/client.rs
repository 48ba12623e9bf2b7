//! OpenAI-compatible chat client with tool-calling support.
//!
//! Works against any endpoint that speaks the `/chat/completions` wire
//! format with `tools` and `tool_calls`, which covers Ollama's v1 API,
//! vLLM, and LiteLLM proxies.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::time::Duration;

use crate::error::RunnerError;

/// Default endpoint, matching a local Ollama install.
pub const DEFAULT_API_BASE: &str = "http://localhost:11434/v1";

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// A message in a tool-calling conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender ("system", "user", "assistant", "tool").
    pub role: String,
    /// Text content. Absent on assistant turns that only request tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool invocations requested by an assistant turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ApiToolCall>>,
    /// Identifier of the call a "tool" message responds to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create an assistant message echoing the model's turn, including any
    /// tool calls, so it can be appended back into the transcript.
    pub fn assistant(content: Option<String>, tool_calls: Option<Vec<ApiToolCall>>) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Create a tool-result message answering a specific call id.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A tool invocation as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiToolCall {
    /// Call identifier, echoed back in the matching "tool" message.
    pub id: String,
    /// Always "function" for the endpoints this client targets.
    #[serde(rename = "type")]
    pub kind: String,
    /// The requested function and its raw argument payload.
    pub function: ApiFunctionCall,
}

/// Function name plus arguments as the model emitted them.
///
/// `arguments` stays a raw string: models sometimes emit malformed JSON
/// here, and that malformation is an observation, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiFunctionCall {
    pub name: String,
    pub arguments: String,
}

/// Request body for the chat-completions endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// JSON schemas of the tools offered to the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
    pub temperature: f64,
    /// Generation seed, forwarded for endpoints that honor it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub stream: bool,
}

impl ChatRequest {
    /// Create a deterministic (temperature 0, non-streaming) request.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: None,
            temperature: 0.0,
            seed: None,
            stream: false,
        }
    }

    /// Attach tool schemas to this request.
    pub fn with_tools(mut self, tools: Vec<Value>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Set the generation seed for this request.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the sampling temperature for this request.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Response from the chat-completions endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

impl ChatResponse {
    /// The message of the first choice.
    pub fn first_message(&self) -> Result<&ResponseMessage, RunnerError> {
        self.choices
            .first()
            .map(|choice| &choice.message)
            .ok_or(RunnerError::EmptyResponse)
    }
}

/// A single completion choice.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub index: u32,
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// The assistant turn inside a choice.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ApiToolCall>>,
}

impl ResponseMessage {
    /// Tool calls requested by this turn, empty when the model answered
    /// in text.
    pub fn requested_calls(&self) -> &[ApiToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }
}

/// Token usage statistics for one request.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// Error response from the API.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Trait for endpoints that can run one round of a chat conversation.
///
/// The experiment orchestrator and the tests inject scripted
/// implementations through this seam.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Execute a single chat-completion request.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, RunnerError>;
}

/// HTTP client for OpenAI-compatible endpoints.
pub struct HttpChatClient {
    /// Base URL for the API.
    api_base: String,
    /// Optional API key for authentication.
    api_key: Option<String>,
    /// HTTP client for making API requests.
    http_client: Client,
}

impl HttpChatClient {
    /// Create a new client with explicit configuration.
    ///
    /// # Arguments
    ///
    /// * `api_base` - Base URL (e.g., "http://localhost:11434/v1")
    /// * `api_key` - Optional bearer token
    /// * `timeout_secs` - Per-request timeout in seconds
    pub fn new(api_base: String, api_key: Option<String>, timeout_secs: u64) -> Self {
        Self {
            api_base,
            api_key,
            http_client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Create a new client from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `ANCHORLAB_API_BASE`: Base URL (defaults to a local Ollama)
    /// - `ANCHORLAB_API_KEY`: Bearer token (optional, empty means unset)
    pub fn from_env() -> Self {
        let api_base =
            env::var("ANCHORLAB_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let api_key = env::var("ANCHORLAB_API_KEY")
            .ok()
            .filter(|key| !key.is_empty());
        Self::new(api_base, api_key, DEFAULT_TIMEOUT_SECS)
    }

    /// Get the API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Check if an API key is configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl ChatProvider for HttpChatClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, RunnerError> {
        let url = format!("{}/chat/completions", self.api_base);

        let mut http_request = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json");

        if let Some(ref api_key) = self.api_key {
            http_request = http_request.header("Authorization", format!("Bearer {}", api_key));
        }

        let http_response = http_request.json(&request).send().await.map_err(|e| {
            RunnerError::Transport {
                attempts: 1,
                message: e.to_string(),
            }
        })?;

        let status = http_response.status();

        if !status.is_success() {
            let status_code = status.as_u16();
            let error_text = http_response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());

            if let Ok(error_response) = serde_json::from_str::<ApiErrorResponse>(&error_text) {
                if status_code == 429 {
                    return Err(RunnerError::RateLimited(error_response.error.message));
                }
                return Err(RunnerError::ApiError {
                    code: status_code,
                    message: error_response.error.message,
                });
            }

            if status_code == 429 {
                return Err(RunnerError::RateLimited(error_text));
            }
            return Err(RunnerError::ApiError {
                code: status_code,
                message: error_text,
            });
        }

        let response: ChatResponse = http_response
            .json()
            .await
            .map_err(|e| RunnerError::ParseError(format!("Failed to parse API response: {}", e)))?;

        Ok(response)
    }
}
