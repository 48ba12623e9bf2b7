//! Model runner for tool-calling executions.
//!
//! This module talks to an OpenAI-compatible chat endpoint and drives the
//! tool-call conversation loop for a single execution.
//!
//! # Architecture
//!
//! ```text
//! GeneratedPrompt → ConversationRunner → ChatProvider → Transcript → Classifier
//! ```
//!
//! The runner:
//! 1. Sends the message pair plus the active tool schemas
//! 2. Executes every requested tool against the mock registry
//! 3. Feeds tool results back until the model answers in text
//! 4. Records calls, latency, and token usage in a [`Transcript`]
//!
//! # Example
//!
//! ```ignore
//! use anchorlab::runner::{ConversationRunner, HttpChatClient, RunOptions};
//! use anchorlab::scenario::ToolSetKind;
//! use anchorlab::tools::ToolRegistry;
//!
//! let client = HttpChatClient::from_env();
//! let registry = ToolRegistry::for_set(ToolSetKind::Base);
//! let options = RunOptions::new("qwen2.5:7b").with_seed(42);
//!
//! let runner = ConversationRunner::new(&client, &registry, options);
//! let transcript = runner.run(&prompt.system_message, &prompt.user_message).await?;
//!
//! println!("{} tool call(s), final: {}", transcript.tool_calls.len(), transcript.final_text);
//! ```

pub mod client;
pub mod conversation;

pub use client::{
    ApiFunctionCall, ApiToolCall, ChatMessage, ChatProvider, ChatRequest, ChatResponse,
    HttpChatClient, DEFAULT_API_BASE,
};
pub use conversation::{
    ConversationRunner, RunOptions, ToolCallRecord, Transcript, DEFAULT_MAX_RETRIES,
    DEFAULT_MAX_TOOL_CALLS, DEFAULT_RETRY_BACKOFF_MS,
};
