//! Provider abstraction over cloud LLM services.
//!
//! A provider adapter translates the engine's neutral conversation shape
//! into one vendor's wire format and back. It does not keep track of the
//! conversation itself; that is the engine's job. Adapters are expected to
//! be stateless apart from the usage slot, so one instance can serve many
//! rounds concurrently.

use crate::macrochat::conversation::Message;
use crate::macrochat::tool_protocol::{ToolCall, ToolSpec};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt;
use std::sync::Mutex;

/// How many tokens were spent on prompt vs. completion.
#[derive(Clone, Debug)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

/// One textual segment of a model response, in emission order.
#[derive(Clone, Debug)]
pub struct TextContent {
    pub text: String,
    pub index: usize,
}

/// Provider-neutral view of a single model response.
#[derive(Clone, Debug)]
pub struct LLMResponse {
    /// Vendor-assigned response id (synthesized when the vendor has none).
    pub id: String,
    pub text_contents: Vec<TextContent>,
    /// Tool invocations requested by the model, in emission order.
    pub tool_calls: Vec<ToolCall>,
    pub provider: String,
    pub model: String,
    pub stop_reason: Option<String>,
    pub usage: Option<TokenUsage>,
    pub timestamp: DateTime<Utc>,
}

impl LLMResponse {
    /// All text segments joined with newlines.
    pub fn text(&self) -> String {
        self.text_contents
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<&str>>()
            .join("\n")
    }

    pub fn first_text(&self) -> Option<&str> {
        self.text_contents.first().map(|t| t.text.as_str())
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Errors surfaced by provider adapters.
#[derive(Debug)]
pub enum ProviderError {
    /// The HTTP request itself failed (connect, timeout, body read).
    Transport(String),
    /// The provider answered with a non-success status.
    Api { status: u16, message: String },
    /// The provider answered 2xx but the payload did not parse.
    InvalidResponse(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Transport(msg) => write!(f, "Transport error: {}", msg),
            ProviderError::Api { status, message } => {
                write!(f, "API error (status {}): {}", status, message)
            }
            ProviderError::InvalidResponse(msg) => {
                write!(f, "Invalid provider response: {}", msg)
            }
        }
    }
}

impl Error for ProviderError {}

/// Trait defining the interface to interact with various LLM services.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Send the conversation to the model and parse its reply.
    ///
    /// - `system_prompt`: out-of-band steering text, not part of `messages`.
    /// - `messages`: the full conversation so far, oldest first.
    /// - `tools`: tool specs to advertise, or `None` to withhold tools
    ///   entirely (follow-up requests after tool execution do this).
    async fn process_messages(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: Option<&[ToolSpec]>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<LLMResponse, ProviderError>;

    /// Stable lowercase provider name ("claude", "openai", "gemini").
    fn provider_name(&self) -> &str;

    /// The model identifier requests are issued against.
    fn model_id(&self) -> &str;

    /// Whether this adapter can advertise tools at all.
    fn supports_tools(&self) -> bool {
        true
    }

    /// Hook to retrieve usage from the *last* process_messages() call.
    /// Default impl returns None so adapters without tracking don't break.
    fn last_usage(&self) -> Option<TokenUsage> {
        self.usage_slot()
            .and_then(|slot| slot.lock().ok().and_then(|u| u.clone()))
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        // Adapters that track usage override this with their own slot.
        None
    }
}
