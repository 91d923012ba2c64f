//! OpenAI adapter speaking the Chat Completions API.
//!
//! The neutral conversation shape does not map one-to-one onto this wire:
//! an assistant message carrying tool invocations becomes a single message
//! with a `tool_calls` array (arguments JSON-encoded as a string), while a
//! user message carrying tool results fans out into one `tool` role message
//! per result. The adapter owns both directions of that reshaping.
//!
//! # Example
//!
//! ```rust,no_run
//! use macrochat::conversation::{Message, Role};
//! use macrochat::provider::LLMProvider;
//! use macrochat::providers::openai::{Model, OpenAIProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let key = std::env::var("OPENAI_API_KEY")?;
//!     let provider = OpenAIProvider::new_with_model_enum(&key, Model::Gpt4o);
//!     let messages = vec![Message::text(Role::User, "Summarize the borrow checker.".to_string())];
//!     let response = provider
//!         .process_messages(None, &messages, None, 1024, 1.0)
//!         .await?;
//!     println!("{}", response.text());
//!     Ok(())
//! }
//! ```

use crate::macrochat::conversation::{ContentBlock, Message, MessageContent, Role};
use crate::macrochat::provider::{
    LLMProvider, LLMResponse, ProviderError, TextContent, TokenUsage,
};
use crate::macrochat::providers::common;
use crate::macrochat::tool_protocol::{ToolCall, ToolSpec};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value as JsonValue};
use std::sync::Mutex;
use uuid::Uuid;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Provider adapter for OpenAI's Chat Completions API.
pub struct OpenAIProvider {
    api_key: String,
    model: String,
    base_url: String,
    usage: Mutex<Option<TokenUsage>>,
}

/// OpenAI models this adapter has been exercised against.
pub enum Model {
    /// `gpt-4o` – flagship multimodal model, the default.
    Gpt4o,
    /// `gpt-4o-mini` – cheaper tier with full tool support.
    Gpt4oMini,
    /// `gpt-4-turbo` – previous flagship generation.
    Gpt4Turbo,
    /// `o1` – reasoning model.
    O1,
    /// `o1-mini` – smaller reasoning tier.
    O1Mini,
}

/// Convert a [`Model`] variant into its public string identifier.
fn model_to_string(model: Model) -> String {
    match model {
        Model::Gpt4o => "gpt-4o".to_string(),
        Model::Gpt4oMini => "gpt-4o-mini".to_string(),
        Model::Gpt4Turbo => "gpt-4-turbo".to_string(),
        Model::O1 => "o1".to_string(),
        Model::O1Mini => "o1-mini".to_string(),
    }
}

fn role_to_wire(role: &Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn render_result_content(content: &JsonValue) -> String {
    match content {
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Flatten one block-structured message onto the wire.
///
/// Tool results become standalone `tool` role messages; the remaining text
/// and tool invocations collapse into a single message for the original role.
fn append_block_message(wire: &mut Vec<JsonValue>, role: &Role, blocks: &[ContentBlock]) {
    let mut texts: Vec<&str> = Vec::new();
    let mut tool_calls = Vec::new();

    for block in blocks {
        match block {
            ContentBlock::Text { text } => texts.push(text.as_str()),
            ContentBlock::ToolUse {
                id,
                name,
                arguments,
            } => tool_calls.push(json!({
                "id": id,
                "type": "function",
                "function": {"name": name, "arguments": arguments.to_string()},
            })),
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                ..
            } => wire.push(json!({
                "role": "tool",
                "tool_call_id": tool_use_id,
                "content": render_result_content(content),
            })),
        }
    }

    match role {
        Role::Assistant => {
            let mut message = json!({"role": "assistant"});
            message["content"] = if texts.is_empty() {
                JsonValue::Null
            } else {
                json!(texts.join("\n"))
            };
            if !tool_calls.is_empty() {
                message["tool_calls"] = json!(tool_calls);
            }
            wire.push(message);
        }
        Role::User => {
            if !texts.is_empty() {
                wire.push(json!({"role": "user", "content": texts.join("\n")}));
            }
        }
    }
}

fn messages_to_wire(system_prompt: Option<&str>, messages: &[Message]) -> Vec<JsonValue> {
    let mut wire = Vec::new();
    if let Some(system) = system_prompt {
        wire.push(json!({"role": "system", "content": system}));
    }
    for message in messages {
        match &message.content {
            MessageContent::Text(text) => {
                wire.push(json!({"role": role_to_wire(&message.role), "content": text}));
            }
            MessageContent::Blocks(blocks) => {
                append_block_message(&mut wire, &message.role, blocks);
            }
        }
    }
    wire
}

fn tool_to_wire(tool: &ToolSpec) -> JsonValue {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.input_schema,
        },
    })
}

fn parse_usage(value: &JsonValue) -> Option<TokenUsage> {
    let input = value["prompt_tokens"].as_u64()?;
    let output = value["completion_tokens"].as_u64()?;
    let total = value["total_tokens"].as_u64().unwrap_or(input + output);
    Some(TokenUsage {
        input_tokens: input as usize,
        output_tokens: output as usize,
        total_tokens: total as usize,
    })
}

impl OpenAIProvider {
    /// Create an adapter from an API key and strongly typed model variant.
    pub fn new_with_model_enum(api_key: &str, model: Model) -> Self {
        Self::new_with_model_str(api_key, &model_to_string(model))
    }

    /// Create an adapter from an API key and explicit model string.
    pub fn new_with_model_str(api_key: &str, model_name: &str) -> Self {
        Self::new_with_base_url(api_key, model_name, DEFAULT_BASE_URL)
    }

    /// Create an adapter pointing at any OpenAI-compatible base URL.
    pub fn new_with_base_url(api_key: &str, model_name: &str, base_url: &str) -> Self {
        OpenAIProvider {
            api_key: api_key.to_string(),
            model: model_name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            usage: Mutex::new(None),
        }
    }

    fn build_request_body(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: Option<&[ToolSpec]>,
        max_tokens: u32,
        temperature: f32,
    ) -> JsonValue {
        let mut body = json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "temperature": temperature,
            "messages": messages_to_wire(system_prompt, messages),
        });
        if let Some(tools) = tools {
            if !tools.is_empty() {
                body["tools"] = json!(tools.iter().map(tool_to_wire).collect::<Vec<JsonValue>>());
            }
        }
        body
    }

    fn parse_response(&self, payload: &JsonValue) -> Result<LLMResponse, ProviderError> {
        let message = &payload["choices"][0]["message"];
        if message.is_null() {
            return Err(ProviderError::InvalidResponse(
                "response has no choices".to_string(),
            ));
        }

        let mut text_contents = Vec::new();
        if let Some(text) = message["content"].as_str() {
            if !text.is_empty() {
                text_contents.push(TextContent {
                    text: text.to_string(),
                    index: 0,
                });
            }
        }

        let mut tool_calls = Vec::new();
        if let Some(calls) = message["tool_calls"].as_array() {
            for call in calls {
                let id = call["id"].as_str().ok_or_else(|| {
                    ProviderError::InvalidResponse("tool call has no id".to_string())
                })?;
                let name = call["function"]["name"].as_str().ok_or_else(|| {
                    ProviderError::InvalidResponse("tool call has no function name".to_string())
                })?;
                let raw_arguments = call["function"]["arguments"].as_str().unwrap_or("{}");
                let arguments = serde_json::from_str(raw_arguments).map_err(|e| {
                    ProviderError::InvalidResponse(format!(
                        "tool call arguments for '{}' are not valid JSON: {}",
                        name, e
                    ))
                })?;
                tool_calls.push(ToolCall {
                    id: id.to_string(),
                    name: name.to_string(),
                    arguments,
                    timestamp: Utc::now(),
                });
            }
        }

        Ok(LLMResponse {
            id: payload["id"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("chatcmpl_{}", Uuid::new_v4())),
            text_contents,
            tool_calls,
            provider: "openai".to_string(),
            model: payload["model"]
                .as_str()
                .unwrap_or(&self.model)
                .to_string(),
            stop_reason: payload["choices"][0]["finish_reason"]
                .as_str()
                .map(str::to_string),
            usage: parse_usage(&payload["usage"]),
            timestamp: Utc::now(),
        })
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn process_messages(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: Option<&[ToolSpec]>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<LLMResponse, ProviderError> {
        let body = self.build_request_body(system_prompt, messages, tools, max_tokens, temperature);
        let url = format!("{}/chat/completions", self.base_url);
        let auth = format!("Bearer {}", self.api_key);
        let headers = [("authorization", auth.as_str())];

        let payload = common::post_json(&url, &headers, &body).await?;
        let response = self.parse_response(&payload)?;
        common::record_usage(&self.usage, response.usage.clone());
        Ok(response)
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        Some(&self.usage)
    }
}
