//! Anthropic Claude adapter speaking the native Messages API.
//!
//! Use this module when you want Claude models behind the common
//! [`LLMProvider`] interface. The adapter renders the neutral conversation
//! into Anthropic content blocks (`text`, `tool_use`, `tool_result`) and
//! parses block-structured replies back out, so tool calling works without
//! any compatibility shim.
//!
//! # Example
//!
//! ```rust,no_run
//! use macrochat::conversation::{Message, Role};
//! use macrochat::provider::LLMProvider;
//! use macrochat::providers::claude::{ClaudeProvider, Model};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let key = std::env::var("ANTHROPIC_API_KEY")?;
//!     let provider = ClaudeProvider::new_with_model_enum(&key, Model::Claude37Sonnet);
//!     let messages = vec![Message::text(Role::User, "List three crates for CLI parsing.".to_string())];
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

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Provider adapter for Anthropic's native Messages API.
pub struct ClaudeProvider {
    api_key: String,
    model: String,
    base_url: String,
    usage: Mutex<Option<TokenUsage>>,
}

/// Anthropic Claude models this adapter has been exercised against.
pub enum Model {
    /// `claude-3-7-sonnet-20250219` – hybrid reasoning model, the default.
    Claude37Sonnet,
    /// `claude-3-5-sonnet-20241022` – second 3.5 Sonnet revision.
    Claude35SonnetV2,
    /// `claude-3-5-sonnet-20240620` – original 3.5 Sonnet.
    Claude35Sonnet,
    /// `claude-3-5-haiku-20241022` – fastest tier with tool support.
    Claude35Haiku,
    /// `claude-3-opus-20240229` – largest Claude 3 generation model.
    Claude3Opus,
}

/// Convert a [`Model`] variant into its public string identifier.
fn model_to_string(model: Model) -> String {
    match model {
        Model::Claude37Sonnet => "claude-3-7-sonnet-20250219".to_string(),
        Model::Claude35SonnetV2 => "claude-3-5-sonnet-20241022".to_string(),
        Model::Claude35Sonnet => "claude-3-5-sonnet-20240620".to_string(),
        Model::Claude35Haiku => "claude-3-5-haiku-20241022".to_string(),
        Model::Claude3Opus => "claude-3-opus-20240229".to_string(),
    }
}

fn role_to_wire(role: &Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn block_to_wire(block: &ContentBlock) -> JsonValue {
    match block {
        ContentBlock::Text { text } => json!({"type": "text", "text": text}),
        ContentBlock::ToolUse {
            id,
            name,
            arguments,
        } => json!({"type": "tool_use", "id": id, "name": name, "input": arguments}),
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
            ..
        } => {
            // Anthropic wants tool result content as text.
            let rendered = match content {
                JsonValue::String(text) => text.clone(),
                other => other.to_string(),
            };
            let mut wire =
                json!({"type": "tool_result", "tool_use_id": tool_use_id, "content": rendered});
            if *is_error {
                wire["is_error"] = json!(true);
            }
            wire
        }
    }
}

fn messages_to_wire(messages: &[Message]) -> Vec<JsonValue> {
    messages
        .iter()
        .map(|message| {
            let content = match &message.content {
                MessageContent::Text(text) => json!(text),
                MessageContent::Blocks(blocks) => {
                    json!(blocks.iter().map(block_to_wire).collect::<Vec<JsonValue>>())
                }
            };
            json!({"role": role_to_wire(&message.role), "content": content})
        })
        .collect()
}

fn tool_to_wire(tool: &ToolSpec) -> JsonValue {
    json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.input_schema,
    })
}

fn parse_usage(value: &JsonValue) -> Option<TokenUsage> {
    let input = value["input_tokens"].as_u64()?;
    let output = value["output_tokens"].as_u64()?;
    Some(TokenUsage {
        input_tokens: input as usize,
        output_tokens: output as usize,
        total_tokens: (input + output) as usize,
    })
}

impl ClaudeProvider {
    /// Create an adapter from an API key and strongly typed model variant.
    pub fn new_with_model_enum(api_key: &str, model: Model) -> Self {
        Self::new_with_model_str(api_key, &model_to_string(model))
    }

    /// Create an adapter from an API key and explicit model string.
    pub fn new_with_model_str(api_key: &str, model_name: &str) -> Self {
        Self::new_with_base_url(api_key, model_name, DEFAULT_BASE_URL)
    }

    /// Create an adapter pointing at a custom Anthropic-compatible base URL.
    pub fn new_with_base_url(api_key: &str, model_name: &str, base_url: &str) -> Self {
        ClaudeProvider {
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
            "messages": messages_to_wire(messages),
        });
        if let Some(system) = system_prompt {
            body["system"] = json!(system);
        }
        if let Some(tools) = tools {
            if !tools.is_empty() {
                body["tools"] = json!(tools.iter().map(tool_to_wire).collect::<Vec<JsonValue>>());
            }
        }
        body
    }

    fn parse_response(&self, payload: &JsonValue) -> Result<LLMResponse, ProviderError> {
        let blocks = payload["content"].as_array().ok_or_else(|| {
            ProviderError::InvalidResponse("response has no content array".to_string())
        })?;

        let mut text_contents = Vec::new();
        let mut tool_calls = Vec::new();
        for (index, block) in blocks.iter().enumerate() {
            match block["type"].as_str() {
                Some("text") => {
                    if let Some(text) = block["text"].as_str() {
                        text_contents.push(TextContent {
                            text: text.to_string(),
                            index,
                        });
                    }
                }
                Some("tool_use") => {
                    let id = block["id"].as_str().ok_or_else(|| {
                        ProviderError::InvalidResponse("tool_use block has no id".to_string())
                    })?;
                    let name = block["name"].as_str().ok_or_else(|| {
                        ProviderError::InvalidResponse("tool_use block has no name".to_string())
                    })?;
                    let arguments = match &block["input"] {
                        JsonValue::Null => json!({}),
                        other => other.clone(),
                    };
                    tool_calls.push(ToolCall {
                        id: id.to_string(),
                        name: name.to_string(),
                        arguments,
                        timestamp: Utc::now(),
                    });
                }
                other => {
                    log::debug!("ignoring unknown claude content block type {:?}", other);
                }
            }
        }

        Ok(LLMResponse {
            id: payload["id"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("msg_{}", Uuid::new_v4())),
            text_contents,
            tool_calls,
            provider: "claude".to_string(),
            model: payload["model"]
                .as_str()
                .unwrap_or(&self.model)
                .to_string(),
            stop_reason: payload["stop_reason"].as_str().map(str::to_string),
            usage: parse_usage(&payload["usage"]),
            timestamp: Utc::now(),
        })
    }
}

#[async_trait]
impl LLMProvider for ClaudeProvider {
    async fn process_messages(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: Option<&[ToolSpec]>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<LLMResponse, ProviderError> {
        let body = self.build_request_body(system_prompt, messages, tools, max_tokens, temperature);
        let url = format!("{}/messages", self.base_url);
        let headers = [
            ("x-api-key", self.api_key.as_str()),
            ("anthropic-version", ANTHROPIC_VERSION),
        ];

        let payload = common::post_json(&url, &headers, &body).await?;
        let response = self.parse_response(&payload)?;
        common::record_usage(&self.usage, response.usage.clone());
        Ok(response)
    }

    fn provider_name(&self) -> &str {
        "claude"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        Some(&self.usage)
    }
}
