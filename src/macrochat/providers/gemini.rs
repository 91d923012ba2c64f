//! Google Gemini adapter speaking the generateContent API.
//!
//! Gemini's wire format differs from the other vendors in two ways that this
//! adapter has to paper over. Function calls carry no ids, so the adapter
//! synthesizes `call_<uuid>` ids on parse and, when sending results back,
//! recovers the function name a result belongs to by scanning the earlier
//! assistant turns for the matching invocation. Assistant turns use the
//! `model` role, and steering text rides in a top-level `systemInstruction`.
//!
//! # Example
//!
//! ```rust,no_run
//! use macrochat::conversation::{Message, Role};
//! use macrochat::provider::LLMProvider;
//! use macrochat::providers::gemini::{GeminiProvider, Model};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let key = std::env::var("GEMINI_API_KEY")?;
//!     let provider = GeminiProvider::new_with_model_enum(&key, Model::Gemini20FlashExp);
//!     let messages = vec![Message::text(Role::User, "What is an Arc<str>?".to_string())];
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
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Provider adapter for Google's Gemini generateContent API.
pub struct GeminiProvider {
    api_key: String,
    model: String,
    base_url: String,
    usage: Mutex<Option<TokenUsage>>,
}

/// Gemini models this adapter has been exercised against.
pub enum Model {
    /// `gemini-2.0-flash-exp` – experimental 2.0 tier, the default.
    Gemini20FlashExp,
    /// `gemini-2.0-flash` – production 2.0 flash tier.
    Gemini20Flash,
    /// `gemini-1.5-pro` – long-context workhorse.
    Gemini15Pro,
    /// `gemini-1.5-flash` – fast 1.5 tier.
    Gemini15Flash,
    /// `gemini-1.5-flash-8b` – smallest hosted tier.
    Gemini15Flash8B,
}

/// Convert a [`Model`] variant into its public string identifier.
fn model_to_string(model: Model) -> String {
    match model {
        Model::Gemini20FlashExp => "gemini-2.0-flash-exp".to_string(),
        Model::Gemini20Flash => "gemini-2.0-flash".to_string(),
        Model::Gemini15Pro => "gemini-1.5-pro".to_string(),
        Model::Gemini15Flash => "gemini-1.5-flash".to_string(),
        Model::Gemini15Flash8B => "gemini-1.5-flash-8b".to_string(),
    }
}

fn role_to_wire(role: &Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

/// Map tool invocation ids to function names across the whole conversation.
///
/// Function responses on this wire are keyed by name, not id, so the name
/// has to be recovered from the assistant turn that made the call.
fn build_call_map(messages: &[Message]) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for message in messages {
        if let MessageContent::Blocks(blocks) = &message.content {
            for block in blocks {
                if let ContentBlock::ToolUse { id, name, .. } = block {
                    map.insert(id.clone(), name.clone());
                }
            }
        }
    }
    map
}

fn block_to_part(block: &ContentBlock, call_map: &HashMap<String, String>) -> JsonValue {
    match block {
        ContentBlock::Text { text } => json!({"text": text}),
        ContentBlock::ToolUse {
            name, arguments, ..
        } => json!({"functionCall": {"name": name, "args": arguments}}),
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            ..
        } => {
            let name = call_map.get(tool_use_id).cloned().unwrap_or_else(|| {
                log::warn!(
                    "no originating call found for tool result {}, using the id as function name",
                    tool_use_id
                );
                tool_use_id.clone()
            });
            json!({"functionResponse": {"name": name, "response": {"content": content}}})
        }
    }
}

fn messages_to_wire(messages: &[Message]) -> Vec<JsonValue> {
    let call_map = build_call_map(messages);
    messages
        .iter()
        .map(|message| {
            let parts = match &message.content {
                MessageContent::Text(text) => vec![json!({"text": text})],
                MessageContent::Blocks(blocks) => blocks
                    .iter()
                    .map(|block| block_to_part(block, &call_map))
                    .collect(),
            };
            json!({"role": role_to_wire(&message.role), "parts": parts})
        })
        .collect()
}

fn tool_declarations(tools: &[ToolSpec]) -> JsonValue {
    let declarations: Vec<JsonValue> = tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            })
        })
        .collect();
    json!([{"functionDeclarations": declarations}])
}

fn parse_usage(value: &JsonValue) -> Option<TokenUsage> {
    let input = value["promptTokenCount"].as_u64()?;
    let output = value["candidatesTokenCount"].as_u64().unwrap_or(0);
    let total = value["totalTokenCount"].as_u64().unwrap_or(input + output);
    Some(TokenUsage {
        input_tokens: input as usize,
        output_tokens: output as usize,
        total_tokens: total as usize,
    })
}

impl GeminiProvider {
    /// Create an adapter from an API key and strongly typed model variant.
    pub fn new_with_model_enum(api_key: &str, model: Model) -> Self {
        Self::new_with_model_str(api_key, &model_to_string(model))
    }

    /// Create an adapter from an API key and explicit model string.
    pub fn new_with_model_str(api_key: &str, model_name: &str) -> Self {
        Self::new_with_base_url(api_key, model_name, DEFAULT_BASE_URL)
    }

    /// Create an adapter pointing at a custom Gemini-compatible base URL.
    pub fn new_with_base_url(api_key: &str, model_name: &str, base_url: &str) -> Self {
        GeminiProvider {
            api_key: api_key.to_string(),
            model: model_name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            usage: Mutex::new(None),
        }
    }

    fn request_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url,
            self.model,
            urlencoding::encode(&self.api_key)
        )
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
            "contents": messages_to_wire(messages),
            "generationConfig": {
                "maxOutputTokens": max_tokens,
                "temperature": temperature,
            },
        });
        if let Some(system) = system_prompt {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }
        if let Some(tools) = tools {
            if !tools.is_empty() {
                body["tools"] = tool_declarations(tools);
            }
        }
        body
    }

    fn parse_response(&self, payload: &JsonValue) -> Result<LLMResponse, ProviderError> {
        let candidate = &payload["candidates"][0];
        if candidate.is_null() {
            return Err(ProviderError::InvalidResponse(
                "response has no candidates".to_string(),
            ));
        }

        let mut text_contents = Vec::new();
        let mut tool_calls = Vec::new();
        // A candidate may carry no parts at all (safety stops do this).
        if let Some(parts) = candidate["content"]["parts"].as_array() {
            for (index, part) in parts.iter().enumerate() {
                if let Some(text) = part["text"].as_str() {
                    text_contents.push(TextContent {
                        text: text.to_string(),
                        index,
                    });
                } else if !part["functionCall"].is_null() {
                    let name = part["functionCall"]["name"].as_str().ok_or_else(|| {
                        ProviderError::InvalidResponse("functionCall has no name".to_string())
                    })?;
                    let arguments = match &part["functionCall"]["args"] {
                        JsonValue::Null => json!({}),
                        other => other.clone(),
                    };
                    tool_calls.push(ToolCall {
                        // No vendor id on this wire; mint one so results can
                        // be joined back to their invocation.
                        id: format!("call_{}", Uuid::new_v4()),
                        name: name.to_string(),
                        arguments,
                        timestamp: Utc::now(),
                    });
                }
            }
        }

        Ok(LLMResponse {
            id: format!("gemini_{}", Uuid::new_v4()),
            text_contents,
            tool_calls,
            provider: "gemini".to_string(),
            model: self.model.clone(),
            stop_reason: candidate["finishReason"].as_str().map(str::to_string),
            usage: parse_usage(&payload["usageMetadata"]),
            timestamp: Utc::now(),
        })
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn process_messages(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: Option<&[ToolSpec]>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<LLMResponse, ProviderError> {
        let body = self.build_request_body(system_prompt, messages, tools, max_tokens, temperature);
        let url = self.request_url();

        let payload = common::post_json(&url, &[], &body).await?;
        let response = self.parse_response(&payload)?;
        common::record_usage(&self.usage, response.usage.clone());
        Ok(response)
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        Some(&self.usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GeminiProvider {
        GeminiProvider::new_with_model_str("test-key", "gemini-2.0-flash-exp")
    }

    #[test]
    fn test_model_to_string() {
        assert_eq!(
            model_to_string(Model::Gemini20FlashExp),
            "gemini-2.0-flash-exp"
        );
        assert_eq!(model_to_string(Model::Gemini15Pro), "gemini-1.5-pro");
    }

    #[test]
    fn test_request_url_encodes_key() {
        let provider = GeminiProvider::new_with_model_str("key with spaces", "gemini-1.5-flash");
        assert_eq!(
            provider.request_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent?key=key%20with%20spaces"
        );
    }

    #[test]
    fn test_assistant_role_maps_to_model() {
        let messages = vec![
            Message::text(Role::User, "hi".to_string()),
            Message::text(Role::Assistant, "hello".to_string()),
        ];
        let wire = messages_to_wire(&messages);
        assert_eq!(wire[0]["role"], json!("user"));
        assert_eq!(wire[1]["role"], json!("model"));
        assert_eq!(wire[1]["parts"][0]["text"], json!("hello"));
    }

    #[test]
    fn test_function_response_recovers_name_from_call() {
        let messages = vec![
            Message::blocks(
                Role::Assistant,
                vec![ContentBlock::tool_use(
                    "call_abc".to_string(),
                    "search".to_string(),
                    json!({"query": "rust"}),
                )],
            ),
            Message::blocks(
                Role::User,
                vec![ContentBlock::ToolResult {
                    tool_use_id: "call_abc".to_string(),
                    content: json!("42 results"),
                    is_error: false,
                    error_message: None,
                }],
            ),
        ];
        let wire = messages_to_wire(&messages);

        let call_part = &wire[0]["parts"][0]["functionCall"];
        assert_eq!(call_part["name"], json!("search"));
        assert_eq!(call_part["args"]["query"], json!("rust"));

        let response_part = &wire[1]["parts"][0]["functionResponse"];
        assert_eq!(response_part["name"], json!("search"));
        assert_eq!(response_part["response"]["content"], json!("42 results"));
    }

    #[test]
    fn test_orphan_result_falls_back_to_id() {
        let messages = vec![Message::blocks(
            Role::User,
            vec![ContentBlock::ToolResult {
                tool_use_id: "call_lost".to_string(),
                content: json!("data"),
                is_error: false,
                error_message: None,
            }],
        )];
        let wire = messages_to_wire(&messages);
        assert_eq!(
            wire[0]["parts"][0]["functionResponse"]["name"],
            json!("call_lost")
        );
    }

    #[test]
    fn test_build_request_body_shape() {
        let messages = vec![Message::text(Role::User, "hi".to_string())];
        let tools = vec![ToolSpec::new(
            "search".to_string(),
            "Search the index".to_string(),
        )];
        let body = provider().build_request_body(Some("Be terse."), &messages, Some(&tools), 512, 0.3);

        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            json!("Be terse.")
        );
        assert_eq!(body["generationConfig"]["maxOutputTokens"], json!(512));
        assert_eq!(
            body["tools"][0]["functionDeclarations"][0]["name"],
            json!("search")
        );

        let body = provider().build_request_body(None, &messages, None, 512, 0.3);
        assert!(body.get("tools").is_none());
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_parse_response_synthesizes_call_ids() {
        let payload = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "Looking that up."},
                        {"functionCall": {"name": "search", "args": {"query": "ttl"}}}
                    ]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 4, "totalTokenCount": 14}
        });

        let response = provider().parse_response(&payload).unwrap();
        assert_eq!(response.text(), "Looking that up.");
        assert_eq!(response.tool_calls.len(), 1);
        assert!(response.tool_calls[0].id.starts_with("call_"));
        assert_eq!(response.tool_calls[0].arguments["query"], json!("ttl"));
        assert_eq!(response.stop_reason.as_deref(), Some("STOP"));
        assert_eq!(response.usage.as_ref().unwrap().total_tokens, 14);
    }

    #[test]
    fn test_parse_response_without_parts_is_empty() {
        let payload = json!({
            "candidates": [{"finishReason": "SAFETY"}]
        });
        let response = provider().parse_response(&payload).unwrap();
        assert!(response.text_contents.is_empty());
        assert!(response.tool_calls.is_empty());
        assert_eq!(response.stop_reason.as_deref(), Some("SAFETY"));
    }

    #[test]
    fn test_parse_response_requires_candidates() {
        let err = provider().parse_response(&json!({})).unwrap_err();
        match err {
            ProviderError::InvalidResponse(msg) => assert!(msg.contains("candidates")),
            other => panic!("unexpected error: {}", other),
        }
    }
}
