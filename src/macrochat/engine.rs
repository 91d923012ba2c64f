//! Query orchestration across provider, gateway, and conversation store.
//!
//! [`ChatEngine`] runs one query round at a time. A round starts by sending
//! the history (plus the tool catalog, when a tool server is connected) to
//! the provider. If the model answers with plain text the round is done. If
//! it requests tools, the engine executes them sequentially in the order the
//! model emitted them, appends every outcome to the conversation, and asks
//! the provider for a follow-up answer with tools withheld, so each query
//! triggers at most one execution pass.
//!
//! Tool failures never abort a round: the gateway folds them into
//! error-flagged results and the model gets to read the error text.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use macrochat::conversation_store::ConversationStore;
//! use macrochat::engine::ChatEngine;
//! use macrochat::providers::claude::{ClaudeProvider, Model};
//! use macrochat::tool_gateway::ToolGateway;
//! use macrochat::tool_transports::HttpToolTransport;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     macrochat::init_logger();
//!
//!     let provider = Arc::new(ClaudeProvider::new_with_model_enum(
//!         &std::env::var("ANTHROPIC_API_KEY")?,
//!         Model::Claude37Sonnet,
//!     ));
//!     let transport = Arc::new(HttpToolTransport::new("http://localhost:8080/mcp".to_string()));
//!     let gateway = Arc::new(ToolGateway::new(transport));
//!     let store = Arc::new(ConversationStore::with_json_storage("./conversations"));
//!
//!     gateway.connect().await?;
//!     let engine = ChatEngine::new(provider, gateway, store);
//!     let answer = engine.process_query("What did Q3 revenue look like?").await?;
//!     println!("{}", answer);
//!     Ok(())
//! }
//! ```

use crate::macrochat::config::EngineConfig;
use crate::macrochat::conversation::{ContentBlock, Message, Role};
use crate::macrochat::conversation_store::ConversationStore;
use crate::macrochat::provider::{LLMProvider, LLMResponse, ProviderError, TokenUsage};
use crate::macrochat::tool_gateway::ToolGateway;
use crate::macrochat::tool_protocol::{GatewayError, ToolCallResult};
use serde::Serialize;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Where a query round currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// The first provider call is in flight.
    AwaitingFirstResponse,
    /// The model requested tools; they are being executed in order.
    ExecutingTools,
    /// Tool results are in the history; the tool-free follow-up call is in
    /// flight.
    AwaitingFollowup,
    /// The round produced its final text.
    Done,
}

/// Errors that abort a query round.
#[derive(Debug)]
pub enum EngineError {
    Gateway(GatewayError),
    Provider(ProviderError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Gateway(e) => write!(f, "Tool gateway error: {}", e),
            EngineError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EngineError::Gateway(e) => Some(e),
            EngineError::Provider(e) => Some(e),
        }
    }
}

impl From<GatewayError> for EngineError {
    fn from(e: GatewayError) -> Self {
        EngineError::Gateway(e)
    }
}

impl From<ProviderError> for EngineError {
    fn from(e: ProviderError) -> Self {
        EngineError::Provider(e)
    }
}

/// Snapshot of the active provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderInfo {
    pub provider: String,
    pub model_id: String,
    pub supports_tools: bool,
}

/// The orchestrator tying one provider, one tool gateway, and one
/// conversation store together.
pub struct ChatEngine {
    provider: RwLock<Arc<dyn LLMProvider>>,
    gateway: Arc<ToolGateway>,
    store: Arc<ConversationStore>,
    config: EngineConfig,
}

/// Reassemble a model response as conversation blocks: text segments first,
/// then the tool invocations, both in emission order.
fn assistant_blocks(response: &LLMResponse) -> Vec<ContentBlock> {
    let mut blocks: Vec<ContentBlock> = response
        .text_contents
        .iter()
        .map(|segment| ContentBlock::text(segment.text.clone()))
        .collect();
    for call in &response.tool_calls {
        blocks.push(ContentBlock::tool_use(
            call.id.clone(),
            call.name.clone(),
            call.arguments.clone(),
        ));
    }
    blocks
}

/// Convert one execution outcome into its conversation block. Failures keep
/// the flag and carry `Error: <message>` as readable content for the model.
fn result_block(result: &ToolCallResult) -> ContentBlock {
    if result.failed() {
        let message = result
            .error_message
            .clone()
            .unwrap_or_else(|| "unknown error".to_string());
        ContentBlock::ToolResult {
            tool_use_id: result.tool_call_id.clone(),
            content: serde_json::Value::String(format!("Error: {}", message)),
            is_error: true,
            error_message: Some(message),
        }
    } else {
        ContentBlock::ToolResult {
            tool_use_id: result.tool_call_id.clone(),
            content: result.content.clone(),
            is_error: false,
            error_message: None,
        }
    }
}

impl ChatEngine {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        gateway: Arc<ToolGateway>,
        store: Arc<ConversationStore>,
    ) -> Self {
        Self::new_with_config(provider, gateway, store, EngineConfig::default())
    }

    pub fn new_with_config(
        provider: Arc<dyn LLMProvider>,
        gateway: Arc<ToolGateway>,
        store: Arc<ConversationStore>,
        config: EngineConfig,
    ) -> Self {
        ChatEngine {
            provider: RwLock::new(provider),
            gateway,
            store,
            config,
        }
    }

    /// Run one query round with the configured request parameters.
    pub async fn process_query(&self, query: &str) -> Result<String, EngineError> {
        self.process_query_with(query, self.config.max_tokens, self.config.temperature)
            .await
    }

    /// Run one query round with explicit request parameters.
    ///
    /// Returns the final assistant text. The conversation picks up the user
    /// query, the assistant turns, and any tool results along the way, so
    /// the full exchange is inspectable afterwards through the store.
    pub async fn process_query_with(
        &self,
        query: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, EngineError> {
        // The provider is pinned for the whole round; a concurrent switch
        // only affects later queries.
        let provider = self.provider.read().await.clone();
        let system_prompt = self.config.system_prompt.clone();
        let system_prompt = system_prompt.as_deref();

        self.store
            .add_message(Message::text(Role::User, query))
            .await;

        let tools = if provider.supports_tools() && self.gateway.is_connected().await {
            Some(self.gateway.list_tools(true).await?)
        } else {
            None
        };

        let mut phase = RoundPhase::AwaitingFirstResponse;
        log::debug!("query round started, phase {:?}", phase);

        let history = self.store.get_current().await;
        let response = provider
            .process_messages(
                system_prompt,
                history.messages(),
                tools.as_deref(),
                max_tokens,
                temperature,
            )
            .await?;

        if !response.has_tool_calls() {
            let text = response.text();
            self.store
                .add_message(Message::text(Role::Assistant, text.clone()))
                .await;
            phase = RoundPhase::Done;
            log::debug!("query round reached {:?} without tool use", phase);
            return Ok(text);
        }

        phase = RoundPhase::ExecutingTools;
        log::debug!(
            "phase {:?}: {} tool calls requested",
            phase,
            response.tool_calls.len()
        );

        self.store
            .add_message(Message::blocks(Role::Assistant, assistant_blocks(&response)))
            .await;

        let mut result_blocks = Vec::with_capacity(response.tool_calls.len());
        for call in &response.tool_calls {
            self.store.record_tool_use(&call.name).await;
            let result = self.gateway.call_tool(call).await;
            if result.failed() {
                log::warn!(
                    "tool '{}' failed for call {}, passing the error back to the model",
                    call.name,
                    call.id
                );
            }
            result_blocks.push(result_block(&result));
        }
        self.store
            .add_message(Message::blocks(Role::User, result_blocks))
            .await;

        phase = RoundPhase::AwaitingFollowup;
        log::debug!("phase {:?}: requesting tool-free follow-up", phase);

        let history = self.store.get_current().await;
        let followup = provider
            .process_messages(system_prompt, history.messages(), None, max_tokens, temperature)
            .await?;

        let text = followup.text();
        if followup.has_tool_calls() {
            // One execution pass per query. Record what the model wanted,
            // but do not run it.
            log::warn!(
                "follow-up requested {} more tool calls; recording them unexecuted",
                followup.tool_calls.len()
            );
            for call in &followup.tool_calls {
                self.store.record_tool_use(&call.name).await;
            }
            self.store
                .add_message(Message::blocks(Role::Assistant, assistant_blocks(&followup)))
                .await;
        } else {
            self.store
                .add_message(Message::text(Role::Assistant, text.clone()))
                .await;
        }

        phase = RoundPhase::Done;
        log::debug!("query round reached {:?}", phase);
        Ok(text)
    }

    /// Swap the active provider. The conversation history is provider
    /// neutral, so the next query replays it against the new backend.
    pub async fn switch_provider(&self, provider: Arc<dyn LLMProvider>) {
        log::info!(
            "switching provider to {} ({})",
            provider.provider_name(),
            provider.model_id()
        );
        *self.provider.write().await = provider;
    }

    pub async fn provider_info(&self) -> ProviderInfo {
        let provider = self.provider.read().await;
        ProviderInfo {
            provider: provider.provider_name().to_string(),
            model_id: provider.model_id().to_string(),
            supports_tools: provider.supports_tools(),
        }
    }

    /// Token usage of the most recent provider call, when the adapter
    /// tracks it.
    pub async fn last_usage(&self) -> Option<TokenUsage> {
        self.provider.read().await.last_usage()
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn gateway(&self) -> &Arc<ToolGateway> {
        &self.gateway
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macrochat::provider::TextContent;
    use crate::macrochat::tool_protocol::ToolCall;
    use chrono::Utc;
    use serde_json::json;

    fn response_with(texts: &[&str], calls: Vec<ToolCall>) -> LLMResponse {
        LLMResponse {
            id: "resp".to_string(),
            text_contents: texts
                .iter()
                .enumerate()
                .map(|(index, text)| TextContent {
                    text: text.to_string(),
                    index,
                })
                .collect(),
            tool_calls: calls,
            provider: "test".to_string(),
            model: "test-model".to_string(),
            stop_reason: None,
            usage: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_assistant_blocks_keep_text_before_calls() {
        let response = response_with(
            &["Thinking.", "Calling now."],
            vec![
                ToolCall::new("t1", "alpha", json!({})),
                ToolCall::new("t2", "beta", json!({})),
            ],
        );
        let blocks = assistant_blocks(&response);

        assert_eq!(blocks.len(), 4);
        assert!(matches!(&blocks[0], ContentBlock::Text { text } if text == "Thinking."));
        assert!(matches!(&blocks[1], ContentBlock::Text { text } if text == "Calling now."));
        assert!(matches!(&blocks[2], ContentBlock::ToolUse { name, .. } if name == "alpha"));
        assert!(matches!(&blocks[3], ContentBlock::ToolUse { name, .. } if name == "beta"));
    }

    #[test]
    fn test_result_block_success_keeps_content() {
        let call = ToolCall::new("t1", "search", json!({"q": "x"}));
        let result = ToolCallResult::success(&call, json!("42 results"));
        let block = result_block(&result);

        match block {
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
                error_message,
            } => {
                assert_eq!(tool_use_id, call.id);
                assert_eq!(content, json!("42 results"));
                assert!(!is_error);
                assert!(error_message.is_none());
            }
            other => panic!("unexpected block: {:?}", other),
        }
    }

    #[test]
    fn test_result_block_failure_carries_error_text() {
        let call = ToolCall::new("t1", "search", json!({}));
        let result = ToolCallResult::failure(&call, "index offline");
        let block = result_block(&result);

        match block {
            ContentBlock::ToolResult {
                content,
                is_error,
                error_message,
                ..
            } => {
                assert_eq!(content, json!("Error: index offline"));
                assert!(is_error);
                assert_eq!(error_message.as_deref(), Some("index offline"));
            }
            other => panic!("unexpected block: {:?}", other),
        }
    }
}
