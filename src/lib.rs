//! # macrochat
//!
//! macrochat is a Rust engine for tool-calling conversations: it orchestrates
//! the full round trip between a user query, a cloud LLM, and a remote tool
//! server, while keeping the whole exchange in a provider-neutral,
//! persistable conversation format.
//!
//! The crate provides carefully layered abstractions for:
//!
//! * **Query Orchestration**: [`ChatEngine`] drives one query round at a
//!   time through first response, sequential tool execution, and a tool-free
//!   follow-up, so a single query never loops
//! * **Provider Flexibility**: the [`provider::LLMProvider`] trait is
//!   implemented for Anthropic Claude, OpenAI, and Google Gemini, each
//!   speaking its native wire format including tool calls
//! * **Tool Access**: [`tool_gateway::ToolGateway`] manages the connection
//!   to a JSON-over-HTTP tool server, caches its catalogs, and contains tool
//!   failures so one broken tool never kills a round
//! * **Stateful Conversations**: [`conversation_store::ConversationStore`]
//!   tracks the working conversation and archives finished ones as
//!   one-file-per-conversation JSON
//! * **Catalog Caching**: [`resource_cache::ResourceCache`] is a generic
//!   TTL map used for tool and resource catalogs, usable on its own
//!
//! ## Core Concepts
//!
//! ### One Round per Query
//!
//! A query round has at most two provider calls. The first call advertises
//! the tool catalog; if the model requests tools, the engine executes them
//! in the model's emission order, appends the results, and makes a second
//! call with tools withheld. The text of that second call (or of the first,
//! when no tools were requested) is the answer. Tool failures are folded
//! into error-flagged results and handed back to the model instead of
//! aborting the round.
//!
//! ### Provider-Neutral History
//!
//! Conversations store assistant tool requests and their results as typed
//! [`conversation::ContentBlock`]s rather than vendor JSON. Each adapter
//! renders the same history into its own wire format, which is what makes
//! [`ChatEngine::switch_provider`](engine::ChatEngine::switch_provider)
//! possible mid-conversation:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use macrochat::providers::{create_provider, ProviderKind};
//!
//! # async fn run(engine: macrochat::ChatEngine) -> Result<(), Box<dyn std::error::Error>> {
//! let gemini = create_provider(ProviderKind::Gemini, &std::env::var("GEMINI_API_KEY")?, None);
//! engine.switch_provider(gemini).await;
//! let info = engine.provider_info().await;
//! println!("now talking to {} ({})", info.provider, info.model_id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Getting Started
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
//!
//!     let engine = ChatEngine::new(provider, gateway, store);
//!     let answer = engine.process_query("How did GDP trend last year?").await?;
//!     println!("{}", answer);
//!
//!     engine.store().save_current().await?;
//!     Ok(())
//! }
//! ```
//!
//! Continue exploring the modules re-exported from the crate root for the
//! individual building blocks.

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// The helper is intentionally lightweight so that applications embedding
/// macrochat can opt in to simple `RUST_LOG` driven diagnostics without
/// having to choose a specific logging backend upfront.
///
/// ```rust
/// macrochat::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

// Import the top-level `macrochat` module.
pub mod macrochat;

// Re-exporting key items for easier external access.
pub use crate::macrochat::config;
pub use crate::macrochat::config::EngineConfig;
pub use crate::macrochat::conversation;
pub use crate::macrochat::conversation::{
    ContentBlock, Conversation, Message, MessageContent, Role,
};
pub use crate::macrochat::conversation_store;
pub use crate::macrochat::conversation_store::{
    ConversationStorage, ConversationStore, ConversationSummary, JsonFileStorage, StorageError,
};
pub use crate::macrochat::engine;
pub use crate::macrochat::engine::{ChatEngine, EngineError, ProviderInfo, RoundPhase};
pub use crate::macrochat::provider;
pub use crate::macrochat::provider::{LLMProvider, LLMResponse, ProviderError, TokenUsage};
pub use crate::macrochat::providers;
pub use crate::macrochat::resource_cache;
pub use crate::macrochat::resource_cache::{CacheStats, ResourceCache};
pub use crate::macrochat::tool_gateway;
pub use crate::macrochat::tool_gateway::ToolGateway;
pub use crate::macrochat::tool_protocol;
pub use crate::macrochat::tool_protocol::{
    GatewayError, ResourceDescriptor, ToolCall, ToolCallResult, ToolSpec, ToolTransport,
};
pub use crate::macrochat::tool_transports;
pub use crate::macrochat::tool_transports::HttpToolTransport;
