//! Conversation domain model.
//!
//! A [`Conversation`] is an append-only sequence of [`Message`]s plus the
//! metadata accumulated while answering queries (which tools were used, when
//! the dialog started). Messages carry either plain text or an ordered list
//! of [`ContentBlock`]s so that assistant tool requests and their results can
//! be stored in provider-neutral form and replayed to any backend.
//!
//! # Example
//!
//! ```rust
//! use macrochat::conversation::{Conversation, ContentBlock, Message, Role};
//!
//! let mut conversation = Conversation::new();
//! conversation.add_message(Message::text(Role::User, "How is GDP trending?"));
//! conversation.add_message(Message::blocks(
//!     Role::Assistant,
//!     vec![ContentBlock::text("Let me fetch the latest series.")],
//! ));
//!
//! assert_eq!(conversation.messages().len(), 2);
//! assert!(conversation.tools_used().is_empty());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Author of a message. System prompts are not messages; they travel
/// alongside the history and are injected per provider convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One typed block inside a structured message.
///
/// The serialized shape follows the storage format of the conversation
/// files: `tool_use` arguments live under the `input` key and `tool_result`
/// links back to its request through `tool_use_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain prose emitted by the user or the model.
    Text { text: String },
    /// A request from the model to run a named tool with JSON arguments.
    ToolUse {
        id: String,
        name: String,
        #[serde(rename = "input")]
        arguments: serde_json::Value,
    },
    /// The outcome of one tool invocation, keyed by the id of the
    /// `ToolUse` block that requested it earlier in the same conversation.
    ToolResult {
        tool_use_id: String,
        content: serde_json::Value,
        #[serde(default)]
        is_error: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
}

impl ContentBlock {
    /// Build a text block.
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    /// Build a tool-use block.
    pub fn tool_use(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Message payload: plain text or an ordered, non-empty sequence of blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    /// Render the textual portion of the content. Block content joins its
    /// text blocks with newlines; tool blocks contribute nothing.
    pub fn display_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => {
                let texts: Vec<&str> = blocks
                    .iter()
                    .filter_map(|block| match block {
                        ContentBlock::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();
                texts.join("\n")
            }
        }
    }
}

/// A single immutable turn in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a plain text message stamped with the current time.
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Message {
            role,
            content: MessageContent::Text(content.into()),
            timestamp: Utc::now(),
        }
    }

    /// Create a structured message from ordered content blocks.
    pub fn blocks(role: Role, blocks: Vec<ContentBlock>) -> Self {
        Message {
            role,
            content: MessageContent::Blocks(blocks),
            timestamp: Utc::now(),
        }
    }

    /// True when the message carries plain text rather than blocks.
    pub fn is_text_only(&self) -> bool {
        matches!(self.content, MessageContent::Text(_))
    }

    /// True when any block is a tool-use request.
    pub fn has_tool_calls(&self) -> bool {
        match &self.content {
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .any(|block| matches!(block, ContentBlock::ToolUse { .. })),
            MessageContent::Text(_) => false,
        }
    }

    /// True when any block is a tool result.
    pub fn has_tool_results(&self) -> bool {
        match &self.content {
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .any(|block| matches!(block, ContentBlock::ToolResult { .. })),
            MessageContent::Text(_) => false,
        }
    }
}

/// An append-only dialog between one user and one assistant.
///
/// Messages can only be added, never edited or removed; the accessor hands
/// out a shared slice so the compiler enforces the invariant for callers.
/// `tools_used` grows monotonically: a tool lands in the list the first time
/// the model requests it, whether or not the invocation succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    id: String,
    created_at: DateTime<Utc>,
    messages: Vec<Message>,
    #[serde(default)]
    tools_used: Vec<String>,
    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
}

impl Conversation {
    /// Create an empty conversation with a fresh UUID.
    pub fn new() -> Self {
        Conversation {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            messages: Vec::new(),
            tools_used: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Rebuild a conversation from previously persisted parts.
    pub fn from_parts(
        id: String,
        created_at: DateTime<Utc>,
        messages: Vec<Message>,
        tools_used: Vec<String>,
    ) -> Self {
        Conversation {
            id,
            created_at,
            messages,
            tools_used,
            metadata: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// All messages, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Names of every tool the model has requested so far, in first-use order.
    pub fn tools_used(&self) -> &[String] {
        &self.tools_used
    }

    pub fn metadata(&self) -> &HashMap<String, serde_json::Value> {
        &self.metadata
    }

    /// Append a message and return a reference to the stored copy.
    pub fn add_message(&mut self, message: Message) -> &Message {
        self.messages.push(message);
        // Unwrap is safe right after a push.
        self.messages.last().unwrap()
    }

    /// Record that a tool was requested. Duplicates are ignored so the list
    /// stays an insertion-ordered set.
    pub fn record_tool_use(&mut self, name: &str) {
        if !self.tools_used.iter().any(|used| used == name) {
            self.tools_used.push(name.to_string());
        }
    }

    /// Attach an arbitrary metadata value.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
