//! Conversation persistence and the working-conversation service.
//!
//! [`ConversationStore`] owns the "current" conversation that the engine
//! appends to, and delegates durability to a [`ConversationStorage`]
//! implementation. The bundled [`JsonFileStorage`] writes one pretty-printed
//! `conversation_<id>.json` file per conversation, which keeps transcripts
//! greppable and diffable.
//!
//! # Example
//!
//! ```rust,no_run
//! use macrochat::conversation::{Message, Role};
//! use macrochat::conversation_store::ConversationStore;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = ConversationStore::with_json_storage("./conversations");
//! store.add_message(Message::text(Role::User, "hello")).await;
//! store.save_current().await?;
//! for summary in store.list().await? {
//!     println!("{} ({} messages)", summary.id, summary.message_count);
//! }
//! # Ok(())
//! # }
//! ```

use crate::macrochat::conversation::{ContentBlock, Conversation, Message, MessageContent, Role};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

const FILE_PREFIX: &str = "conversation_";
const FILE_SUFFIX: &str = ".json";

/// Errors surfaced by conversation persistence.
#[derive(Debug)]
pub enum StorageError {
    Io(String),
    Serialization(String),
    NotFound(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(msg) => write!(f, "I/O error: {}", msg),
            StorageError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            StorageError::NotFound(id) => write!(f, "Conversation not found: {}", id),
        }
    }
}

impl Error for StorageError {}

/// Listing row describing one persisted conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub message_count: usize,
    pub tools_used: Vec<String>,
}

impl ConversationSummary {
    pub fn of(conversation: &Conversation) -> Self {
        ConversationSummary {
            id: conversation.id().to_string(),
            created_at: conversation.created_at(),
            message_count: conversation.message_count(),
            tools_used: conversation.tools_used().to_vec(),
        }
    }
}

/// Durability backend for conversations.
#[async_trait]
pub trait ConversationStorage: Send + Sync {
    async fn save(&self, conversation: &Conversation) -> Result<(), StorageError>;
    async fn load(&self, id: &str) -> Result<Conversation, StorageError>;
    /// All persisted conversations, newest first.
    async fn list(&self) -> Result<Vec<ConversationSummary>, StorageError>;
    async fn delete(&self, id: &str) -> Result<(), StorageError>;
}

/// One JSON file per conversation under a flat directory.
pub struct JsonFileStorage {
    directory: PathBuf,
}

impl JsonFileStorage {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        JsonFileStorage {
            directory: directory.into(),
        }
    }

    fn file_path(&self, id: &str) -> PathBuf {
        self.directory
            .join(format!("{}{}{}", FILE_PREFIX, id, FILE_SUFFIX))
    }
}

#[async_trait]
impl ConversationStorage for JsonFileStorage {
    async fn save(&self, conversation: &Conversation) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| StorageError::Io(e.to_string()))?;

        let json = serde_json::to_string_pretty(conversation)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let path = self.file_path(conversation.id());
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| StorageError::Io(e.to_string()))?;

        log::debug!("saved conversation {} to {:?}", conversation.id(), path);
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Conversation, StorageError> {
        let path = self.file_path(id);
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(id.to_string()));
            }
            Err(e) => return Err(StorageError::Io(e.to_string())),
        };

        serde_json::from_str(&json).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    async fn list(&self) -> Result<Vec<ConversationSummary>, StorageError> {
        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            // A directory that does not exist yet simply has no conversations.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Io(e.to_string())),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::Io(e.to_string()))?
        {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with(FILE_PREFIX) || !name.ends_with(FILE_SUFFIX) {
                continue;
            }

            let json = match tokio::fs::read_to_string(entry.path()).await {
                Ok(json) => json,
                Err(e) => {
                    log::warn!("skipping unreadable conversation file {}: {}", name, e);
                    continue;
                }
            };
            match serde_json::from_str::<Conversation>(&json) {
                Ok(conversation) => summaries.push(ConversationSummary::of(&conversation)),
                Err(e) => {
                    log::warn!("skipping corrupt conversation file {}: {}", name, e);
                }
            }
        }

        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let path = self.file_path(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(id.to_string()))
            }
            Err(e) => Err(StorageError::Io(e.to_string())),
        }
    }
}

/// Service tracking the conversation the engine is currently appending to.
///
/// The working copy lives in memory; nothing touches the storage backend
/// until [`save_current`](Self::save_current) or
/// [`start_new`](Self::start_new) decides it should.
pub struct ConversationStore {
    storage: Arc<dyn ConversationStorage>,
    current: RwLock<Option<Conversation>>,
}

impl ConversationStore {
    pub fn new(storage: Arc<dyn ConversationStorage>) -> Self {
        ConversationStore {
            storage,
            current: RwLock::new(None),
        }
    }

    /// Convenience constructor backed by [`JsonFileStorage`].
    pub fn with_json_storage(directory: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(JsonFileStorage::new(directory)))
    }

    /// The working conversation, created on first access. Repeated calls
    /// return the same conversation until it is replaced.
    pub async fn get_current(&self) -> Conversation {
        let mut current = self.current.write().await;
        current.get_or_insert_with(Conversation::new).clone()
    }

    pub async fn current_id(&self) -> String {
        let mut current = self.current.write().await;
        current.get_or_insert_with(Conversation::new).id().to_string()
    }

    /// Append a message to the working conversation, creating it if needed.
    /// Returns the stored copy.
    pub async fn add_message(&self, message: Message) -> Message {
        let mut current = self.current.write().await;
        current
            .get_or_insert_with(Conversation::new)
            .add_message(message)
            .clone()
    }

    /// Record a tool request against the working conversation.
    pub async fn record_tool_use(&self, name: &str) {
        let mut current = self.current.write().await;
        current.get_or_insert_with(Conversation::new).record_tool_use(name);
    }

    /// Attach metadata to the working conversation.
    pub async fn set_metadata(&self, key: &str, value: serde_json::Value) {
        let mut current = self.current.write().await;
        current
            .get_or_insert_with(Conversation::new)
            .set_metadata(key, value);
    }

    /// Persist the outgoing conversation (when it has any messages) and
    /// start a fresh one. Returns the fresh conversation.
    pub async fn start_new(&self) -> Result<Conversation, StorageError> {
        let mut current = self.current.write().await;
        if let Some(outgoing) = current.take() {
            if !outgoing.is_empty() {
                self.storage.save(&outgoing).await?;
                log::info!("archived conversation {}", outgoing.id());
            }
        }
        let fresh = Conversation::new();
        *current = Some(fresh.clone());
        Ok(fresh)
    }

    /// Throw the working conversation away without persisting it and start
    /// a fresh one.
    pub async fn clear_current(&self) -> Conversation {
        let mut current = self.current.write().await;
        let fresh = Conversation::new();
        *current = Some(fresh.clone());
        fresh
    }

    /// Persist the working conversation under its id.
    pub async fn save_current(&self) -> Result<(), StorageError> {
        let snapshot = self.get_current().await;
        self.storage.save(&snapshot).await
    }

    /// Load a persisted conversation and make it the working one. The
    /// previous working conversation is discarded unsaved.
    pub async fn load(&self, id: &str) -> Result<Conversation, StorageError> {
        let conversation = self.storage.load(id).await?;
        let mut current = self.current.write().await;
        *current = Some(conversation.clone());
        Ok(conversation)
    }

    pub async fn list(&self) -> Result<Vec<ConversationSummary>, StorageError> {
        self.storage.list().await
    }

    /// Delete a persisted conversation. The working copy is unaffected even
    /// when it shares the id.
    pub async fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.storage.delete(id).await
    }

    /// Render the working conversation as a plain text transcript.
    pub async fn export_current(&self) -> String {
        let snapshot = self.get_current().await;
        Self::export_to_text(&snapshot)
    }

    /// Render any conversation as a numbered plain text transcript.
    pub fn export_to_text(conversation: &Conversation) -> String {
        let mut out = String::new();
        out.push_str(&format!("Conversation {}\n", conversation.id()));
        out.push_str(&format!(
            "Created: {}\n",
            conversation.created_at().format("%Y-%m-%d %H:%M:%S")
        ));
        if !conversation.tools_used().is_empty() {
            out.push_str(&format!(
                "Tools used: {}\n",
                conversation.tools_used().join(", ")
            ));
        }
        out.push('\n');

        for (index, message) in conversation.messages().iter().enumerate() {
            let role = match message.role {
                Role::User => "USER",
                Role::Assistant => "ASSISTANT",
            };
            out.push_str(&format!(
                "[{}] {} ({}):\n{}\n\n",
                index + 1,
                role,
                message.timestamp.format("%Y-%m-%d %H:%M:%S"),
                render_body(&message.content)
            ));
        }
        out
    }
}

/// Flatten message content for the transcript, with bracketed placeholders
/// for tool activity.
fn render_body(content: &MessageContent) -> String {
    match content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::Blocks(blocks) => {
            let lines: Vec<String> = blocks
                .iter()
                .map(|block| match block {
                    ContentBlock::Text { text } => text.clone(),
                    ContentBlock::ToolUse { name, .. } => format!("[tool call: {}]", name),
                    ContentBlock::ToolResult {
                        content, is_error, ..
                    } => {
                        let rendered = match content {
                            serde_json::Value::String(text) => text.clone(),
                            other => other.to_string(),
                        };
                        if *is_error {
                            format!("[tool error: {}]", rendered)
                        } else {
                            format!("[tool result: {}]", rendered)
                        }
                    }
                })
                .collect();
            lines.join("\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory storage double recording every save.
    struct MockStorage {
        saved: Mutex<HashMap<String, Conversation>>,
    }

    impl MockStorage {
        fn new() -> Self {
            MockStorage {
                saved: Mutex::new(HashMap::new()),
            }
        }

        fn saved_count(&self) -> usize {
            self.saved.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ConversationStorage for MockStorage {
        async fn save(&self, conversation: &Conversation) -> Result<(), StorageError> {
            self.saved
                .lock()
                .unwrap()
                .insert(conversation.id().to_string(), conversation.clone());
            Ok(())
        }

        async fn load(&self, id: &str) -> Result<Conversation, StorageError> {
            self.saved
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(id.to_string()))
        }

        async fn list(&self) -> Result<Vec<ConversationSummary>, StorageError> {
            let mut summaries: Vec<ConversationSummary> = self
                .saved
                .lock()
                .unwrap()
                .values()
                .map(ConversationSummary::of)
                .collect();
            summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(summaries)
        }

        async fn delete(&self, id: &str) -> Result<(), StorageError> {
            self.saved
                .lock()
                .unwrap()
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| StorageError::NotFound(id.to_string()))
        }
    }

    fn store_with_mock() -> (ConversationStore, Arc<MockStorage>) {
        let storage = Arc::new(MockStorage::new());
        (ConversationStore::new(storage.clone()), storage)
    }

    #[tokio::test]
    async fn test_get_current_is_idempotent() {
        let (store, _) = store_with_mock();
        let first = store.get_current().await;
        let second = store.get_current().await;
        assert_eq!(first.id(), second.id());
    }

    #[tokio::test]
    async fn test_start_new_persists_only_nonempty() {
        let (store, storage) = store_with_mock();

        // Empty working conversation: nothing to archive.
        let fresh = store.start_new().await.unwrap();
        assert_eq!(storage.saved_count(), 0);

        store
            .add_message(Message::text(Role::User, "hello"))
            .await;
        let replaced = store.start_new().await.unwrap();
        assert_eq!(storage.saved_count(), 1);
        assert_ne!(fresh.id(), replaced.id());
        assert!(store.get_current().await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_current_discards_without_saving() {
        let (store, storage) = store_with_mock();
        store
            .add_message(Message::text(Role::User, "throwaway"))
            .await;
        let old_id = store.current_id().await;

        let fresh = store.clear_current().await;
        assert_ne!(fresh.id(), old_id);
        assert_eq!(storage.saved_count(), 0);
    }

    #[tokio::test]
    async fn test_load_replaces_working_conversation() {
        let (store, _) = store_with_mock();
        store
            .add_message(Message::text(Role::User, "keep me"))
            .await;
        store.save_current().await.unwrap();
        let saved_id = store.current_id().await;

        store.clear_current().await;
        assert_ne!(store.current_id().await, saved_id);

        let loaded = store.load(&saved_id).await.unwrap();
        assert_eq!(loaded.id(), saved_id);
        assert_eq!(store.current_id().await, saved_id);
        assert_eq!(loaded.message_count(), 1);
    }

    #[tokio::test]
    async fn test_load_unknown_id_fails() {
        let (store, _) = store_with_mock();
        match store.load("missing").await {
            Err(StorageError::NotFound(id)) => assert_eq!(id, "missing"),
            _ => panic!("expected NotFound"),
        }
    }

    #[tokio::test]
    async fn test_export_transcript_shape() {
        let (store, _) = store_with_mock();
        store
            .add_message(Message::text(Role::User, "How is GDP trending?"))
            .await;
        store
            .add_message(Message::blocks(
                Role::Assistant,
                vec![
                    ContentBlock::text("Let me look."),
                    ContentBlock::tool_use("t1", "get_gdp", json!({"years": 2})),
                ],
            ))
            .await;
        store.record_tool_use("get_gdp").await;

        let transcript = store.export_current().await;
        assert!(transcript.contains("Tools used: get_gdp"));
        assert!(transcript.contains("[1] USER ("));
        assert!(transcript.contains("How is GDP trending?"));
        assert!(transcript.contains("[2] ASSISTANT ("));
        assert!(transcript.contains("[tool call: get_gdp]"));
    }

    #[tokio::test]
    async fn test_export_renders_tool_errors() {
        let conversation = {
            let mut c = Conversation::new();
            c.add_message(Message::blocks(
                Role::User,
                vec![ContentBlock::ToolResult {
                    tool_use_id: "t1".to_string(),
                    content: json!("Error: index offline"),
                    is_error: true,
                    error_message: Some("index offline".to_string()),
                }],
            ));
            c
        };
        let transcript = ConversationStore::export_to_text(&conversation);
        assert!(transcript.contains("[tool error: Error: index offline]"));
    }

    #[tokio::test]
    async fn test_summary_reports_counts_and_tools() {
        let (store, storage) = store_with_mock();
        store
            .add_message(Message::text(Role::User, "what is a ttl cache?"))
            .await;
        store
            .add_message(Message::text(Role::Assistant, "an expiring map"))
            .await;
        store.record_tool_use("fetch_series").await;
        store.save_current().await.unwrap();

        let summaries = storage.list().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].message_count, 2);
        assert_eq!(summaries[0].tools_used, ["fetch_series".to_string()]);
    }
}
