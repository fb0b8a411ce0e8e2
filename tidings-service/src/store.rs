//! Chat persistence behind an injectable store.
//!
//! The API and the chat service only ever see `Arc<dyn ChatStore>`. SQLite is
//! the default backend; the in-memory store stands in when SQLite cannot be
//! opened or when configured explicitly.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{StorageConfig, StoreBackend};
use crate::db::Database;
use crate::db::models::{Chat, ChatTranscript, NewMessage, StoredMessage};
use crate::error::{ServiceError, ServiceResult, format_error_chain};

pub mod memory;

pub use memory::MemoryStore;

/// Longest chat title kept, in characters
pub const MAX_TITLE_CHARS: usize = 100;

/// Per-user chat and message storage
pub trait ChatStore: Send + Sync {
    fn backend(&self) -> StoreBackend;

    fn create_chat(&self, user_id: &str, title: &str) -> ServiceResult<Chat>;

    /// Chats owned by the user, most recently updated first
    fn list_chats(&self, user_id: &str) -> ServiceResult<Vec<Chat>>;

    fn load_chat(&self, user_id: &str, chat_id: &str) -> ServiceResult<ChatTranscript>;

    /// Delete a chat and all of its messages
    fn delete_chat(&self, user_id: &str, chat_id: &str) -> ServiceResult<()>;

    /// Append a message and bump the chat's `updated_at`
    fn save_message(
        &self,
        user_id: &str,
        chat_id: &str,
        message: NewMessage,
    ) -> ServiceResult<StoredMessage>;

    fn list_messages(&self, user_id: &str, chat_id: &str) -> ServiceResult<Vec<StoredMessage>> {
        Ok(self.load_chat(user_id, chat_id)?.messages)
    }
}

/// Open the configured store, falling back to memory when SQLite is unusable
pub fn open_store(config: &StorageConfig) -> Arc<dyn ChatStore> {
    match config.backend {
        StoreBackend::Memory => {
            warn!("Using in-memory chat store; chats will not survive a restart");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Sqlite => {
            let path = config.data_dir.join("tidings.db");
            match Database::open(&path) {
                Ok(db) => {
                    info!(path = %path.display(), "Opened SQLite chat store");
                    Arc::new(db)
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %format_error_chain(&e),
                        "SQLite chat store unavailable, falling back to in-memory store"
                    );
                    Arc::new(MemoryStore::new())
                }
            }
        }
    }
}

/// Require a non-blank title and cap its length
pub fn validate_title(title: Option<&str>) -> ServiceResult<String> {
    let title = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ServiceError::MissingField { field: "title" })?;
    Ok(title.chars().take(MAX_TITLE_CHARS).collect())
}

/// Ownership check shared by the store implementations
pub(crate) fn ensure_owner(chat: &Chat, user_id: &str) -> ServiceResult<()> {
    if chat.user_id == user_id {
        Ok(())
    } else {
        Err(ServiceError::ChatForbidden {
            chat_id: chat.id.clone(),
        })
    }
}

#[cfg(test)]
pub(crate) mod contract {
    //! Behavior every `ChatStore` must share; run against each backend.

    use super::*;
    use crate::models::{Role, ToolInvocation, ToolName};

    fn message(role: Role, content: &str) -> NewMessage {
        NewMessage {
            role,
            content: content.to_string(),
            tool_invocations: Vec::new(),
        }
    }

    pub fn chats_are_scoped_to_their_owner(store: &dyn ChatStore) {
        let chat = store.create_chat("alice", "Weather chat").unwrap();
        assert_eq!(chat.user_id, "alice");

        assert_eq!(store.list_chats("alice").unwrap().len(), 1);
        assert!(store.list_chats("bob").unwrap().is_empty());

        assert!(matches!(
            store.load_chat("bob", &chat.id),
            Err(ServiceError::ChatForbidden { .. })
        ));
        assert!(matches!(
            store.save_message("bob", &chat.id, message(Role::User, "hi")),
            Err(ServiceError::ChatForbidden { .. })
        ));
        assert!(matches!(
            store.delete_chat("bob", &chat.id),
            Err(ServiceError::ChatForbidden { .. })
        ));
        assert!(matches!(
            store.load_chat("alice", "missing"),
            Err(ServiceError::ChatNotFound { .. })
        ));
    }

    pub fn messages_keep_order_and_tool_invocations(store: &dyn ChatStore) {
        let chat = store.create_chat("alice", "Quotes").unwrap();
        store
            .save_message("alice", &chat.id, message(Role::User, "AAPL stock price"))
            .unwrap();

        let mut reply = message(Role::Assistant, "Here's the stock information for AAPL:");
        reply.tool_invocations.push(ToolInvocation {
            tool_name: ToolName::GetStockPrice,
            args: serde_json::Map::new(),
            result: serde_json::json!({"symbol": "AAPL", "price": "$190.64"}),
        });
        let saved = store.save_message("alice", &chat.id, reply).unwrap();
        assert_eq!(saved.chat_id, chat.id);

        let transcript = store.load_chat("alice", &chat.id).unwrap();
        assert_eq!(transcript.messages.len(), 2);
        assert_eq!(transcript.messages[0].role, Role::User);
        assert_eq!(transcript.messages[1].tool_invocations.len(), 1);
        assert!(transcript.chat.updated_at >= chat.updated_at);
        assert_eq!(
            store.list_messages("alice", &chat.id).unwrap(),
            transcript.messages
        );
    }

    pub fn recently_updated_chats_list_first(store: &dyn ChatStore) {
        let older = store.create_chat("carol", "Older").unwrap();
        let newer = store.create_chat("carol", "Newer").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store
            .save_message("carol", &older.id, message(Role::User, "bump"))
            .unwrap();

        let ids: Vec<String> = store
            .list_chats("carol")
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![older.id, newer.id]);
    }

    pub fn delete_removes_messages(store: &dyn ChatStore) {
        let chat = store.create_chat("dave", "Doomed").unwrap();
        store
            .save_message("dave", &chat.id, message(Role::User, "hello"))
            .unwrap();
        store.delete_chat("dave", &chat.id).unwrap();

        assert!(matches!(
            store.list_messages("dave", &chat.id),
            Err(ServiceError::ChatNotFound { .. })
        ));
        assert!(store.list_chats("dave").unwrap().is_empty());
    }

    pub fn run_all(store: &dyn ChatStore) {
        chats_are_scoped_to_their_owner(store);
        messages_keep_order_and_tool_invocations(store);
        recently_updated_chats_list_first(store);
        delete_removes_messages(store);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_is_required() {
        assert!(matches!(
            validate_title(None),
            Err(ServiceError::MissingField { field: "title" })
        ));
        assert!(validate_title(Some("   ")).is_err());
    }

    #[test]
    fn test_title_is_truncated() {
        let long = "x".repeat(250);
        assert_eq!(
            validate_title(Some(&long)).unwrap().chars().count(),
            MAX_TITLE_CHARS
        );
    }

    #[test]
    fn test_memory_backend_when_configured() {
        let store = open_store(&StorageConfig {
            backend: StoreBackend::Memory,
            ..StorageConfig::default()
        });
        assert_eq!(store.backend(), StoreBackend::Memory);
    }

    #[test]
    fn test_falls_back_to_memory_when_sqlite_cannot_open() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the data directory should be
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let store = open_store(&StorageConfig {
            data_dir: blocker,
            backend: StoreBackend::Sqlite,
        });
        assert_eq!(store.backend(), StoreBackend::Memory);
    }

    #[test]
    fn test_sqlite_backend_opens_in_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&StorageConfig {
            data_dir: dir.path().to_path_buf(),
            backend: StoreBackend::Sqlite,
        });
        assert_eq!(store.backend(), StoreBackend::Sqlite);
        assert!(dir.path().join("tidings.db").exists());
    }
}
