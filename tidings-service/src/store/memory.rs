//! Process-local chat store.

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::{ChatStore, ensure_owner};
use crate::config::StoreBackend;
use crate::db::models::{Chat, ChatTranscript, NewMessage, StoredMessage};
use crate::error::{ServiceError, ServiceResult};

/// Chats and their messages held in concurrent maps; lost on restart
#[derive(Default)]
pub struct MemoryStore {
    chats: DashMap<String, Chat>,
    /// chat id → messages in insertion order
    messages: DashMap<String, Vec<StoredMessage>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn owned_chat(&self, user_id: &str, chat_id: &str) -> ServiceResult<Chat> {
        let chat = self
            .chats
            .get(chat_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::ChatNotFound {
                chat_id: chat_id.to_string(),
            })?;
        ensure_owner(&chat, user_id)?;
        Ok(chat)
    }
}

impl ChatStore for MemoryStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Memory
    }

    fn create_chat(&self, user_id: &str, title: &str) -> ServiceResult<Chat> {
        let now = Utc::now();
        let chat = Chat {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.messages.insert(chat.id.clone(), Vec::new());
        self.chats.insert(chat.id.clone(), chat.clone());
        Ok(chat)
    }

    fn list_chats(&self, user_id: &str) -> ServiceResult<Vec<Chat>> {
        let mut chats: Vec<Chat> = self
            .chats
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        chats.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(chats)
    }

    fn load_chat(&self, user_id: &str, chat_id: &str) -> ServiceResult<ChatTranscript> {
        let chat = self.owned_chat(user_id, chat_id)?;
        let messages = self
            .messages
            .get(chat_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        Ok(ChatTranscript { chat, messages })
    }

    fn delete_chat(&self, user_id: &str, chat_id: &str) -> ServiceResult<()> {
        self.owned_chat(user_id, chat_id)?;
        self.chats.remove(chat_id);
        self.messages.remove(chat_id);
        Ok(())
    }

    fn save_message(
        &self,
        user_id: &str,
        chat_id: &str,
        message: NewMessage,
    ) -> ServiceResult<StoredMessage> {
        self.owned_chat(user_id, chat_id)?;

        let now = Utc::now();
        let stored = StoredMessage {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.to_string(),
            role: message.role,
            content: message.content,
            tool_invocations: message.tool_invocations,
            created_at: now,
        };

        self.messages
            .entry(chat_id.to_string())
            .or_default()
            .push(stored.clone());
        if let Some(mut chat) = self.chats.get_mut(chat_id) {
            chat.updated_at = now;
        }

        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;

    #[test]
    fn test_memory_store_contract() {
        contract::run_all(&MemoryStore::new());
    }

    #[test]
    fn test_reports_memory_backend() {
        assert_eq!(MemoryStore::new().backend(), StoreBackend::Memory);
    }
}
