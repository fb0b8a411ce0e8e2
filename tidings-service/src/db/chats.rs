//! Chat and message operations.

use chrono::{SubsecRound, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use super::models::{Chat, ChatTranscript, NewMessage, StoredMessage};
use super::{Database, timestamp};
use crate::config::StoreBackend;
use crate::error::{ServiceError, ServiceResult, StoreError};
use crate::store::{ChatStore, ensure_owner};

const CHAT_COLUMNS: &str = "id, user_id, title, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, chat_id, role, content, tool_invocations, created_at";

/// Fetch a chat and check that `user_id` owns it
fn owned_chat(conn: &Connection, user_id: &str, chat_id: &str) -> ServiceResult<Chat> {
    let chat = conn
        .query_row(
            &format!("SELECT {} FROM chats WHERE id = ?1", CHAT_COLUMNS),
            params![chat_id],
            Chat::from_row,
        )
        .optional()
        .map_err(StoreError::Query)?
        .ok_or_else(|| ServiceError::ChatNotFound {
            chat_id: chat_id.to_string(),
        })?;
    ensure_owner(&chat, user_id)?;
    Ok(chat)
}

fn chat_messages(conn: &Connection, chat_id: &str) -> ServiceResult<Vec<StoredMessage>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM messages WHERE chat_id = ?1 ORDER BY created_at, rowid",
            MESSAGE_COLUMNS
        ))
        .map_err(StoreError::Query)?;

    let rows = stmt
        .query_map(params![chat_id], StoredMessage::from_row)
        .map_err(StoreError::Query)?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::Query)
        .map_err(Into::into)
}

impl ChatStore for Database {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Sqlite
    }

    fn create_chat(&self, user_id: &str, title: &str) -> ServiceResult<Chat> {
        let conn = self.conn.lock().unwrap();

        // Stored text keeps microseconds; keep the returned record identical
        let now = Utc::now().trunc_subsecs(6);
        let chat = Chat {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };

        conn.execute(
            "INSERT INTO chats (id, user_id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                chat.id,
                chat.user_id,
                chat.title,
                timestamp(chat.created_at),
                timestamp(chat.updated_at),
            ],
        )
        .map_err(StoreError::Query)?;

        Ok(chat)
    }

    fn list_chats(&self, user_id: &str) -> ServiceResult<Vec<Chat>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM chats WHERE user_id = ?1 ORDER BY updated_at DESC, created_at DESC",
                CHAT_COLUMNS
            ))
            .map_err(StoreError::Query)?;

        let rows = stmt
            .query_map(params![user_id], Chat::from_row)
            .map_err(StoreError::Query)?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::Query)
            .map_err(Into::into)
    }

    fn load_chat(&self, user_id: &str, chat_id: &str) -> ServiceResult<ChatTranscript> {
        let conn = self.conn.lock().unwrap();

        let chat = owned_chat(&conn, user_id, chat_id)?;
        let messages = chat_messages(&conn, chat_id)?;

        Ok(ChatTranscript { chat, messages })
    }

    fn delete_chat(&self, user_id: &str, chat_id: &str) -> ServiceResult<()> {
        let conn = self.conn.lock().unwrap();

        owned_chat(&conn, user_id, chat_id)?;
        // Messages go with it through ON DELETE CASCADE
        conn.execute("DELETE FROM chats WHERE id = ?1", params![chat_id])
            .map_err(StoreError::Query)?;

        Ok(())
    }

    fn save_message(
        &self,
        user_id: &str,
        chat_id: &str,
        message: NewMessage,
    ) -> ServiceResult<StoredMessage> {
        let conn = self.conn.lock().unwrap();

        owned_chat(&conn, user_id, chat_id)?;

        let stored = StoredMessage {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.to_string(),
            role: message.role,
            content: message.content,
            tool_invocations: message.tool_invocations,
            created_at: Utc::now().trunc_subsecs(6),
        };
        let invocations_json = if stored.tool_invocations.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&stored.tool_invocations).map_err(StoreError::Serialization)?)
        };

        conn.execute(
            &format!(
                "INSERT INTO messages ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                MESSAGE_COLUMNS
            ),
            params![
                stored.id,
                stored.chat_id,
                stored.role.to_string(),
                stored.content,
                invocations_json,
                timestamp(stored.created_at),
            ],
        )
        .map_err(StoreError::Query)?;

        conn.execute(
            "UPDATE chats SET updated_at = ?1 WHERE id = ?2",
            params![timestamp(stored.created_at), chat_id],
        )
        .map_err(StoreError::Query)?;

        Ok(stored)
    }
}
