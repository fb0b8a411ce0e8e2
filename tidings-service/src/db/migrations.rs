//! Database schema migrations.

use rusqlite::Connection;

use crate::error::{ServiceResult, StoreError};

/// Bring the schema up to date; safe to run on every open
pub(super) fn run_migrations(conn: &Connection) -> ServiceResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS chats (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            title TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chats_user ON chats(user_id);
        CREATE INDEX IF NOT EXISTS idx_chats_updated ON chats(updated_at);

        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            chat_id TEXT NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_messages_chat ON messages(chat_id);
    "#,
    )
    .map_err(|e| StoreError::Migration {
        message: e.to_string(),
    })?;

    run_tool_invocations_migration(conn)?;

    Ok(())
}

/// Migration: add the serialized tool invocation column to messages
fn run_tool_invocations_migration(conn: &Connection) -> ServiceResult<()> {
    let has_tool_invocations: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('messages') WHERE name='tool_invocations'",
            [],
            |row| row.get::<_, i64>(0),
        )
        .unwrap_or(0)
        > 0;

    if !has_tool_invocations {
        conn.execute("ALTER TABLE messages ADD COLUMN tool_invocations TEXT", [])
            .map_err(|e| StoreError::Migration {
                message: format!("Failed to add tool_invocations column: {}", e),
            })?;
    }

    Ok(())
}
