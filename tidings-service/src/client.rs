//! Chat client: session state machine plus the transport and persistence
//! seams it talks through.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::Deserialize;
use std::pin::Pin;

use crate::db::models::{Chat, ChatTranscript, StoredMessage};
use crate::models::{ConversationMessage, Role, ToolInvocation};

pub mod cards;
pub mod http;
pub mod session;

pub use cards::render_card;
pub use http::{HttpChatTransport, HttpPersistence};
pub use session::{SessionController, SessionState, TurnPhase};

/// Response body increments as they arrive
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Stream interrupted: {message}")]
    Interrupted { message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

/// Sends the conversation to the assistant and yields the raw response stream
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, messages: &[ConversationMessage]) -> Result<ByteStream, TransportError>;
}

/// Per-user chat storage as seen from the client
#[async_trait]
pub trait ChatPersistence: Send + Sync {
    async fn create_chat(&self, title: &str) -> Result<Chat, PersistenceError>;

    async fn save_message(
        &self,
        chat_id: &str,
        role: Role,
        content: &str,
        tool_invocations: &[ToolInvocation],
    ) -> Result<StoredMessage, PersistenceError>;

    async fn load_chat(&self, chat_id: &str) -> Result<ChatTranscript, PersistenceError>;

    async fn list_chats(&self) -> Result<Vec<Chat>, PersistenceError>;

    async fn delete_chat(&self, chat_id: &str) -> Result<(), PersistenceError>;
}

/// Terminal client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Bearer token presented to the server
    #[serde(default)]
    pub token: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            token: String::new(),
        }
    }
}

fn default_server_url() -> String {
    "http://localhost:8080".to_string()
}
