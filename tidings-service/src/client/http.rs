//! HTTP implementations of the client seams.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{ByteStream, ChatPersistence, ChatTransport, PersistenceError, TransportError};
use crate::db::models::{Chat, ChatTranscript, StoredMessage};
use crate::models::{ConversationMessage, Role, ToolInvocation};

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ConversationMessage],
}

#[derive(Serialize)]
struct CreateChatBody<'a> {
    title: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveMessageBody<'a> {
    role: Role,
    content: &'a str,
    #[serde(skip_serializing_if = "<[ToolInvocation]>::is_empty")]
    tool_invocations: &'a [ToolInvocation],
}

/// Streams replies from `POST /api/chat`
#[derive(Clone)]
pub struct HttpChatTransport {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpChatTransport {
    pub fn new(client: Client, base_url: &str, token: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn send(&self, messages: &[ConversationMessage]) -> Result<ByteStream, TransportError> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .bearer_auth(&self.token)
            .json(&ChatRequest { messages })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::Status {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(TransportError::from)),
        ))
    }
}

/// Talks to the `/api/chats` persistence endpoints
#[derive(Clone)]
pub struct HttpPersistence {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpPersistence {
    pub fn new(client: Client, base_url: &str, token: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/chats{}", self.base_url, path)
    }

    async fn checked(response: Response) -> Result<Response, PersistenceError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(PersistenceError::Rejected {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            })
        }
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, PersistenceError> {
        Ok(Self::checked(response).await?.json().await?)
    }
}

#[async_trait]
impl ChatPersistence for HttpPersistence {
    async fn create_chat(&self, title: &str) -> Result<Chat, PersistenceError> {
        let response = self
            .client
            .post(self.url(""))
            .bearer_auth(&self.token)
            .json(&CreateChatBody { title })
            .send()
            .await?;
        Self::json(response).await
    }

    async fn save_message(
        &self,
        chat_id: &str,
        role: Role,
        content: &str,
        tool_invocations: &[ToolInvocation],
    ) -> Result<StoredMessage, PersistenceError> {
        let response = self
            .client
            .post(self.url(&format!("/{}/messages", urlencoding::encode(chat_id))))
            .bearer_auth(&self.token)
            .json(&SaveMessageBody {
                role,
                content,
                tool_invocations,
            })
            .send()
            .await?;
        Self::json(response).await
    }

    async fn load_chat(&self, chat_id: &str) -> Result<ChatTranscript, PersistenceError> {
        let response = self
            .client
            .get(self.url(&format!("/{}", urlencoding::encode(chat_id))))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::json(response).await
    }

    async fn list_chats(&self) -> Result<Vec<Chat>, PersistenceError> {
        let response = self
            .client
            .get(self.url(""))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::json(response).await
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<(), PersistenceError> {
        let response = self
            .client
            .delete(self.url(&format!("/{}", urlencoding::encode(chat_id))))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::checked(response).await?;
        Ok(())
    }
}
