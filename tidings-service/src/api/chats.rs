//! Chat persistence endpoints.
//!
//! Every handler is scoped to the authenticated user; foreign chats are
//! rejected with 403 and unknown ones with 404 by the store.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::AppState;
use super::auth::AuthUser;
use crate::db::models::{Chat, ChatTranscript, NewMessage, StoredMessage};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{Role, ToolInvocation};
use crate::store::validate_title;

#[derive(Deserialize)]
pub struct CreateChatRequest {
    pub title: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveMessageRequest {
    pub role: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub tool_invocations: Vec<ToolInvocation>,
}

impl SaveMessageRequest {
    fn into_new_message(self) -> ServiceResult<NewMessage> {
        let role = self
            .role
            .ok_or(ServiceError::MissingField { field: "role" })?;
        let role: Role = role.parse().map_err(|_| ServiceError::InvalidRequest {
            message: format!("role must be 'user' or 'assistant', got '{}'", role),
        })?;
        let content = self
            .content
            .filter(|c| !c.is_empty())
            .ok_or(ServiceError::MissingField { field: "content" })?;

        Ok(NewMessage {
            role,
            content,
            tool_invocations: self.tool_invocations,
        })
    }
}

/// List the user's chats, most recently updated first
pub async fn list_chats_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ServiceResult<Json<Vec<Chat>>> {
    Ok(Json(state.service.store.list_chats(&user.user_id)?))
}

pub async fn create_chat_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<CreateChatRequest>,
) -> ServiceResult<(StatusCode, Json<Chat>)> {
    let title = validate_title(request.title.as_deref())?;
    let chat = state.service.store.create_chat(&user.user_id, &title)?;
    info!(chat_id = %chat.id, user_id = %user.user_id, "Chat created");
    Ok((StatusCode::CREATED, Json(chat)))
}

/// A chat together with its messages
pub async fn get_chat_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(chat_id): Path<String>,
) -> ServiceResult<Json<ChatTranscript>> {
    Ok(Json(state.service.store.load_chat(&user.user_id, &chat_id)?))
}

pub async fn delete_chat_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(chat_id): Path<String>,
) -> ServiceResult<StatusCode> {
    state.service.store.delete_chat(&user.user_id, &chat_id)?;
    info!(%chat_id, user_id = %user.user_id, "Chat deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_messages_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(chat_id): Path<String>,
) -> ServiceResult<Json<Vec<StoredMessage>>> {
    Ok(Json(
        state.service.store.list_messages(&user.user_id, &chat_id)?,
    ))
}

pub async fn save_message_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(chat_id): Path<String>,
    Json(request): Json<SaveMessageRequest>,
) -> ServiceResult<(StatusCode, Json<StoredMessage>)> {
    let message = request.into_new_message()?;
    let stored = state
        .service
        .store
        .save_message(&user.user_id, &chat_id, message)?;
    Ok((StatusCode::CREATED, Json(stored)))
}
