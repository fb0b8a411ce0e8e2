//! Streaming chat endpoint.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, warn};

use super::AppState;
use super::auth::AuthUser;
use crate::models::ConversationMessage;

#[derive(Deserialize)]
struct ChatRequest {
    messages: Vec<ConversationMessage>,
}

/// Answer the latest message as a word-paced text stream, optionally
/// followed by a tool result frame.
///
/// Anything that keeps a turn from being produced still answers with a
/// plain apology and a success status.
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    body: Bytes,
) -> Response {
    let messages = match serde_json::from_slice::<ChatRequest>(&body) {
        Ok(request) => request.messages,
        Err(e) => {
            warn!(user_id = %user.user_id, error = %e, "Undecodable chat request");
            return plain_text(Body::from(state.service.apology()));
        }
    };

    let service = state.service.clone();
    let composition = match tokio::spawn(async move { service.respond(&messages).await }).await
    {
        Ok(composition) => composition,
        Err(e) => {
            error!(user_id = %user.user_id, error = %e, "Chat turn failed");
            return plain_text(Body::from(state.service.apology()));
        }
    };

    plain_text(Body::from_stream(state.service.reply_stream(composition)))
}

fn plain_text(body: Body) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}
