use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Chat not found: {chat_id}")]
    ChatNotFound { chat_id: String },

    #[error("Chat {chat_id} belongs to another user")]
    ChatForbidden { chat_id: String },

    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Storage error")]
    Store(#[from] StoreError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Chat store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database connection failed")]
    Connection(#[source] rusqlite::Error),

    #[error("Query failed")]
    Query(#[source] rusqlite::Error),

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Serialization failed")]
    Serialization(#[source] serde_json::Error),

    #[error("Could not prepare data directory")]
    Io(#[source] std::io::Error),
}

/// API error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceError::ChatNotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::ChatForbidden { .. } => StatusCode::FORBIDDEN,
            ServiceError::MissingField { .. } | ServiceError::InvalidRequest { .. } => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServiceError::Unauthorized => "unauthorized",
            ServiceError::ChatNotFound { .. } => "chat_not_found",
            ServiceError::ChatForbidden { .. } => "chat_forbidden",
            ServiceError::MissingField { .. } => "missing_field",
            ServiceError::InvalidRequest { .. } => "invalid_request",
            ServiceError::Store(_) => "store_error",
            ServiceError::Config { .. } => "config_error",
            ServiceError::Internal { .. } => "internal_error",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %format_error_chain(&self), "Request failed");
        }

        let response = ErrorResponse {
            message: self.to_string(),
            code: Some(self.error_code().to_string()),
        };

        (status, Json(response)).into_response()
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Render an error and all of its sources as a single `a: b: c` line for logs
pub fn format_error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_error_kind() {
        assert_eq!(
            ServiceError::Unauthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::ChatForbidden {
                chat_id: "c1".to_string()
            }
            .status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::MissingField { field: "title" }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Store(StoreError::Migration {
                message: "boom".to_string()
            })
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_chain_includes_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err = ServiceError::Store(StoreError::Io(io));
        assert_eq!(
            format_error_chain(&err),
            "Storage error: Could not prepare data directory: read-only"
        );
    }
}
