//! Bearer token authentication.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use std::sync::Arc;
use tracing::debug;

use super::AppState;
use crate::error::ServiceError;

/// The user a request acts for, resolved from its bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ServiceError::Unauthorized)?;

        match state.service.config.auth.tokens.get(bearer.token()) {
            Some(user_id) => Ok(Self {
                user_id: user_id.clone(),
            }),
            None => {
                debug!(path = %parts.uri.path(), "Rejected unknown bearer token");
                Err(ServiceError::Unauthorized)
            }
        }
    }
}
