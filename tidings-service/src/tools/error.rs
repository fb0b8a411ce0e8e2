//! Error types for external data providers.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Malformed response: {message}")]
    Malformed { message: String },

    #[error("No API key configured for {provider}")]
    MissingCredentials { provider: &'static str },

    #[error("Provider did not answer within {0:?}")]
    Timeout(Duration),
}

impl ProviderError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        ProviderError::Malformed {
            message: message.into(),
        }
    }
}
