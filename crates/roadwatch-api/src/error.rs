//! Error types for the HTTP API.
//!
//! [`ApiError`] can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation; the body
//! is always `{"error": ..., "status": ...}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use roadwatch_core::StoreError;
use roadwatch_messaging::MessagingError;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested road or segment does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request carried invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The message bus could not deliver the write.
    #[error("bus unavailable: {0}")]
    Transport(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Validation(e) => Self::BadRequest(e.to_string()),
            StoreError::NotFound(e) => Self::NotFound(e.to_string()),
            other @ (StoreError::Construction(_) | StoreError::Persistence(_)) => {
                Self::Internal(other.to_string())
            }
        }
    }
}

impl From<MessagingError> for ApiError {
    fn from(error: MessagingError) -> Self {
        match error {
            MessagingError::Transport(msg) => Self::Transport(msg),
            MessagingError::InvalidTimestamp(msg) => Self::BadRequest(msg),
            MessagingError::Store(e) => e.into(),
            other @ (MessagingError::Decode(_) | MessagingError::CommandRejected(_)) => {
                Self::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Transport(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
