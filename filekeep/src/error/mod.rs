//! Error types returned by HTTP handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::oauth2::OAuthError;
use crate::storage::StorageError;

/// Handler-level error type
///
/// Every variant renders as `{"error": "<message>"}` with the matching status.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or incomplete request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Unknown file id (404)
    #[error("{0}")]
    NotFound(String),

    /// The backend has no usable credential (401)
    #[error("{0}")]
    Unauthorized(String),

    /// The backend failed (500)
    #[error("{0}")]
    Backend(String),

    /// Deployment configuration is incomplete (500)
    #[error("{0}")]
    Misconfigured(String),
}

impl ApiError {
    /// HTTP status for this error
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Backend(_) | Self::Misconfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => Self::NotFound(format!("File not found: {id}")),
            StorageError::Unauthorized(msg) => Self::Unauthorized(msg),
            StorageError::Misconfigured(msg) => Self::Misconfigured(msg),
            other => Self::Backend(other.to_string()),
        }
    }
}

impl From<OAuthError> for ApiError {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::InvalidState => Self::BadRequest(err.to_string()),
            OAuthError::NotAuthorized | OAuthError::TokenRejected(_) => {
                Self::Unauthorized(err.to_string())
            }
            OAuthError::TokenExchangeFailed(_) | OAuthError::Generic(_) => {
                Self::Backend(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Request rejected");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
