//! HTTP error mapping.
//!
//! Every failure leaves the server as `{ "error": "..." }`. Internal
//! details are logged, never returned: the client only sees a generic
//! message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub const INTERNAL_MESSAGE: &str = "Error interno en el servidor";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("No autorizado")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Another turn holds the conversation.
    #[error("{0}")]
    Busy(String),

    /// An optional collaborator is not configured.
    #[error("{0}")]
    Unavailable(String),

    /// Detail is for the logs only.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Busy(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to the client.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Internal(_) => INTERNAL_MESSAGE.to_owned(),
            other => other.to_string(),
        }
    }
}

impl From<lt_domain::error::Error> for ApiError {
    fn from(e: lt_domain::error::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(error = %detail, "request failed");
        }
        let status = self.status();
        (status, Json(serde_json::json!({ "error": self.public_message() }))).into_response()
    }
}
