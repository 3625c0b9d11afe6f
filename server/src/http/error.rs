//! HTTP application errors with status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Request-level failures surfaced as opaque JSON errors. Messages carry no
/// internal details.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid JSON")]
    InvalidJson,

    #[error("logs field is required")]
    MissingLogs,

    #[error("request payload too large")]
    PayloadTooLarge,

    #[error("unsupported content type")]
    UnsupportedMediaType,

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidJson | AppError::MissingLogs => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        (self.status_code(), body).into_response()
    }
}
