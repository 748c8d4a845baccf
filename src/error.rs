//! HTTP-facing error type.
//!
//! Handlers return `Result<T, AppError>`. Client errors carry a fixed public
//! message; upstream and internal errors are logged in full and answered with
//! a generic body so provider details never reach the caller.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

use crate::services::generator::GenerationError;

pub const INVALID_MESSAGES: &str = "Invalid messages format";
pub const INTERNAL_ERROR: &str = "Internal server error";
pub const UNAUTHORIZED: &str = "Unauthorized";

#[derive(Debug, Error)]
pub enum AppError {
    /// Request body did not have the `{ messages: [...] }` shape.
    #[error("invalid messages: {0}")]
    InvalidMessages(String),

    #[error("missing or wrong api key")]
    Unauthorized,

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::InvalidMessages(detail) => {
                debug!(detail = %detail, "rejected chat request");
                (StatusCode::BAD_REQUEST, INVALID_MESSAGES)
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, UNAUTHORIZED),
            AppError::Generation(e) => {
                error!(error = %e, "text generation failed");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
            }
            AppError::Internal(m) => {
                error!(message = %m, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upstream_detail_is_not_exposed() {
        let err = AppError::Generation(GenerationError::Status {
            status: 403,
            body: "API key leaked: sk-123".to_string(),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"Internal server error"}"#);
    }
}
