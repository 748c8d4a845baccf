use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    error::AppError,
    message::{ChatRequest, ChatResponse, StatusResponse},
    state::SharedState,
};

pub async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(body) = payload.map_err(|e| AppError::InvalidMessages(e.body_text()))?;
    let request = ChatRequest::try_from(body)?;

    info!(messages = request.messages.len(), "relaying chat");

    // The upstream call runs detached so a dropped client connection does not cancel it.
    let generator = state.generator.clone();
    let text = tokio::spawn(async move { generator.generate(&request.messages).await })
        .await
        .map_err(|e| AppError::Internal(format!("generation task failed: {e}")))??;

    debug!(reply = %text, "chat reply");
    Ok(Json(ChatResponse { text }))
}

pub async fn status_handler() -> Json<StatusResponse> {
    Json(StatusResponse { status: "API is running".to_string() })
}
