// src/routes/mod.rs
pub mod chat;

use crate::{error::AppError, state::SharedState};
use axum::{
    Router,
    extract::{DefaultBodyLimit, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use chat::{chat_handler, status_handler};
use subtle::ConstantTimeEq;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub const API_KEY_HEADER: &str = "x-api-key";

pub fn create_router(state: SharedState) -> Router {
    let api_routes = Router::new()
        .route("/chat", post(chat_handler))
        // Conversation size is the provider's concern.
        .layer(DefaultBodyLimit::disable())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/", get(status_handler))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn auth_middleware(
    State(state): State<SharedState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.relay_api_key.as_deref() else {
        return Ok(next.run(req).await);
    };

    match req.headers().get(API_KEY_HEADER) {
        Some(val) if bool::from(val.as_bytes().ct_eq(expected.as_bytes())) => Ok(next.run(req).await),
        _ => Err(AppError::Unauthorized),
    }
}
