use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::api::state::AppState;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Rejects requests whose `X-API-Key` is not one of the configured keys.
/// With no keys configured every request passes.
pub async fn api_key_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let keys = &state.config.config.server.api_keys;
    if keys.is_empty() {
        return next.run(request).await;
    }

    let api_key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match api_key {
        Some(key) if keys.iter().any(|k| k == key) => next.run(request).await,
        Some(_) => {
            tracing::warn!(uri = %request.uri(), "rejected invalid API key");
            unauthorized("invalid API key")
        }
        None => unauthorized("missing API key"),
    }
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}
