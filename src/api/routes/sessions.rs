use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::domain::{Conversation, DomainError};

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
    /// Extra prompt variables, e.g. `language`.
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub session_id: String,
    pub reply: String,
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<String>,
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<Json<SendMessageResponse>> {
    if request.message.trim().is_empty() {
        return Err(DomainError::validation("message must not be empty").into());
    }

    let reply = state
        .chat
        .send(&session_id, &request.message, request.variables)
        .await?;

    Ok(Json(SendMessageResponse { session_id, reply }))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Conversation>> {
    Ok(Json(state.chat.history(&session_id).await?))
}

pub async fn clear_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.chat.clear(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_sessions(State(state): State<AppState>) -> ApiResult<Json<SessionsResponse>> {
    Ok(Json(SessionsResponse {
        sessions: state.chat.sessions().await?,
    }))
}
