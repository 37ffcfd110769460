use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::domain::Conversation;

#[derive(Debug, Deserialize)]
pub struct AgentRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub thread_id: String,
    pub reply: String,
}

pub async fn run(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    Json(request): Json<AgentRequest>,
) -> ApiResult<Json<AgentResponse>> {
    let reply = state.agent.run(&thread_id, &request.message).await?;
    Ok(Json(AgentResponse { thread_id, reply }))
}

pub async fn memory(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> ApiResult<Json<Conversation>> {
    Ok(Json(state.agent.memory(&thread_id).await?))
}

pub async fn forget(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.agent.forget(&thread_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
