use axum::{extract::State, Json};

use crate::api::error::ApiResult;
use crate::api::routes::qa::QuestionRequest;
use crate::api::state::AppState;
use crate::application::GraphAnswer;
use crate::domain::DomainError;

pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<QuestionRequest>,
) -> ApiResult<Json<GraphAnswer>> {
    let graph_qa = state
        .graph_qa
        .as_ref()
        .ok_or_else(|| DomainError::not_found("graph database is not configured"))?;

    Ok(Json(graph_qa.ask(&request.question).await?))
}
