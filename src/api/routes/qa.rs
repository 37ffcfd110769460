use axum::{extract::State, Json};
use serde::Deserialize;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::application::QaAnswer;
use crate::domain::SearchQuery;

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
}

pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<QuestionRequest>,
) -> ApiResult<Json<QaAnswer>> {
    Ok(Json(state.qa.ask(&request.question).await?))
}

pub async fn analyze_query(
    State(state): State<AppState>,
    Json(request): Json<QuestionRequest>,
) -> ApiResult<Json<SearchQuery>> {
    Ok(Json(state.analyzer.analyze(&request.question).await?))
}
