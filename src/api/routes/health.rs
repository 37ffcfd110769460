use axum::{extract::State, http::StatusCode, Json};
use deadpool_redis::redis::cmd;
use serde::Serialize;

use crate::api::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub redis: String,
    pub graph: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Ready unless a configured Redis history store fails to answer `PING`.
pub async fn readiness_check(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let redis_status = match &state.redis_pool {
        None => "not_configured",
        Some(pool) => match pool.get().await {
            Ok(mut conn) => {
                let ping: Result<String, _> = cmd("PING").query_async(&mut *conn).await;
                if ping.is_ok() {
                    "connected"
                } else {
                    "disconnected"
                }
            }
            Err(_) => "disconnected",
        },
    };
    let graph_status = if state.graph_qa.is_some() {
        "configured"
    } else {
        "not_configured"
    };

    let is_ready = redis_status != "disconnected";
    let response = ReadinessResponse {
        status: if is_ready { "ready" } else { "not_ready" }.into(),
        redis: redis_status.into(),
        graph: graph_status.into(),
    };

    if is_ready {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
