pub mod agent;
pub mod chain;
pub mod documents;
pub mod graph;
pub mod health;
pub mod qa;
pub mod sessions;

use axum::http::{header, HeaderName, Method};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::middleware::{api_key_auth, request_logger};
use crate::api::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = build_cors(&state.config.config.cors.allowed_origins);
    let auth = middleware::from_fn_with_state(state.clone(), api_key_auth);

    let protected = Router::new()
        .nest("/chain", chain_routes())
        .nest("/api/v1", api_v1_routes())
        .route_layer(auth);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .merge(protected)
        .layer(middleware::from_fn(request_logger))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn build_cors(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
        ]);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(origins)
    }
}

/// Runnable-style routes for the translation chain.
fn chain_routes() -> Router<AppState> {
    Router::new()
        .route("/invoke", post(chain::invoke))
        .route("/batch", post(chain::batch))
        .route("/stream", post(chain::stream))
        .route("/input_schema", get(chain::input_schema))
        .route("/output_schema", get(chain::output_schema))
}

fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(sessions::list_sessions))
        .route(
            "/sessions/{id}",
            get(sessions::get_session).delete(sessions::clear_session),
        )
        .route("/sessions/{id}/messages", post(sessions::send_message))
        .route("/documents", post(documents::create_document))
        .route("/documents/{id}", axum::routing::delete(documents::delete_document))
        .route("/documents/search", post(documents::search_documents))
        .route("/documents/search/vector", post(documents::search_by_vector))
        .route("/qa", post(qa::ask))
        .route("/query/analyze", post(qa::analyze_query))
        .route("/graph/qa", post(graph::ask))
        .route(
            "/agent/threads/{thread_id}",
            post(agent::run).get(agent::memory).delete(agent::forget),
        )
}
