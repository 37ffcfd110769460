use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::domain::{publish_year_filter, ChunkMetadata, Document, Embedding, SearchResult};

#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub name: String,
    pub content: String,
    pub content_type: Option<String>,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub name: String,
    pub content_type: String,
    pub metadata: ChunkMetadata,
    pub chunks: usize,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl DocumentResponse {
    fn new(doc: Document, chunks: usize) -> Self {
        Self {
            id: doc.id,
            name: doc.name,
            content_type: doc.content_type,
            metadata: doc.metadata,
            chunks,
            created_at: doc.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchDocumentsRequest {
    pub query: String,
    pub limit: Option<usize>,
    pub publish_year: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct VectorSearchRequest {
    pub vector: Vec<f32>,
    pub limit: Option<usize>,
    pub publish_year: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct SearchResultResponse {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
}

impl From<SearchResult> for SearchResultResponse {
    fn from(result: SearchResult) -> Self {
        Self {
            chunk_id: result.chunk.id,
            document_id: result.chunk.document_id,
            content: result.chunk.content,
            metadata: result.chunk.metadata,
            score: result.score,
        }
    }
}

fn to_response(results: Vec<SearchResult>) -> Json<Vec<SearchResultResponse>> {
    Json(results.into_iter().map(Into::into).collect())
}

pub async fn create_document(
    State(state): State<AppState>,
    Json(request): Json<CreateDocumentRequest>,
) -> ApiResult<(StatusCode, Json<DocumentResponse>)> {
    let (doc, chunks) = state
        .rag
        .ingest(&request.name, &request.content, request.metadata)
        .await?;

    let doc = match request.content_type {
        Some(content_type) => doc.with_content_type(content_type),
        None => doc,
    };

    Ok((
        StatusCode::CREATED,
        Json(DocumentResponse::new(doc, chunks.len())),
    ))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.rag.delete_document(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn search_documents(
    State(state): State<AppState>,
    Json(request): Json<SearchDocumentsRequest>,
) -> ApiResult<Json<Vec<SearchResultResponse>>> {
    let top_k = request.limit.unwrap_or(state.rag.default_top_k());
    let filter = publish_year_filter(request.publish_year);
    let results = state
        .rag
        .retrieve_filtered(&request.query, top_k, filter.as_ref())
        .await?;

    Ok(to_response(results))
}

pub async fn search_by_vector(
    State(state): State<AppState>,
    Json(request): Json<VectorSearchRequest>,
) -> ApiResult<Json<Vec<SearchResultResponse>>> {
    let top_k = request.limit.unwrap_or(state.rag.default_top_k());
    let filter = publish_year_filter(request.publish_year);
    let results = state
        .rag
        .search_by_vector(&Embedding::new(request.vector), top_k, filter.as_ref())
        .await?;

    Ok(to_response(results))
}
