use async_trait::async_trait;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use uuid::Uuid;

use crate::domain::{
    ports::VectorStore, ChunkMetadata, DocumentChunk, DomainError, Embedding, MetadataFilter,
    SearchResult,
};

/// Payload key holding chunk metadata. Filters address fields beneath it.
const METADATA_KEY: &str = "metadata";

pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantVectorStore {
    pub async fn new(url: &str, collection: &str, dimension: usize) -> Result<Self, DomainError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| DomainError::external(e.to_string()))?;

        let store = Self {
            client,
            collection: collection.to_string(),
            dimension,
        };

        store.ensure_collection().await?;

        Ok(store)
    }

    async fn ensure_collection(&self) -> Result<(), DomainError> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| DomainError::external(e.to_string()))?;

        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == self.collection);

        if !exists {
            tracing::info!(
                collection = %self.collection,
                dimension = self.dimension,
                "creating collection"
            );
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection).vectors_config(
                        VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine),
                    ),
                )
                .await
                .map_err(|e| DomainError::external(e.to_string()))?;
        }

        Ok(())
    }

    fn to_filter(filter: &MetadataFilter) -> Result<Filter, DomainError> {
        let conditions = filter
            .conditions()
            .into_iter()
            .map(|(field, value)| {
                let key = format!("{METADATA_KEY}.{field}");
                match value {
                    serde_json::Value::String(s) => Ok(Condition::matches(key, s.clone())),
                    serde_json::Value::Bool(b) => Ok(Condition::matches(key, *b)),
                    serde_json::Value::Number(n) => n
                        .as_i64()
                        .map(|i| Condition::matches(key, i))
                        .ok_or_else(|| {
                            DomainError::validation(format!("filter on {field} needs an integer"))
                        }),
                    other => Err(DomainError::validation(format!(
                        "unsupported filter value for {field}: {other}"
                    ))),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Filter::must(conditions))
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn upsert(
        &self,
        chunk: &DocumentChunk,
        embedding: &Embedding,
    ) -> Result<(), DomainError> {
        let payload: Payload = serde_json::json!({
            "chunk_id": chunk.id.to_string(),
            "document_id": chunk.document_id.to_string(),
            "content": chunk.content,
            "chunk_index": chunk.chunk_index,
            METADATA_KEY: chunk.metadata.to_value(),
            "metadata_json": serde_json::to_string(&chunk.metadata)?,
        })
        .try_into()
        .map_err(|_| DomainError::internal("Failed to create payload"))?;

        // Chunk ids are v4 UUIDs, which Qdrant accepts directly as point ids.
        let point = PointStruct::new(
            chunk.id.to_string(),
            embedding.as_slice().to_vec(),
            payload,
        );

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![point]))
            .await
            .map_err(|e| DomainError::external(e.to_string()))?;

        Ok(())
    }

    async fn search(
        &self,
        query: &Embedding,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let mut request =
            SearchPointsBuilder::new(&self.collection, query.as_slice().to_vec(), top_k as u64)
                .with_payload(true);
        if let Some(filter) = filter {
            request = request.filter(Self::to_filter(filter)?);
        }

        let results = self
            .client
            .search_points(request)
            .await
            .map_err(|e| DomainError::external(e.to_string()))?;

        let search_results: Vec<SearchResult> = results
            .result
            .into_iter()
            .filter_map(|point| {
                let payload = point.payload;

                let chunk_id: Uuid = payload.get("chunk_id")?.as_str()?.parse().ok()?;
                let document_id: Uuid = payload.get("document_id")?.as_str()?.parse().ok()?;
                let content = payload.get("content")?.as_str()?.to_string();
                let chunk_index = payload.get("chunk_index")?.as_integer()? as usize;
                let metadata: ChunkMetadata = payload
                    .get("metadata_json")
                    .and_then(|v| v.as_str())
                    .and_then(|raw| serde_json::from_str(raw).ok())
                    .unwrap_or_default();

                let chunk = DocumentChunk {
                    id: chunk_id,
                    document_id,
                    content,
                    chunk_index,
                    metadata,
                };

                Some(SearchResult {
                    chunk,
                    score: point.score,
                })
            })
            .collect();

        Ok(search_results)
    }

    async fn delete_by_document(&self, document_id: Uuid) -> Result<(), DomainError> {
        let filter = Filter::must([Condition::matches(
            "document_id",
            document_id.to_string(),
        )]);

        self.client
            .delete_points(DeletePointsBuilder::new(&self.collection).points(filter))
            .await
            .map_err(|e| DomainError::external(e.to_string()))?;

        Ok(())
    }
}
