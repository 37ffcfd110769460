use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::{
    chunk_content,
    ports::{EmbeddingService, VectorStore},
    ChunkMetadata, Document, DocumentChunk, DomainError, Embedding, MetadataFilter, SearchResult,
};

pub struct RagService {
    embedding: Arc<dyn EmbeddingService>,
    vector_store: Arc<dyn VectorStore>,
    default_top_k: usize,
    chunk_size: usize,
}

impl RagService {
    pub fn new(
        embedding: Arc<dyn EmbeddingService>,
        vector_store: Arc<dyn VectorStore>,
        default_top_k: usize,
    ) -> Self {
        Self {
            embedding,
            vector_store,
            default_top_k,
            chunk_size: 1000,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Splits `content` into chunks that inherit `metadata`, then embeds and
    /// indexes them.
    #[instrument(skip(self, content, metadata))]
    pub async fn ingest(
        &self,
        name: &str,
        content: &str,
        metadata: ChunkMetadata,
    ) -> Result<(Document, Vec<DocumentChunk>), DomainError> {
        if content.trim().is_empty() {
            return Err(DomainError::validation("document content is empty"));
        }

        let doc = Document::new(name).with_metadata(metadata.clone());
        let chunks: Vec<DocumentChunk> = chunk_content(doc.id, content, self.chunk_size)
            .into_iter()
            .map(|c| c.with_metadata(metadata.clone()))
            .collect();

        self.index_chunks(&chunks).await?;
        tracing::info!(document_id = %doc.id, chunks = chunks.len(), "document ingested");

        Ok((doc, chunks))
    }

    #[instrument(skip(self), fields(top_k))]
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>, DomainError> {
        self.retrieve_top_k(query, self.default_top_k).await
    }

    #[instrument(skip(self))]
    pub async fn retrieve_top_k(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, DomainError> {
        self.retrieve_filtered(query, top_k, None).await
    }

    /// Similarity search with scores, restricted by an optional metadata filter.
    #[instrument(skip(self))]
    pub async fn retrieve_filtered(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let embedding = self.embedding.embed(query).await?;
        self.vector_store.search(&embedding, top_k, filter).await
    }

    #[instrument(skip(self, vector), fields(dimension = vector.dimension()))]
    pub async fn search_by_vector(
        &self,
        vector: &Embedding,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let expected = self.embedding.dimension();
        if vector.dimension() != expected {
            return Err(DomainError::validation(format!(
                "query vector has dimension {}, index expects {expected}",
                vector.dimension()
            )));
        }
        self.vector_store.search(vector, top_k, filter).await
    }

    #[instrument(skip(self, chunk), fields(chunk_id = %chunk.id))]
    pub async fn index_chunk(&self, chunk: &DocumentChunk) -> Result<(), DomainError> {
        let embedding = self.embedding.embed(&chunk.content).await?;
        self.vector_store.upsert(chunk, &embedding).await
    }

    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    pub async fn index_chunks(&self, chunks: &[DocumentChunk]) -> Result<(), DomainError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let embeddings = self.embedding.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(DomainError::external(format!(
                "embedding service returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            self.vector_store.upsert(chunk, embedding).await?;
        }

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_document(&self, document_id: Uuid) -> Result<(), DomainError> {
        self.vector_store.delete_by_document(document_id).await
    }
}
