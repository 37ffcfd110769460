use async_trait::async_trait;
use std::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    ports::VectorStore, DocumentChunk, DomainError, Embedding, MetadataFilter, SearchResult,
};

struct Entry {
    chunk: DocumentChunk,
    embedding: Embedding,
    metadata: serde_json::Value,
}

/// Brute-force cosine index held in process memory.
pub struct InMemoryVectorStore {
    entries: RwLock<Vec<Entry>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(
        &self,
        chunk: &DocumentChunk,
        embedding: &Embedding,
    ) -> Result<(), DomainError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?;

        entries.retain(|e| e.chunk.id != chunk.id);
        entries.push(Entry {
            chunk: chunk.clone(),
            embedding: embedding.clone(),
            metadata: chunk.metadata.to_value(),
        });
        Ok(())
    }

    async fn search(
        &self,
        query: &Embedding,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| DomainError::internal(e.to_string()))?;

        let mut results: Vec<SearchResult> = entries
            .iter()
            .filter(|e| filter.map_or(true, |f| f.matches(&e.metadata)))
            .map(|e| SearchResult {
                chunk: e.chunk.clone(),
                score: query.cosine_similarity(&e.embedding),
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);
        Ok(results)
    }

    async fn delete_by_document(&self, document_id: Uuid) -> Result<(), DomainError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?;

        entries.retain(|e| e.chunk.document_id != document_id);
        Ok(())
    }
}
