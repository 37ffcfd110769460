use async_trait::async_trait;
use rig::client::{EmbeddingsClient, ProviderClient};
use rig::embeddings::EmbeddingsBuilder;
use rig::providers::openai;

use crate::domain::{ports::EmbeddingService, DomainError, Embedding};
use crate::infrastructure::config::EmbeddingConfig;

/// OpenAI text embeddings through `rig`.
pub struct TextEmbedding {
    model: String,
    dimension: usize,
}

impl TextEmbedding {
    pub fn new() -> Self {
        Self::from_config(&EmbeddingConfig::default())
    }

    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            model: config.model.clone(),
            dimension: config.dimension,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Default for TextEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingService for TextEmbedding {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if std::env::var("OPENAI_API_KEY").is_err() {
            return Err(DomainError::validation("OPENAI_API_KEY is not set"));
        }

        let client = openai::Client::from_env();
        let model = client.embedding_model(&self.model);

        let mut builder = EmbeddingsBuilder::new(model);
        for text in texts {
            builder = builder
                .document(*text)
                .map_err(|e| DomainError::external(e.to_string()))?;
        }

        let embeddings = builder
            .build()
            .await
            .map_err(|e| DomainError::external(e.to_string()))?;

        Ok(embeddings
            .into_iter()
            .map(|(_doc, emb)| Embedding::from(emb.first().vec))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let embedding = TextEmbedding::from_config(&EmbeddingConfig {
            model: "text-embedding-3-large".into(),
            dimension: 3072,
        });

        assert_eq!(embedding.model(), "text-embedding-3-large");
        assert_eq!(embedding.dimension(), 3072);
    }

    #[tokio::test]
    async fn test_empty_batch_needs_no_request() {
        let embeddings = TextEmbedding::new().embed_batch(&[]).await.unwrap();
        assert!(embeddings.is_empty());
    }
}
