use crate::domain::{errors::DomainError, Embedding};
use async_trait::async_trait;

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embeds `texts` in one request, preserving order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError>;

    async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::internal("No embedding returned"))
    }

    fn dimension(&self) -> usize;
}
