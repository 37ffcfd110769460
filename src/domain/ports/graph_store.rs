use async_trait::async_trait;

use crate::domain::{errors::DomainError, CypherResult, GraphSchema};

#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn schema(&self) -> Result<GraphSchema, DomainError>;
    async fn query(
        &self,
        cypher: &str,
        params: serde_json::Value,
    ) -> Result<CypherResult, DomainError>;
}
