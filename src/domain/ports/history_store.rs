use async_trait::async_trait;

use crate::domain::{errors::DomainError, Message};

/// Per-session message log. Each session id maps to an append-only ordered
/// list that is created on first append; unknown ids read as empty.
#[async_trait]
pub trait ChatHistoryStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Vec<Message>, DomainError>;
    async fn append(&self, session_id: &str, messages: &[Message]) -> Result<(), DomainError>;
    async fn clear(&self, session_id: &str) -> Result<(), DomainError>;
    async fn sessions(&self) -> Result<Vec<String>, DomainError>;
}
