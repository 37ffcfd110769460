use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::{ports::ChatHistoryStore, DomainError, Message};

/// Session map held for the lifetime of the process.
#[derive(Default)]
pub struct InMemoryChatHistory {
    sessions: RwLock<HashMap<String, Vec<Message>>>,
}

impl InMemoryChatHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatHistoryStore for InMemoryChatHistory {
    async fn get(&self, session_id: &str) -> Result<Vec<Message>, DomainError> {
        let sessions = self
            .sessions
            .read()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        Ok(sessions.get(session_id).cloned().unwrap_or_default())
    }

    async fn append(&self, session_id: &str, messages: &[Message]) -> Result<(), DomainError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        sessions
            .entry(session_id.to_string())
            .or_default()
            .extend_from_slice(messages);
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<(), DomainError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        sessions.remove(session_id);
        Ok(())
    }

    async fn sessions(&self) -> Result<Vec<String>, DomainError> {
        let sessions = self
            .sessions
            .read()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        let mut ids: Vec<String> = sessions.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
