use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use crate::domain::{
    ports::{ChatHistoryStore, LlmService},
    trim_messages, ChatPromptTemplate, Conversation, DomainError, Message,
};

/// Chat model with per-session message history.
pub struct ChatService {
    model: Arc<dyn LlmService>,
    store: Arc<dyn ChatHistoryStore>,
    prompt: ChatPromptTemplate,
    defaults: HashMap<String, String>,
    max_messages: usize,
}

impl ChatService {
    /// `system` is rendered ahead of the session history on every turn.
    pub fn new(
        model: Arc<dyn LlmService>,
        store: Arc<dyn ChatHistoryStore>,
        system: &str,
    ) -> Result<Self, DomainError> {
        let prompt = ChatPromptTemplate::new()
            .system(system)?
            .history()
            .user("{input}")?;

        Ok(Self {
            model,
            store,
            prompt,
            defaults: HashMap::new(),
            max_messages: 10,
        })
    }

    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages;
        self
    }

    /// Value used for a prompt variable the caller leaves out.
    pub fn with_default(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    #[instrument(skip(self, message, vars))]
    pub async fn send(
        &self,
        session_id: &str,
        message: &str,
        vars: HashMap<String, String>,
    ) -> Result<String, DomainError> {
        if session_id.trim().is_empty() {
            return Err(DomainError::validation("session id must not be empty"));
        }

        let history = self.store.get(session_id).await?;
        let window = trim_messages(&history, self.max_messages);

        let mut vars: HashMap<String, String> = self
            .defaults
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .chain(vars)
            .collect();
        vars.insert("input".to_string(), message.to_string());

        let messages = self.prompt.format_messages(&vars, window)?;
        let reply = self.model.generate(&messages).await?;

        self.store
            .append(
                session_id,
                &[Message::user(message), Message::assistant(reply.as_str())],
            )
            .await?;

        tracing::info!(session_id, history_len = history.len() + 2, "chat turn stored");
        Ok(reply)
    }

    pub async fn history(&self, session_id: &str) -> Result<Conversation, DomainError> {
        let messages = self.store.get(session_id).await?;
        Ok(Conversation::with_messages(session_id, messages))
    }

    pub async fn clear(&self, session_id: &str) -> Result<(), DomainError> {
        self.store.clear(session_id).await
    }

    pub async fn sessions(&self) -> Result<Vec<String>, DomainError> {
        self.store.sessions().await
    }
}
