use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::domain::{errors::DomainError, Message, MessageRole};

/// Reply text as it arrives from the model.
pub type TextStream = BoxStream<'static, Result<String, DomainError>>;

#[async_trait]
pub trait LlmService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, DomainError>;
    async fn complete_with_system(&self, system: &str, prompt: &str)
        -> Result<String, DomainError>;

    /// Continues a conversation. Prior turns are folded into the prompt text.
    async fn chat(
        &self,
        system: &str,
        history: &[Message],
        message: &str,
    ) -> Result<String, DomainError> {
        let prompt = render_history(history, message);
        if system.is_empty() {
            self.complete(&prompt).await
        } else {
            self.complete_with_system(system, &prompt).await
        }
    }

    /// Runs a rendered chat prompt: system messages become the preamble, the
    /// final user message is the prompt, everything between is history.
    async fn generate(&self, messages: &[Message]) -> Result<String, DomainError> {
        let (system, turns, prompt) = split_messages(messages)?;
        self.chat(&system, &turns, &prompt).await
    }

    /// Streams the reply. Adapters without native streaming yield the whole
    /// completion as one chunk.
    async fn stream_with_system(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<TextStream, DomainError> {
        let reply = if system.is_empty() {
            self.complete(prompt).await?
        } else {
            self.complete_with_system(system, prompt).await?
        };
        Ok(stream::once(async move { Ok(reply) }).boxed())
    }

    /// Streaming counterpart of `generate`.
    async fn stream_generate(&self, messages: &[Message]) -> Result<TextStream, DomainError> {
        let (system, turns, prompt) = split_messages(messages)?;
        self.stream_with_system(&system, &render_history(&turns, &prompt))
            .await
    }
}

/// Splits rendered messages into preamble, prior turns and the final user
/// message.
fn split_messages(messages: &[Message]) -> Result<(String, Vec<Message>, String), DomainError> {
    let system = messages
        .iter()
        .filter(|m| m.role == MessageRole::System)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut turns: Vec<Message> = messages
        .iter()
        .filter(|m| m.role != MessageRole::System)
        .cloned()
        .collect();

    if !turns.last().is_some_and(|m| m.role == MessageRole::User) {
        return Err(DomainError::validation(
            "chat prompt must end with a user message",
        ));
    }
    let prompt = turns.pop().map(|m| m.content).unwrap_or_default();
    Ok((system, turns, prompt))
}

/// Flattens prior turns ahead of the current user message.
pub fn render_history(history: &[Message], message: &str) -> String {
    if history.is_empty() {
        return message.to_string();
    }

    let context = history
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Previous conversation:\n{}\n\nCurrent message from user: {}",
        context, message
    )
}
