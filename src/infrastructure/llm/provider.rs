use async_trait::async_trait;
use futures::StreamExt;
use rig::agent::{MultiTurnStreamItem, StreamingResult};
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::{anthropic, gemini, openai};
use rig::streaming::{StreamedAssistantContent, StreamingPrompt};
use std::time::Duration;

use crate::domain::{
    ports::{LlmService, TextStream},
    DomainError,
};
use crate::infrastructure::config::{LlmConfig, LlmProvider};

/// Environment variable holding the provider's API key.
pub fn api_key_var(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::OpenAi => "OPENAI_API_KEY",
        LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
        LlmProvider::Gemini => "GEMINI_API_KEY",
    }
}

/// OpenAI Chat Completions client. Explicit values win over
/// `OPENAI_API_KEY` and `OPENAI_BASE_URL`.
///
/// rig's default OpenAI client speaks the Responses API, which local
/// OpenAI-compatible servers do not serve.
pub fn openai_client(
    api_key: Option<&str>,
    base_url: Option<&str>,
) -> Result<openai::CompletionsClient, DomainError> {
    let api_key = match api_key {
        Some(key) => key.to_string(),
        None => std::env::var("OPENAI_API_KEY")
            .map_err(|_| DomainError::validation("OPENAI_API_KEY is not set"))?,
    };
    let base_url = base_url
        .map(str::to_string)
        .or_else(|| std::env::var("OPENAI_BASE_URL").ok());

    let mut builder = openai::CompletionsClient::builder().api_key(&api_key);
    if let Some(base) = base_url {
        builder = builder.base_url(&base);
    }
    builder
        .build()
        .map_err(|e| DomainError::internal(format!("OpenAI client: {e}")))
}

/// Builds a rig agent, with or without a preamble, and applies `$call` to it.
macro_rules! with_agent {
    ($client:expr, $model:expr, $system:expr, |$agent:ident| $call:expr) => {{
        let client = $client;
        match $system {
            Some(system) => {
                let $agent = client.agent($model).preamble(system).build();
                $call
            }
            None => {
                let $agent = client.agent($model).build();
                $call
            }
        }
    }};
}

/// Keeps the assistant's text deltas; tool and reasoning items are dropped.
fn text_chunks<R: Send + 'static>(stream: StreamingResult<R>) -> TextStream {
    stream
        .filter_map(|item| async move {
            match item {
                Ok(MultiTurnStreamItem::StreamAssistantItem(StreamedAssistantContent::Text(
                    text,
                ))) => Some(Ok(text.text)),
                Ok(_) => None,
                Err(e) => Some(Err(DomainError::external(e.to_string()))),
            }
        })
        .boxed()
}

/// Chat model reached through a `rig` provider client.
///
/// OpenAI-compatible local servers work through the OpenAI provider with
/// `OPENAI_BASE_URL` pointing at them.
pub struct RigLlm {
    provider: LlmProvider,
    model: String,
    timeout: Duration,
    api_key: Option<String>,
    base_url: Option<String>,
}

impl RigLlm {
    pub fn new(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            timeout: Duration::from_secs(60),
            api_key: None,
            base_url: None,
        }
    }

    /// Fails when the provider's API key is not set, rather than letting the
    /// client constructor panic on first use.
    pub fn from_config(config: &LlmConfig) -> Result<Self, DomainError> {
        let var = api_key_var(config.provider);
        if std::env::var(var).map_or(true, |v| v.is_empty()) {
            return Err(DomainError::validation(format!("{var} is not set")));
        }
        Ok(Self::new(config.provider, &config.model)
            .with_timeout(Duration::from_secs(config.timeout_seconds)))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Only the OpenAI provider honours these two overrides.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn openai(&self) -> Result<openai::CompletionsClient, DomainError> {
        openai_client(self.api_key.as_deref(), self.base_url.as_deref())
    }

    async fn run(&self, system: Option<&str>, prompt: &str) -> Result<String, DomainError> {
        let call = async {
            let reply = match self.provider {
                LlmProvider::OpenAi => {
                    with_agent!(self.openai()?, &self.model, system, |agent| {
                        agent.prompt(prompt).await
                    })
                }
                LlmProvider::Anthropic => {
                    with_agent!(anthropic::Client::from_env(), &self.model, system, |agent| {
                        agent.prompt(prompt).await
                    })
                }
                LlmProvider::Gemini => {
                    with_agent!(gemini::Client::from_env(), &self.model, system, |agent| {
                        agent.prompt(prompt).await
                    })
                }
            };
            reply.map_err(|e| DomainError::external(e.to_string()))
        };

        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| DomainError::timeout(format!("{} did not respond", self.model)))?
    }

    /// Opens a token stream. The timeout covers the time to the first
    /// response, not the whole stream.
    async fn open_stream(
        &self,
        system: Option<&str>,
        prompt: &str,
    ) -> Result<TextStream, DomainError> {
        let open = async {
            let chunks = match self.provider {
                LlmProvider::OpenAi => {
                    with_agent!(self.openai()?, &self.model, system, |agent| {
                        text_chunks(agent.stream_prompt(prompt).await)
                    })
                }
                LlmProvider::Anthropic => {
                    with_agent!(anthropic::Client::from_env(), &self.model, system, |agent| {
                        text_chunks(agent.stream_prompt(prompt).await)
                    })
                }
                LlmProvider::Gemini => {
                    with_agent!(gemini::Client::from_env(), &self.model, system, |agent| {
                        text_chunks(agent.stream_prompt(prompt).await)
                    })
                }
            };
            Ok::<_, DomainError>(chunks)
        };

        tokio::time::timeout(self.timeout, open)
            .await
            .map_err(|_| DomainError::timeout(format!("{} did not respond", self.model)))?
    }
}

#[async_trait]
impl LlmService for RigLlm {
    async fn complete(&self, prompt: &str) -> Result<String, DomainError> {
        self.run(None, prompt).await
    }

    async fn complete_with_system(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<String, DomainError> {
        self.run(Some(system), prompt).await
    }

    async fn stream_with_system(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<TextStream, DomainError> {
        let system = Some(system).filter(|s| !s.is_empty());
        self.open_stream(system, prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{chat_completion, serve_json_once};

    #[test]
    fn test_api_key_vars() {
        assert_eq!(api_key_var(LlmProvider::OpenAi), "OPENAI_API_KEY");
        assert_eq!(api_key_var(LlmProvider::Gemini), "GEMINI_API_KEY");
    }

    #[test]
    fn test_builder_keeps_model() {
        let llm = RigLlm::new(LlmProvider::Anthropic, "claude-3-5-haiku-latest")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(llm.provider(), LlmProvider::Anthropic);
        assert_eq!(llm.model(), "claude-3-5-haiku-latest");
        assert_eq!(llm.timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_openai_provider_uses_chat_completions() {
        let (base_url, server) = serve_json_once(chat_completion("hello")).await;

        let llm = RigLlm::new(LlmProvider::OpenAi, "mistral-7b-instruct-v0.3")
            .with_api_key("local")
            .with_base_url(base_url)
            .with_timeout(Duration::from_secs(10));

        let answer = llm.complete_with_system("Be brief.", "hi").await.unwrap();
        let request_line = server.await.unwrap();

        assert_eq!(answer, "hello");
        assert!(
            request_line.starts_with("POST /v1/chat/completions "),
            "unexpected request: {request_line}"
        );
    }

    #[test]
    fn test_openai_client_takes_explicit_key() {
        assert!(openai_client(Some("local"), Some("http://127.0.0.1:1/v1")).is_ok());
    }
}
