use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::{anthropic, gemini};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::application::{GraphQaService, RagService};
use crate::domain::{
    ports::{render_history, ChatHistoryStore},
    trim_messages, Conversation, DomainError, Message,
};
use crate::infrastructure::config::{AppConfig, LlmProvider, ToolsConfig};
use crate::infrastructure::llm::openai_client;
use crate::infrastructure::tools::{GraphQueryTool, KnowledgeBaseTool};

/// Builds a rig agent with both tools and runs one multi-turn prompt.
macro_rules! run_tool_agent {
    ($client:expr, $agent:expr, $prompt:expr) => {{
        let agent = $agent;
        $client
            .agent(&agent.model)
            .preamble(&agent.system_prompt)
            .tool(agent.knowledge_base_tool())
            .tool(agent.graph_tool())
            .build()
            .prompt($prompt)
            .multi_turn(agent.max_turns)
            .await
    }};
}

/// Tool-calling agent with per-thread memory.
///
/// The model decides when to call `knowledge_base` or `graph_query`; each
/// thread keeps its own transcript in `memory` so follow-up questions can
/// refer back to earlier answers.
pub struct ChatAgent {
    provider: LlmProvider,
    model: String,
    system_prompt: String,
    rag: Arc<RagService>,
    graph_qa: Option<Arc<GraphQaService>>,
    memory: Arc<dyn ChatHistoryStore>,
    tools: ToolsConfig,
    top_k: usize,
    max_turns: usize,
    memory_window: usize,
    timeout: Duration,
    api_key: Option<String>,
    base_url: Option<String>,
}

impl ChatAgent {
    pub fn new(
        rag: Arc<RagService>,
        graph_qa: Option<Arc<GraphQaService>>,
        memory: Arc<dyn ChatHistoryStore>,
        config: &AppConfig,
    ) -> Self {
        let settings = &config.config;
        Self {
            provider: settings.llm.provider,
            model: settings.llm.model.clone(),
            system_prompt: config.prompts.agent.system.clone(),
            rag,
            graph_qa,
            memory,
            tools: settings.tools.clone(),
            top_k: settings.rag.top_k,
            max_turns: settings.agent.max_turns,
            memory_window: settings.agent.memory_window,
            timeout: Duration::from_secs(settings.llm.timeout_seconds),
            api_key: None,
            base_url: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_memory_window(mut self, window: usize) -> Self {
        self.memory_window = window;
        self
    }

    /// OpenAI-compatible endpoint to use instead of `OPENAI_BASE_URL` and
    /// `OPENAI_API_KEY`.
    pub fn with_openai_endpoint(
        mut self,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        self.base_url = Some(base_url.into());
        self.api_key = Some(api_key.into());
        self
    }

    /// Answers `message` in the context of `thread_id` and records the
    /// exchange in that thread's memory.
    #[instrument(skip(self, message), fields(model = %self.model))]
    pub async fn run(&self, thread_id: &str, message: &str) -> Result<String, DomainError> {
        if thread_id.trim().is_empty() {
            return Err(DomainError::validation("thread_id must not be empty"));
        }
        if message.trim().is_empty() {
            return Err(DomainError::validation("message must not be empty"));
        }

        let prompt = self.prompt_for(thread_id, message).await?;
        let reply = tokio::time::timeout(self.timeout, self.execute(&prompt))
            .await
            .map_err(|_| DomainError::timeout("Agent execution timed out"))??;

        self.remember(thread_id, message, &reply).await?;
        tracing::info!(thread_id, "agent turn completed");
        Ok(reply)
    }

    /// Full transcript recorded for a thread.
    pub async fn memory(&self, thread_id: &str) -> Result<Conversation, DomainError> {
        let messages = self.memory.get(thread_id).await?;
        Ok(Conversation::with_messages(thread_id, messages))
    }

    pub async fn forget(&self, thread_id: &str) -> Result<(), DomainError> {
        self.memory.clear(thread_id).await
    }

    async fn prompt_for(&self, thread_id: &str, message: &str) -> Result<String, DomainError> {
        let history = self.memory.get(thread_id).await?;
        let recent = trim_messages(&history, self.memory_window);
        Ok(render_history(recent, message))
    }

    async fn remember(
        &self,
        thread_id: &str,
        message: &str,
        reply: &str,
    ) -> Result<(), DomainError> {
        self.memory
            .append(thread_id, &[Message::user(message), Message::assistant(reply)])
            .await
    }

    async fn execute(&self, prompt: &str) -> Result<String, DomainError> {
        let result = match self.provider {
            LlmProvider::OpenAi => {
                let client = openai_client(self.api_key.as_deref(), self.base_url.as_deref())?;
                run_tool_agent!(client, self, prompt)
            }
            LlmProvider::Anthropic => run_tool_agent!(anthropic::Client::from_env(), self, prompt),
            LlmProvider::Gemini => run_tool_agent!(gemini::Client::from_env(), self, prompt),
        };

        result.map_err(|e| DomainError::external(format!("Agent failed: {e}")))
    }

    fn knowledge_base_tool(&self) -> KnowledgeBaseTool {
        KnowledgeBaseTool::new(
            self.rag.clone(),
            self.top_k,
            self.tools.knowledge_base.clone(),
        )
    }

    fn graph_tool(&self) -> GraphQueryTool {
        GraphQueryTool::new(self.graph_qa.clone(), self.tools.graph_query.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{InMemoryChatHistory, InMemoryVectorStore};
    use crate::testing::{chat_completion, serve_json_once, KeywordEmbedding};

    fn agent(memory: Arc<InMemoryChatHistory>) -> ChatAgent {
        let rag = Arc::new(RagService::new(
            Arc::new(KeywordEmbedding::new(&["agent"])),
            Arc::new(InMemoryVectorStore::new()),
            2,
        ));
        ChatAgent::new(rag, None, memory, &AppConfig::default())
    }

    #[tokio::test]
    async fn test_first_turn_prompt_is_message() {
        let agent = agent(Arc::new(InMemoryChatHistory::new()));
        let prompt = agent.prompt_for("t1", "hi, I'm Bob").await.unwrap();
        assert_eq!(prompt, "hi, I'm Bob");
    }

    #[tokio::test]
    async fn test_memory_is_per_thread_and_windowed() {
        let memory = Arc::new(InMemoryChatHistory::new());
        let agent = agent(memory.clone()).with_memory_window(2);

        agent.remember("t1", "hi, I'm Bob", "Hello Bob").await.unwrap();
        agent.remember("t1", "I like rust", "Nice").await.unwrap();
        agent.remember("t2", "other thread", "ok").await.unwrap();

        let prompt = agent.prompt_for("t1", "what's my name?").await.unwrap();
        assert_eq!(
            prompt,
            "Previous conversation:\nUser: I like rust\nAssistant: Nice\n\n\
             Current message from user: what's my name?"
        );

        let transcript = agent.memory("t1").await.unwrap();
        assert_eq!(transcript.messages.len(), 4);
        assert_eq!(transcript.messages[0], Message::user("hi, I'm Bob"));

        agent.forget("t1").await.unwrap();
        assert!(agent.memory("t1").await.unwrap().messages.is_empty());
        assert_eq!(agent.memory("t2").await.unwrap().messages.len(), 2);
    }

    #[tokio::test]
    async fn test_openai_agent_uses_chat_completions() {
        let (base_url, server) = serve_json_once(chat_completion("Hello Bob")).await;
        let memory = Arc::new(InMemoryChatHistory::new());
        let agent = agent(memory.clone())
            .with_model("mistral-7b-instruct-v0.3")
            .with_openai_endpoint(base_url, "local")
            .with_timeout(Duration::from_secs(10));

        let reply = agent.run("t1", "hi, I'm Bob").await.unwrap();
        let request_line = server.await.unwrap();

        assert_eq!(reply, "Hello Bob");
        assert!(
            request_line.starts_with("POST /v1/chat/completions "),
            "unexpected request: {request_line}"
        );
        assert_eq!(agent.memory("t1").await.unwrap().messages.len(), 2);
    }

    #[tokio::test]
    async fn test_run_validates_input() {
        let agent = agent(Arc::new(InMemoryChatHistory::new()));

        assert!(matches!(agent.run("", "hi").await, Err(DomainError::Validation(_))));
        assert!(matches!(agent.run("t1", " ").await, Err(DomainError::Validation(_))));
    }
}
