//! Application configuration.
//!
//! Settings come from `config.yaml` and prompt texts from `prompts.yaml`,
//! both under `APP_CONFIG_DIR` (default `config`). A missing file falls back
//! to built-in defaults. Selected environment variables override the files.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::domain::DomainError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub config: Config,
    pub prompts: PromptsConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, DomainError> {
        let dir = std::env::var("APP_CONFIG_DIR").unwrap_or_else(|_| "config".into());
        let mut config = Self::from_dir(dir)?;
        config.config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let dir = dir.as_ref();
        Ok(Self {
            config: read_yaml(dir.join("config.yaml"))?.unwrap_or_default(),
            prompts: read_yaml(dir.join("prompts.yaml"))?.unwrap_or_default(),
        })
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: PathBuf) -> Result<Option<T>, DomainError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| DomainError::internal(format!("{}: {e}", path.display())))?;
    serde_yaml::from_str(&raw)
        .map(Some)
        .map_err(|e| DomainError::validation(format!("{}: {e}", path.display())))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub vector_store: VectorStoreConfig,
    pub rag: RagConfig,
    pub history: HistoryConfig,
    pub chain: ChainConfig,
    pub graph: Option<GraphConfig>,
    pub agent: AgentConfig,
    pub tools: ToolsConfig,
}

impl Config {
    fn apply_env_overrides(&mut self) {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        if let Some(host) = var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("SERVER_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(keys) = var("API_KEYS") {
            self.server.api_keys = keys.split(',').map(|k| k.trim().to_string()).collect();
        }
        if let Some(provider) = var("LLM_PROVIDER").and_then(|p| LlmProvider::parse(&p)) {
            self.llm.provider = provider;
        }
        if let Some(model) = var("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = var("REDIS_URL") {
            self.history.backend = HistoryBackend::Redis;
            self.history.redis_url = url;
        }
        if let Some(url) = var("QDRANT_URL") {
            self.vector_store.backend = VectorBackend::Qdrant;
            self.vector_store.url = url;
        }
        if let Some(url) = var("NEO4J_URL") {
            let graph = self.graph.get_or_insert_with(GraphConfig::default);
            graph.url = url;
            if let Some(user) = var("NEO4J_USERNAME") {
                graph.username = user;
            }
            if let Some(password) = var("NEO4J_PASSWORD") {
                graph.password = password;
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Accepted `X-API-Key` values. Empty leaves the API open.
    pub api_keys: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            api_keys: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAi,
    Anthropic,
    Gemini,
}

impl LlmProvider {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "anthropic" => Some(Self::Anthropic),
            "gemini" => Some(Self::Gemini),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            model: "gpt-4o-mini".to_string(),
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorBackend {
    #[default]
    InMemory,
    Qdrant,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub backend: VectorBackend,
    pub url: String,
    pub collection: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::InMemory,
            url: "http://localhost:6334".to_string(),
            collection: "knowledge_base".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub top_k: usize,
    pub chunk_size: usize,
    /// Run query analysis before retrieval in the QA service.
    pub query_analysis: bool,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            chunk_size: 1000,
            query_analysis: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryBackend {
    #[default]
    InMemory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub backend: HistoryBackend,
    pub redis_url: String,
    pub key_prefix: String,
    pub ttl_seconds: Option<u64>,
    /// Number of most recent messages sent to the model with each turn.
    pub max_messages: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: HistoryBackend::InMemory,
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "message_store".to_string(),
            ttl_seconds: None,
            max_messages: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub batch_concurrency: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            batch_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub url: String,
    pub database: String,
    pub username: String,
    pub password: String,
    /// Permit generated Cypher to contain write clauses.
    pub allow_writes: bool,
    /// Maximum result records handed to the answer prompt.
    pub top_k: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:7474".to_string(),
            database: "neo4j".to_string(),
            username: "neo4j".to_string(),
            password: String::new(),
            allow_writes: false,
            top_k: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_turns: usize,
    pub memory_window: usize,
    pub memory_key_prefix: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: 5,
            memory_window: 20,
            memory_key_prefix: "agent_memory".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub knowledge_base: KnowledgeBaseToolConfig,
    pub graph_query: GraphQueryToolConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KnowledgeBaseToolConfig {
    pub description: String,
    pub no_results_message: String,
}

impl Default for KnowledgeBaseToolConfig {
    fn default() -> Self {
        Self {
            description: "Search the knowledge base for relevant information. \
                          Pass publish_year to restrict results to documents from that year."
                .to_string(),
            no_results_message: "No relevant documents found.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphQueryToolConfig {
    pub description: String,
    pub unavailable_message: String,
}

impl Default for GraphQueryToolConfig {
    fn default() -> Self {
        Self {
            description: "Answer a question from the graph database.".to_string(),
            unavailable_message: "The graph database is not configured.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub translation: TranslationPrompts,
    pub chat: ChatPrompts,
    pub query_analysis: QueryAnalysisPrompts,
    pub qa: QaPrompts,
    pub graph: GraphPrompts,
    pub agent: AgentPrompts,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranslationPrompts {
    pub system: String,
    pub user: String,
}

impl Default for TranslationPrompts {
    fn default() -> Self {
        Self {
            system: "Translate the following into {language}:".to_string(),
            user: "{text}".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatPrompts {
    pub system: String,
    pub default_language: String,
}

impl Default for ChatPrompts {
    fn default() -> Self {
        Self {
            system: "You are a helpful assistant. Answer all questions to the best of your \
                     ability in {language}."
                .to_string(),
            default_language: "English".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueryAnalysisPrompts {
    pub system: String,
}

impl Default for QueryAnalysisPrompts {
    fn default() -> Self {
        Self {
            system: "You are an expert at converting user questions into database queries. \
                     You have access to a database of tutorial videos about a software library \
                     for building LLM-powered applications. Given a question, return a database \
                     query optimized to retrieve the most relevant results.\n\n\
                     If there are acronyms or words you are not familiar with, do not try to \
                     rephrase them.\n\n\
                     Respond with only a JSON object of the form \
                     {{\"query\": string, \"publish_year\": integer or null}}. Set publish_year \
                     only when the question asks about videos published in a specific year."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QaPrompts {
    pub system: String,
}

impl Default for QaPrompts {
    fn default() -> Self {
        Self {
            system: "You are an assistant for question-answering tasks. Use the following pieces \
                     of retrieved context to answer the question. If you don't know the answer, \
                     say that you don't know. Use three sentences maximum and keep the answer \
                     concise.\n\n{context}"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphPrompts {
    pub cypher_generation: String,
    pub answer: String,
}

impl Default for GraphPrompts {
    fn default() -> Self {
        Self {
            cypher_generation: "Task: Generate Cypher statement to query a graph database.\n\
                                Instructions:\n\
                                Use only the provided relationship types and properties in the \
                                schema.\n\
                                Do not use any other relationship types or properties that are \
                                not provided.\n\
                                Schema:\n{schema}\n\
                                Note: Do not include any explanations or apologies in your \
                                responses.\n\
                                Do not include any text except the generated Cypher statement.\n\n\
                                The question is:\n{question}"
                .to_string(),
            answer: "You are an assistant that helps to form nice and human understandable \
                     answers.\n\
                     The information part contains the provided information that you must use \
                     to construct an answer.\n\
                     The provided information is authoritative, you must never doubt it or try \
                     to use your internal knowledge to correct it.\n\
                     If the provided information is empty, say that you don't know the answer.\n\
                     Information:\n{context}\n\n\
                     Question: {question}\n\
                     Helpful Answer:"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentPrompts {
    pub system: String,
}

impl Default for AgentPrompts {
    fn default() -> Self {
        Self {
            system: "You are a helpful assistant. Use the knowledge_base tool to look up \
                     documentation and the graph_query tool for questions about data in the \
                     graph database. Answer concisely."
                .to_string(),
        }
    }
}
