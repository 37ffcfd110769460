use std::sync::Arc;

use crate::application::{
    ChatService, GraphQaService, PromptChain, QaService, QueryAnalyzer, RagService,
};
use crate::domain::{
    ports::{ChatHistoryStore, EmbeddingService, GraphStore, LlmService, VectorStore},
    DomainError,
};
use crate::infrastructure::{AppConfig, ChatAgent, RedisPool};

/// Adapters the services are wired over.
pub struct Ports {
    pub llm: Arc<dyn LlmService>,
    pub embedding: Arc<dyn EmbeddingService>,
    pub vector_store: Arc<dyn VectorStore>,
    pub history: Arc<dyn ChatHistoryStore>,
    pub agent_memory: Arc<dyn ChatHistoryStore>,
    pub graph: Option<Arc<dyn GraphStore>>,
    pub redis_pool: Option<RedisPool>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub translation: Arc<PromptChain>,
    pub chat: Arc<ChatService>,
    pub rag: Arc<RagService>,
    pub analyzer: Arc<QueryAnalyzer>,
    pub qa: Arc<QaService>,
    pub graph_qa: Option<Arc<GraphQaService>>,
    pub agent: Arc<ChatAgent>,
    pub redis_pool: Option<RedisPool>,
}

impl AppState {
    /// Builds every service from `config` over the given adapters. Fails
    /// when a configured prompt does not parse.
    pub fn new(config: AppConfig, ports: Ports) -> Result<Self, DomainError> {
        let settings = &config.config;
        let prompts = &config.prompts;

        let translation = PromptChain::from_templates(
            &prompts.translation.system,
            &prompts.translation.user,
            ports.llm.clone(),
        )?
        .with_batch_concurrency(settings.chain.batch_concurrency);

        let chat = ChatService::new(ports.llm.clone(), ports.history, &prompts.chat.system)?
            .with_max_messages(settings.history.max_messages)
            .with_default("language", &prompts.chat.default_language);

        let rag = Arc::new(
            RagService::new(ports.embedding, ports.vector_store, settings.rag.top_k)
                .with_chunk_size(settings.rag.chunk_size),
        );

        let analyzer = Arc::new(QueryAnalyzer::new(
            ports.llm.clone(),
            &prompts.query_analysis.system,
        )?);

        let mut qa = QaService::new(rag.clone(), ports.llm.clone(), &prompts.qa.system)?;
        if settings.rag.query_analysis {
            qa = qa.with_analyzer(analyzer.clone());
        }

        let graph_qa = match (ports.graph, &settings.graph) {
            (Some(graph), Some(graph_config)) => Some(Arc::new(
                GraphQaService::new(
                    graph,
                    ports.llm.clone(),
                    &prompts.graph.cypher_generation,
                    &prompts.graph.answer,
                )?
                .with_allow_writes(graph_config.allow_writes)
                .with_top_k(graph_config.top_k),
            )),
            _ => None,
        };

        let agent = ChatAgent::new(rag.clone(), graph_qa.clone(), ports.agent_memory, &config);

        Ok(Self {
            translation: Arc::new(translation),
            chat: Arc::new(chat),
            rag,
            analyzer,
            qa: Arc::new(qa),
            graph_qa,
            agent: Arc::new(agent),
            redis_pool: ports.redis_pool,
            config: Arc::new(config),
        })
    }
}
