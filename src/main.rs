use llm_apps::api::{create_router, AppState, Ports};
use llm_apps::domain::ports::{ChatHistoryStore, GraphStore, VectorStore};
use llm_apps::infrastructure::config::{HistoryBackend, VectorBackend};
use llm_apps::infrastructure::{
    create_pool, AppConfig, InMemoryChatHistory, InMemoryVectorStore, Neo4jGraph,
    QdrantVectorStore, RedisChatHistory, RigLlm, TextEmbedding,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "api=debug,llm_apps=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f == "json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn build_ports(config: &AppConfig) -> anyhow::Result<Ports> {
    let settings = &config.config;

    let llm = Arc::new(RigLlm::from_config(&settings.llm)?);
    info!(provider = ?settings.llm.provider, model = %settings.llm.model, "LLM configured");

    let vector_store: Arc<dyn VectorStore> = match settings.vector_store.backend {
        VectorBackend::InMemory => Arc::new(InMemoryVectorStore::new()),
        VectorBackend::Qdrant => Arc::new(
            QdrantVectorStore::new(
                &settings.vector_store.url,
                &settings.vector_store.collection,
                settings.embedding.dimension,
            )
            .await?,
        ),
    };
    info!(backend = ?settings.vector_store.backend, "vector store initialized");

    let (history, agent_memory, redis_pool): (
        Arc<dyn ChatHistoryStore>,
        Arc<dyn ChatHistoryStore>,
        _,
    ) = match settings.history.backend {
        HistoryBackend::InMemory => (
            Arc::new(InMemoryChatHistory::new()),
            Arc::new(InMemoryChatHistory::new()),
            None,
        ),
        HistoryBackend::Redis => {
            let pool = create_pool(&settings.history.redis_url)?;
            (
                Arc::new(
                    RedisChatHistory::new(pool.clone(), &settings.history.key_prefix)
                        .with_ttl(settings.history.ttl_seconds),
                ),
                Arc::new(RedisChatHistory::new(pool.clone(), &settings.agent.memory_key_prefix)),
                Some(pool),
            )
        }
    };
    info!(backend = ?settings.history.backend, "chat history initialized");

    let graph = match &settings.graph {
        Some(graph_config) => {
            info!(
                url = %graph_config.url,
                database = %graph_config.database,
                "graph database configured"
            );
            Some(Arc::new(Neo4jGraph::new(graph_config)?) as Arc<dyn GraphStore>)
        }
        None => None,
    };

    Ok(Ports {
        llm,
        embedding: Arc::new(TextEmbedding::from_config(&settings.embedding)),
        vector_store,
        history,
        agent_memory,
        graph,
        redis_pool,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::load()?;
    let ports = build_ports(&config).await?;

    let addr = SocketAddr::new(config.config.server.host.parse()?, config.config.server.port);
    let state = AppState::new(config, ports)?;
    let app = create_router(state);

    info!("API server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
