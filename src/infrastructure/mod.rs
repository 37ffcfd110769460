pub mod agent;
pub mod config;
pub mod embedding;
pub mod graph;
pub mod history;
pub mod llm;
pub mod tools;
pub mod vector_store;

pub use agent::ChatAgent;
pub use config::{AppConfig, Config, PromptsConfig};
pub use embedding::TextEmbedding;
pub use graph::Neo4jGraph;
pub use history::{create_pool, InMemoryChatHistory, RedisChatHistory, RedisPool};
pub use llm::{api_key_var, RigLlm};
pub use tools::{GraphQueryTool, KnowledgeBaseTool};
pub use vector_store::{InMemoryVectorStore, QdrantVectorStore};
