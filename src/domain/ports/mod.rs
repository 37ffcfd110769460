mod embedding;
mod graph_store;
mod history_store;
mod llm;
mod vector_store;

pub use embedding::EmbeddingService;
pub use graph_store::GraphStore;
pub use history_store::ChatHistoryStore;
pub use llm::{render_history, LlmService, TextStream};
pub use vector_store::VectorStore;
