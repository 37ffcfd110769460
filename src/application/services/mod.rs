mod chain;
mod chat;
mod graph_qa;
mod qa;
mod query_analysis;
mod rag;

pub use chain::PromptChain;
pub use chat::ChatService;
pub use graph_qa::{GraphAnswer, GraphQaService};
pub use qa::{format_context, QaAnswer, QaService};
pub use query_analysis::QueryAnalyzer;
pub use rag::RagService;
