mod graph_query;
mod knowledge_base;

pub use graph_query::{GraphQueryArgs, GraphQueryError, GraphQueryTool};
pub use knowledge_base::{KnowledgeBaseArgs, KnowledgeBaseError, KnowledgeBaseTool};
