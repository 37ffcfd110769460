mod conversation;
mod document;
mod embedding;
mod filter;
mod graph;
mod parser;
mod prompt;

pub use conversation::{trim_messages, Conversation, Message, MessageRole};
pub use document::{chunk_content, ChunkMetadata, Document, DocumentChunk, SearchResult};
pub use embedding::Embedding;
pub use filter::{publish_year_filter, MetadataFilter, SearchQuery, PUBLISH_YEAR_FIELD};
pub use graph::{
    ensure_read_only, extract_cypher, CypherResult, GraphSchema, PropertySchema,
    RelationshipPattern,
};
pub use parser::{parse_json, strip_code_fence, OutputParser};
pub use prompt::{ChatPromptPart, ChatPromptTemplate, PromptTemplate};
