//! Application layer - Use cases and orchestration.
//!
//! Services here compose prompts, models, retrievers and stores into the
//! user-facing flows (translation chain, chat with history, retrieval QA,
//! query analysis, graph QA). They depend on domain ports (traits) rather than
//! concrete implementations.

pub mod services;

pub use services::{
    format_context, ChatService, GraphAnswer, GraphQaService, PromptChain, QaAnswer, QaService,
    QueryAnalyzer, RagService,
};
