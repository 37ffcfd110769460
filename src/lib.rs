//! LLM application backends: prompt chains, chat with per-session history,
//! retrieval-augmented QA with query analysis, graph-database QA, and a
//! tool-calling agent, served over HTTP.

pub mod api;
pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
pub(crate) mod testing;
