use rig::completion::ToolDefinition;
use rig::tool::Tool;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::application::RagService;
use crate::domain::{publish_year_filter, SearchResult};
use crate::infrastructure::config::KnowledgeBaseToolConfig;

#[derive(Debug, thiserror::Error)]
#[error("Knowledge base error: {0}")]
pub struct KnowledgeBaseError(pub String);

#[derive(Debug, Deserialize, Serialize)]
pub struct KnowledgeBaseArgs {
    pub query: String,
    #[serde(default)]
    pub publish_year: Option<i32>,
}

/// Retriever exposed to the agent as a tool.
pub struct KnowledgeBaseTool {
    rag: Arc<RagService>,
    top_k: usize,
    config: KnowledgeBaseToolConfig,
}

impl KnowledgeBaseTool {
    pub fn new(rag: Arc<RagService>, top_k: usize, config: KnowledgeBaseToolConfig) -> Self {
        Self { rag, top_k, config }
    }

    pub fn with_defaults(rag: Arc<RagService>) -> Self {
        let top_k = rag.default_top_k();
        Self::new(rag, top_k, KnowledgeBaseToolConfig::default())
    }

    fn render(&self, results: &[SearchResult]) -> String {
        if results.is_empty() {
            return self.config.no_results_message.clone();
        }

        results
            .iter()
            .enumerate()
            .map(|(i, r)| match &r.chunk.metadata.source {
                Some(source) => format!("[{}] ({}) {}", i + 1, source, r.chunk.content),
                None => format!("[{}] {}", i + 1, r.chunk.content),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl Tool for KnowledgeBaseTool {
    const NAME: &'static str = "knowledge_base";

    type Error = KnowledgeBaseError;
    type Args = KnowledgeBaseArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: self.config.description.clone(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query"
                    },
                    "publish_year": {
                        "type": "integer",
                        "description": "Only return documents published in this year"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        tracing::info!(
            query = %args.query,
            publish_year = ?args.publish_year,
            "knowledge_base tool called"
        );
        let filter = publish_year_filter(args.publish_year);
        let results = self
            .rag
            .retrieve_filtered(&args.query, self.top_k, filter.as_ref())
            .await
            .map_err(|e| KnowledgeBaseError(e.to_string()))?;

        Ok(self.render(&results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChunkMetadata;
    use crate::infrastructure::InMemoryVectorStore;
    use crate::testing::KeywordEmbedding;

    async fn tool() -> KnowledgeBaseTool {
        let rag = RagService::new(
            Arc::new(KeywordEmbedding::new(&["agent", "tool"])),
            Arc::new(InMemoryVectorStore::new()),
            3,
        );
        rag.ingest(
            "a",
            "Agents call tools.",
            ChunkMetadata::default().with_publish_year(2024).with_source("video-1"),
        )
        .await
        .unwrap();
        rag.ingest("b", "Agent memory.", ChunkMetadata::default().with_publish_year(2023))
            .await
            .unwrap();
        KnowledgeBaseTool::with_defaults(Arc::new(rag))
    }

    #[tokio::test]
    async fn test_call_formats_numbered_results() {
        let tool = tool().await;
        let output = tool
            .call(KnowledgeBaseArgs {
                query: "agent tool".into(),
                publish_year: None,
            })
            .await
            .unwrap();

        assert!(output.starts_with("[1] (video-1) Agents call tools."));
        assert!(output.contains("[2] Agent memory."));
    }

    #[tokio::test]
    async fn test_call_with_year_and_no_results() {
        let tool = tool().await;

        let output = tool
            .call(KnowledgeBaseArgs {
                query: "agent".into(),
                publish_year: Some(2023),
            })
            .await
            .unwrap();
        assert_eq!(output, "[1] Agent memory.");

        let output = tool
            .call(KnowledgeBaseArgs {
                query: "agent".into(),
                publish_year: Some(1999),
            })
            .await
            .unwrap();
        assert_eq!(output, "No relevant documents found.");
    }

    #[tokio::test]
    async fn test_definition_lists_year_parameter() {
        let definition = tool().await.definition(String::new()).await;

        assert_eq!(definition.name, "knowledge_base");
        assert_eq!(definition.parameters["required"], json!(["query"]));
        assert!(definition.parameters["properties"]["publish_year"].is_object());
    }
}
