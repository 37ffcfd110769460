use rig::completion::ToolDefinition;
use rig::tool::Tool;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::application::GraphQaService;
use crate::infrastructure::config::GraphQueryToolConfig;

#[derive(Debug, thiserror::Error)]
#[error("Graph query error: {0}")]
pub struct GraphQueryError(pub String);

#[derive(Debug, Deserialize, Serialize)]
pub struct GraphQueryArgs {
    pub question: String,
}

/// Graph QA exposed to the agent. Answers with a fixed message when no
/// graph database is configured.
pub struct GraphQueryTool {
    graph_qa: Option<Arc<GraphQaService>>,
    config: GraphQueryToolConfig,
}

impl GraphQueryTool {
    pub fn new(graph_qa: Option<Arc<GraphQaService>>, config: GraphQueryToolConfig) -> Self {
        Self { graph_qa, config }
    }
}

impl Tool for GraphQueryTool {
    const NAME: &'static str = "graph_query";

    type Error = GraphQueryError;
    type Args = GraphQueryArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: self.config.description.clone(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "question": {
                        "type": "string",
                        "description": "A natural-language question about the graph data"
                    }
                },
                "required": ["question"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let Some(graph_qa) = &self.graph_qa else {
            return Ok(self.config.unavailable_message.clone());
        };

        tracing::info!(question = %args.question, "graph_query tool called");
        graph_qa
            .ask(&args.question)
            .await
            .map(|answer| answer.answer)
            .map_err(|e| GraphQueryError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CypherResult;
    use crate::testing::{StubGraph, StubLlm};

    #[tokio::test]
    async fn test_unconfigured_graph() {
        let tool = GraphQueryTool::new(None, GraphQueryToolConfig::default());
        let output = tool
            .call(GraphQueryArgs {
                question: "Who directed Casino?".into(),
            })
            .await
            .unwrap();

        assert_eq!(output, "The graph database is not configured.");
    }

    #[tokio::test]
    async fn test_delegates_to_graph_qa() {
        let graph = Arc::new(StubGraph {
            result: CypherResult {
                columns: vec!["name".into()],
                rows: vec![vec![json!("Martin Scorsese")]],
            },
            ..Default::default()
        });
        let llm = Arc::new(StubLlm::with_replies(&[
            "MATCH (p)-[:DIRECTED]->(m) RETURN p.name AS name",
            "Martin Scorsese directed Casino.",
        ]));
        let qa = GraphQaService::new(graph, llm, "{schema} {question}", "{context} {question}")
            .unwrap();
        let tool = GraphQueryTool::new(Some(Arc::new(qa)), GraphQueryToolConfig::default());

        let output = tool
            .call(GraphQueryArgs {
                question: "Who directed Casino?".into(),
            })
            .await
            .unwrap();

        assert_eq!(output, "Martin Scorsese directed Casino.");
    }
}
