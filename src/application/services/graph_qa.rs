use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use crate::domain::{
    ensure_read_only, extract_cypher, ports::GraphStore, ports::LlmService, DomainError,
    PromptTemplate,
};

#[derive(Debug, Clone, Serialize)]
pub struct GraphAnswer {
    pub answer: String,
    pub cypher: String,
    pub records: Vec<serde_json::Value>,
}

/// Question answering over a graph database: the model writes Cypher from the
/// schema, the store runs it, and the model phrases the records as an answer.
pub struct GraphQaService {
    graph: Arc<dyn GraphStore>,
    model: Arc<dyn LlmService>,
    cypher_prompt: PromptTemplate,
    answer_prompt: PromptTemplate,
    allow_writes: bool,
    top_k: usize,
}

impl GraphQaService {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        model: Arc<dyn LlmService>,
        cypher_prompt: &str,
        answer_prompt: &str,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            graph,
            model,
            cypher_prompt: PromptTemplate::new(cypher_prompt)?,
            answer_prompt: PromptTemplate::new(answer_prompt)?,
            allow_writes: false,
            top_k: 10,
        })
    }

    pub fn with_allow_writes(mut self, allow: bool) -> Self {
        self.allow_writes = allow;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[instrument(skip(self))]
    pub async fn ask(&self, question: &str) -> Result<GraphAnswer, DomainError> {
        if question.trim().is_empty() {
            return Err(DomainError::validation("question must not be empty"));
        }

        let schema = self.graph.schema().await?;
        let generation = self.cypher_prompt.format(&HashMap::from([
            ("schema".to_string(), schema.render()),
            ("question".to_string(), question.to_string()),
        ]))?;

        let cypher = extract_cypher(&self.model.complete(&generation).await?);
        if cypher.is_empty() {
            return Err(DomainError::external("model returned no Cypher statement"));
        }
        if !self.allow_writes {
            ensure_read_only(&cypher)?;
        }
        tracing::info!(%cypher, "generated cypher");

        let result = self.graph.query(&cypher, serde_json::json!({})).await?;
        let records: Vec<serde_json::Value> =
            result.to_records().into_iter().take(self.top_k).collect();

        let context = serde_json::to_string(&records)?;
        let prompt = self.answer_prompt.format(&HashMap::from([
            ("context".to_string(), context),
            ("question".to_string(), question.to_string()),
        ]))?;
        let answer = self.model.complete(&prompt).await?;

        Ok(GraphAnswer {
            answer,
            cypher,
            records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CypherResult, GraphSchema, PropertySchema};
    use crate::testing::{StubGraph, StubLlm};
    use serde_json::json;

    fn graph(rows: Vec<Vec<serde_json::Value>>) -> Arc<StubGraph> {
        Arc::new(StubGraph {
            schema: GraphSchema {
                node_properties: vec![PropertySchema {
                    label: "Movie".into(),
                    properties: vec!["title".into(), "released".into()],
                }],
                ..Default::default()
            },
            result: CypherResult {
                columns: vec!["released".into()],
                rows,
            },
            ..Default::default()
        })
    }

    fn service(store: Arc<StubGraph>, llm: Arc<StubLlm>, answer: &str) -> GraphQaService {
        GraphQaService::new(store, llm, "{schema}{question}", answer).unwrap()
    }

    #[tokio::test]
    async fn test_ask_generates_runs_and_answers() {
        let store = graph(vec![vec![json!(1995)]]);
        let llm = Arc::new(StubLlm::with_replies(&[
            "```cypher\nMATCH (m:Movie {title: 'Casino'}) RETURN m.released AS released\n```",
            "Casino was released in 1995.",
        ]));
        let qa = GraphQaService::new(
            store.clone(),
            llm.clone(),
            "Schema:\n{schema}\nQuestion: {question}",
            "Info: {context}\nQ: {question}",
        )
        .unwrap();

        let answer = qa.ask("When was Casino released?").await.unwrap();

        assert_eq!(answer.answer, "Casino was released in 1995.");
        assert_eq!(answer.records, vec![json!({"released": 1995})]);
        assert_eq!(
            store.queries.lock().unwrap().as_slice(),
            ["MATCH (m:Movie {title: 'Casino'}) RETURN m.released AS released"]
        );

        let calls = llm.calls();
        assert!(calls[0].1.contains("Movie {title, released}"));
        assert_eq!(calls[1].1, "Info: [{\"released\":1995}]\nQ: When was Casino released?");
    }

    #[tokio::test]
    async fn test_write_statements_rejected() {
        let store = graph(vec![]);
        let llm = Arc::new(StubLlm::with_replies(&["MATCH (n) DETACH DELETE n"]));
        let qa = service(store.clone(), llm, "{context}{question}");

        let err = qa.ask("delete everything").await;

        assert!(matches!(err, Err(DomainError::Validation(_))));
        assert!(store.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_records_capped_at_top_k() {
        let store = graph((0..5).map(|y| vec![json!(2000 + y)]).collect());
        let llm = Arc::new(StubLlm::with_replies(&["MATCH (m) RETURN m.released AS released"]));
        let qa = service(store, llm, "{context}|{question}").with_top_k(2);

        let answer = qa.ask("years?").await.unwrap();

        assert_eq!(answer.records.len(), 2);
        assert!(answer.answer.starts_with("echo: [{\"released\":2000}"));
    }

    #[tokio::test]
    async fn test_empty_results_still_reach_answer_prompt() {
        let store = graph(vec![]);
        let llm = Arc::new(StubLlm::with_replies(&[
            "MATCH (m:Movie {title: 'Nope'}) RETURN m.released AS released",
            "I don't know the answer.",
        ]));
        let qa = service(store.clone(), llm.clone(), "{context}|{question}");

        let answer = qa.ask("When was Nope released?").await.unwrap();

        assert!(answer.records.is_empty());
        assert_eq!(answer.answer, "I don't know the answer.");
        assert_eq!(store.queries.lock().unwrap().len(), 1);
        assert_eq!(llm.calls()[1].1, "[]|When was Nope released?");
    }

    #[tokio::test]
    async fn test_allow_writes_runs_write_statements() {
        let store = graph(vec![]);
        let llm = Arc::new(StubLlm::with_replies(&["MERGE (m:Movie {title: 'Heat'}) RETURN m"]));
        let qa = service(store.clone(), llm, "{context}{question}").with_allow_writes(true);

        qa.ask("add Heat").await.unwrap();

        assert_eq!(
            store.queries.lock().unwrap().as_slice(),
            ["MERGE (m:Movie {title: 'Heat'}) RETURN m"]
        );
    }

    #[tokio::test]
    async fn test_empty_generation_is_external_error() {
        for reply in ["   ", "```cypher\n```"] {
            let store = graph(vec![]);
            let llm = Arc::new(StubLlm::with_replies(&[reply]));
            let qa = service(store.clone(), llm, "{context}{question}");

            let err = qa.ask("anything").await.unwrap_err();

            assert!(matches!(err, DomainError::ExternalService(ref m) if m.contains("no Cypher")));
            assert!(store.queries.lock().unwrap().is_empty());
        }
    }
}
