use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use crate::application::{QueryAnalyzer, RagService};
use crate::domain::{
    ports::LlmService, ChatPromptTemplate, DomainError, SearchQuery, SearchResult,
};

#[derive(Debug, Clone, Serialize)]
pub struct QaAnswer {
    pub answer: String,
    pub query: SearchQuery,
    pub sources: Vec<SearchResult>,
}

/// Retrieval-augmented question answering.
pub struct QaService {
    rag: Arc<RagService>,
    model: Arc<dyn LlmService>,
    analyzer: Option<Arc<QueryAnalyzer>>,
    prompt: ChatPromptTemplate,
}

impl QaService {
    /// `system` must reference `{context}`; the question is sent as the user turn.
    pub fn new(
        rag: Arc<RagService>,
        model: Arc<dyn LlmService>,
        system: &str,
    ) -> Result<Self, DomainError> {
        let prompt = ChatPromptTemplate::new().system(system)?.user("{question}")?;
        Ok(Self {
            rag,
            model,
            analyzer: None,
            prompt,
        })
    }

    pub fn with_analyzer(mut self, analyzer: Arc<QueryAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    #[instrument(skip(self))]
    pub async fn ask(&self, question: &str) -> Result<QaAnswer, DomainError> {
        if question.trim().is_empty() {
            return Err(DomainError::validation("question must not be empty"));
        }

        let top_k = self.rag.default_top_k();
        let (query, sources) = match &self.analyzer {
            Some(analyzer) => analyzer.retrieve(&self.rag, question, top_k).await?,
            None => (
                SearchQuery::new(question),
                self.rag.retrieve_top_k(question, top_k).await?,
            ),
        };

        let vars = HashMap::from([
            ("context".to_string(), format_context(&sources)),
            ("question".to_string(), question.to_string()),
        ]);
        let messages = self.prompt.format_messages(&vars, &[])?;
        let answer = self.model.generate(&messages).await?;

        tracing::info!(sources = sources.len(), "question answered");
        Ok(QaAnswer {
            answer,
            query,
            sources,
        })
    }
}

pub fn format_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| r.chunk.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChunkMetadata;
    use crate::infrastructure::InMemoryVectorStore;
    use crate::testing::{KeywordEmbedding, StubLlm};

    async fn rag() -> Arc<RagService> {
        let rag = RagService::new(
            Arc::new(KeywordEmbedding::new(&["decomposition", "memory"])),
            Arc::new(InMemoryVectorStore::new()),
            1,
        );
        rag.ingest(
            "post",
            "Task decomposition splits a task into smaller steps.",
            ChunkMetadata::default().with_publish_year(2023),
        )
        .await
        .unwrap();
        rag.ingest("post", "Memory stores past observations.", ChunkMetadata::default())
            .await
            .unwrap();
        Arc::new(rag)
    }

    #[tokio::test]
    async fn test_ask_stuffs_retrieved_context() {
        let llm = Arc::new(StubLlm::with_replies(&["Breaking a task into steps."]));
        let qa = QaService::new(rag().await, llm.clone(), "Context:\n{context}").unwrap();

        let answer = qa.ask("What is task decomposition?").await.unwrap();

        assert_eq!(answer.answer, "Breaking a task into steps.");
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.query.publish_year, None);

        let (system, prompt) = llm.calls()[0].clone();
        assert_eq!(system, "Context:\nTask decomposition splits a task into smaller steps.");
        assert_eq!(prompt, "What is task decomposition?");
    }

    #[tokio::test]
    async fn test_ask_with_analyzer_filters() {
        let llm = Arc::new(StubLlm::with_replies(&[
            r#"{"query": "memory", "publish_year": 2023}"#,
            "I don't know.",
        ]));
        let analyzer = Arc::new(QueryAnalyzer::new(llm.clone(), "analyze").unwrap());
        let qa = QaService::new(rag().await, llm.clone(), "{context}")
            .unwrap()
            .with_analyzer(analyzer);

        let answer = qa.ask("memory posts from 2023").await.unwrap();

        assert_eq!(answer.query.publish_year, Some(2023));
        assert!(answer.sources.iter().all(|s| s.chunk.metadata.publish_year == Some(2023)));
        assert_eq!(answer.answer, "I don't know.");
    }

    #[tokio::test]
    async fn test_ask_rejects_blank_question() {
        let qa = QaService::new(rag().await, Arc::new(StubLlm::new()), "{context}").unwrap();
        assert!(matches!(qa.ask("  ").await, Err(DomainError::Validation(_))));
    }
}
