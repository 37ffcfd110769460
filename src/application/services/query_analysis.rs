use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use crate::application::RagService;
use crate::domain::{
    parse_json, ports::LlmService, ChatPromptTemplate, DomainError, SearchQuery, SearchResult,
};

/// Turns a free-form question into a structured [`SearchQuery`].
pub struct QueryAnalyzer {
    model: Arc<dyn LlmService>,
    prompt: ChatPromptTemplate,
}

impl QueryAnalyzer {
    pub fn new(model: Arc<dyn LlmService>, system: &str) -> Result<Self, DomainError> {
        let prompt = ChatPromptTemplate::new().system(system)?.user("{question}")?;
        Ok(Self { model, prompt })
    }

    #[instrument(skip(self))]
    pub async fn analyze(&self, question: &str) -> Result<SearchQuery, DomainError> {
        let vars = HashMap::from([("question".to_string(), question.to_string())]);
        let messages = self.prompt.format_messages(&vars, &[])?;
        let raw = self.model.generate(&messages).await?;

        let mut query: SearchQuery = serde_json::from_value(parse_json(&raw)?).map_err(|e| {
            DomainError::external(format!("model output is not a search query: {e}"))
        })?;
        if query.query.trim().is_empty() {
            query.query = question.to_string();
        }

        tracing::debug!(
            query = %query.query,
            publish_year = ?query.publish_year,
            "query analyzed"
        );
        Ok(query)
    }

    /// Analyzes `question`, then searches with the year filter it implies.
    pub async fn retrieve(
        &self,
        rag: &RagService,
        question: &str,
        top_k: usize,
    ) -> Result<(SearchQuery, Vec<SearchResult>), DomainError> {
        let query = self.analyze(question).await?;
        let filter = query.filter();
        let results = rag
            .retrieve_filtered(&query.query, top_k, filter.as_ref())
            .await?;
        Ok((query, results))
    }
}
