use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use crate::domain::{
    ports::{LlmService, TextStream},
    ChatPromptTemplate, DomainError, MessageRole, OutputParser,
};

/// Prompt template piped into a model, piped into an output parser.
pub struct PromptChain {
    prompt: ChatPromptTemplate,
    model: Arc<dyn LlmService>,
    parser: OutputParser,
    batch_concurrency: usize,
}

impl PromptChain {
    pub fn new(prompt: ChatPromptTemplate, model: Arc<dyn LlmService>) -> Self {
        Self {
            prompt,
            model,
            parser: OutputParser::Str,
            batch_concurrency: 4,
        }
    }

    /// `system` then `user`, each a template. The shape used for translation.
    pub fn from_templates(
        system: &str,
        user: &str,
        model: Arc<dyn LlmService>,
    ) -> Result<Self, DomainError> {
        let prompt = ChatPromptTemplate::from_messages(&[
            (MessageRole::System, system),
            (MessageRole::User, user),
        ])?;
        Ok(Self::new(prompt, model))
    }

    pub fn with_parser(mut self, parser: OutputParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch_concurrency = concurrency.max(1);
        self
    }

    pub fn input_variables(&self) -> Vec<String> {
        self.prompt.input_variables()
    }

    pub fn output_schema(&self) -> serde_json::Value {
        self.parser.output_schema()
    }

    #[instrument(skip(self, vars))]
    pub async fn invoke(
        &self,
        vars: &HashMap<String, String>,
    ) -> Result<serde_json::Value, DomainError> {
        let messages = self.prompt.format_messages(vars, &[])?;
        let text = self.model.generate(&messages).await?;
        self.parser.parse(&text)
    }

    /// Runs every input, at most `batch_concurrency` at a time. Outputs keep
    /// input order; the first failure fails the whole batch.
    #[instrument(skip(self, inputs), fields(count = inputs.len()))]
    pub async fn batch(
        &self,
        inputs: &[HashMap<String, String>],
    ) -> Result<Vec<serde_json::Value>, DomainError> {
        let calls: Vec<_> = inputs.iter().map(|vars| self.invoke(vars)).collect();
        stream::iter(calls)
            .buffered(self.batch_concurrency)
            .try_collect()
            .await
    }

    /// Streams the raw model reply for one input. The parser is not applied;
    /// chunks are text as the model produces it.
    #[instrument(skip(self, vars))]
    pub async fn stream(&self, vars: &HashMap<String, String>) -> Result<TextStream, DomainError> {
        let messages = self.prompt.format_messages(vars, &[])?;
        self.model.stream_generate(&messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingLlm, StubLlm};
    use serde_json::json;

    fn input(language: &str, text: &str) -> HashMap<String, String> {
        HashMap::from([
            ("language".to_string(), language.to_string()),
            ("text".to_string(), text.to_string()),
        ])
    }

    fn translation(model: Arc<dyn LlmService>) -> PromptChain {
        PromptChain::from_templates("Translate the following into {language}:", "{text}", model)
            .unwrap()
    }

    #[tokio::test]
    async fn test_invoke_renders_system_and_user() {
        let llm = Arc::new(StubLlm::with_replies(&["Ciao"]));
        let chain = translation(llm.clone());

        let output = chain.invoke(&input("italian", "hi")).await.unwrap();

        assert_eq!(output, json!("Ciao"));
        assert_eq!(
            llm.calls(),
            vec![("Translate the following into italian:".to_string(), "hi".to_string())]
        );
        assert_eq!(chain.input_variables(), vec!["language", "text"]);
    }

    #[tokio::test]
    async fn test_invoke_missing_variable() {
        let chain = translation(Arc::new(StubLlm::new()));
        let vars = HashMap::from([("text".to_string(), "hi".to_string())]);

        let err = chain.invoke(&vars).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let chain = translation(Arc::new(StubLlm::new())).with_batch_concurrency(2);
        let inputs = vec![input("french", "one"), input("german", "two"), input("dutch", "three")];

        let outputs = chain.batch(&inputs).await.unwrap();

        assert_eq!(
            outputs,
            vec![json!("echo: one"), json!("echo: two"), json!("echo: three")]
        );
    }

    #[tokio::test]
    async fn test_batch_fails_on_model_error() {
        let chain = translation(Arc::new(FailingLlm));
        let result = chain.batch(&[input("french", "one")]).await;

        assert!(matches!(result, Err(DomainError::ExternalService(_))));
    }

    #[tokio::test]
    async fn test_batch_future_is_send() {
        fn assert_send<T: Send>(_: &T) {}

        let chain = translation(Arc::new(StubLlm::new()));
        let inputs = vec![input("french", "one")];
        let fut = chain.batch(&inputs);
        assert_send(&fut);
        assert_eq!(fut.await.unwrap(), vec![json!("echo: one")]);
    }

    #[tokio::test]
    async fn test_batch_from_spawned_task() {
        let chain = Arc::new(translation(Arc::new(StubLlm::new())).with_batch_concurrency(2));
        let inputs = vec![input("french", "one"), input("german", "two")];

        let outputs = tokio::spawn(async move { chain.batch(&inputs).await })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outputs, vec![json!("echo: one"), json!("echo: two")]);
    }

    #[tokio::test]
    async fn test_stream_yields_reply_chunks() {
        let llm = Arc::new(StubLlm::with_replies(&["Ciao"]));
        let chain = translation(llm.clone());

        let chunks: Vec<String> = chain
            .stream(&input("italian", "hi"))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(chunks.concat(), "Ciao");
        assert_eq!(llm.calls()[0].0, "Translate the following into italian:");
    }

    #[tokio::test]
    async fn test_stream_checks_variables_before_calling_model() {
        let llm = Arc::new(StubLlm::new());
        let chain = translation(llm.clone());
        let vars = HashMap::from([("text".to_string(), "hi".to_string())]);

        assert!(matches!(chain.stream(&vars).await, Err(DomainError::Validation(_))));
        assert!(llm.calls().is_empty());
    }

    #[tokio::test]
    async fn test_json_parser() {
        let llm = Arc::new(StubLlm::with_replies(&["```json\n{\"ok\": true}\n```"]));
        let chain = translation(llm).with_parser(OutputParser::Json);

        let output = chain.invoke(&input("french", "x")).await.unwrap();
        assert_eq!(output, json!({"ok": true}));
    }
}
