//! Port stubs shared by unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::domain::{
    ports::{EmbeddingService, GraphStore, LlmService},
    CypherResult, DomainError, Embedding, GraphSchema,
};

/// Returns queued replies in order, then echoes the prompt. Records every call.
#[derive(Default)]
pub struct StubLlm {
    replies: Mutex<VecDeque<String>>,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl StubLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for StubLlm {
    async fn complete(&self, prompt: &str) -> Result<String, DomainError> {
        self.complete_with_system("", prompt).await
    }

    async fn complete_with_system(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<String, DomainError> {
        self.calls
            .lock()
            .unwrap()
            .push((system.to_string(), prompt.to_string()));
        let reply = self.replies.lock().unwrap().pop_front();
        Ok(reply.unwrap_or_else(|| format!("echo: {prompt}")))
    }
}

/// Always fails, for error-path tests.
pub struct FailingLlm;

#[async_trait]
impl LlmService for FailingLlm {
    async fn complete(&self, _prompt: &str) -> Result<String, DomainError> {
        Err(DomainError::external("model unavailable"))
    }

    async fn complete_with_system(
        &self,
        _system: &str,
        _prompt: &str,
    ) -> Result<String, DomainError> {
        Err(DomainError::external("model unavailable"))
    }
}

/// Bag-of-keywords embedding: one dimension per keyword, 1.0 when the text
/// mentions it. Texts sharing keywords land close together.
pub struct KeywordEmbedding {
    keywords: Vec<&'static str>,
}

impl KeywordEmbedding {
    pub fn new(keywords: &[&'static str]) -> Self {
        Self {
            keywords: keywords.to_vec(),
        }
    }

    fn vector(&self, text: &str) -> Embedding {
        let lower = text.to_lowercase();
        Embedding::new(
            self.keywords
                .iter()
                .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
                .collect(),
        )
    }
}

#[async_trait]
impl EmbeddingService for KeywordEmbedding {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.keywords.len()
    }
}

/// Fixed schema and result; records the statements it was asked to run.
#[derive(Default)]
pub struct StubGraph {
    pub schema: GraphSchema,
    pub result: CypherResult,
    pub queries: Mutex<Vec<String>>,
}

#[async_trait]
impl GraphStore for StubGraph {
    async fn schema(&self) -> Result<GraphSchema, DomainError> {
        Ok(self.schema.clone())
    }

    async fn query(
        &self,
        cypher: &str,
        _params: serde_json::Value,
    ) -> Result<CypherResult, DomainError> {
        self.queries.lock().unwrap().push(cypher.to_string());
        Ok(self.result.clone())
    }
}

/// Serves one HTTP request with a JSON `body` on a local port. Returns the
/// base URL (with a `/v1` suffix) and a handle yielding the request line.
pub async fn serve_json_once(body: String) -> (String, tokio::task::JoinHandle<String>) {
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut reader = BufReader::new(socket);

        let mut request_line = String::new();
        reader.read_line(&mut request_line).await.unwrap();
        let mut content_length = 0;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            if line.trim().is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap();
                }
            }
        }
        let mut request_body = vec![0; content_length];
        reader.read_exact(&mut request_body).await.unwrap();

        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        reader.get_mut().write_all(response.as_bytes()).await.unwrap();
        request_line.trim().to_string()
    });

    (format!("http://{addr}/v1"), handle)
}

/// Minimal OpenAI `chat.completion` body with one assistant message.
pub fn chat_completion(content: &str) -> String {
    serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "mistral-7b-instruct-v0.3",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4}
    })
    .to_string()
}
