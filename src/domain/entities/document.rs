use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    pub content_type: String,
    pub metadata: ChunkMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            content_type: "text/plain".to_string(),
            metadata: ChunkMetadata::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_metadata(mut self, metadata: ChunkMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub content: String,
    pub chunk_index: usize,
    pub metadata: ChunkMetadata,
}

impl DocumentChunk {
    pub fn new(document_id: Uuid, content: impl Into<String>, chunk_index: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            content: content.into(),
            chunk_index,
            metadata: ChunkMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: ChunkMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Metadata carried by a document and copied onto each of its chunks.
///
/// Well-known keys are typed; anything else lands in `extra` and is
/// flattened back into the same JSON object on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_year: Option<i32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChunkMetadata {
    pub fn with_publish_year(mut self, year: i32) -> Self {
        self.publish_year = Some(year);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: DocumentChunk,
    pub score: f32,
}

/// Splits content into chunks by paragraph boundaries.
///
/// Paragraphs are joined until they exceed `chunk_size`, then a new chunk starts.
/// Each chunk is assigned a sequential index starting from 0.
pub fn chunk_content(document_id: Uuid, content: &str, chunk_size: usize) -> Vec<DocumentChunk> {
    let paragraphs = content
        .split("\n\n")
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in paragraphs {
        if !current.is_empty() && current.len() + paragraph.len() + 2 > chunk_size {
            let index = chunks.len();
            chunks.push(DocumentChunk::new(document_id, std::mem::take(&mut current), index));
        }

        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }

    if !current.is_empty() {
        let index = chunks.len();
        chunks.push(DocumentChunk::new(document_id, current, index));
    }

    chunks
}
