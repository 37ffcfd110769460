use serde::{Deserialize, Serialize};

/// Metadata field the year filter targets.
pub const PUBLISH_YEAR_FIELD: &str = "publish_year";

/// Predicate over chunk metadata, evaluated by the vector store during search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataFilter {
    Eq {
        field: String,
        value: serde_json::Value,
    },
    All(Vec<MetadataFilter>),
}

impl MetadataFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Evaluates the filter against a metadata object.
    pub fn matches(&self, metadata: &serde_json::Value) -> bool {
        match self {
            Self::Eq { field, value } => metadata.get(field).is_some_and(|v| v == value),
            Self::All(filters) => filters.iter().all(|f| f.matches(metadata)),
        }
    }

    /// Flattens nested `All` groups into the equality conditions they contain.
    pub fn conditions(&self) -> Vec<(&str, &serde_json::Value)> {
        match self {
            Self::Eq { field, value } => vec![(field.as_str(), value)],
            Self::All(filters) => filters.iter().flat_map(|f| f.conditions()).collect(),
        }
    }
}

/// No year means no filter; otherwise an equality match on `publish_year`.
pub fn publish_year_filter(year: Option<i32>) -> Option<MetadataFilter> {
    year.map(|y| MetadataFilter::eq(PUBLISH_YEAR_FIELD, y))
}

/// A search over the document index, as extracted from a user question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Similarity search query applied to the document chunks.
    pub query: String,
    /// Year the document was published, when the question names one.
    #[serde(default)]
    pub publish_year: Option<i32>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            publish_year: None,
        }
    }

    pub fn with_publish_year(mut self, year: i32) -> Self {
        self.publish_year = Some(year);
        self
    }

    pub fn filter(&self) -> Option<MetadataFilter> {
        publish_year_filter(self.publish_year)
    }
}
