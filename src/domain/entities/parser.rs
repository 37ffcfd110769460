use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, Result};

/// How raw model text is turned into a chain output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputParser {
    #[default]
    Str,
    Json,
}

impl OutputParser {
    pub fn parse(&self, text: &str) -> Result<serde_json::Value> {
        match self {
            Self::Str => Ok(serde_json::Value::String(text.to_string())),
            Self::Json => parse_json(text),
        }
    }

    /// JSON schema of the parsed output.
    pub fn output_schema(&self) -> serde_json::Value {
        match self {
            Self::Str => serde_json::json!({"title": "StrOutputParserOutput", "type": "string"}),
            Self::Json => serde_json::json!({"title": "JsonOutputParserOutput"}),
        }
    }
}

/// Returns the body of the first fenced code block, or the trimmed text when
/// there is none. A language tag on the opening fence is dropped.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after = &trimmed[start + 3..];
    let body = match after.find('\n') {
        Some(nl) if !after[..nl].trim().contains(char::is_whitespace) => &after[nl + 1..],
        _ => after,
    };
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Parses model output as JSON. Bad output is the model's fault, so it
/// surfaces as an external service error.
pub fn parse_json(text: &str) -> Result<serde_json::Value> {
    serde_json::from_str(strip_code_fence(text))
        .map_err(|e| DomainError::external(format!("model output is not valid JSON: {e}")))
}
