use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::domain::DomainError;

#[derive(Debug, Deserialize)]
pub struct InvokeRequest {
    pub input: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub inputs: Vec<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct InvokeResponse {
    pub output: Value,
    pub metadata: RunMetadata,
}

#[derive(Debug, Serialize)]
pub struct RunMetadata {
    pub run_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub output: Vec<Value>,
    pub metadata: BatchMetadata,
}

#[derive(Debug, Serialize)]
pub struct BatchMetadata {
    pub run_ids: Vec<Uuid>,
}

/// Chain inputs are template variables; non-string JSON values are passed
/// in their JSON text form.
fn to_vars(input: Map<String, Value>) -> Result<HashMap<String, String>, DomainError> {
    input
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key, s)),
            Value::Null => Err(DomainError::validation(format!("input {key} is null"))),
            other => Ok((key, other.to_string())),
        })
        .collect()
}

pub async fn invoke(
    State(state): State<AppState>,
    Json(request): Json<InvokeRequest>,
) -> ApiResult<Json<InvokeResponse>> {
    let vars = to_vars(request.input)?;
    let output = state.translation.invoke(&vars).await?;

    Ok(Json(InvokeResponse {
        output,
        metadata: RunMetadata {
            run_id: Uuid::new_v4(),
        },
    }))
}

pub async fn batch(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> ApiResult<Json<BatchResponse>> {
    let inputs = request
        .inputs
        .into_iter()
        .map(to_vars)
        .collect::<Result<Vec<_>, _>>()?;
    let output = state.translation.batch(&inputs).await?;
    let run_ids = output.iter().map(|_| Uuid::new_v4()).collect();

    Ok(Json(BatchResponse {
        output,
        metadata: BatchMetadata { run_ids },
    }))
}

/// Server-sent events: one `metadata` event with the run id, a `data` event
/// per reply chunk, then `end`. A model failure mid-stream is sent as an
/// `error` event.
pub async fn stream(
    State(state): State<AppState>,
    Json(request): Json<InvokeRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let vars = to_vars(request.input)?;
    let chunks = state.translation.stream(&vars).await?;
    let run_id = Uuid::new_v4();

    let metadata = stream::once(async move {
        Event::default()
            .event("metadata")
            .json_data(RunMetadata { run_id })
    });
    let data = chunks.map(|chunk| match chunk {
        Ok(text) => Event::default().event("data").json_data(text),
        Err(e) => Event::default()
            .event("error")
            .json_data(json!({ "error": e.to_string() })),
    });
    let end = stream::once(async { Ok(Event::default().event("end")) });

    Ok(Sse::new(metadata.chain(data).chain(end)).keep_alive(KeepAlive::default()))
}

/// JSON schema of the chain input: one required string per prompt variable.
pub async fn input_schema(State(state): State<AppState>) -> Json<Value> {
    let variables = state.translation.input_variables();
    let properties: Map<String, Value> = variables
        .iter()
        .map(|name| (name.clone(), json!({ "title": title_case(name), "type": "string" })))
        .collect();

    Json(json!({
        "title": "PromptInput",
        "type": "object",
        "properties": properties,
        "required": variables,
    }))
}

pub async fn output_schema(State(state): State<AppState>) -> Json<Value> {
    Json(state.translation.output_schema())
}

fn title_case(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_vars_stringifies_values() {
        let input = json!({"language": "italian", "count": 2});
        let vars = to_vars(input.as_object().unwrap().clone()).unwrap();

        assert_eq!(vars["language"], "italian");
        assert_eq!(vars["count"], "2");
    }

    #[test]
    fn test_to_vars_rejects_null() {
        let input = json!({"language": null});
        assert!(to_vars(input.as_object().unwrap().clone()).is_err());
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("language"), "Language");
        assert_eq!(title_case("publish_year"), "Publish Year");
    }
}
