use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::{
    ports::GraphStore, CypherResult, DomainError, GraphSchema, PropertySchema,
    RelationshipPattern,
};
use crate::infrastructure::config::GraphConfig;

const NODE_PROPERTIES_QUERY: &str = "CALL db.schema.nodeTypeProperties() \
     YIELD nodeLabels, propertyName \
     RETURN nodeLabels, collect(propertyName) AS properties";

const REL_PROPERTIES_QUERY: &str = "CALL db.schema.relTypeProperties() \
     YIELD relType, propertyName \
     RETURN relType, collect(propertyName) AS properties";

const RELATIONSHIPS_QUERY: &str = "MATCH (a)-[r]->(b) \
     WITH DISTINCT labels(a) AS source, type(r) AS rel, labels(b) AS target \
     RETURN source, rel, target LIMIT 200";

#[derive(Serialize)]
struct Statement<'a> {
    statement: &'a str,
    parameters: serde_json::Value,
}

#[derive(Serialize)]
struct TxRequest<'a> {
    statements: Vec<Statement<'a>>,
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    columns: Vec<String>,
    data: Vec<TxRow>,
}

#[derive(Debug, Deserialize)]
struct TxRow {
    row: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    code: String,
    message: String,
}

impl From<TxResult> for CypherResult {
    fn from(result: TxResult) -> Self {
        Self {
            columns: result.columns,
            rows: result.data.into_iter().map(|d| d.row).collect(),
        }
    }
}

/// Neo4j over its HTTP transactional endpoint (`/db/{database}/tx/commit`).
pub struct Neo4jGraph {
    client: reqwest::Client,
    endpoint: String,
    username: String,
    password: String,
}

impl Neo4jGraph {
    pub fn new(config: &GraphConfig) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DomainError::internal(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/db/{}/tx/commit",
                config.url.trim_end_matches('/'),
                config.database
            ),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    async fn run(
        &self,
        statements: Vec<Statement<'_>>,
    ) -> Result<Vec<CypherResult>, DomainError> {
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&TxRequest { statements })
            .send()
            .await
            .map_err(|e| DomainError::external(format!("Neo4j request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::external(format!("Neo4j returned {status}: {body}")));
        }

        let body: TxResponse = response
            .json()
            .await
            .map_err(|e| DomainError::external(format!("Neo4j response: {e}")))?;
        into_results(body)
    }
}

fn into_results(response: TxResponse) -> Result<Vec<CypherResult>, DomainError> {
    if let Some(err) = response.errors.first() {
        let msg = format!("{}: {}", err.code, err.message);
        return Err(if err.code.contains("Statement.SyntaxError") {
            DomainError::validation(msg)
        } else {
            DomainError::external(msg)
        });
    }
    Ok(response.results.into_iter().map(Into::into).collect())
}

fn strings(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// `relTypeProperties` reports types as ``:`ACTED_IN` ``.
fn clean_rel_type(raw: &str) -> String {
    raw.trim_start_matches(':').trim_matches('`').to_string()
}

fn schema_from_results(
    nodes: &CypherResult,
    rels: &CypherResult,
    patterns: &CypherResult,
) -> GraphSchema {
    let node_properties = nodes
        .rows
        .iter()
        .filter_map(|row| {
            let label = strings(row.first()?).join(":");
            Some(PropertySchema {
                label,
                properties: strings(row.get(1)?),
            })
        })
        .collect();

    let relationship_properties = rels
        .rows
        .iter()
        .filter_map(|row| {
            let properties = strings(row.get(1)?);
            if properties.is_empty() {
                return None;
            }
            Some(PropertySchema {
                label: clean_rel_type(row.first()?.as_str()?),
                properties,
            })
        })
        .collect();

    let relationships = patterns
        .rows
        .iter()
        .filter_map(|row| {
            Some(RelationshipPattern {
                start: strings(row.first()?).join(":"),
                rel_type: row.get(1)?.as_str()?.to_string(),
                end: strings(row.get(2)?).join(":"),
            })
        })
        .collect();

    GraphSchema {
        node_properties,
        relationship_properties,
        relationships,
    }
}

#[async_trait]
impl GraphStore for Neo4jGraph {
    async fn schema(&self) -> Result<GraphSchema, DomainError> {
        let statements = [NODE_PROPERTIES_QUERY, REL_PROPERTIES_QUERY, RELATIONSHIPS_QUERY]
            .into_iter()
            .map(|statement| Statement {
                statement,
                parameters: serde_json::json!({}),
            })
            .collect();

        let results = self.run(statements).await?;
        match results.as_slice() {
            [nodes, rels, patterns] => Ok(schema_from_results(nodes, rels, patterns)),
            _ => Err(DomainError::external(format!(
                "expected 3 schema results from Neo4j, got {}",
                results.len()
            ))),
        }
    }

    async fn query(
        &self,
        cypher: &str,
        params: serde_json::Value,
    ) -> Result<CypherResult, DomainError> {
        let mut results = self
            .run(vec![Statement {
                statement: cypher,
                parameters: params,
            }])
            .await?;

        Ok(results.pop().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(body: serde_json::Value) -> Result<Vec<CypherResult>, DomainError> {
        into_results(serde_json::from_value(body).unwrap())
    }

    #[test]
    fn test_endpoint_from_config() {
        let graph = Neo4jGraph::new(&GraphConfig {
            url: "http://localhost:7474/".into(),
            database: "movies".into(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(graph.endpoint, "http://localhost:7474/db/movies/tx/commit");
    }

    #[test]
    fn test_rows_parsed() {
        let results = parse(json!({
            "results": [{
                "columns": ["title", "released"],
                "data": [{"row": ["Casino", 1995], "meta": [null, null]}]
            }],
            "errors": []
        }))
        .unwrap();

        assert_eq!(results[0].to_records(), vec![json!({"title": "Casino", "released": 1995})]);
    }

    #[test]
    fn test_syntax_error_is_validation() {
        let err = parse(json!({
            "results": [],
            "errors": [{
                "code": "Neo.ClientError.Statement.SyntaxError",
                "message": "Invalid input 'MTCH'"
            }]
        }))
        .unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn test_schema_from_results() {
        let nodes = CypherResult {
            columns: vec!["nodeLabels".into(), "properties".into()],
            rows: vec![vec![json!(["Movie"]), json!(["title", "released"])]],
        };
        let rels = CypherResult {
            columns: vec!["relType".into(), "properties".into()],
            rows: vec![
                vec![json!(":`ACTED_IN`"), json!(["roles"])],
                vec![json!(":`DIRECTED`"), json!([])],
            ],
        };
        let patterns = CypherResult {
            columns: vec!["source".into(), "rel".into(), "target".into()],
            rows: vec![vec![json!(["Person"]), json!("ACTED_IN"), json!(["Movie"])]],
        };

        let schema = schema_from_results(&nodes, &rels, &patterns);

        assert_eq!(schema.node_properties[0].label, "Movie");
        assert_eq!(schema.relationship_properties.len(), 1);
        assert_eq!(schema.relationship_properties[0].label, "ACTED_IN");
        assert_eq!(schema.relationships[0].end, "Movie");
    }
}
