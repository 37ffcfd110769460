use serde::{Deserialize, Serialize};

use crate::domain::{strip_code_fence, DomainError, Result};

/// Clauses that mutate the graph. Matched as whole words, case-insensitively.
const WRITE_CLAUSES: &[&str] = &[
    "CREATE", "MERGE", "DELETE", "DETACH", "SET", "REMOVE", "DROP", "FOREACH",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySchema {
    pub label: String,
    pub properties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipPattern {
    pub start: String,
    pub rel_type: String,
    pub end: String,
}

/// Structure of the graph as shown to the model when writing Cypher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSchema {
    pub node_properties: Vec<PropertySchema>,
    pub relationship_properties: Vec<PropertySchema>,
    pub relationships: Vec<RelationshipPattern>,
}

impl GraphSchema {
    pub fn is_empty(&self) -> bool {
        self.node_properties.is_empty() && self.relationships.is_empty()
    }

    pub fn render(&self) -> String {
        let section = |items: &[PropertySchema]| {
            items
                .iter()
                .map(|p| format!("{} {{{}}}", p.label, p.properties.join(", ")))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let relationships = self
            .relationships
            .iter()
            .map(|r| format!("(:{})-[:{}]->(:{})", r.start, r.rel_type, r.end))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "Node properties:\n{}\nRelationship properties:\n{}\nThe relationships:\n{}",
            section(&self.node_properties),
            section(&self.relationship_properties),
            relationships
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CypherResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl CypherResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as objects keyed by column name.
    pub fn to_records(&self) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .map(|row| {
                let record = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect::<serde_json::Map<_, _>>();
                serde_json::Value::Object(record)
            })
            .collect()
    }
}

/// Pulls the Cypher statement out of model output.
pub fn extract_cypher(text: &str) -> String {
    let body = strip_code_fence(text);
    let body = match body.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("cypher") => &body[6..],
        _ => body,
    };
    body.trim().to_string()
}

/// Fails with a validation error when the statement contains a write clause.
/// String literals, backticked names and property keys (`n.set`) are not
/// clauses and are ignored.
pub fn ensure_read_only(cypher: &str) -> Result<()> {
    let words = clause_words(cypher);

    if let Some(clause) = words.iter().find(|w| WRITE_CLAUSES.contains(&w.as_str())) {
        return Err(DomainError::validation(format!(
            "generated Cypher contains write clause {clause}"
        )));
    }
    if words.windows(2).any(|w| w[0] == "LOAD" && w[1] == "CSV") {
        return Err(DomainError::validation(
            "generated Cypher contains write clause LOAD CSV",
        ));
    }
    Ok(())
}

/// Upper-cased bare words of a statement, skipping quoted text and words
/// that follow a `.`.
fn clause_words(cypher: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut after_dot = false;
    let mut chars = cypher.chars();

    while let Some(c) = chars.next() {
        if c.is_ascii_alphanumeric() || c == '_' {
            word.push(c.to_ascii_uppercase());
            continue;
        }
        if !word.is_empty() {
            if !after_dot {
                words.push(std::mem::take(&mut word));
            }
            word.clear();
            after_dot = false;
        }
        match c {
            '\'' | '"' | '`' => {
                skip_quoted(&mut chars, c);
                after_dot = false;
            }
            '.' => after_dot = true,
            c if c.is_whitespace() => {}
            _ => after_dot = false,
        }
    }
    if !word.is_empty() && !after_dot {
        words.push(word);
    }
    words
}

/// Consumes up to and including the closing `quote`. Backslash escapes
/// apply inside string literals; a doubled backtick escapes a backtick.
fn skip_quoted(chars: &mut std::str::Chars<'_>, quote: char) {
    while let Some(c) = chars.next() {
        if c == '\\' && quote != '`' {
            chars.next();
        } else if c == quote {
            if quote == '`' && chars.clone().next() == Some('`') {
                chars.next();
                continue;
            }
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_cypher_from_fenced_block() {
        let text = "```cypher\nMATCH (m:Movie {title: 'Casino'}) RETURN m.released\n```";
        assert_eq!(
            extract_cypher(text),
            "MATCH (m:Movie {title: 'Casino'}) RETURN m.released"
        );
        assert_eq!(extract_cypher("  MATCH (n) RETURN n "), "MATCH (n) RETURN n");
    }

    #[test]
    fn test_read_only_guard() {
        assert!(ensure_read_only("MATCH (p:Person)-[:ACTED_IN]->(m) RETURN p.name").is_ok());
        assert!(ensure_read_only("MATCH (n) RETURN n.created_at, n.offset").is_ok());
        assert!(ensure_read_only("match (n) detach delete n").is_err());
        assert!(ensure_read_only("MERGE (m:Movie {title: 'x'})").is_err());
        assert!(ensure_read_only("LOAD CSV FROM 'file:///x' AS row RETURN row").is_err());
        assert!(ensure_read_only("MATCH (n) SET n.seen = true").is_err());
        assert!(ensure_read_only("MATCH (n) WHERE n.x = 'a' DELETE n").is_err());
    }

    #[test]
    fn test_read_only_guard_ignores_literals_and_properties() {
        let read_only = [
            "MATCH (m:Movie {title: 'Set It Off'}) RETURN m.released",
            "MATCH (p:Person)-[:ACTED_IN]->(m) WHERE p.name CONTAINS 'Delete' RETURN p.name",
            r#"MATCH (m) WHERE m.title = "It's \"Merge\" day" RETURN m"#,
            r"MATCH (m) WHERE m.title = 'Don\'t Set' RETURN m",
        ];
        for cypher in read_only {
            assert!(ensure_read_only(cypher).is_ok(), "{cypher}");
        }
        assert!(ensure_read_only("MATCH (n) RETURN n.set, n.remove AS `create`").is_ok());
        assert!(ensure_read_only("MATCH (n:`Drop Zone`) RETURN n").is_ok());
        assert!(ensure_read_only("MATCH (n) RETURN n.`delete`").is_ok());

        assert!(ensure_read_only("MATCH (m {title: 'Set It Off'}) SET m.seen = true").is_err());
        assert!(ensure_read_only("MATCH (n:`A``B`) DETACH DELETE n").is_err());
    }

    #[test]
    fn test_records_zip_columns() {
        let result = CypherResult {
            columns: vec!["name".into(), "born".into()],
            rows: vec![vec![json!("Al Pacino"), json!(1940)]],
        };

        assert_eq!(result.to_records(), vec![json!({"name": "Al Pacino", "born": 1940})]);
    }

    #[test]
    fn test_schema_render() {
        let schema = GraphSchema {
            node_properties: vec![PropertySchema {
                label: "Movie".into(),
                properties: vec!["title".into(), "released".into()],
            }],
            relationship_properties: vec![],
            relationships: vec![RelationshipPattern {
                start: "Person".into(),
                rel_type: "ACTED_IN".into(),
                end: "Movie".into(),
            }],
        };

        let rendered = schema.render();
        assert!(rendered.contains("Movie {title, released}"));
        assert!(rendered.contains("(:Person)-[:ACTED_IN]->(:Movie)"));
        assert!(!schema.is_empty());
    }
}
