use crate::error::{Result, StoreError};
use serde_json::{Map, Value};

/// Canonical tool-search payload parsed from one native store row.
///
/// This is the strict boundary between the engine's row shape and the
/// routing pipeline: a row that parses is fully typed from here on, and a
/// row that does not is dropped by the caller with a logged reason.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSearchPayload {
    /// Routed id as the engine reported it (usually `skill.command`).
    pub name: String,
    pub content: String,
    pub score: f64,
    pub confidence: String,
    pub final_score: f64,
    pub vector_score: Option<f64>,
    pub keyword_score: Option<f64>,
    pub skill_name: String,
    pub tool_name: String,
    pub file_path: String,
    pub category: String,
    pub routing_keywords: Vec<String>,
    pub intents: Vec<String>,
    /// JSON Schema object for the tool's parameters; empty object when the
    /// row carried none or an unparsable string.
    pub input_schema: Value,
    /// Full metadata object from the row, for downstream consumers.
    pub metadata: Map<String, Value>,
}

fn required_str(row: &Map<String, Value>, keys: &[&str]) -> Result<String> {
    for key in keys {
        match row.get(*key) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) if !s.trim().is_empty() => return Ok(s.trim().to_string()),
            Some(Value::String(_)) => continue,
            Some(other) => {
                return Err(StoreError::payload(
                    *key,
                    format!("expected string, got {other}"),
                ))
            }
        }
    }
    Err(StoreError::payload(
        keys.join("|"),
        "missing required string field",
    ))
}

fn optional_str(row: &Map<String, Value>, key: &str) -> Result<String> {
    match row.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(other) => Err(StoreError::payload(
            key,
            format!("expected string, got {other}"),
        )),
    }
}

fn required_score(row: &Map<String, Value>, key: &str) -> Result<f64> {
    let raw = row
        .get(key)
        .ok_or_else(|| StoreError::payload(key, "missing required numeric field"))?;
    let value = raw
        .as_f64()
        .ok_or_else(|| StoreError::payload(key, format!("expected number, got {raw}")))?;
    if !value.is_finite() {
        return Err(StoreError::payload(key, "score must be finite"));
    }
    Ok(value)
}

fn optional_score(row: &Map<String, Value>, key: &str) -> Result<Option<f64>> {
    match row.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => {
            let value = raw
                .as_f64()
                .ok_or_else(|| StoreError::payload(key, format!("expected number, got {raw}")))?;
            if !value.is_finite() {
                return Err(StoreError::payload(key, "score must be finite"));
            }
            Ok(Some(value))
        }
    }
}

fn string_list(source: &Map<String, Value>, key: &str) -> Result<Vec<String>> {
    match source.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) if !s.trim().is_empty() => out.push(s.trim().to_string()),
                    Value::String(_) => {}
                    other => {
                        return Err(StoreError::payload(
                            key,
                            format!("expected string list item, got {other}"),
                        ))
                    }
                }
            }
            Ok(out)
        }
        Some(other) => Err(StoreError::payload(
            key,
            format!("expected list, got {other}"),
        )),
    }
}

fn schema_object(raw: Option<&Value>) -> Value {
    match raw {
        Some(Value::Object(map)) => Value::Object(map.clone()),
        Some(Value::String(s)) if !s.trim().is_empty() => {
            match serde_json::from_str::<Value>(s) {
                Ok(Value::Object(map)) => Value::Object(map),
                _ => Value::Object(Map::new()),
            }
        }
        _ => Value::Object(Map::new()),
    }
}

fn metadata_object(row: &Map<String, Value>) -> Map<String, Value> {
    match row.get("metadata") {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        },
        _ => Map::new(),
    }
}

/// Parse one native row into the canonical payload. Strict on types of
/// fields that are present; lenient on absence of optional fields.
pub fn parse_tool_search_payload(row: &Value) -> Result<ToolSearchPayload> {
    let row = row
        .as_object()
        .ok_or_else(|| StoreError::payload("<row>", "expected object"))?;

    let metadata = metadata_object(row);
    let lookup = |key: &str| -> Option<&Value> { row.get(key).or_else(|| metadata.get(key)) };

    let name = required_str(row, &["name", "id"])?;
    let score = required_score(row, "score")?;
    let confidence = {
        let raw = optional_str(row, "confidence")?;
        if raw.is_empty() {
            "medium".to_string()
        } else {
            raw.to_ascii_lowercase()
        }
    };
    let final_score = optional_score(row, "final_score")?.unwrap_or(score);

    let skill_name = match lookup("skill_name") {
        Some(Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    };
    // No fallback to `name` here: a missing tool_name marks a skill-level
    // document, and canonicalization downstream drops those.
    let tool_name = match lookup("tool_name") {
        Some(Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    };

    let mut routing_keywords = string_list(row, "routing_keywords")?;
    if routing_keywords.is_empty() {
        routing_keywords = string_list(&metadata, "keywords").unwrap_or_default();
    }
    let mut intents = string_list(row, "intents")?;
    if intents.is_empty() {
        intents = string_list(&metadata, "intents").unwrap_or_default();
    }

    Ok(ToolSearchPayload {
        name,
        content: optional_str(row, "content")?,
        score,
        confidence,
        final_score,
        vector_score: optional_score(row, "vector_score")?,
        keyword_score: optional_score(row, "keyword_score")?,
        skill_name,
        tool_name,
        file_path: optional_str(row, "file_path")?,
        category: match lookup("category") {
            Some(Value::String(s)) => s.trim().to_string(),
            _ => String::new(),
        },
        routing_keywords,
        intents,
        input_schema: schema_object(lookup("input_schema")),
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parses_complete_row() {
        let row = json!({
            "name": "git.commit",
            "content": "COMMAND: git.commit",
            "score": 0.91,
            "confidence": "HIGH",
            "final_score": 0.95,
            "vector_score": 0.7,
            "keyword_score": 1.2,
            "skill_name": "git",
            "tool_name": "git.commit",
            "file_path": "skills/git/SKILL.md",
            "routing_keywords": ["commit", "git"],
            "input_schema": "{\"properties\": {\"message\": {\"type\": \"string\"}}}",
            "metadata": {"category": "version_control", "intents": ["commit"]}
        });
        let payload = parse_tool_search_payload(&row).unwrap();
        assert_eq!(payload.name, "git.commit");
        assert_eq!(payload.confidence, "high");
        assert_eq!(payload.final_score, 0.95);
        assert_eq!(payload.category, "version_control");
        assert_eq!(payload.intents, vec!["commit".to_string()]);
        assert!(payload.input_schema["properties"]["message"].is_object());
    }

    #[test]
    fn score_defaults_flow_to_final_score() {
        let row = json!({"id": "fs.read", "score": 0.4});
        let payload = parse_tool_search_payload(&row).unwrap();
        assert_eq!(payload.final_score, 0.4);
        assert_eq!(payload.confidence, "medium");
        assert_eq!(payload.tool_name, "");
    }

    #[test]
    fn rejects_missing_name() {
        let row = json!({"score": 0.4});
        assert!(parse_tool_search_payload(&row).is_err());
    }

    #[test]
    fn rejects_non_numeric_score() {
        let row = json!({"name": "git.commit", "score": "high"});
        assert!(parse_tool_search_payload(&row).is_err());
    }

    #[test]
    fn rejects_typed_field_with_wrong_type() {
        let row = json!({"name": "git.commit", "score": 0.5, "routing_keywords": [1, 2]});
        assert!(parse_tool_search_payload(&row).is_err());
    }

    #[test]
    fn unparsable_schema_string_becomes_empty_object() {
        let row = json!({"name": "git.commit", "score": 0.5, "input_schema": "{broken"});
        let payload = parse_tool_search_payload(&row).unwrap();
        assert_eq!(payload.input_schema, json!({}));
    }
}
