use hive_vector_store::{EmbeddingService, ToolSearchRequest, VectorStore};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

const SKILLS_TABLE: &str = "skills";
// Score given to the discovery meta-tool when nothing else matches.
const DISCOVER_FALLBACK_SCORE: f64 = 0.05;
// Optional schema arguments shown in a usage template.
const MAX_OPTIONAL_ARGS: usize = 5;

/// Query-keyword groups mapped to store categories, used by the keyword
/// fallback when the native store is unreachable.
const CATEGORY_BOOSTS: &[(&[&str], &[&str])] = &[
    (
        &["code", "refactor", "function", "class", "variable", "import"],
        &["engineering", "code_tools", "development"],
    ),
    (
        &["file", "read", "write", "edit", "create", "delete"],
        &["filesystem", "file_tools"],
    ),
    (&["search", "find", "grep", "query"], &["search", "query_tools"]),
    (&["git", "commit", "branch", "merge", "push"], &["version_control", "git"]),
    (&["test", "unit", "integration", "coverage"], &["testing", "qa"]),
    (&["api", "http", "request", "rest", "endpoint"], &["api", "network"]),
    (&["database", "sql", "query", "table"], &["database", "data"]),
    (&["shell", "run", "execute", "command", "bash"], &["shell", "execution"]),
];

/// Tool metadata row held by the memory registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRecord {
    pub name: String,
    pub skill_name: String,
    pub description: String,
    pub category: String,
    /// JSON Schema for the tool's parameters, as stored.
    pub input_schema: String,
    pub file_path: String,
}

/// A tool matching a discovery query, enriched with a usage template.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolMatch {
    pub name: String,
    pub skill_name: String,
    pub description: String,
    pub score: f64,
    pub matched_intent: String,
    pub usage_template: String,
}

/// Skill summary produced by `discover_all`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillSummary {
    pub name: String,
    pub tool_count: usize,
}

fn render_placeholder(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Generate a strict usage template aligned with the tool's JSON Schema:
/// `@omni("tool", {"arg": placeholder, ...})`.
///
/// Required placeholders come from the property type (enum -> first value,
/// integer -> 0, number -> 0.0, boolean -> true, array -> [], object -> {},
/// else `<name>`); optional properties render as `"<name?>"`, capped at
/// five so the template stays prompt-sized.
#[must_use]
pub fn generate_usage_template(tool_name: &str, input_schema: &str) -> String {
    let schema: Value = serde_json::from_str(input_schema)
        .ok()
        .map(|parsed: Value| match parsed {
            // Double-encoded schemas show up in older indexes.
            Value::String(inner) => serde_json::from_str(&inner).unwrap_or(Value::Null),
            other => other,
        })
        .unwrap_or(Value::Null);

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return format!("@omni(\"{tool_name}\", {{\"...\"}})");
    };
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut args: Vec<String> = Vec::new();
    let mut optional_shown = 0usize;
    for (prop_name, prop_meta) in properties {
        let placeholder = if required.contains(&prop_name.as_str()) {
            let prop_type = prop_meta.get("type").and_then(Value::as_str).unwrap_or("string");
            let enum_values = prop_meta.get("enum").and_then(Value::as_array);
            match (enum_values.and_then(|values| values.first()), prop_type) {
                (Some(Value::String(first)), _) => format!("\"{first}\""),
                (Some(_), _) => format!("\"<{prop_name}>\""),
                (None, "integer") => "0".to_string(),
                (None, "number") => "0.0".to_string(),
                (None, "boolean") => "true".to_string(),
                (None, "array") => "[]".to_string(),
                (None, "object") => "{}".to_string(),
                (None, _) => format!("\"<{prop_name}>\""),
            }
        } else {
            if optional_shown >= MAX_OPTIONAL_ARGS {
                continue;
            }
            optional_shown += 1;
            format!("\"<{prop_name}?>\"")
        };
        args.push(format!("\"{prop_name}\": {placeholder}"));
    }

    format!("@omni(\"{tool_name}\", {{{}}})", args.join(", "))
}

fn discover_fallback_match(query: &str) -> ToolMatch {
    ToolMatch {
        name: "skill.discover".to_string(),
        skill_name: "skill".to_string(),
        description: "Discover available skills and tools".to_string(),
        score: DISCOVER_FALLBACK_SCORE,
        matched_intent: query.to_string(),
        usage_template: "@omni(\"skill.discover\", {\"query\": \"...\"})".to_string(),
    }
}

/// Holographic tool discovery: metadata is projected from the store on
/// demand. The only in-memory structure is a lazily-built registry keyed
/// by tool name for O(1) schema lookup; it is a cache over the store, not
/// a second source of truth.
pub struct SkillDiscoveryService {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingService>,
    registry: RwLock<Option<HashMap<String, ToolRecord>>>,
}

impl SkillDiscoveryService {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingService>) -> Self {
        Self {
            store,
            embedder,
            registry: RwLock::new(None),
        }
    }

    fn record_from_row(row: &Value) -> Option<ToolRecord> {
        let metadata = match row.get("metadata") {
            Some(Value::Object(map)) => Some(map.clone()),
            Some(Value::String(raw)) => serde_json::from_str::<Value>(raw)
                .ok()
                .and_then(|v| v.as_object().cloned()),
            _ => None,
        }
        .unwrap_or_default();
        let lookup = |key: &str| -> Option<&Value> { row.get(key).or_else(|| metadata.get(key)) };

        let name = lookup("tool_name")
            .or_else(|| row.get("id"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();
        if name.is_empty() {
            return None;
        }

        let description = lookup("description")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                row.get("content")
                    .and_then(Value::as_str)
                    .map(|content| content.chars().take(200).collect())
            })
            .unwrap_or_default();

        let input_schema = match lookup("input_schema") {
            Some(Value::String(raw)) if !raw.trim().is_empty() => raw.clone(),
            Some(Value::Object(map)) => Value::Object(map.clone()).to_string(),
            _ => "{}".to_string(),
        };

        Some(ToolRecord {
            name,
            skill_name: lookup("skill_name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            description,
            category: lookup("category")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            input_schema,
            file_path: lookup("file_path")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }

    /// Hydrate the registry from one `list_all_tools` call. Failures leave
    /// the registry unloaded so the next call retries.
    async fn load_registry(&self) -> HashMap<String, ToolRecord> {
        if let Some(registry) = self.registry.read().await.as_ref() {
            return registry.clone();
        }

        let rows = match self.store.list_all_tools().await {
            Ok(rows) => rows,
            Err(err) => {
                log::error!("failed to load tool registry from store: {err}");
                return HashMap::new();
            }
        };
        let registry: HashMap<String, ToolRecord> = rows
            .iter()
            .filter_map(Self::record_from_row)
            .map(|record| (record.name.clone(), record))
            .collect();
        log::debug!("loaded {} tools into the registry", registry.len());
        *self.registry.write().await = Some(registry.clone());
        registry
    }

    /// O(1) record lookup via the lazily-built registry.
    pub async fn get_tool_record(&self, tool_name: &str) -> Option<ToolRecord> {
        self.load_registry().await.get(tool_name).cloned()
    }

    pub async fn tool_count(&self) -> usize {
        self.load_registry().await.len()
    }

    /// Drop the cached registry; the next lookup re-reads the store.
    pub async fn invalidate_registry(&self) {
        *self.registry.write().await = None;
    }

    /// Search for tools matching an intent. Degrades store errors into the
    /// keyword fallback; an empty answer becomes the `skill.discover`
    /// meta-tool so discovery never dead-ends.
    pub async fn search_tools(&self, query: &str, limit: usize, threshold: f64) -> Vec<ToolMatch> {
        // Quotes and brackets break the lexical parser; embed the original.
        let keyword_query: String = query
            .chars()
            .filter(|c| !matches!(c, '"' | '\'' | '[' | ']' | '(' | ')' | '{' | '}'))
            .collect();

        let query_vector = match self.embedder.embed_batch(&[query.to_string()]).await {
            Ok(mut vectors) if !vectors.is_empty() => vectors.swap_remove(0),
            Ok(_) => Vec::new(),
            Err(err) => {
                log::warn!("embedding failed, using keyword-only search: {err}");
                Vec::new()
            }
        };

        let rows = self
            .store
            .search_tools(ToolSearchRequest {
                table_name: SKILLS_TABLE.to_string(),
                query_vector,
                query_text: keyword_query.trim().to_string(),
                limit: limit * 2,
                threshold,
                confidence_profile: None,
                rerank: true,
            })
            .await;

        let rows = match rows {
            Ok(rows) => rows,
            Err(err) => {
                log::warn!("store search failed, falling back to keyword matching: {err}");
                let mut matches = self.search_tools_fallback(query, limit, threshold).await;
                if matches.is_empty() {
                    matches.push(discover_fallback_match(query));
                }
                return matches;
            }
        };

        let mut matches = Vec::new();
        for row in &rows {
            let score = row.get("score").and_then(Value::as_f64).unwrap_or(0.0);
            if score < threshold {
                continue;
            }
            let name = row
                .get("name")
                .or_else(|| row.get("id"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if name.is_empty() {
                continue;
            }
            let record = self.get_tool_record(&name).await;
            let usage = generate_usage_template(
                &name,
                record
                    .as_ref()
                    .map_or("{}", |record| record.input_schema.as_str()),
            );
            matches.push(ToolMatch {
                skill_name: record
                    .as_ref()
                    .map(|r| r.skill_name.clone())
                    .or_else(|| {
                        row.get("skill_name")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    })
                    .unwrap_or_default(),
                description: record.map(|r| r.description).unwrap_or_default(),
                score,
                matched_intent: query.to_string(),
                usage_template: usage,
                name,
            });
        }

        if matches.is_empty() {
            return vec![discover_fallback_match(query)];
        }
        matches.truncate(limit);
        matches
    }

    fn detect_query_categories(query_words: &HashSet<String>) -> Option<&'static [&'static str]> {
        CATEGORY_BOOSTS
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| query_words.contains(*k)))
            .map(|(_, categories)| *categories)
    }

    /// Keyword fallback over the registry for when the store is down.
    async fn search_tools_fallback(
        &self,
        query: &str,
        limit: usize,
        threshold: f64,
    ) -> Vec<ToolMatch> {
        let registry = self.load_registry().await;
        let query_lower = query.to_lowercase();
        let query_words: HashSet<String> =
            query_lower.split_whitespace().map(str::to_string).collect();
        let categories = Self::detect_query_categories(&query_words);

        let mut matches: Vec<ToolMatch> = Vec::new();
        for (tool_name, record) in &registry {
            let name_lower = tool_name.to_lowercase();
            let mut score: f64 = 0.0;

            if name_lower.contains(&query_lower.replace(' ', "_")) {
                score = score.max(0.95);
            } else if name_lower
                .replace(['_', '.'], "")
                .contains(&query_lower.replace(' ', ""))
            {
                score = score.max(0.85);
            }
            if categories.is_some_and(|c| c.contains(&record.category.as_str())) {
                score = score.max(0.8);
            }
            for word in &query_words {
                if word.len() > 3 && name_lower.contains(word.as_str()) {
                    score = score.max(0.7);
                }
            }
            if record.description.to_lowercase().contains(&query_lower) {
                score = score.max(0.6);
            }

            if score >= threshold && score > 0.0 {
                matches.push(ToolMatch {
                    name: tool_name.clone(),
                    skill_name: record.skill_name.clone(),
                    description: record.description.clone(),
                    score,
                    matched_intent: query.to_string(),
                    usage_template: generate_usage_template(tool_name, &record.input_schema),
                });
            }
        }

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        matches.truncate(limit);
        matches
    }

    /// Enumerate all skills known to the store, sorted by name.
    pub async fn discover_all(&self) -> Vec<SkillSummary> {
        let registry = self.load_registry().await;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for record in registry.values() {
            let skill = if record.skill_name.is_empty() {
                record
                    .name
                    .split_once('.')
                    .map_or(record.name.as_str(), |(skill, _)| skill)
            } else {
                record.skill_name.as_str()
            };
            *counts.entry(skill.to_string()).or_insert(0) += 1;
        }
        let mut out: Vec<SkillSummary> = counts
            .into_iter()
            .map(|(name, tool_count)| SkillSummary { name, tool_count })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Tool count per category, `uncategorized` for blanks.
    pub async fn category_distribution(&self) -> HashMap<String, usize> {
        let registry = self.load_registry().await;
        let mut distribution: HashMap<String, usize> = HashMap::new();
        for record in registry.values() {
            let category = if record.category.is_empty() {
                "uncategorized"
            } else {
                record.category.as_str()
            };
            *distribution.entry(category.to_string()).or_insert(0) += 1;
        }
        distribution
    }

    /// All tools rendered as `@omni()` lines for LLM prompt context.
    pub async fn generate_system_context(&self) -> String {
        let registry = self.load_registry().await;
        if registry.is_empty() {
            return String::new();
        }
        let mut names: Vec<&String> = registry.keys().collect();
        names.sort_unstable();

        let mut parts = vec!["# Available Tools".to_string(), String::new()];
        for name in names {
            if let Some(record) = registry.get(name) {
                parts.push(format!(
                    "- {}",
                    generate_usage_template(name, &record.input_schema)
                ));
            }
        }
        parts.join("\n")
    }
}
