use crate::error::{Result, StoreError};
use crate::store::{
    AgenticSearchRequest, DocumentBatch, SearchProfile, TableInfo, ToolSearchRequest, VectorStore,
};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredDoc {
    id: String,
    content: String,
    metadata: Map<String, Value>,
}

/// In-process [`VectorStore`] with keyword-overlap ranking.
///
/// Scores are `min(0.9, matches / |query_terms|)` — capped below any
/// calibrated high tier so fallback rows never outrank native-engine rows
/// in a mixed deployment. Commit and search counters are exposed so tests
/// can observe idempotent-skip behavior.
#[derive(Default)]
pub struct MemoryVectorStore {
    tables: RwLock<HashMap<String, Vec<StoredDoc>>>,
    commit_count: AtomicUsize,
    search_count: AtomicUsize,
}

impl MemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `add_documents` commits observed since construction.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commit_count.load(Ordering::SeqCst)
    }

    /// Number of search calls observed since construction.
    #[must_use]
    pub fn search_count(&self) -> usize {
        self.search_count.load(Ordering::SeqCst)
    }

    fn keyword_rows(&self, table: &str, query: &str, limit: usize, threshold: f64) -> Vec<Value> {
        let tables = match self.tables.read() {
            Ok(tables) => tables,
            Err(_) => return Vec::new(),
        };
        let Some(docs) = tables.get(table) else {
            return Vec::new();
        };

        let query_terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(f64, &StoredDoc)> = docs
            .iter()
            .filter_map(|doc| {
                let content = doc.content.to_lowercase();
                let matches = query_terms.iter().filter(|t| content.contains(*t)).count();
                if matches == 0 {
                    return None;
                }
                let score = (matches as f64 / query_terms.len() as f64).min(0.9);
                (score >= threshold).then_some((score, doc))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(score, doc)| self.row_from_doc(doc, score))
            .collect()
    }

    fn row_from_doc(&self, doc: &StoredDoc, score: f64) -> Value {
        let mut row = Map::new();
        row.insert("id".to_string(), json!(doc.id));
        row.insert("name".to_string(), json!(doc.id));
        row.insert("score".to_string(), json!(score));
        row.insert("content".to_string(), json!(doc.content));
        row.insert("metadata".to_string(), Value::Object(doc.metadata.clone()));
        for key in ["skill_name", "tool_name", "category", "file_path", "input_schema"] {
            if let Some(value) = doc.metadata.get(key) {
                row.insert(key.to_string(), value.clone());
            }
        }
        Value::Object(row)
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn agentic_search(&self, request: AgenticSearchRequest) -> Result<Vec<Value>> {
        self.search_count.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.keyword_rows(
            &request.table_name,
            &request.query_text,
            request.limit,
            request.threshold,
        );
        if let Some(category) = request.category_filter.as_deref() {
            rows.retain(|row| {
                row.get("metadata")
                    .and_then(|m| m.get("category"))
                    .and_then(Value::as_str)
                    .is_some_and(|c| c.eq_ignore_ascii_case(category))
            });
        }
        Ok(rows)
    }

    async fn search_tools(&self, request: ToolSearchRequest) -> Result<Vec<Value>> {
        self.search_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.keyword_rows(
            &request.table_name,
            &request.query_text,
            request.limit,
            request.threshold,
        ))
    }

    async fn add_documents(&self, table_name: &str, batch: DocumentBatch) -> Result<()> {
        if !batch.is_aligned() {
            return Err(StoreError::Backend(
                "document batch columns are not the same length".to_string(),
            ));
        }
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;
        let docs = tables.entry(table_name.to_string()).or_default();
        for i in 0..batch.len() {
            let metadata = serde_json::from_str::<Value>(&batch.metadatas[i])
                .ok()
                .and_then(|v| v.as_object().cloned())
                .unwrap_or_default();
            // Upsert by id within one commit.
            docs.retain(|doc| doc.id != batch.ids[i]);
            docs.push(StoredDoc {
                id: batch.ids[i].clone(),
                content: batch.contents[i].clone(),
                metadata,
            });
        }
        self.commit_count.fetch_add(1, Ordering::SeqCst);
        log::debug!(
            "memory store committed {} docs into '{}'",
            batch.len(),
            table_name
        );
        Ok(())
    }

    async fn list_all(&self, collection: &str, source_filter: Option<&str>) -> Result<Vec<Value>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;
        let Some(docs) = tables.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .iter()
            .filter(|doc| {
                source_filter.is_none_or(|needle| {
                    doc.metadata
                        .get("source")
                        .and_then(Value::as_str)
                        .is_some_and(|source| source.contains(needle))
                })
            })
            .map(|doc| self.row_from_doc(doc, 0.0))
            .collect())
    }

    async fn list_all_tools(&self) -> Result<Vec<Value>> {
        self.list_all("skills", None).await
    }

    async fn count(&self, table_name: &str) -> Result<u64> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;
        Ok(tables.get(table_name).map_or(0, |docs| docs.len() as u64))
    }

    async fn get_table_info(&self, table_name: &str) -> Result<TableInfo> {
        Ok(TableInfo {
            row_count: self.count(table_name).await?,
        })
    }

    fn get_search_profile(&self) -> SearchProfile {
        SearchProfile::default()
    }

    fn supports_agentic_search(&self) -> bool {
        true
    }
}
