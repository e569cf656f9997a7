use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters for the agentic (intent-aware) hybrid search path.
#[derive(Debug, Clone, Default)]
pub struct AgenticSearchRequest {
    pub table_name: String,
    /// Empty vector means keyword-only search.
    pub query_vector: Vec<f32>,
    pub query_text: String,
    pub limit: usize,
    pub threshold: f64,
    pub intent: Option<String>,
    pub confidence_profile: Option<Value>,
    pub rerank: bool,
    pub category_filter: Option<String>,
    pub semantic_weight: Option<f64>,
    pub keyword_weight: Option<f64>,
}

/// Parameters for the plain tool search path (fallback when the engine has
/// no agentic entry point).
#[derive(Debug, Clone, Default)]
pub struct ToolSearchRequest {
    pub table_name: String,
    pub query_vector: Vec<f32>,
    pub query_text: String,
    pub limit: usize,
    pub threshold: f64,
    pub confidence_profile: Option<Value>,
    pub rerank: bool,
}

/// A batch of documents committed to the store in a single call.
///
/// All four columns must be the same length; the store commits them as one
/// transaction so a crash never leaves a half-written table.
#[derive(Debug, Clone, Default)]
pub struct DocumentBatch {
    pub ids: Vec<String>,
    pub vectors: Vec<Vec<f32>>,
    pub contents: Vec<String>,
    pub metadatas: Vec<String>,
}

impl DocumentBatch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn is_aligned(&self) -> bool {
        self.ids.len() == self.vectors.len()
            && self.ids.len() == self.contents.len()
            && self.ids.len() == self.metadatas.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub row_count: u64,
}

/// Fusion profile the engine applies when the caller does not override
/// weights per query. Keyword weight is higher by default because exact
/// keyword matches are more reliable relevance signals for tool search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchProfile {
    pub semantic_weight: f64,
    pub keyword_weight: f64,
    pub rrf_k: f64,
}

impl Default for SearchProfile {
    fn default() -> Self {
        Self {
            semantic_weight: 1.0,
            keyword_weight: 1.5,
            rrf_k: 10.0,
        }
    }
}

/// Native hybrid store handle.
///
/// Rows come back as raw JSON objects exactly as the engine produced them;
/// [`crate::parse_tool_search_payload`] is the strict boundary that turns a
/// row into a typed payload. Read operations are safe to call concurrently
/// from any task; `add_documents` is serialized by the caller.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Intent-aware hybrid search. Engines without this capability should
    /// return [`crate::StoreError::Backend`]; callers then use
    /// [`VectorStore::search_tools`].
    async fn agentic_search(&self, request: AgenticSearchRequest) -> Result<Vec<Value>>;

    async fn search_tools(&self, request: ToolSearchRequest) -> Result<Vec<Value>>;

    /// Single-commit batch upsert.
    async fn add_documents(&self, table_name: &str, batch: DocumentBatch) -> Result<()>;

    /// List rows of a collection, optionally filtered by source substring.
    async fn list_all(&self, collection: &str, source_filter: Option<&str>) -> Result<Vec<Value>>;

    /// All indexed tool rows, for registry hydration.
    async fn list_all_tools(&self) -> Result<Vec<Value>>;

    async fn count(&self, table_name: &str) -> Result<u64>;

    async fn get_table_info(&self, table_name: &str) -> Result<TableInfo>;

    fn get_search_profile(&self) -> SearchProfile;

    /// Whether the agentic entry point is implemented.
    fn supports_agentic_search(&self) -> bool {
        true
    }
}
