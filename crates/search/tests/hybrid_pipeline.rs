//! Pipeline-level scenarios against a scripted native store.

use async_trait::async_trait;
use hive_search::{
    HybridSearch, SearchConfidence, SearchOptions, SearchSettings, ToolSearchIntent,
};
use hive_vector_store::{
    AgenticSearchRequest, DocumentBatch, EmbeddingService, SearchProfile, StoreError, TableInfo,
    ToolSearchRequest, VectorStore,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

struct ScriptedStore {
    rows: Vec<Value>,
    filtered_rows_empty: bool,
    requests: Mutex<Vec<AgenticSearchRequest>>,
}

impl ScriptedStore {
    fn new(rows: Vec<Value>) -> Self {
        Self {
            rows,
            filtered_rows_empty: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn with_empty_filtered_rows(mut self) -> Self {
        self.filtered_rows_empty = true;
        self
    }

    fn recorded_requests(&self) -> Vec<AgenticSearchRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl VectorStore for ScriptedStore {
    async fn agentic_search(
        &self,
        request: AgenticSearchRequest,
    ) -> hive_vector_store::Result<Vec<Value>> {
        let filtered = request.category_filter.is_some();
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        if filtered && self.filtered_rows_empty {
            return Ok(Vec::new());
        }
        Ok(self.rows.clone())
    }

    async fn search_tools(
        &self,
        _request: ToolSearchRequest,
    ) -> hive_vector_store::Result<Vec<Value>> {
        Ok(self.rows.clone())
    }

    async fn add_documents(
        &self,
        _table_name: &str,
        _batch: DocumentBatch,
    ) -> hive_vector_store::Result<()> {
        Ok(())
    }

    async fn list_all(
        &self,
        _collection: &str,
        _source_filter: Option<&str>,
    ) -> hive_vector_store::Result<Vec<Value>> {
        Ok(Vec::new())
    }

    async fn list_all_tools(&self) -> hive_vector_store::Result<Vec<Value>> {
        Ok(self.rows.clone())
    }

    async fn count(&self, _table_name: &str) -> hive_vector_store::Result<u64> {
        Ok(self.rows.len() as u64)
    }

    async fn get_table_info(&self, _table_name: &str) -> hive_vector_store::Result<TableInfo> {
        Ok(TableInfo {
            row_count: self.rows.len() as u64,
        })
    }

    fn get_search_profile(&self) -> SearchProfile {
        SearchProfile::default()
    }
}

struct StubEmbedder {
    fail: AtomicBool,
}

impl StubEmbedder {
    fn new() -> Self {
        Self {
            fail: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl EmbeddingService for StubEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> hive_vector_store::Result<Vec<Vec<f32>>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Embedding("model offline".to_string()));
        }
        Ok(texts.iter().map(|t| vec![t.len() as f32, 0.5]).collect())
    }

    fn dimension(&self) -> usize {
        2
    }

    fn backend(&self) -> &str {
        "stub"
    }
}

fn researcher_row(score: f64) -> Value {
    json!({
        "name": "web.research",
        "score": score,
        "content": "COMMAND: web.research",
        "skill_name": "web",
        "tool_name": "web.research",
        "confidence": "medium",
        "routing_keywords": ["research", "analyze_repo", "repository"],
        "input_schema": {"properties": {"url": {"type": "string"}}},
        "metadata": {"intents": ["research"], "category": "research_tools"}
    })
}

fn crawler_row(score: f64) -> Value {
    json!({
        "name": "crawler.fetch",
        "score": score,
        "content": "COMMAND: crawler.fetch",
        "skill_name": "crawler",
        "tool_name": "crawler.fetch",
        "confidence": "medium",
        "routing_keywords": ["crawl", "fetch", "page"],
        "input_schema": {"properties": {"url": {"type": "string"}}},
        "metadata": {"intents": ["crawl"], "category": "web"}
    })
}

fn pipeline(store: Arc<ScriptedStore>) -> (HybridSearch, Arc<StubEmbedder>) {
    let embedder = Arc::new(StubEmbedder::new());
    let search = HybridSearch::new(
        store as Arc<dyn VectorStore>,
        Arc::clone(&embedder) as Arc<dyn EmbeddingService>,
    );
    (search, embedder)
}

#[tokio::test]
async fn research_over_url_prefers_repo_analyzer() {
    // The crawler starts AHEAD of the researcher on raw fusion score; the
    // research+URL rerank must flip the order.
    let store = Arc::new(ScriptedStore::new(vec![
        crawler_row(0.55),
        researcher_row(0.50),
    ]));
    let (search, _) = pipeline(Arc::clone(&store));

    let results = search
        .search(
            "help me research https://github.com/foo/bar",
            &SearchOptions::default(),
        )
        .await;

    assert_eq!(results[0].id, "web.research");
    assert_eq!(results[0].confidence, SearchConfidence::High);
    assert!(results[0].boosts.research_url > 0.0);
    assert!(results[0].boosts.param_schema > 0.0);
    assert!(results[0].final_score <= 1.0);

    // Deep candidate pool and intent-shaped keyword text went to the store.
    let requests = store.recorded_requests();
    assert_eq!(requests[0].limit, 100);
    assert!(requests[0].query_text.contains("research"));
    assert!(requests[0].query_text.contains("analyze repo"));
    // The embedding input was the intent text, not the URL placeholder.
    assert!(!requests[0].query_text.contains("github.com"));
}

#[tokio::test]
async fn plain_queries_use_the_requested_limit() {
    let store = Arc::new(ScriptedStore::new(vec![researcher_row(0.6)]));
    let (search, _) = pipeline(Arc::clone(&store));

    let _ = search.search("research the codebase", &SearchOptions::default()).await;
    let requests = store.recorded_requests();
    assert_eq!(requests[0].limit, 5);
}

#[tokio::test]
async fn embedding_failure_degrades_to_keyword_only() {
    let store = Arc::new(ScriptedStore::new(vec![crawler_row(0.6)]));
    let (search, embedder) = pipeline(Arc::clone(&store));
    embedder.fail.store(true, Ordering::SeqCst);

    let results = search.search("crawl the docs page", &SearchOptions::default()).await;
    assert_eq!(results.len(), 1);

    let requests = store.recorded_requests();
    assert!(requests[0].query_vector.is_empty());
}

#[tokio::test]
async fn empty_category_rows_retry_without_filter() {
    let store = Arc::new(
        ScriptedStore::new(vec![researcher_row(0.6)]).with_empty_filtered_rows(),
    );
    let (search, _) = pipeline(Arc::clone(&store));

    // "read the config file" resolves to the filesystem category.
    let results = search.search("read the config file", &SearchOptions::default()).await;
    assert_eq!(results.len(), 1);

    let requests = store.recorded_requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].category_filter.is_some());
    assert!(requests[1].category_filter.is_none());
}

#[tokio::test]
async fn non_routable_rows_are_dropped() {
    let store = Arc::new(ScriptedStore::new(vec![
        researcher_row(0.6),
        json!({"name": "123e4567-e89b-12d3-a456-426614174000", "score": 0.9}),
        json!({"name": "no score either way"}),
    ]));
    let (search, _) = pipeline(store);

    let results = search.search("research the repo", &SearchOptions::default()).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "web.research");
}

#[tokio::test]
async fn dotless_tool_names_canonicalize_with_skill_prefix() {
    let store = Arc::new(ScriptedStore::new(vec![json!({
        "name": "commit",
        "tool_name": "commit",
        "skill_name": "git",
        "score": 0.8,
    })]));
    let (search, _) = pipeline(store);

    let results = search.search("commit the changes", &SearchOptions::default()).await;
    assert_eq!(results[0].id, "git.commit");
    assert_eq!(results[0].skill_name, "git");
    assert_eq!(results[0].command, "commit");
}

#[tokio::test]
async fn results_are_sorted_descending_after_every_stage() {
    let store = Arc::new(ScriptedStore::new(vec![
        crawler_row(0.30),
        researcher_row(0.28),
        json!({"name": "fs.read", "score": 0.61, "skill_name": "fs", "tool_name": "fs.read"}),
    ]));
    let (search, _) = pipeline(store);

    let results = search
        .search(
            "research https://github.com/foo/bar",
            &SearchOptions::with_limit(10),
        )
        .await;
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn intent_override_short_circuits_classification() {
    let store = Arc::new(ScriptedStore::new(vec![researcher_row(0.6)]));
    let (search, _) = pipeline(Arc::clone(&store));

    let options = SearchOptions {
        intent_override: Some(ToolSearchIntent::Exact),
        ..Default::default()
    };
    let _ = search.search("read the config file", &options).await;

    let requests = store.recorded_requests();
    assert_eq!(requests[0].intent.as_deref(), Some("exact"));
    // Override also suppresses the rule-derived category filter.
    assert!(requests[0].category_filter.is_none());
}

#[tokio::test]
async fn custom_settings_change_table_and_vocab() {
    let store = Arc::new(ScriptedStore::new(vec![researcher_row(0.6)]));
    let embedder = Arc::new(StubEmbedder::new());
    let search = HybridSearch::new(
        Arc::clone(&store) as Arc<dyn VectorStore>,
        embedder as Arc<dyn EmbeddingService>,
    )
    .with_settings(SearchSettings {
        table_name: "tools".to_string(),
        ..Default::default()
    });

    let _ = search.search("research something", &SearchOptions::default()).await;
    let requests = store.recorded_requests();
    assert_eq!(requests[0].table_name, "tools");
}
