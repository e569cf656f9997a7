use crate::policy::{
    fetch_graph_rows_by_policy, ChunkRow, LinkGraphPolicyConfig, PlanReason,
    RetrievalPolicyPlanner,
};
use hive_protocol::{
    ConfidenceLevel, PlanRecord, RetrievalMode, LINK_GRAPH_RETRIEVAL_PLAN_SCHEMA_ID,
};
use hive_vector_store::VectorStore;
use serde::{Deserialize, Serialize};

/// Inputs for one recall policy evaluation.
#[derive(Debug, Clone)]
pub struct RecallPolicyRequest {
    pub query: String,
    pub limit: usize,
    pub mode: RetrievalMode,
    pub collection: String,
}

impl RecallPolicyRequest {
    #[must_use]
    pub fn new(query: impl Into<String>, limit: usize, mode: RetrievalMode) -> Self {
        Self {
            query: query.into(),
            limit,
            mode,
            collection: "knowledge_chunks".to_string(),
        }
    }
}

/// Decision payload consumed by knowledge recall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallPolicyDecision {
    pub retrieval_path: RetrievalMode,
    pub retrieval_reason: String,
    pub graph_backend: String,
    pub graph_hit_count: usize,
    pub graph_confidence_score: f64,
    pub graph_confidence_level: ConfidenceLevel,
    pub plan_schema_id: String,
    pub plan_record: Option<PlanRecord>,
    pub graph_rows: Vec<ChunkRow>,
    pub graph_only_empty: bool,
}

impl Default for RecallPolicyDecision {
    fn default() -> Self {
        Self {
            retrieval_path: RetrievalMode::VectorOnly,
            retrieval_reason: PlanReason::VectorDefault.as_str().to_string(),
            graph_backend: String::new(),
            graph_hit_count: 0,
            graph_confidence_score: 0.0,
            graph_confidence_level: ConfidenceLevel::None,
            plan_schema_id: String::new(),
            plan_record: None,
            graph_rows: Vec::new(),
            graph_only_empty: false,
        }
    }
}

fn override_plan_record(
    record: Option<PlanRecord>,
    selected_mode: RetrievalMode,
    reason: PlanReason,
) -> Option<PlanRecord> {
    record.map(|mut record| {
        record.selected_mode = selected_mode;
        record.reason = reason.as_str().to_string();
        record
    })
}

/// Evaluate the policy and, on the graph path, fetch graph rows.
///
/// Empty graph rows fall back: to `graph_only_empty` when the caller asked
/// for graph-only, else to `vector_only`/`graph_empty_fallback_vector` with
/// the plan record rewritten to match what actually happened.
pub async fn evaluate_link_graph_recall_policy(
    planner: &RetrievalPolicyPlanner,
    store: &dyn VectorStore,
    request: &RecallPolicyRequest,
) -> RecallPolicyDecision {
    let config = LinkGraphPolicyConfig::with_mode(request.mode);
    let plan = planner
        .plan_with_config(&request.query, request.limit, &config)
        .await;
    let plan_record = plan.to_record();

    let base = RecallPolicyDecision {
        retrieval_path: plan.selected_mode(),
        retrieval_reason: plan.reason.as_str().to_string(),
        graph_backend: plan.backend_name.clone(),
        graph_hit_count: plan.graph_hits().len(),
        graph_confidence_score: plan.graph_confidence_score,
        graph_confidence_level: plan.graph_confidence_level,
        plan_schema_id: LINK_GRAPH_RETRIEVAL_PLAN_SCHEMA_ID.to_string(),
        plan_record: Some(plan_record),
        ..Default::default()
    };

    if base.retrieval_path != RetrievalMode::GraphOnly {
        return base;
    }

    let graph_rows = fetch_graph_rows_by_policy(
        store,
        &request.collection,
        plan.source_hints(),
        request.limit,
        config.graph_rows_per_source as usize,
    )
    .await;

    if !graph_rows.is_empty() {
        return RecallPolicyDecision {
            graph_rows,
            ..base
        };
    }

    if plan.requested_mode == RetrievalMode::GraphOnly {
        return RecallPolicyDecision {
            retrieval_reason: PlanReason::GraphOnlyEmpty.as_str().to_string(),
            graph_only_empty: true,
            ..base
        };
    }

    RecallPolicyDecision {
        retrieval_path: RetrievalMode::VectorOnly,
        retrieval_reason: PlanReason::GraphEmptyFallbackVector.as_str().to_string(),
        plan_record: override_plan_record(
            base.plan_record.clone(),
            RetrievalMode::VectorOnly,
            PlanReason::GraphEmptyFallbackVector,
        ),
        ..base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LinkGraphBackend, PlannedSearch};
    use crate::config::LinkGraphSettings;
    use crate::error::Result;
    use crate::models::{
        LinkGraphDirection, LinkGraphHit, LinkGraphMetadata, LinkGraphNeighbor,
        LinkGraphSearchOptions,
    };
    use crate::runtime::LinkGraphRuntime;
    use async_trait::async_trait;
    use hive_vector_store::{DocumentBatch, MemoryVectorStore};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct HitsBackend {
        hits: Vec<LinkGraphHit>,
    }

    #[async_trait]
    impl LinkGraphBackend for HitsBackend {
        fn backend_name(&self) -> &str {
            "hits"
        }

        async fn search_planned(
            &self,
            query: &str,
            limit: usize,
            options: Option<LinkGraphSearchOptions>,
        ) -> Result<PlannedSearch> {
            let mut hits = self.hits.clone();
            hits.truncate(limit);
            Ok(PlannedSearch {
                query: query.to_string(),
                search_options: options.unwrap_or_default(),
                hits,
            })
        }

        async fn neighbors(
            &self,
            _stem: &str,
            _direction: LinkGraphDirection,
            _hops: u32,
            _limit: usize,
        ) -> Result<Vec<LinkGraphNeighbor>> {
            Ok(Vec::new())
        }

        async fn related(
            &self,
            _stem: &str,
            _max_distance: u32,
            _limit: usize,
        ) -> Result<Vec<LinkGraphNeighbor>> {
            Ok(Vec::new())
        }

        async fn metadata(&self, _stem: &str) -> Result<Option<LinkGraphMetadata>> {
            Ok(None)
        }

        async fn toc(&self, _limit: usize) -> Result<Vec<Value>> {
            Ok(Vec::new())
        }

        async fn stats(&self) -> Result<Value> {
            Ok(Value::Null)
        }

        async fn refresh_with_delta(&self, _paths: &[String], _full: bool) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    fn hit(stem: &str, score: f64) -> LinkGraphHit {
        LinkGraphHit {
            stem: stem.to_string(),
            score,
            title: String::new(),
            path: format!("notes/{stem}.md"),
            best_section: String::new(),
            match_reason: String::new(),
        }
    }

    fn planner_with(hits: Vec<LinkGraphHit>) -> RetrievalPolicyPlanner {
        RetrievalPolicyPlanner::new(LinkGraphSettings::default())
            .with_runtime(LinkGraphRuntime::new())
            .with_backend(Arc::new(HitsBackend { hits }))
    }

    async fn seeded_store() -> MemoryVectorStore {
        let store = MemoryVectorStore::new();
        store
            .add_documents(
                "knowledge_chunks",
                DocumentBatch {
                    ids: vec!["c1".to_string(), "c2".to_string()],
                    vectors: vec![Vec::new(), Vec::new()],
                    contents: vec!["ownership rules".to_string(), "borrow checker".to_string()],
                    metadatas: vec![
                        json!({"source": "notes/ownership.md", "chunk_index": 0}).to_string(),
                        json!({"source": "notes/ownership.md", "chunk_index": 1}).to_string(),
                    ],
                },
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn graph_path_carries_rows() {
        let planner = planner_with(vec![hit("ownership", 0.9), hit("borrowing", 0.7)]);
        let store = seeded_store().await;
        let decision = evaluate_link_graph_recall_policy(
            &planner,
            &store,
            &RecallPolicyRequest::new("ownership", 5, RetrievalMode::Hybrid),
        )
        .await;

        assert_eq!(decision.retrieval_path, RetrievalMode::GraphOnly);
        assert_eq!(decision.retrieval_reason, "graph_sufficient");
        assert_eq!(decision.graph_hit_count, 2);
        assert!(!decision.graph_rows.is_empty());
        assert_eq!(
            decision.plan_schema_id,
            LINK_GRAPH_RETRIEVAL_PLAN_SCHEMA_ID
        );
    }

    #[tokio::test]
    async fn empty_graph_rows_fall_back_to_vector() {
        let planner = planner_with(vec![hit("missing-note", 0.9), hit("other", 0.8)]);
        let store = MemoryVectorStore::new();
        let decision = evaluate_link_graph_recall_policy(
            &planner,
            &store,
            &RecallPolicyRequest::new("anything", 5, RetrievalMode::Hybrid),
        )
        .await;

        assert_eq!(decision.retrieval_path, RetrievalMode::VectorOnly);
        assert_eq!(decision.retrieval_reason, "graph_empty_fallback_vector");
        let record = decision.plan_record.unwrap();
        assert_eq!(record.selected_mode, RetrievalMode::VectorOnly);
        assert_eq!(record.reason, "graph_empty_fallback_vector");
        record.validate().unwrap();
    }

    #[tokio::test]
    async fn graph_only_with_empty_rows_reports_graph_only_empty() {
        let planner = planner_with(vec![hit("missing-note", 0.9)]);
        let store = MemoryVectorStore::new();
        let decision = evaluate_link_graph_recall_policy(
            &planner,
            &store,
            &RecallPolicyRequest::new("anything", 5, RetrievalMode::GraphOnly),
        )
        .await;

        assert_eq!(decision.retrieval_path, RetrievalMode::GraphOnly);
        assert_eq!(decision.retrieval_reason, "graph_only_empty");
        assert!(decision.graph_only_empty);
    }

    #[tokio::test]
    async fn vector_only_request_never_touches_the_store() {
        let planner = planner_with(vec![hit("ownership", 0.9)]);
        let store = MemoryVectorStore::new();
        let decision = evaluate_link_graph_recall_policy(
            &planner,
            &store,
            &RecallPolicyRequest::new("anything", 5, RetrievalMode::VectorOnly),
        )
        .await;
        assert_eq!(decision.retrieval_path, RetrievalMode::VectorOnly);
        assert_eq!(decision.retrieval_reason, "vector_only_requested");
        assert!(decision.graph_rows.is_empty());
    }
}
