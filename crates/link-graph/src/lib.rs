//! # Hive Link Graph
//!
//! Graph-first retrieval on top of a note link graph:
//!
//! - [`LinkGraphBackend`] — the backend-agnostic contract (search, neighbors,
//!   metadata, stats), with [`NoteGraphBackend`] as the adapter shell over a
//!   raw row-producing engine.
//! - [`RetrievalPolicyPlanner`] — decides `graph_only` vs `vector_only` per
//!   query under per-bucket timeouts, with a plan cache and timeout markers.
//! - [`apply_link_graph_proximity_boost`] — rescoring of ranked chunk rows by
//!   link adjacency and shared tags, with bounded concurrency and a
//!   whole-call deadline.
//! - Stats caching with probe + background refresh, and the recall-policy
//!   orchestration consumed by knowledge recall.
//!
//! Process-wide state (plan cache, timeout markers, stats cache, stem cache)
//! lives in a [`LinkGraphRuntime`]; `LinkGraphRuntime::global()` is the thin
//! default for hosts that do not inject their own.

mod backend;
mod config;
mod error;
mod models;
mod policy;
mod proximity;
mod recall;
mod results;
mod runtime;
mod stats_cache;

pub use backend::{LinkGraphBackend, NoteGraphBackend, PlannedSearch, RawNoteEngine};
pub use config::{LinkGraphSettings, ProximitySettings, TimeoutScales};
pub use error::{LinkGraphError, Result};
pub use models::{
    LinkGraphDirection, LinkGraphEdgeType, LinkGraphHit, LinkGraphLinkFilter,
    LinkGraphMatchStrategy, LinkGraphMetadata, LinkGraphNeighbor, LinkGraphRelatedFilter,
    LinkGraphScope, LinkGraphSearchFilters, LinkGraphSearchOptions, LinkGraphSortField,
    LinkGraphSortOrder, LinkGraphSortTerm, LinkGraphTagFilter,
};
pub use policy::{
    fetch_graph_rows_by_policy, note_recent_graph_search_timeout,
    take_recent_graph_search_timeout, ChunkRow, GraphEvidence, LinkGraphPolicyConfig,
    LinkGraphRetrievalPlan, LinkGraphSourceHint, PlanReason, PlanSelection, QueryTimeoutBucket,
    RetrievalBudget, RetrievalPolicyPlanner,
};
pub use proximity::{apply_link_graph_proximity_boost, ProximityOptions};
pub use recall::{evaluate_link_graph_recall_policy, RecallPolicyDecision, RecallPolicyRequest};
pub use results::{
    link_graph_hits_to_hybrid_results, link_graph_hits_to_search_results, merge_hybrid_results,
    normalize_link_graph_direction, vector_rows_to_hybrid_results, GraphSearchRow, HybridRow,
    NoteRef,
};
pub use runtime::LinkGraphRuntime;
pub use stats_cache::{
    clear_link_graph_stats_cache, get_cached_link_graph_stats, get_link_graph_stats_for_response,
    schedule_link_graph_stats_refresh, StatsCacheOptions,
};

// Re-export the shared-schema types consumers verify against.
pub use hive_protocol::{ConfidenceLevel, PlanRecord, RetrievalMode, StatsMeta, StatsPayload};
