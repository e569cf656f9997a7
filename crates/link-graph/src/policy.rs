use crate::backend::LinkGraphBackend;
use crate::config::LinkGraphSettings;
use crate::error::Result;
use crate::models::{LinkGraphHit, LinkGraphMatchStrategy, LinkGraphSearchOptions};
use crate::runtime::LinkGraphRuntime;
use hive_protocol::{ConfidenceLevel, PlanBudgetRecord, PlanRecord, RetrievalMode};
use hive_vector_store::VectorStore;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Policy thresholds and limits shared across skills.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkGraphPolicyConfig {
    pub mode: RetrievalMode,
    pub candidate_multiplier: u32,
    pub max_sources: u32,
    pub min_graph_hits: u32,
    pub min_graph_score: f64,
    pub graph_rows_per_source: u32,
}

impl Default for LinkGraphPolicyConfig {
    fn default() -> Self {
        Self {
            mode: RetrievalMode::Hybrid,
            candidate_multiplier: 4,
            max_sources: 8,
            min_graph_hits: 2,
            min_graph_score: 0.25,
            graph_rows_per_source: 8,
        }
    }
}

impl LinkGraphPolicyConfig {
    #[must_use]
    pub fn with_mode(mode: RetrievalMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}

/// Source filter candidate derived from one graph hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkGraphSourceHint {
    pub source_filter: String,
    pub stem: String,
    pub graph_score: f64,
}

/// Budget constraints applied while planning retrieval. Clamped to `>= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalBudget {
    pub candidate_limit: u32,
    pub max_sources: u32,
    pub rows_per_source: u32,
}

impl RetrievalBudget {
    #[must_use]
    pub fn new(candidate_limit: u32, max_sources: u32, rows_per_source: u32) -> Self {
        Self {
            candidate_limit: candidate_limit.max(1),
            max_sources: max_sources.max(1),
            rows_per_source: rows_per_source.max(1),
        }
    }

    #[must_use]
    pub fn to_record(self) -> PlanBudgetRecord {
        PlanBudgetRecord::new(self.candidate_limit, self.max_sources, self.rows_per_source)
    }
}

/// Why the planner selected what it selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanReason {
    VectorOnlyRequested,
    BackendUnavailable,
    GraphSufficient,
    GraphInsufficient,
    GraphSearchTimeout,
    GraphOnlyRequested,
    GraphOnlyRequestedEmpty,
    GraphOnlySearchTimeout,
    GraphOnlyEmpty,
    GraphEmptyFallbackVector,
    PolicyErrorFallbackVector,
    VectorDefault,
}

impl PlanReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VectorOnlyRequested => "vector_only_requested",
            Self::BackendUnavailable => "backend_unavailable",
            Self::GraphSufficient => "graph_sufficient",
            Self::GraphInsufficient => "graph_insufficient",
            Self::GraphSearchTimeout => "graph_search_timeout",
            Self::GraphOnlyRequested => "graph_only_requested",
            Self::GraphOnlyRequestedEmpty => "graph_only_requested_empty",
            Self::GraphOnlySearchTimeout => "graph_only_search_timeout",
            Self::GraphOnlyEmpty => "graph_only_empty",
            Self::GraphEmptyFallbackVector => "graph_empty_fallback_vector",
            Self::PolicyErrorFallbackVector => "policy_error_fallback_vector",
            Self::VectorDefault => "vector_default",
        }
    }
}

/// Graph evidence gathered while planning, kept on both selection variants
/// so consumers can report hit counts even on the vector path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphEvidence {
    pub hits: Vec<LinkGraphHit>,
    pub hints: Vec<LinkGraphSourceHint>,
}

/// What the planner decided. Internal code branches on the variant; the
/// shared-schema record is the serialization boundary only.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanSelection {
    GraphOnly(GraphEvidence),
    VectorOnly(GraphEvidence),
}

impl PlanSelection {
    #[must_use]
    pub fn mode(&self) -> RetrievalMode {
        match self {
            Self::GraphOnly(_) => RetrievalMode::GraphOnly,
            Self::VectorOnly(_) => RetrievalMode::VectorOnly,
        }
    }

    #[must_use]
    pub fn evidence(&self) -> &GraphEvidence {
        match self {
            Self::GraphOnly(evidence) | Self::VectorOnly(evidence) => evidence,
        }
    }
}

/// Decision made by the graph/vector policy planner.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkGraphRetrievalPlan {
    pub requested_mode: RetrievalMode,
    pub selection: PlanSelection,
    pub reason: PlanReason,
    pub backend_name: String,
    pub graph_confidence_score: f64,
    pub graph_confidence_level: ConfidenceLevel,
    pub budget: RetrievalBudget,
}

impl LinkGraphRetrievalPlan {
    #[must_use]
    pub fn selected_mode(&self) -> RetrievalMode {
        self.selection.mode()
    }

    #[must_use]
    pub fn graph_hits(&self) -> &[LinkGraphHit] {
        &self.selection.evidence().hits
    }

    #[must_use]
    pub fn source_hints(&self) -> &[LinkGraphSourceHint] {
        &self.selection.evidence().hints
    }

    /// Canonical shared-schema retrieval plan payload.
    #[must_use]
    pub fn to_record(&self) -> PlanRecord {
        PlanRecord::build(
            self.requested_mode,
            self.selected_mode(),
            self.reason.as_str(),
            self.backend_name.clone(),
            self.graph_hits().len(),
            self.source_hints().len(),
            self.graph_confidence_score,
            self.graph_confidence_level,
            self.budget.to_record(),
        )
    }
}

fn build_plan(
    requested_mode: RetrievalMode,
    selection: PlanSelection,
    reason: PlanReason,
    backend_name: &str,
    graph_confidence_score: f64,
    graph_confidence_level: ConfidenceLevel,
    budget: RetrievalBudget,
) -> LinkGraphRetrievalPlan {
    let plan = LinkGraphRetrievalPlan {
        requested_mode,
        selection,
        reason,
        backend_name: if backend_name.trim().is_empty() {
            "unknown".to_string()
        } else {
            backend_name.to_string()
        },
        graph_confidence_score: graph_confidence_score.clamp(0.0, 1.0),
        graph_confidence_level,
        budget,
    };
    debug_assert!(plan.to_record().validate().is_ok());
    plan
}

// --- timeout buckets -----------------------------------------------------

/// Coarse query class used to scale the graph search timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryTimeoutBucket {
    Empty,
    MachineLike,
    Short,
    LongNatural,
    SymbolHeavy,
    Normal,
}

static SLUG_LIKE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").unwrap_or_else(|_| unreachable!()));
static WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9\x{4E00}-\x{9FFF}]+").unwrap_or_else(|_| unreachable!())
});

impl QueryTimeoutBucket {
    /// Classify a query. Slug-like tokens with digits, >= 4 `_`/`-`
    /// segments, or length >= 24 are machine identifiers; short and long
    /// natural-language shapes and punctuation-dense inputs get their own
    /// buckets.
    #[must_use]
    pub fn classify(query: &str) -> Self {
        let text = query.trim();
        if text.is_empty() {
            return Self::Empty;
        }
        let lowered = text.to_lowercase();
        let words = WORD_RE.find_iter(&lowered).count();
        let digit_count = lowered.chars().filter(char::is_ascii_digit).count();
        let punct_count = lowered
            .chars()
            .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
            .count();

        if SLUG_LIKE_RE.is_match(&lowered) {
            let segment_count = lowered
                .split(['_', '-'])
                .filter(|seg| !seg.is_empty())
                .count();
            if digit_count > 0 || segment_count >= 4 || lowered.len() >= 24 {
                return Self::MachineLike;
            }
        }

        if words > 0 && words <= 2 && lowered.len() <= 16 {
            return Self::Short;
        }

        if lowered.len() >= 80 || words >= 10 {
            return Self::LongNatural;
        }

        if punct_count > 3.max(lowered.len() / 4) {
            return Self::SymbolHeavy;
        }

        Self::Normal
    }
}

fn timeout_scale(bucket: QueryTimeoutBucket, settings: &LinkGraphSettings) -> f64 {
    let scales = &settings.policy_timeout_scales;
    match bucket {
        QueryTimeoutBucket::Empty => 0.2,
        QueryTimeoutBucket::MachineLike => scales.machine_like,
        QueryTimeoutBucket::Short => scales.short,
        QueryTimeoutBucket::LongNatural => scales.long_natural,
        QueryTimeoutBucket::SymbolHeavy => scales.symbol_heavy,
        QueryTimeoutBucket::Normal => scales.normal,
    }
}

fn search_timeout_seconds(query: &str, settings: &LinkGraphSettings) -> (f64, QueryTimeoutBucket) {
    let bucket = QueryTimeoutBucket::classify(query);
    let timeout = (settings.policy_search_timeout_s * timeout_scale(bucket, settings))
        .clamp(0.02, 30.0);
    (timeout, bucket)
}

fn looks_path_like_query(query: &str) -> bool {
    let lowered = query.trim().to_lowercase();
    if lowered.is_empty() {
        return false;
    }
    lowered.contains('/')
        || lowered.contains('\\')
        || lowered.ends_with(".md")
        || lowered.ends_with(".mdx")
        || lowered.ends_with(".markdown")
}

fn search_options_for_bucket(bucket: QueryTimeoutBucket, query: &str) -> LinkGraphSearchOptions {
    if looks_path_like_query(query) {
        return LinkGraphSearchOptions::with_strategy(LinkGraphMatchStrategy::PathFuzzy);
    }
    if bucket == QueryTimeoutBucket::MachineLike {
        return LinkGraphSearchOptions::with_strategy(LinkGraphMatchStrategy::Exact);
    }
    LinkGraphSearchOptions::with_strategy(LinkGraphMatchStrategy::Fts)
}

// --- plan cache key ------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct PlanCacheKey {
    backend_name: String,
    mode: RetrievalMode,
    limit: u32,
    candidate_multiplier: u32,
    min_graph_hits: u32,
    min_graph_score_bits: u64,
    max_sources: u32,
    rows_per_source: u32,
    query: String,
}

impl PlanCacheKey {
    fn new(backend_name: &str, limit: usize, config: &LinkGraphPolicyConfig, query: &str) -> Self {
        Self {
            backend_name: backend_name.to_string(),
            mode: config.mode,
            limit: u32::try_from(limit.max(1)).unwrap_or(u32::MAX),
            candidate_multiplier: config.candidate_multiplier.max(1),
            min_graph_hits: config.min_graph_hits.max(1),
            min_graph_score_bits: config.min_graph_score.max(0.0).to_bits(),
            max_sources: config.max_sources.max(1),
            rows_per_source: config.graph_rows_per_source.max(1),
            query: query.trim().to_lowercase(),
        }
    }
}

// --- confidence ----------------------------------------------------------

fn confidence_level_from_score(score: f64) -> ConfidenceLevel {
    let bounded = score.clamp(0.0, 1.0);
    if bounded <= 0.0 {
        ConfidenceLevel::None
    } else if bounded < 0.35 {
        ConfidenceLevel::Low
    } else if bounded < 0.7 {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::High
    }
}

fn compute_graph_confidence(
    hits: &[LinkGraphHit],
    min_hits: u32,
    min_top_score: f64,
) -> (f64, ConfidenceLevel) {
    if hits.is_empty() {
        return (0.0, ConfidenceLevel::None);
    }
    let count_score = (hits.len() as f64 / f64::from(min_hits.max(1))).min(1.0);
    let top_score = hits
        .iter()
        .map(|h| h.score)
        .fold(0.0_f64, f64::max)
        .clamp(0.0, 1.0);
    // Capped at 1.0 like the other terms, including when min_top_score is 0.
    let threshold_score = (top_score / min_top_score.max(f64::EPSILON)).min(1.0);
    let confidence =
        (0.45 * count_score + 0.35 * top_score + 0.2 * threshold_score).clamp(0.0, 1.0);
    (confidence, confidence_level_from_score(confidence))
}

fn graph_is_sufficient(hits: &[LinkGraphHit], min_hits: u32, min_top_score: f64) -> bool {
    if hits.is_empty() || hits.len() < min_hits.max(1) as usize {
        return false;
    }
    hits.iter().map(|h| h.score).fold(0.0_f64, f64::max) >= min_top_score
}

fn build_source_hints(hits: &[LinkGraphHit], max_sources: usize) -> Vec<LinkGraphSourceHint> {
    let mut hints = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    for hit in hits {
        let stem = hit.stem.trim().to_string();
        if stem.is_empty() {
            continue;
        }
        let score = hit.score.max(0.0);
        let path = hit.path.trim();

        let mut source_candidates: Vec<String> = Vec::new();
        if !path.is_empty() {
            if let Some(basename) = Path::new(path).file_name().and_then(|n| n.to_str()) {
                source_candidates.push(basename.to_string());
            }
            if !source_candidates.iter().any(|c| c == path) {
                source_candidates.push(path.to_string());
            }
        }
        if !source_candidates.iter().any(|c| c == &stem) {
            source_candidates.push(stem.clone());
        }

        for source_filter in source_candidates {
            let key = (source_filter.clone(), stem.clone());
            if !seen.insert(key) {
                continue;
            }
            hints.push(LinkGraphSourceHint {
                source_filter,
                stem: stem.clone(),
                graph_score: score,
            });
            if hints.len() >= max_sources {
                return hints;
            }
        }
    }
    hints
}

// --- planner -------------------------------------------------------------

/// Plans whether a query should run graph-only or fall back to vectors.
///
/// Every failure path degrades to a safe `vector_only` plan; this type never
/// surfaces an error to its caller.
pub struct RetrievalPolicyPlanner {
    runtime: Arc<LinkGraphRuntime>,
    settings: LinkGraphSettings,
    backend: Option<Arc<dyn LinkGraphBackend>>,
}

impl RetrievalPolicyPlanner {
    #[must_use]
    pub fn new(settings: LinkGraphSettings) -> Self {
        Self {
            runtime: LinkGraphRuntime::global(),
            settings,
            backend: None,
        }
    }

    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn LinkGraphBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    #[must_use]
    pub fn with_runtime(mut self, runtime: Arc<LinkGraphRuntime>) -> Self {
        self.runtime = runtime;
        self
    }

    #[must_use]
    pub fn runtime(&self) -> &Arc<LinkGraphRuntime> {
        &self.runtime
    }

    #[must_use]
    pub fn settings(&self) -> &LinkGraphSettings {
        &self.settings
    }

    /// Plan with the default policy config, optionally overriding the mode.
    pub async fn plan(
        &self,
        query: &str,
        limit: usize,
        mode: Option<RetrievalMode>,
    ) -> LinkGraphRetrievalPlan {
        let mut config = LinkGraphPolicyConfig::default();
        if let Some(mode) = mode {
            config.mode = mode;
        }
        self.plan_with_config(query, limit, &config).await
    }

    /// Plan with an explicit policy config.
    pub async fn plan_with_config(
        &self,
        query: &str,
        limit: usize,
        config: &LinkGraphPolicyConfig,
    ) -> LinkGraphRetrievalPlan {
        let budget = RetrievalBudget::new(
            u32::try_from(limit.max(1)).unwrap_or(u32::MAX).saturating_mul(config.candidate_multiplier.max(1)),
            config.max_sources,
            config.graph_rows_per_source,
        );
        match self.plan_inner(query, limit, config, budget).await {
            Ok(plan) => plan,
            Err(err) => {
                log::warn!("retrieval policy planning failed, falling back to vector: {err}");
                build_plan(
                    config.mode,
                    PlanSelection::VectorOnly(GraphEvidence::default()),
                    PlanReason::PolicyErrorFallbackVector,
                    "policy",
                    0.0,
                    ConfidenceLevel::None,
                    budget,
                )
            }
        }
    }

    async fn plan_inner(
        &self,
        query: &str,
        limit: usize,
        config: &LinkGraphPolicyConfig,
        budget: RetrievalBudget,
    ) -> Result<LinkGraphRetrievalPlan> {
        let requested = config.mode;

        if requested == RetrievalMode::VectorOnly {
            return Ok(build_plan(
                requested,
                PlanSelection::VectorOnly(GraphEvidence::default()),
                PlanReason::VectorOnlyRequested,
                "policy",
                0.0,
                ConfidenceLevel::None,
                budget,
            ));
        }

        let Some(backend) = self.backend.clone() else {
            let selection = match requested {
                RetrievalMode::GraphOnly => PlanSelection::GraphOnly(GraphEvidence::default()),
                _ => PlanSelection::VectorOnly(GraphEvidence::default()),
            };
            return Ok(build_plan(
                requested,
                selection,
                PlanReason::BackendUnavailable,
                "unavailable",
                0.0,
                ConfidenceLevel::None,
                budget,
            ));
        };

        let backend_name = backend.backend_name().to_string();
        let cache_key = PlanCacheKey::new(&backend_name, limit, config, query);
        if let Some(cached) = self.runtime.plan_cache_get(&cache_key) {
            log::debug!("retrieval policy cache hit for '{}'", cache_key.query);
            return Ok(cached);
        }

        let (timeout_s, bucket) = search_timeout_seconds(query, &self.settings);
        let options = search_options_for_bucket(bucket, query);
        let candidate_limit = budget.candidate_limit as usize;

        let mut timed_out = false;
        let hits = match tokio::time::timeout(
            Duration::from_secs_f64(timeout_s),
            backend.search_planned(query, candidate_limit, Some(options)),
        )
        .await
        {
            Ok(Ok(planned)) => planned.hits,
            Ok(Err(err)) => {
                log::debug!("graph search failed during planning: {err}");
                Vec::new()
            }
            Err(_) => {
                timed_out = true;
                self.runtime.note_graph_search_timeout(
                    query,
                    Duration::from_secs_f64(self.settings.timeout_marker_ttl_s.max(0.0)),
                );
                log::debug!(
                    "graph search timed out after {timeout_s:.3}s (bucket {bucket:?})"
                );
                Vec::new()
            }
        };

        let hints = build_source_hints(&hits, config.max_sources.max(1) as usize);
        let (confidence_score, confidence_level) =
            compute_graph_confidence(&hits, config.min_graph_hits, config.min_graph_score.max(0.0));

        let plan = if requested == RetrievalMode::GraphOnly {
            let reason = if timed_out {
                PlanReason::GraphOnlySearchTimeout
            } else if hits.is_empty() {
                PlanReason::GraphOnlyRequestedEmpty
            } else {
                PlanReason::GraphOnlyRequested
            };
            build_plan(
                requested,
                PlanSelection::GraphOnly(GraphEvidence { hits, hints }),
                reason,
                &backend_name,
                confidence_score,
                confidence_level,
                budget,
            )
        } else if graph_is_sufficient(&hits, config.min_graph_hits, config.min_graph_score.max(0.0))
        {
            build_plan(
                requested,
                PlanSelection::GraphOnly(GraphEvidence { hits, hints }),
                PlanReason::GraphSufficient,
                &backend_name,
                confidence_score,
                confidence_level,
                budget,
            )
        } else {
            build_plan(
                requested,
                PlanSelection::VectorOnly(GraphEvidence { hits, hints }),
                if timed_out {
                    PlanReason::GraphSearchTimeout
                } else {
                    PlanReason::GraphInsufficient
                },
                &backend_name,
                confidence_score,
                confidence_level,
                budget,
            )
        };

        self.runtime.plan_cache_put(
            cache_key,
            plan.clone(),
            Duration::from_secs_f64(self.settings.policy_cache_ttl_s.max(0.0)),
        );
        Ok(plan)
    }
}

// --- graph row fetch -----------------------------------------------------

/// Chunk row produced by graph-policy fetch and consumed by recall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRow {
    pub content: String,
    pub source: String,
    pub score: f64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub section: String,
}

fn entry_metadata(entry: &Value) -> serde_json::Map<String, Value> {
    match entry.get("metadata") {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        },
        _ => serde_json::Map::new(),
    }
}

/// Fetch chunk rows by graph-derived source candidates.
///
/// A row is accepted when its source contains the hint's filter or its stem
/// equals the hint's stem; rows dedup by `(source, chunk_index)` and score
/// as `graph_score - max(chunk_index, 0) * 0.0001` so earlier chunks of the
/// same note rank first.
pub async fn fetch_graph_rows_by_policy(
    store: &dyn VectorStore,
    collection: &str,
    source_hints: &[LinkGraphSourceHint],
    limit: usize,
    rows_per_source: usize,
) -> Vec<ChunkRow> {
    let fetch_limit = limit.max(1);
    if source_hints.is_empty() {
        return Vec::new();
    }

    let total_cap = fetch_limit * 4;
    let rows_per_source = rows_per_source.max(1);
    let mut out: Vec<ChunkRow> = Vec::new();
    let mut seen: HashSet<(String, i64)> = HashSet::new();

    'hints: for hint in source_hints {
        let entries = match store
            .list_all(collection, Some(hint.source_filter.as_str()))
            .await
        {
            Ok(entries) => entries,
            Err(err) => {
                log::debug!(
                    "graph row fetch failed for filter '{}': {err}",
                    hint.source_filter
                );
                continue;
            }
        };
        if entries.is_empty() {
            continue;
        }

        let mut accepted = 0usize;
        for entry in &entries {
            if !entry.is_object() {
                continue;
            }
            let metadata = entry_metadata(entry);
            let source = metadata
                .get("source")
                .and_then(Value::as_str)
                .or_else(|| entry.get("id").and_then(Value::as_str))
                .unwrap_or_default()
                .trim()
                .to_string();
            if source.is_empty() {
                continue;
            }
            let stem = Path::new(&source)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            if !source.contains(&hint.source_filter) && stem != hint.stem {
                continue;
            }

            let chunk_index = metadata
                .get("chunk_index")
                .and_then(Value::as_i64)
                .unwrap_or(-1);
            if !seen.insert((source.clone(), chunk_index)) {
                continue;
            }

            out.push(ChunkRow {
                content: entry
                    .get("content")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                source,
                score: (hint.graph_score - chunk_index.max(0) as f64 * 0.0001).max(0.0),
                title: metadata
                    .get("title")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                section: metadata
                    .get("section")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
            accepted += 1;
            if accepted >= rows_per_source {
                break;
            }
            if out.len() >= total_cap {
                break 'hints;
            }
        }

        if out.len() >= total_cap {
            break;
        }
    }

    out.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    out.truncate(total_cap);
    out
}

// --- thin global accessors ----------------------------------------------

/// Record a recent graph-search timeout in the global runtime.
pub fn note_recent_graph_search_timeout(query: &str, ttl: Duration) {
    LinkGraphRuntime::global().note_graph_search_timeout(query, ttl);
}

/// Consume one timeout marker for the query from the global runtime.
#[must_use]
pub fn take_recent_graph_search_timeout(query: &str) -> bool {
    LinkGraphRuntime::global().take_graph_search_timeout(query)
}
