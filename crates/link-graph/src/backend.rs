use crate::error::{LinkGraphError, Result};
use crate::models::{
    LinkGraphDirection, LinkGraphHit, LinkGraphMetadata, LinkGraphNeighbor, LinkGraphSearchOptions,
};
use crate::results::normalize_link_graph_direction;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Parsed search plan returned by [`LinkGraphBackend::search_planned`].
#[derive(Debug, Clone)]
pub struct PlannedSearch {
    /// The query as the backend parsed it.
    pub query: String,
    /// The options the backend actually applied, normalized.
    pub search_options: LinkGraphSearchOptions,
    /// Hits ordered by backend relevance.
    pub hits: Vec<LinkGraphHit>,
}

/// Backend-agnostic contract for graph-first retrieval operations.
///
/// Implementations normalize their engine rows into the typed models; the
/// core never sees engine-specific shapes. `stats` and `refresh_with_delta`
/// return raw JSON because their payloads are adapter-defined.
#[async_trait]
pub trait LinkGraphBackend: Send + Sync {
    fn backend_name(&self) -> &str;

    /// Search and return the parsed plan with effective options and hits.
    /// Options must be validated; unknown fields are schema violations.
    async fn search_planned(
        &self,
        query: &str,
        limit: usize,
        options: Option<LinkGraphSearchOptions>,
    ) -> Result<PlannedSearch>;

    async fn neighbors(
        &self,
        stem: &str,
        direction: LinkGraphDirection,
        hops: u32,
        limit: usize,
    ) -> Result<Vec<LinkGraphNeighbor>>;

    async fn related(
        &self,
        stem: &str,
        max_distance: u32,
        limit: usize,
    ) -> Result<Vec<LinkGraphNeighbor>>;

    async fn metadata(&self, stem: &str) -> Result<Option<LinkGraphMetadata>>;

    async fn toc(&self, limit: usize) -> Result<Vec<Value>>;

    async fn stats(&self) -> Result<Value>;

    /// Refresh the backend index from changed paths, or fully when forced.
    async fn refresh_with_delta(&self, changed_paths: &[String], force_full: bool)
        -> Result<Value>;

    /// Create a graph note when the backend supports writes.
    async fn create_note(&self, _title: &str, _body: &str, _tags: &[String]) -> Result<Option<Value>> {
        Ok(None)
    }
}

/// Raw row-producing note-graph engine.
///
/// The engine speaks JSON rows; [`NoteGraphBackend`] is the adapter that
/// turns those rows into the typed contract above.
#[async_trait]
pub trait RawNoteEngine: Send + Sync {
    async fn search(&self, query: &str, limit: usize, options: &Value) -> Result<Value>;

    async fn neighbors(
        &self,
        stem: &str,
        direction: &str,
        hops: u32,
        limit: usize,
    ) -> Result<Vec<Value>>;

    async fn related(&self, stem: &str, max_distance: u32, limit: usize) -> Result<Vec<Value>>;

    async fn metadata(&self, stem: &str) -> Result<Value>;

    async fn toc(&self, limit: usize) -> Result<Vec<Value>>;

    async fn stats(&self) -> Result<Value>;

    async fn refresh_with_delta(&self, changed_paths: &[String], force_full: bool)
        -> Result<Value>;
}

/// Adapter shell mapping the contract onto a raw note-graph engine.
///
/// Normalization rules: stems are required and trimmed, scores clamp to
/// `>= 0`, distances clamp to `>= 1`, direction aliases (`to`/`from`)
/// resolve to the canonical enum, and rows without a stem are dropped.
pub struct NoteGraphBackend {
    name: String,
    engine: Arc<dyn RawNoteEngine>,
}

impl NoteGraphBackend {
    pub fn new(name: impl Into<String>, engine: Arc<dyn RawNoteEngine>) -> Self {
        Self {
            name: name.into(),
            engine,
        }
    }

    fn row_stem(row: &Value) -> Option<String> {
        let stem = row
            .get("stem")
            .or_else(|| row.get("id"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();
        (!stem.is_empty()).then_some(stem)
    }

    fn row_str(row: &Value, key: &str) -> String {
        row.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    fn neighbor_from_row(row: &Value, fallback_direction: LinkGraphDirection) -> Option<LinkGraphNeighbor> {
        let stem = Self::row_stem(row)?;
        let direction = row
            .get("direction")
            .and_then(Value::as_str)
            .map_or(fallback_direction, normalize_link_graph_direction);
        let distance = row
            .get("distance")
            .and_then(Value::as_u64)
            .map_or(1, |d| d.max(1) as u32);
        Some(LinkGraphNeighbor {
            stem,
            direction,
            distance,
            title: Self::row_str(row, "title"),
            path: Self::row_str(row, "path"),
        })
    }
}

#[async_trait]
impl LinkGraphBackend for NoteGraphBackend {
    fn backend_name(&self) -> &str {
        &self.name
    }

    async fn search_planned(
        &self,
        query: &str,
        limit: usize,
        options: Option<LinkGraphSearchOptions>,
    ) -> Result<PlannedSearch> {
        let normalized = options.unwrap_or_default().normalized();
        let payload = self
            .engine
            .search(query, limit, &normalized.to_record())
            .await?;

        let plan = payload
            .as_object()
            .ok_or_else(|| LinkGraphError::Backend("search returned non-object payload".into()))?;
        let hits_raw = plan
            .get("hits")
            .and_then(Value::as_array)
            .ok_or_else(|| LinkGraphError::Backend("search payload missing `hits` list".into()))?;

        // The engine may have refined the options; re-validate what it claims
        // it applied, falling back to what we sent.
        let search_options = match plan.get("search_options") {
            Some(raw) if raw.is_object() => LinkGraphSearchOptions::from_value(raw)?,
            _ => normalized,
        };

        let mut hits = Vec::with_capacity(hits_raw.len());
        for row in hits_raw {
            let Some(stem) = Self::row_stem(row) else {
                continue;
            };
            let score = row.get("score").and_then(Value::as_f64).unwrap_or(0.0);
            hits.push(LinkGraphHit {
                stem,
                score: score.max(0.0),
                title: Self::row_str(row, "title"),
                path: Self::row_str(row, "path"),
                best_section: Self::row_str(row, "best_section"),
                match_reason: Self::row_str(row, "match_reason"),
            });
        }
        hits.truncate(limit.max(1));

        Ok(PlannedSearch {
            query: plan
                .get("query")
                .and_then(Value::as_str)
                .filter(|q| !q.is_empty())
                .unwrap_or(query)
                .to_string(),
            search_options,
            hits,
        })
    }

    async fn neighbors(
        &self,
        stem: &str,
        direction: LinkGraphDirection,
        hops: u32,
        limit: usize,
    ) -> Result<Vec<LinkGraphNeighbor>> {
        let rows = self
            .engine
            .neighbors(stem, direction.as_str(), hops.max(1), limit)
            .await?;
        let mut out: Vec<LinkGraphNeighbor> = rows
            .iter()
            .filter_map(|row| Self::neighbor_from_row(row, LinkGraphDirection::Both))
            .collect();
        out.truncate(limit.max(1));
        Ok(out)
    }

    async fn related(
        &self,
        stem: &str,
        max_distance: u32,
        limit: usize,
    ) -> Result<Vec<LinkGraphNeighbor>> {
        let rows = self.engine.related(stem, max_distance, limit).await?;
        let mut out: Vec<LinkGraphNeighbor> = rows
            .iter()
            .filter_map(|row| Self::neighbor_from_row(row, LinkGraphDirection::Both))
            .collect();
        out.truncate(limit.max(1));
        Ok(out)
    }

    async fn metadata(&self, stem: &str) -> Result<Option<LinkGraphMetadata>> {
        let payload = self.engine.metadata(stem).await?;
        let Some(row) = payload.as_object() else {
            return Ok(None);
        };
        let meta_stem = row
            .get("stem")
            .and_then(Value::as_str)
            .unwrap_or(stem)
            .trim()
            .to_string();
        if meta_stem.is_empty() {
            return Ok(None);
        }
        let tags = row
            .get("tags")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(Some(LinkGraphMetadata {
            stem: meta_stem,
            tags,
            title: payload
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            path: payload
                .get("path")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }))
    }

    async fn toc(&self, limit: usize) -> Result<Vec<Value>> {
        self.engine.toc(limit).await
    }

    async fn stats(&self) -> Result<Value> {
        self.engine.stats().await
    }

    async fn refresh_with_delta(
        &self,
        changed_paths: &[String],
        force_full: bool,
    ) -> Result<Value> {
        self.engine.refresh_with_delta(changed_paths, force_full).await
    }
}
