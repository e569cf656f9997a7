use crate::error::{ProtocolError, Result};
use crate::{ConfidenceLevel, RetrievalMode};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const LINK_GRAPH_RETRIEVAL_PLAN_SCHEMA_ID: &str = "link-graph-retrieval-plan/v1";

/// Budget slice of a retrieval-plan record. Fields are clamped to `>= 1`
/// at construction so no consumer ever sees a zero budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PlanBudgetRecord {
    pub candidate_limit: u32,
    pub max_sources: u32,
    pub rows_per_source: u32,
}

impl PlanBudgetRecord {
    #[must_use]
    pub fn new(candidate_limit: u32, max_sources: u32, rows_per_source: u32) -> Self {
        Self {
            candidate_limit: candidate_limit.max(1),
            max_sources: max_sources.max(1),
            rows_per_source: rows_per_source.max(1),
        }
    }
}

/// Canonical serialized form of a retrieval plan.
///
/// The plan record is a contract boundary: internal code works with a typed
/// plan, and this record is what crosses process or skill boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PlanRecord {
    pub schema: String,
    pub requested_mode: RetrievalMode,
    pub selected_mode: RetrievalMode,
    pub reason: String,
    pub backend_name: String,
    pub graph_hit_count: u32,
    pub source_hint_count: u32,
    pub graph_confidence_score: f64,
    pub graph_confidence_level: ConfidenceLevel,
    pub budget: PlanBudgetRecord,
}

impl PlanRecord {
    /// Build a record with all numeric clamps applied.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn build(
        requested_mode: RetrievalMode,
        selected_mode: RetrievalMode,
        reason: impl Into<String>,
        backend_name: impl Into<String>,
        graph_hit_count: usize,
        source_hint_count: usize,
        graph_confidence_score: f64,
        graph_confidence_level: ConfidenceLevel,
        budget: PlanBudgetRecord,
    ) -> Self {
        let backend_name = {
            let name = backend_name.into();
            if name.trim().is_empty() {
                "unknown".to_string()
            } else {
                name
            }
        };
        Self {
            schema: LINK_GRAPH_RETRIEVAL_PLAN_SCHEMA_ID.to_string(),
            requested_mode,
            selected_mode,
            reason: reason.into(),
            backend_name,
            graph_hit_count: u32::try_from(graph_hit_count).unwrap_or(u32::MAX),
            source_hint_count: u32::try_from(source_hint_count).unwrap_or(u32::MAX),
            graph_confidence_score: graph_confidence_score.clamp(0.0, 1.0),
            graph_confidence_level,
            budget,
        }
    }

    /// Verify the frozen contract: schema id, non-empty reason, clamped values.
    pub fn validate(&self) -> Result<()> {
        if self.schema != LINK_GRAPH_RETRIEVAL_PLAN_SCHEMA_ID {
            return Err(ProtocolError::schema(
                "schema",
                format!(
                    "expected '{LINK_GRAPH_RETRIEVAL_PLAN_SCHEMA_ID}', got '{}'",
                    self.schema
                ),
            ));
        }
        if self.reason.trim().is_empty() {
            return Err(ProtocolError::schema("reason", "must be non-empty"));
        }
        if !(0.0..=1.0).contains(&self.graph_confidence_score) {
            return Err(ProtocolError::schema(
                "graph_confidence_score",
                "must be within [0, 1]",
            ));
        }
        if self.budget.candidate_limit < 1
            || self.budget.max_sources < 1
            || self.budget.rows_per_source < 1
        {
            return Err(ProtocolError::schema("budget", "fields must be >= 1"));
        }
        Ok(())
    }

    /// Parse and validate a record from a JSON value.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        let record: Self = serde_json::from_value(value.clone())
            .map_err(|err| ProtocolError::schema("<root>", err.to_string()))?;
        record.validate()?;
        Ok(record)
    }
}
