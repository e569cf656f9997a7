//! # Hive Protocol
//!
//! Frozen shared-schema payloads exchanged between the retrieval core and its
//! consumers: link-graph search options, retrieval plans, and graph stats.
//!
//! Every record carries a `schema` field with a versioned id so consumers can
//! verify the payload shape before trusting it. Enums are case-insensitive on
//! input and emitted in lowercase. Unknown fields are rejected.

mod error;
mod plan;
mod stats;

pub use error::{ProtocolError, Result};
pub use plan::{PlanBudgetRecord, PlanRecord, LINK_GRAPH_RETRIEVAL_PLAN_SCHEMA_ID};
pub use stats::{StatsMeta, StatsPayload, StatsSource};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const LINK_GRAPH_SEARCH_OPTIONS_SCHEMA_ID: &str = "link-graph-search-options/v1";

/// Retrieval mode shared by policy plans and recall requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    GraphOnly,
    Hybrid,
    VectorOnly,
}

impl RetrievalMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GraphOnly => "graph_only",
            Self::Hybrid => "hybrid",
            Self::VectorOnly => "vector_only",
        }
    }

    /// Case-insensitive parse; `None` for anything outside the frozen set.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "graph_only" => Some(Self::GraphOnly),
            "hybrid" => Some(Self::Hybrid),
            "vector_only" => Some(Self::VectorOnly),
            _ => None,
        }
    }
}

/// Graph-confidence tier attached to retrieval plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    None,
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}
