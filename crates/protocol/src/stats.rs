use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Link-graph statistics exposed in API responses.
///
/// All counters are non-negative; adapters that report garbage get clamped
/// at the boundary rather than leaking negatives downstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StatsPayload {
    pub total_notes: u64,
    pub orphans: u64,
    pub links_in_graph: u64,
    pub nodes_in_graph: u64,
}

impl StatsPayload {
    /// Normalize a raw JSON object into the stable stats shape.
    ///
    /// Missing keys and non-numeric values become 0; negative values clamp to 0.
    #[must_use]
    pub fn from_value(raw: &serde_json::Value) -> Self {
        let read = |key: &str| -> u64 {
            raw.get(key)
                .and_then(|v| {
                    v.as_u64()
                        .or_else(|| v.as_i64().map(|n| n.max(0) as u64))
                        .or_else(|| v.as_f64().map(|n| n.max(0.0) as u64))
                })
                .unwrap_or(0)
        };
        Self {
            total_notes: read("total_notes"),
            orphans: read("orphans"),
            links_in_graph: read("links_in_graph"),
            nodes_in_graph: read("nodes_in_graph"),
        }
    }
}

/// Where a stats payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatsSource {
    Cache,
    Probe,
    CacheStale,
    Fallback,
}

/// Provenance metadata attached to stats responses when requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StatsMeta {
    pub source: StatsSource,
    pub cache_hit: bool,
    pub fresh: bool,
    pub age_ms: u64,
    pub refresh_scheduled: bool,
}
