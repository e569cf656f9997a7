use crate::result::{sort_by_score_desc, SearchResult};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

// Edge weights translate into score deltas conservatively: a full-weight
// edge is worth 0.1, and accumulated relationship boost caps at 0.2.
const RELATIONSHIP_BOOST_SCALE: f64 = 0.1;
const RELATIONSHIP_BOOST_CAP: f64 = 0.2;
const TOP_ANCHOR_COUNT: usize = 3;

/// Weighted skill adjacency used for the associative rerank.
///
/// Built offline from co-occurrence analysis and loaded as JSON:
/// `{"git": [["memory", 0.6], ["testing", 0.3]]}`.
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    edges: HashMap<String, Vec<(String, f64)>>,
}

impl RelationshipGraph {
    #[must_use]
    pub fn new(edges: HashMap<String, Vec<(String, f64)>>) -> Self {
        Self { edges }
    }

    /// Parse from the persisted JSON shape. Unknown shapes yield an empty
    /// graph rather than an error; the rerank is optional.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let mut edges: HashMap<String, Vec<(String, f64)>> = HashMap::new();
        if let Some(map) = value.as_object() {
            for (skill, raw_edges) in map {
                let Some(items) = raw_edges.as_array() else {
                    continue;
                };
                let parsed: Vec<(String, f64)> = items
                    .iter()
                    .filter_map(|item| {
                        let pair = item.as_array()?;
                        let name = pair.first()?.as_str()?.trim().to_string();
                        let weight = pair.get(1)?.as_f64()?;
                        (!name.is_empty() && weight.is_finite()).then_some((name, weight))
                    })
                    .collect();
                if !parsed.is_empty() {
                    edges.insert(skill.clone(), parsed);
                }
            }
        }
        Self { edges }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    #[must_use]
    pub fn neighbors(&self, skill: &str) -> &[(String, f64)] {
        self.edges.get(skill).map_or(&[], Vec::as_slice)
    }
}

/// Boost results whose skill is related to the skills of the current top
/// results, by edge weight.
pub fn apply_relationship_rerank(results: &mut Vec<SearchResult>, graph: &RelationshipGraph) {
    if results.len() < 2 || graph.is_empty() {
        return;
    }

    let anchors: Vec<String> = results
        .iter()
        .take(TOP_ANCHOR_COUNT)
        .map(|r| r.skill_name.clone())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let mut boost_by_skill: HashMap<String, f64> = HashMap::new();
    for anchor in &anchors {
        for (related, weight) in graph.neighbors(anchor) {
            let entry = boost_by_skill.entry(related.clone()).or_insert(0.0);
            *entry = (*entry + weight * RELATIONSHIP_BOOST_SCALE).min(RELATIONSHIP_BOOST_CAP);
        }
    }
    if boost_by_skill.is_empty() {
        return;
    }

    for result in results.iter_mut() {
        // Anchors stay put; only their associates move.
        if anchors.contains(&result.skill_name) {
            continue;
        }
        if let Some(&boost) = boost_by_skill.get(&result.skill_name) {
            result.bump(boost);
            result.boosts.relationship += boost;
        }
    }
    sort_by_score_desc(results);
}
