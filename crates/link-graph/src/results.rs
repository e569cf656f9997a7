use crate::models::{LinkGraphDirection, LinkGraphHit};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Normalize direction aliases (`to`/`from`) into the canonical enum.
#[must_use]
pub fn normalize_link_graph_direction(raw: &str) -> LinkGraphDirection {
    match raw.trim().to_ascii_lowercase().as_str() {
        "incoming" | "to" => LinkGraphDirection::Incoming,
        "outgoing" | "from" => LinkGraphDirection::Outgoing,
        _ => LinkGraphDirection::Both,
    }
}

/// Stable search-result row produced from link-graph hits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSearchRow {
    pub title: String,
    pub id: String,
    pub path: String,
    pub score: f64,
    pub source: String,
    pub distance: u32,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

/// Note identity carried by hybrid rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRef {
    pub id: String,
    pub title: String,
    pub path: String,
}

/// Merged graph/vector recall row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridRow {
    pub note: NoteRef,
    pub score: f64,
    pub source: String,
    pub distance: u32,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

/// Convert backend hits into stable search-result rows.
#[must_use]
pub fn link_graph_hits_to_search_results(
    hits: &[LinkGraphHit],
    source: &str,
    reasoning: &str,
) -> Vec<GraphSearchRow> {
    hits.iter()
        .filter(|hit| !hit.stem.trim().is_empty())
        .map(|hit| {
            let match_reason = hit.match_reason.trim();
            GraphSearchRow {
                title: hit.title.clone(),
                id: hit.stem.trim().to_string(),
                path: hit.path.clone(),
                score: hit.score.max(0.0),
                source: source.to_string(),
                distance: 0,
                reasoning: if match_reason.is_empty() {
                    reasoning.to_string()
                } else {
                    match_reason.to_string()
                },
                section: {
                    let section = hit.best_section.trim();
                    (!section.is_empty()).then(|| section.to_string())
                },
            }
        })
        .collect()
}

/// Convert backend hits into hybrid rows (`note` + `score`).
#[must_use]
pub fn link_graph_hits_to_hybrid_results(
    hits: &[LinkGraphHit],
    source: &str,
    reasoning: &str,
) -> Vec<HybridRow> {
    link_graph_hits_to_search_results(hits, source, reasoning)
        .into_iter()
        .map(|row| HybridRow {
            note: NoteRef {
                id: row.id,
                title: row.title,
                path: row.path,
            },
            score: row.score,
            source: row.source,
            distance: row.distance,
            reasoning: row.reasoning,
            content: None,
            section: row.section,
        })
        .collect()
}

fn note_stem_from_path(path: &str) -> String {
    let path = path.trim();
    if path.is_empty() {
        return String::new();
    }
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .map_or_else(|| path.to_string(), str::to_string)
}

/// Convert raw vector rows (`source`/`content`/`score`) into hybrid rows.
/// Rows with a `distance` but no score get `1 - distance` as their score.
#[must_use]
pub fn vector_rows_to_hybrid_results(rows: &[Value]) -> Vec<HybridRow> {
    rows.iter()
        .filter_map(|row| {
            let row = row.as_object()?;
            let source_path = ["source", "path", "id"]
                .iter()
                .find_map(|key| row.get(*key).and_then(Value::as_str))
                .unwrap_or_default()
                .trim()
                .to_string();
            let note_id = row
                .get("id")
                .or_else(|| row.get("note_id"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map_or_else(|| note_stem_from_path(&source_path), str::to_string);

            let score = match row.get("score").and_then(Value::as_f64) {
                Some(score) if score >= 0.0 => score,
                _ => {
                    let distance = row.get("distance").and_then(Value::as_f64).unwrap_or(1.0);
                    (1.0 - distance).max(0.0)
                }
            };

            Some(HybridRow {
                note: NoteRef {
                    id: note_id,
                    title: row
                        .get("title")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    path: source_path,
                },
                score,
                source: "vector".to_string(),
                distance: 0,
                reasoning: row
                    .get("reasoning")
                    .and_then(Value::as_str)
                    .unwrap_or("Vector recall hit")
                    .to_string(),
                content: row.get("content").and_then(Value::as_str).map(str::to_string),
                section: row.get("section").and_then(Value::as_str).map(str::to_string),
            })
        })
        .collect()
}

fn hybrid_key(row: &HybridRow, index: usize) -> String {
    if !row.note.id.trim().is_empty() {
        return format!("id:{}", row.note.id.trim());
    }
    if !row.note.path.trim().is_empty() {
        return format!("path:{}", row.note.path.trim());
    }
    format!("row:{index}:{}|{}", row.source, row.note.title)
}

fn merge_reasoning(a: &str, b: &str) -> String {
    let (left, right) = (a.trim(), b.trim());
    if !left.is_empty() && !right.is_empty() && left != right {
        format!("{left} | {right}")
    } else if left.is_empty() {
        right.to_string()
    } else {
        left.to_string()
    }
}

/// Merge graph and vector rows by note identity.
///
/// Overlapping notes keep the best score and the minimum distance, fill
/// missing content/section from the weaker row, union their reasoning, and
/// are marked `hybrid`.
#[must_use]
pub fn merge_hybrid_results(
    graph_results: Vec<HybridRow>,
    vector_results: Vec<HybridRow>,
) -> Vec<HybridRow> {
    let mut merged: HashMap<String, HybridRow> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for (index, row) in graph_results
        .into_iter()
        .chain(vector_results)
        .enumerate()
    {
        let key = hybrid_key(&row, index);
        match merged.get_mut(&key) {
            None => {
                merged.insert(key.clone(), row);
                order.push(key);
            }
            Some(current) => {
                let merged_reasoning = merge_reasoning(&current.reasoning, &row.reasoning);
                let (mut primary, secondary) = if row.score > current.score {
                    (row, current.clone())
                } else {
                    (current.clone(), row)
                };
                if primary.content.is_none() {
                    primary.content = secondary.content.clone();
                }
                if primary.section.is_none() {
                    primary.section = secondary.section.clone();
                }
                if primary.note.title.is_empty() {
                    primary.note.title = secondary.note.title.clone();
                }
                if primary.source.is_empty() {
                    primary.source = secondary.source.clone();
                } else if !secondary.source.is_empty() && primary.source != secondary.source {
                    primary.source = "hybrid".to_string();
                }
                primary.score = primary.score.max(secondary.score);
                primary.distance = primary.distance.min(secondary.distance);
                primary.reasoning = merged_reasoning;
                *current = primary;
            }
        }
    }

    let mut out: Vec<HybridRow> = order
        .into_iter()
        .filter_map(|key| merged.remove(&key))
        .collect();
    out.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn hit(stem: &str, score: f64, path: &str) -> LinkGraphHit {
        LinkGraphHit {
            stem: stem.to_string(),
            score,
            title: format!("Title {stem}"),
            path: path.to_string(),
            best_section: String::new(),
            match_reason: String::new(),
        }
    }

    #[test]
    fn direction_aliases_normalize() {
        assert_eq!(normalize_link_graph_direction("to"), LinkGraphDirection::Incoming);
        assert_eq!(normalize_link_graph_direction("FROM"), LinkGraphDirection::Outgoing);
        assert_eq!(normalize_link_graph_direction("sideways"), LinkGraphDirection::Both);
    }

    #[test]
    fn hits_convert_with_match_reason_priority() {
        let mut hits = vec![hit("ownership", 0.9, "notes/ownership.md")];
        hits[0].match_reason = "exact title".to_string();
        let rows = link_graph_hits_to_search_results(&hits, "graph_search", "LinkGraph search hit");
        assert_eq!(rows[0].reasoning, "exact title");
        assert_eq!(rows[0].id, "ownership");
    }

    #[test]
    fn vector_rows_derive_score_from_distance() {
        let rows = vector_rows_to_hybrid_results(&[json!({
            "source": "notes/ownership.md",
            "distance": 0.25,
            "content": "alpha",
        })]);
        assert_eq!(rows.len(), 1);
        assert!((rows[0].score - 0.75).abs() < 1e-9);
        assert_eq!(rows[0].note.id, "ownership");
    }

    #[test]
    fn merge_marks_overlap_as_hybrid_and_keeps_best_score() {
        let graph = link_graph_hits_to_hybrid_results(
            &[hit("ownership", 0.9, "notes/ownership.md")],
            "graph_search",
            "LinkGraph search hit",
        );
        let vector = vector_rows_to_hybrid_results(&[
            json!({"id": "ownership", "source": "notes/ownership.md", "score": 0.6, "content": "body"}),
            json!({"id": "lifetimes", "source": "notes/lifetimes.md", "score": 0.7}),
        ]);

        let merged = merge_hybrid_results(graph, vector);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].note.id, "ownership");
        assert_eq!(merged[0].source, "hybrid");
        assert_eq!(merged[0].score, 0.9);
        // Content filled in from the vector row.
        assert_eq!(merged[0].content.as_deref(), Some("body"));
        assert_eq!(merged[1].note.id, "lifetimes");
    }
}
