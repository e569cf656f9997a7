use serde_json::{Map, Value};

#[derive(Debug, Clone)]
struct IndexedEntry {
    content: String,
    metadata: Map<String, Value>,
}

/// Keyword-overlap index used when the native store is unavailable.
///
/// Ranking contract: `min(0.9, matches / |query_terms|)`. Entries live in
/// insertion order; search is a linear scan, which is fine for the catalog
/// sizes this fallback serves.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    entries: Vec<IndexedEntry>,
}

impl MemoryIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, content: impl Into<String>, metadata: Map<String, Value>) {
        self.entries.push(IndexedEntry {
            content: content.into(),
            metadata,
        });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keyword search over entry contents. Rows mirror the native store
    /// shape (`id`/`score`/`content`/`metadata`).
    #[must_use]
    pub fn search(&self, query: &str, limit: usize) -> Vec<Value> {
        let query_terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if query_terms.is_empty() || self.entries.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(f64, usize)> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| {
                let content = entry.content.to_lowercase();
                let matches = query_terms.iter().filter(|t| content.contains(*t)).count();
                (matches > 0)
                    .then(|| ((matches as f64 / query_terms.len() as f64).min(0.9), i))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(score, i)| {
                let entry = &self.entries[i];
                let id = entry
                    .metadata
                    .get("id")
                    .and_then(Value::as_str)
                    .map_or_else(|| format!("entry_{i}"), str::to_string);
                let mut row = Map::new();
                row.insert("id".to_string(), Value::String(id.clone()));
                row.insert("name".to_string(), Value::String(id));
                row.insert("score".to_string(), Value::from(score));
                row.insert("content".to_string(), Value::String(entry.content.clone()));
                row.insert("metadata".to_string(), Value::Object(entry.metadata.clone()));
                Value::Object(row)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn meta(id: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("id".to_string(), json!(id));
        map
    }

    #[test]
    fn score_is_match_ratio_capped_at_point_nine() {
        let mut index = MemoryIndex::new();
        index.add("commit git changes", meta("git.commit"));
        index.add("read a file", meta("fs.read"));

        let rows = index.search("commit git", 5);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["score"], json!(0.9));

        let rows = index.search("commit something unrelated", 5);
        assert_eq!(rows.len(), 1);
        let score = rows[0]["score"].as_f64().unwrap();
        assert!((score - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_query_returns_nothing() {
        let mut index = MemoryIndex::new();
        index.add("anything", meta("x"));
        assert!(index.search("   ", 5).is_empty());
    }

    #[test]
    fn results_are_sorted_and_limited() {
        let mut index = MemoryIndex::new();
        index.add("alpha", meta("one"));
        index.add("alpha beta", meta("two"));
        index.add("alpha beta gamma", meta("three"));

        let rows = index.search("alpha beta gamma", 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], json!("three"));
        assert_eq!(rows[1]["id"], json!("two"));
    }
}
