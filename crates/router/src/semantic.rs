use crate::route::{RouteConfidence, RouteResult};
use hive_indexer::SkillIndexer;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinSet;

/// Vector-search router: query -> top index row -> confidence check.
pub struct SemanticRouter {
    indexer: Arc<RwLock<SkillIndexer>>,
}

impl SemanticRouter {
    pub const DEFAULT_THRESHOLD: f64 = 0.5;
    pub const DEFAULT_LIMIT: usize = 3;

    #[must_use]
    pub fn new(indexer: Arc<RwLock<SkillIndexer>>) -> Self {
        Self { indexer }
    }

    pub async fn is_ready(&self) -> bool {
        self.indexer.read().await.is_ready()
    }

    /// Route a query to a skill command, `None` when nothing clears the
    /// threshold or the top hit is not a command document.
    pub async fn route(&self, query: &str, threshold: f64, limit: usize) -> Option<RouteResult> {
        let rows = self.indexer.read().await.search(query, limit, 0.0).await;
        Self::route_from_rows(query, &rows, threshold)
    }

    /// Route a batch of queries concurrently; output preserves input order.
    pub async fn route_batch(
        &self,
        queries: &[String],
        threshold: f64,
    ) -> Vec<(String, Option<RouteResult>)> {
        let mut results: Vec<(String, Option<RouteResult>)> = queries
            .iter()
            .map(|query| (query.clone(), None))
            .collect();

        let mut tasks: JoinSet<(usize, Option<RouteResult>)> = JoinSet::new();
        for (idx, query) in queries.iter().enumerate() {
            let indexer = Arc::clone(&self.indexer);
            let query = query.clone();
            tasks.spawn(async move {
                let rows = indexer
                    .read()
                    .await
                    .search(&query, Self::DEFAULT_LIMIT, 0.0)
                    .await;
                (idx, Self::route_from_rows(&query, &rows, threshold))
            });
        }
        while let Some(joined) = tasks.join_next().await {
            if let Ok((idx, route)) = joined {
                results[idx].1 = route;
            }
        }
        results
    }

    fn route_from_rows(query: &str, rows: &[Value], threshold: f64) -> Option<RouteResult> {
        let top = rows.first()?;
        let score = top.get("score").and_then(Value::as_f64).unwrap_or(0.0);
        if score < threshold {
            log::debug!("no route found for: '{query}'");
            return None;
        }

        let metadata = match top.get("metadata") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::String(raw)) => serde_json::from_str::<Value>(raw)
                .ok()
                .and_then(|v| v.as_object().cloned())
                .unwrap_or_default(),
            _ => Default::default(),
        };

        // Only command documents are routable; skill-level documents exist
        // for discovery, not execution.
        if metadata.get("type").and_then(Value::as_str) != Some("command") {
            return None;
        }
        let skill_name = metadata
            .get("skill_name")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let command_name = metadata
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let confidence = RouteConfidence::from_score(score);
        let route = RouteResult::new(skill_name, command_name, score, confidence)?;
        log::info!(
            "route: '{query}' -> {} (score: {score:.2}, confidence: {})",
            route.tool_id(),
            confidence.as_str()
        );
        Some(route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_indexer::{CommandSpec, SkillSpec};
    use pretty_assertions::assert_eq;

    async fn router_with_skills() -> SemanticRouter {
        let mut indexer = SkillIndexer::in_memory();
        indexer
            .index_skills(&[
                SkillSpec::new("git", "Version control")
                    .with_command(CommandSpec::new("commit", "Commit staged changes")),
                SkillSpec::new("memory", "Notes")
                    .with_command(CommandSpec::new("save", "Save a note")),
            ])
            .await
            .unwrap();
        SemanticRouter::new(Arc::new(RwLock::new(indexer)))
    }

    #[tokio::test]
    async fn routes_to_top_command_above_threshold() {
        let router = router_with_skills().await;
        let route = router.route("commit staged changes", 0.5, 3).await.unwrap();
        assert_eq!(route.skill_name(), "git");
        assert_eq!(route.command_name(), "commit");
        assert!(route.score() >= 0.5);
    }

    #[tokio::test]
    async fn below_threshold_yields_none() {
        let router = router_with_skills().await;
        assert!(router.route("commit plus many unrelated words", 0.9, 3).await.is_none());
    }

    #[tokio::test]
    async fn skill_level_hits_are_not_routes() {
        let mut indexer = SkillIndexer::in_memory();
        indexer
            .index_skills(&[SkillSpec::new("git", "Version control and commits")])
            .await
            .unwrap();
        let router = SemanticRouter::new(Arc::new(RwLock::new(indexer)));
        assert!(router.route("version control", 0.1, 3).await.is_none());
    }

    #[tokio::test]
    async fn batch_routing_preserves_input_order() {
        let router = router_with_skills().await;
        let queries = vec![
            "commit staged changes".to_string(),
            "save a note".to_string(),
            "nothing matches this at all".to_string(),
        ];
        let results = router.route_batch(&queries, 0.5).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, queries[0]);
        assert_eq!(results[0].1.as_ref().unwrap().tool_id(), "git.commit");
        assert_eq!(results[1].1.as_ref().unwrap().tool_id(), "memory.save");
        assert!(results[2].1.is_none());
    }
}
