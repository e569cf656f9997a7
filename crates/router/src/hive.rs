use crate::route::{RouteConfidence, RouteResult};
use crate::semantic::SemanticRouter;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;

static EXPLICIT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_]\w*)\.([A-Za-z_]\w*)$").unwrap_or_else(|_| unreachable!())
});

const GIT_KEYWORDS: &[&str] = &["commit", "push", "branch", "status"];
const TEST_KEYWORDS: &[&str] = &["test", "pytest"];

/// Execution context consulted for environment-aware fallbacks.
#[derive(Debug, Clone, Default)]
pub struct RouteContext {
    pub cwd: Option<PathBuf>,
}

impl RouteContext {
    #[must_use]
    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(cwd.into()),
        }
    }
}

/// Aggregator router combining routing strategies in priority order:
///
/// 1. Explicit command pattern (`git.status`) — no search needed.
/// 2. Semantic routing over the skill index.
/// 3. Context-aware fallback from filesystem state.
/// 4. `None` — the caller escalates to the planner.
pub struct HiveRouter {
    semantic: SemanticRouter,
}

impl HiveRouter {
    #[must_use]
    pub fn new(semantic: SemanticRouter) -> Self {
        Self { semantic }
    }

    pub async fn is_ready(&self) -> bool {
        self.semantic.is_ready().await
    }

    pub async fn route(&self, query: &str, context: Option<&RouteContext>) -> Option<RouteResult> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }

        if let Some(captures) = EXPLICIT_PATTERN.captures(query) {
            let skill_name = captures.get(1)?.as_str();
            let command_name = captures.get(2)?.as_str();
            log::debug!("hive matched explicit pattern: {skill_name}.{command_name}");
            return RouteResult::new(skill_name, command_name, 1.0, RouteConfidence::High);
        }

        if let Some(route) = self
            .semantic
            .route(query, SemanticRouter::DEFAULT_THRESHOLD, SemanticRouter::DEFAULT_LIMIT)
            .await
        {
            log::info!("hive selected via semantic: {}", route.tool_id());
            return Some(route);
        }

        if let Some(context) = context {
            if let Some(route) = Self::route_from_context(query, context) {
                return Some(route);
            }
        }

        log::debug!("hive could not route: '{query}'");
        None
    }

    /// Low-confidence defaults inferred from the working directory; the
    /// selected skill refines the exact command.
    fn route_from_context(query: &str, context: &RouteContext) -> Option<RouteResult> {
        let cwd = context.cwd.as_ref()?;
        let lowered = query.to_lowercase();

        if cwd.join(".git").exists() && GIT_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            return RouteResult::new("git", "status", 0.6, RouteConfidence::Low);
        }

        if (cwd.join("pyproject.toml").exists() || cwd.join("requirements.txt").exists())
            && TEST_KEYWORDS.iter().any(|k| lowered.contains(k))
        {
            return RouteResult::new("testing", "run", 0.6, RouteConfidence::Low);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_indexer::SkillIndexer;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    fn empty_router() -> HiveRouter {
        HiveRouter::new(SemanticRouter::new(Arc::new(RwLock::new(
            SkillIndexer::in_memory(),
        ))))
    }

    #[tokio::test]
    async fn explicit_pattern_routes_without_search() {
        let router = empty_router();
        let route = router.route("git.status", None).await.unwrap();
        assert_eq!(route.skill_name(), "git");
        assert_eq!(route.command_name(), "status");
        assert_eq!(route.score(), 1.0);
        assert_eq!(route.confidence(), RouteConfidence::High);
    }

    #[tokio::test]
    async fn empty_query_escalates() {
        let router = empty_router();
        assert!(router.route("   ", None).await.is_none());
    }

    #[tokio::test]
    async fn git_directory_biases_git_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();

        let router = empty_router();
        let context = RouteContext::with_cwd(dir.path());
        let route = router.route("please commit my work", Some(&context)).await.unwrap();
        assert_eq!(route.tool_id(), "git.status");
        assert_eq!(route.confidence(), RouteConfidence::Low);
    }

    #[tokio::test]
    async fn python_project_biases_test_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pyproject.toml"), "[project]").unwrap();

        let router = empty_router();
        let context = RouteContext::with_cwd(dir.path());
        let route = router.route("run the tests", Some(&context)).await.unwrap();
        assert_eq!(route.tool_id(), "testing.run");
    }

    #[tokio::test]
    async fn unmatched_query_without_context_is_none() {
        let router = empty_router();
        assert!(router.route("completely unknown request", None).await.is_none());
    }
}
