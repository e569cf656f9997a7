use crate::cache::{CacheStats, SearchCache};
use crate::hive::{HiveRouter, RouteContext};
use crate::route::{RouteConfidence, RouteResult};
use crate::semantic::SemanticRouter;
use crate::sniffer::IntentSniffer;
use hive_indexer::{IndexStats, SkillIndexer, SkillSpec};
use hive_search::{HybridSearch, SearchOptions};
use hive_vector_store::{EmbeddingService, VectorStore};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// Facade configuration; defaults mirror the cache contract (1000 entries,
/// 300 s TTL) and the hybrid threshold used by route consumers.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub cache_size: usize,
    pub cache_ttl: Duration,
    pub hybrid_threshold: f64,
    pub storage_path: PathBuf,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            cache_size: SearchCache::<Vec<RouteResult>>::DEFAULT_MAX_SIZE,
            cache_ttl: SearchCache::<Vec<RouteResult>>::DEFAULT_TTL,
            hybrid_threshold: 0.4,
            storage_path: PathBuf::from("router.lance"),
        }
    }
}

/// Router statistics snapshot.
#[derive(Debug, Clone)]
pub struct RouterStats {
    pub initialized: bool,
    pub indexer: IndexStats,
    pub cache: CacheStats,
}

/// The unified routing facade: one entry point over the indexer, the
/// semantic/hive routers, hybrid search with its LRU cache, and the
/// context sniffer.
pub struct OmniRouter {
    indexer: Arc<RwLock<SkillIndexer>>,
    hive: HiveRouter,
    hybrid: HybridSearch,
    cache: Mutex<SearchCache<Vec<RouteResult>>>,
    sniffer: Mutex<IntentSniffer>,
    hybrid_threshold: f64,
    initialized: AtomicBool,
}

impl OmniRouter {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingService>,
        settings: RouterSettings,
    ) -> Self {
        let indexer = Arc::new(RwLock::new(SkillIndexer::new(
            Arc::clone(&store),
            Arc::clone(&embedder),
            settings.storage_path.clone(),
        )));
        Self {
            hive: HiveRouter::new(SemanticRouter::new(Arc::clone(&indexer))),
            hybrid: HybridSearch::new(store, embedder),
            cache: Mutex::new(SearchCache::new(settings.cache_size, settings.cache_ttl)),
            sniffer: Mutex::new(IntentSniffer::new()),
            hybrid_threshold: settings.hybrid_threshold,
            indexer,
            initialized: AtomicBool::new(false),
        }
    }

    /// Facade over an in-memory indexer, for hosts without a native store.
    pub fn with_memory_index(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingService>,
        settings: RouterSettings,
    ) -> Self {
        let indexer = Arc::new(RwLock::new(SkillIndexer::in_memory()));
        Self {
            hive: HiveRouter::new(SemanticRouter::new(Arc::clone(&indexer))),
            hybrid: HybridSearch::new(store, embedder),
            cache: Mutex::new(SearchCache::new(settings.cache_size, settings.cache_ttl)),
            sniffer: Mutex::new(IntentSniffer::new()),
            hybrid_threshold: settings.hybrid_threshold,
            indexer,
            initialized: AtomicBool::new(false),
        }
    }

    /// Replace the hybrid pipeline (to install hooks: translator, intent
    /// classifier, relationship graph, KG reranker).
    #[must_use]
    pub fn with_hybrid(mut self, hybrid: HybridSearch) -> Self {
        self.hybrid = hybrid;
        self
    }

    /// Build the skill index. Idempotent: an unchanged skill set skips the
    /// rebuild inside the indexer.
    pub async fn initialize(&self, skills: &[SkillSpec]) -> crate::Result<usize> {
        if self.initialized.load(Ordering::SeqCst) {
            log::warn!("router already initialized");
        }
        let count = self.indexer.write().await.index_skills(skills).await?;
        self.initialized.store(true, Ordering::SeqCst);
        log::info!("router initialized with {count} indexed entries");
        Ok(count)
    }

    pub async fn is_ready(&self) -> bool {
        self.initialized.load(Ordering::SeqCst) && self.indexer.read().await.is_ready()
    }

    /// Single-route entry point: explicit pattern, semantic, context
    /// fallback, or `None` for planner escalation.
    pub async fn route(&self, query: &str, context: Option<&RouteContext>) -> Option<RouteResult> {
        if !self.initialized.load(Ordering::SeqCst) {
            log::warn!("router not initialized, falling back to direct routing");
        }
        self.hive.route(query, context).await
    }

    /// Multi-candidate routing with the configured default threshold.
    pub async fn route_hybrid_default(&self, query: &str, limit: usize) -> Vec<RouteResult> {
        self.route_hybrid(query, limit, self.hybrid_threshold, true)
            .await
    }

    /// Multi-candidate routing through hybrid search with LRU caching.
    pub async fn route_hybrid(
        &self,
        query: &str,
        limit: usize,
        threshold: f64,
        use_cache: bool,
    ) -> Vec<RouteResult> {
        if use_cache {
            if let Some(cached) = self.cache.lock().await.get(query) {
                log::debug!("cache hit for: {:.50}", query);
                return cached;
            }
        }

        // Over-fetch so threshold filtering and skill-level drops still
        // leave `limit` viable candidates.
        let matches = self
            .hybrid
            .search(query, &SearchOptions::with_limit(limit * 2))
            .await;

        let mut results: Vec<RouteResult> = Vec::new();
        for hit in &matches {
            if hit.score < threshold {
                continue;
            }
            let (skill_name, command_name) = match hit.id.split_once('.') {
                Some((skill, command)) => (skill, command),
                // Skill-level entries are not invocable tools.
                None => continue,
            };
            if command_name.is_empty() {
                continue;
            }
            let Some(route) = RouteResult::new(
                skill_name,
                command_name,
                hit.score,
                RouteConfidence::from_score(hit.score),
            ) else {
                continue;
            };
            results.push(route);
            if results.len() >= limit {
                break;
            }
        }

        if use_cache {
            self.cache.lock().await.set(query, results.clone());
        }
        log::info!("hybrid route: '{query}' -> {} results", results.len());
        results
    }

    /// Suggest skills for the current working directory.
    pub async fn suggest_skills(&self, cwd: &Path) -> Vec<String> {
        self.sniffer.lock().await.sniff(cwd)
    }

    pub async fn register_sniffer(&self, configure: impl FnOnce(&mut IntentSniffer)) {
        let mut sniffer = self.sniffer.lock().await;
        configure(&mut sniffer);
    }

    pub async fn clear_cache(&self) -> usize {
        self.cache.lock().await.clear()
    }

    pub async fn stats(&self) -> RouterStats {
        RouterStats {
            initialized: self.initialized.load(Ordering::SeqCst),
            indexer: self.indexer.read().await.stats(),
            cache: self.cache.lock().await.stats(),
        }
    }

    #[must_use]
    pub fn hybrid(&self) -> &HybridSearch {
        &self.hybrid
    }
}
