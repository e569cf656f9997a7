use crate::policy::{LinkGraphRetrievalPlan, PlanCacheKey};
use hive_protocol::StatsPayload;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub(crate) struct StatsCacheEntry {
    pub stats: StatsPayload,
    pub expires_at: Instant,
    pub updated_at: Instant,
}

#[derive(Debug, Clone)]
pub(crate) struct StemCacheEntry {
    pub links: HashSet<String>,
    pub tags: HashSet<String>,
    pub expires_at: Instant,
}

/// Process-wide registry for link-graph coordination state.
///
/// Hosts construct one per runtime and pass it to the planner, booster and
/// stats cache; [`LinkGraphRuntime::global`] is the default for code that
/// does not need isolation (tests construct their own). Backend identity is
/// always the stable `backend_name`, never a pointer surrogate.
#[derive(Default)]
pub struct LinkGraphRuntime {
    plan_cache: Mutex<HashMap<PlanCacheKey, (LinkGraphRetrievalPlan, Instant)>>,
    timeout_markers: Mutex<HashMap<String, Instant>>,
    stats_cache: Mutex<HashMap<String, StatsCacheEntry>>,
    stats_refresh: Mutex<HashMap<String, JoinHandle<()>>>,
    stem_cache: Mutex<HashMap<(String, String, String), StemCacheEntry>>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("link-graph runtime {what} lock poisoned; continuing with inner state");
        poisoned.into_inner()
    })
}

static GLOBAL_RUNTIME: Lazy<Arc<LinkGraphRuntime>> =
    Lazy::new(|| Arc::new(LinkGraphRuntime::default()));

impl LinkGraphRuntime {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The process-default runtime.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL_RUNTIME)
    }

    /// Drop all cached state and cancel pending refresh tasks.
    pub fn reset(&self) {
        lock(&self.plan_cache, "plan cache").clear();
        lock(&self.timeout_markers, "timeout markers").clear();
        lock(&self.stats_cache, "stats cache").clear();
        for (_, handle) in lock(&self.stats_refresh, "stats refresh").drain() {
            handle.abort();
        }
        lock(&self.stem_cache, "stem cache").clear();
    }

    // --- timeout markers -------------------------------------------------

    fn normalize_timeout_query(query: &str) -> String {
        query.trim().to_lowercase()
    }

    /// Record a recent graph-search timeout for same-query coordination.
    pub fn note_graph_search_timeout(&self, query: &str, ttl: Duration) {
        let key = Self::normalize_timeout_query(query);
        if key.is_empty() || ttl.is_zero() {
            return;
        }
        let now = Instant::now();
        let mut markers = lock(&self.timeout_markers, "timeout markers");
        markers.retain(|_, expires| *expires > now);
        markers.insert(key, now + ttl);
    }

    /// Consume one timeout marker for the query, if still valid.
    /// Returns true exactly once per marker.
    pub fn take_graph_search_timeout(&self, query: &str) -> bool {
        let key = Self::normalize_timeout_query(query);
        if key.is_empty() {
            return false;
        }
        let mut markers = lock(&self.timeout_markers, "timeout markers");
        match markers.remove(&key) {
            Some(expires_at) => Instant::now() < expires_at,
            None => false,
        }
    }

    // --- plan cache ------------------------------------------------------

    pub(crate) fn plan_cache_get(&self, key: &PlanCacheKey) -> Option<LinkGraphRetrievalPlan> {
        let mut cache = lock(&self.plan_cache, "plan cache");
        let (plan, expires_at) = cache.get(key)?.clone();
        if Instant::now() >= expires_at {
            cache.remove(key);
            return None;
        }
        Some(plan)
    }

    pub(crate) fn plan_cache_put(
        &self,
        key: PlanCacheKey,
        plan: LinkGraphRetrievalPlan,
        ttl: Duration,
    ) {
        if ttl.is_zero() {
            return;
        }
        lock(&self.plan_cache, "plan cache").insert(key, (plan, Instant::now() + ttl));
    }

    // --- stats cache -----------------------------------------------------

    pub(crate) fn stats_cache_get(&self, backend_name: &str) -> Option<StatsCacheEntry> {
        lock(&self.stats_cache, "stats cache")
            .get(backend_name)
            .cloned()
    }

    pub(crate) fn stats_cache_put(&self, backend_name: &str, stats: StatsPayload, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let now = Instant::now();
        lock(&self.stats_cache, "stats cache").insert(
            backend_name.to_string(),
            StatsCacheEntry {
                stats,
                expires_at: now + ttl,
                updated_at: now,
            },
        );
    }

    pub(crate) fn stats_cache_clear(&self) {
        lock(&self.stats_cache, "stats cache").clear();
        for (_, handle) in lock(&self.stats_refresh, "stats refresh").drain() {
            handle.abort();
        }
    }

    /// Track a refresh task for a backend identity. Returns false (and drops
    /// nothing) when one is already in flight.
    pub(crate) fn stats_refresh_register(
        &self,
        backend_name: &str,
        spawn: impl FnOnce() -> JoinHandle<()>,
    ) -> bool {
        let mut refresh = lock(&self.stats_refresh, "stats refresh");
        if let Some(handle) = refresh.get(backend_name) {
            if !handle.is_finished() {
                return false;
            }
        }
        refresh.insert(backend_name.to_string(), spawn());
        true
    }

    pub(crate) fn stats_refresh_done(&self, backend_name: &str) {
        lock(&self.stats_refresh, "stats refresh").remove(backend_name);
    }

    // --- proximity stem cache --------------------------------------------

    pub(crate) fn stem_cache_get(
        &self,
        backend_name: &str,
        root_id: &str,
        stem: &str,
    ) -> Option<(HashSet<String>, HashSet<String>)> {
        let cache = lock(&self.stem_cache, "stem cache");
        let entry = cache.get(&(
            backend_name.to_string(),
            root_id.to_string(),
            stem.to_string(),
        ))?;
        if Instant::now() >= entry.expires_at {
            return None;
        }
        Some((entry.links.clone(), entry.tags.clone()))
    }

    pub(crate) fn stem_cache_put(
        &self,
        backend_name: &str,
        root_id: &str,
        stem: &str,
        links: HashSet<String>,
        tags: HashSet<String>,
        ttl: Duration,
    ) {
        if ttl.is_zero() {
            return;
        }
        lock(&self.stem_cache, "stem cache").insert(
            (
                backend_name.to_string(),
                root_id.to_string(),
                stem.to_string(),
            ),
            StemCacheEntry {
                links,
                tags,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_marker_is_consumed_exactly_once() {
        let runtime = LinkGraphRuntime::default();
        runtime.note_graph_search_timeout("Rust ownership", Duration::from_secs(5));
        // Normalized key: consume succeeds once regardless of case.
        assert!(runtime.take_graph_search_timeout("rust ownership"));
        assert!(!runtime.take_graph_search_timeout("rust ownership"));
    }

    #[test]
    fn expired_marker_is_not_taken() {
        let runtime = LinkGraphRuntime::default();
        runtime.note_graph_search_timeout("q", Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(15));
        assert!(!runtime.take_graph_search_timeout("q"));
    }

    #[test]
    fn empty_query_never_marks() {
        let runtime = LinkGraphRuntime::default();
        runtime.note_graph_search_timeout("   ", Duration::from_secs(5));
        assert!(!runtime.take_graph_search_timeout("   "));
    }

    #[test]
    fn stem_cache_honors_ttl() {
        let runtime = LinkGraphRuntime::default();
        let links: HashSet<String> = ["borrowing".to_string()].into();
        runtime.stem_cache_put(
            "b",
            "<default>",
            "ownership",
            links.clone(),
            HashSet::new(),
            Duration::from_millis(5),
        );
        assert!(runtime.stem_cache_get("b", "<default>", "ownership").is_some());
        std::thread::sleep(Duration::from_millis(15));
        assert!(runtime.stem_cache_get("b", "<default>", "ownership").is_none());
    }
}
