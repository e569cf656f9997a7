use crate::backend::LinkGraphBackend;
use crate::runtime::LinkGraphRuntime;
use hive_protocol::{StatsMeta, StatsPayload, StatsSource};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// TTL and timeout knobs for one stats-cache call.
#[derive(Debug, Clone, Copy)]
pub struct StatsCacheOptions {
    pub ttl: Duration,
    /// Timeout for a direct `stats()` call.
    pub timeout: Duration,
    /// Short timeout for the response fast path.
    pub probe_timeout: Duration,
    /// Timeout for the background refresh task.
    pub refresh_timeout: Duration,
    pub fallback: StatsPayload,
    pub force_refresh: bool,
    pub allow_refresh: bool,
}

impl Default for StatsCacheOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            timeout: Duration::from_secs(2),
            probe_timeout: Duration::from_millis(350),
            refresh_timeout: Duration::from_secs(4),
            fallback: StatsPayload::default(),
            force_refresh: false,
            allow_refresh: true,
        }
    }
}

async fn probe_stats(
    backend: &dyn LinkGraphBackend,
    timeout: Duration,
) -> Option<StatsPayload> {
    let raw = if timeout.is_zero() {
        backend.stats().await.ok()?
    } else {
        tokio::time::timeout(timeout, backend.stats()).await.ok()?.ok()?
    };
    Some(StatsPayload::from_value(&raw))
}

/// Fetch backend stats with cache and timeout fallback.
///
/// Fresh cache entries short-circuit; on probe failure the stale entry (if
/// any) is returned, else the fallback. Entries are only written after a
/// successful probe.
pub async fn get_cached_link_graph_stats(
    runtime: &Arc<LinkGraphRuntime>,
    backend: &dyn LinkGraphBackend,
    options: StatsCacheOptions,
) -> StatsPayload {
    let backend_name = backend.backend_name().to_string();
    let cached = runtime.stats_cache_get(&backend_name);

    if let Some(entry) = &cached {
        if !options.ttl.is_zero() && !options.force_refresh && Instant::now() < entry.expires_at {
            return entry.stats;
        }
    }
    if !options.allow_refresh {
        return cached.map_or(options.fallback, |entry| entry.stats);
    }

    match probe_stats(backend, options.timeout).await {
        Some(stats) => {
            runtime.stats_cache_put(&backend_name, stats, options.ttl);
            stats
        }
        None => cached.map_or(options.fallback, |entry| entry.stats),
    }
}

/// Schedule a background stats refresh when none is in flight for this
/// backend identity. Returns true when a task was scheduled.
pub fn schedule_link_graph_stats_refresh(
    runtime: &Arc<LinkGraphRuntime>,
    backend: Arc<dyn LinkGraphBackend>,
    options: StatsCacheOptions,
) -> bool {
    let backend_name = backend.backend_name().to_string();
    let runtime_for_task = Arc::clone(runtime);
    runtime.stats_refresh_register(&backend_name, move || {
        tokio::spawn(async move {
            let name = backend.backend_name().to_string();
            if let Some(stats) = probe_stats(backend.as_ref(), options.refresh_timeout).await {
                runtime_for_task.stats_cache_put(&name, stats, options.ttl);
            }
            runtime_for_task.stats_refresh_done(&name);
        })
    })
}

/// Stable stats shape for API responses: fresh cache, else a short probe,
/// else stale-or-fallback with a background refresh scheduled.
pub async fn get_link_graph_stats_for_response(
    runtime: &Arc<LinkGraphRuntime>,
    backend: Arc<dyn LinkGraphBackend>,
    options: StatsCacheOptions,
) -> (StatsPayload, StatsMeta) {
    let backend_name = backend.backend_name().to_string();
    let now = Instant::now();
    let cached = runtime.stats_cache_get(&backend_name);

    if let Some(entry) = &cached {
        if !options.ttl.is_zero() && now < entry.expires_at {
            let meta = StatsMeta {
                source: StatsSource::Cache,
                cache_hit: true,
                fresh: true,
                age_ms: now.duration_since(entry.updated_at).as_millis() as u64,
                refresh_scheduled: false,
            };
            return (entry.stats, meta);
        }
    }

    if let Some(stats) = probe_stats(backend.as_ref(), options.probe_timeout).await {
        runtime.stats_cache_put(&backend_name, stats, options.ttl);
        let meta = StatsMeta {
            source: StatsSource::Probe,
            cache_hit: false,
            fresh: true,
            age_ms: 0,
            refresh_scheduled: false,
        };
        return (stats, meta);
    }

    let refresh_scheduled = schedule_link_graph_stats_refresh(runtime, backend, options);
    match cached {
        Some(entry) => {
            let meta = StatsMeta {
                source: StatsSource::CacheStale,
                cache_hit: true,
                fresh: false,
                age_ms: now.duration_since(entry.updated_at).as_millis() as u64,
                refresh_scheduled,
            };
            (entry.stats, meta)
        }
        None => {
            let meta = StatsMeta {
                source: StatsSource::Fallback,
                cache_hit: false,
                fresh: false,
                age_ms: 0,
                refresh_scheduled,
            };
            (options.fallback, meta)
        }
    }
}

/// Clear the stats cache and cancel pending refresh tasks.
pub fn clear_link_graph_stats_cache(runtime: &Arc<LinkGraphRuntime>) {
    runtime.stats_cache_clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PlannedSearch;
    use crate::error::{LinkGraphError, Result};
    use crate::models::{
        LinkGraphDirection, LinkGraphHit, LinkGraphMetadata, LinkGraphNeighbor,
        LinkGraphSearchOptions,
    };
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct CountingBackend {
        notes: u64,
        fail: AtomicBool,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl CountingBackend {
        fn new(notes: u64) -> Self {
            Self {
                notes,
                fail: AtomicBool::new(false),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl LinkGraphBackend for CountingBackend {
        fn backend_name(&self) -> &str {
            "counting"
        }

        async fn search_planned(
            &self,
            query: &str,
            _limit: usize,
            options: Option<LinkGraphSearchOptions>,
        ) -> Result<PlannedSearch> {
            Ok(PlannedSearch {
                query: query.to_string(),
                search_options: options.unwrap_or_default(),
                hits: Vec::<LinkGraphHit>::new(),
            })
        }

        async fn neighbors(
            &self,
            _stem: &str,
            _direction: LinkGraphDirection,
            _hops: u32,
            _limit: usize,
        ) -> Result<Vec<LinkGraphNeighbor>> {
            Ok(Vec::new())
        }

        async fn related(
            &self,
            _stem: &str,
            _max_distance: u32,
            _limit: usize,
        ) -> Result<Vec<LinkGraphNeighbor>> {
            Ok(Vec::new())
        }

        async fn metadata(&self, _stem: &str) -> Result<Option<LinkGraphMetadata>> {
            Ok(None)
        }

        async fn toc(&self, _limit: usize) -> Result<Vec<Value>> {
            Ok(Vec::new())
        }

        async fn stats(&self) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(LinkGraphError::Backend("stats unavailable".into()));
            }
            Ok(json!({"total_notes": self.notes, "orphans": 1, "links_in_graph": 4, "nodes_in_graph": self.notes}))
        }

        async fn refresh_with_delta(&self, _paths: &[String], _full: bool) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn fresh_cache_short_circuits_probe() {
        let runtime = LinkGraphRuntime::new();
        let backend = CountingBackend::new(5);
        let options = StatsCacheOptions::default();

        let first = get_cached_link_graph_stats(&runtime, &backend, options).await;
        assert_eq!(first.total_notes, 5);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        let second = get_cached_link_graph_stats(&runtime, &backend, options).await;
        assert_eq!(second, first);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn force_refresh_bypasses_fresh_cache() {
        let runtime = LinkGraphRuntime::new();
        let backend = CountingBackend::new(5);
        let mut options = StatsCacheOptions::default();

        let _ = get_cached_link_graph_stats(&runtime, &backend, options).await;
        options.force_refresh = true;
        let _ = get_cached_link_graph_stats(&runtime, &backend, options).await;
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_probe_returns_stale_then_fallback() {
        let runtime = LinkGraphRuntime::new();
        let backend = CountingBackend::new(5);
        let options = StatsCacheOptions {
            ttl: Duration::from_millis(5),
            ..Default::default()
        };

        let first = get_cached_link_graph_stats(&runtime, &backend, options).await;
        assert_eq!(first.total_notes, 5);

        tokio::time::sleep(Duration::from_millis(15)).await;
        backend.fail.store(true, Ordering::SeqCst);
        let stale = get_cached_link_graph_stats(&runtime, &backend, options).await;
        assert_eq!(stale.total_notes, 5);

        // No cache at all: fallback payload.
        let empty_runtime = LinkGraphRuntime::new();
        let fallback = get_cached_link_graph_stats(&empty_runtime, &backend, options).await;
        assert_eq!(fallback, StatsPayload::default());
    }

    #[tokio::test]
    async fn response_path_reports_meta_sources() {
        let runtime = LinkGraphRuntime::new();
        let backend: Arc<dyn LinkGraphBackend> = Arc::new(CountingBackend::new(7));
        let options = StatsCacheOptions::default();

        let (stats, meta) =
            get_link_graph_stats_for_response(&runtime, Arc::clone(&backend), options).await;
        assert_eq!(stats.total_notes, 7);
        assert_eq!(meta.source, StatsSource::Probe);
        assert!(meta.fresh);

        let (_, meta) =
            get_link_graph_stats_for_response(&runtime, Arc::clone(&backend), options).await;
        assert_eq!(meta.source, StatsSource::Cache);
        assert!(meta.cache_hit);
    }

    #[tokio::test]
    async fn response_path_schedules_refresh_on_probe_failure() {
        let runtime = LinkGraphRuntime::new();
        // Slow enough that the probe times out and the refresh task stays
        // in flight across both calls.
        let backend = Arc::new(CountingBackend::new(7).with_delay(Duration::from_secs(5)));
        let handle: Arc<dyn LinkGraphBackend> = Arc::clone(&backend) as _;
        let options = StatsCacheOptions {
            probe_timeout: Duration::from_millis(20),
            ..Default::default()
        };

        let (stats, meta) =
            get_link_graph_stats_for_response(&runtime, Arc::clone(&handle), options).await;
        assert_eq!(stats, StatsPayload::default());
        assert_eq!(meta.source, StatsSource::Fallback);
        assert!(meta.refresh_scheduled);

        // A second miss while the refresh is in flight does not schedule
        // another task.
        let (_, meta) = get_link_graph_stats_for_response(&runtime, handle, options).await;
        assert!(!meta.refresh_scheduled);
    }

    #[tokio::test]
    async fn clear_cancels_pending_refresh() {
        let runtime = LinkGraphRuntime::new();
        let backend = Arc::new(CountingBackend::new(7));
        backend.fail.store(true, Ordering::SeqCst);
        let handle: Arc<dyn LinkGraphBackend> = Arc::clone(&backend) as _;
        let scheduled =
            schedule_link_graph_stats_refresh(&runtime, handle, StatsCacheOptions::default());
        assert!(scheduled);
        clear_link_graph_stats_cache(&runtime);
        // After clearing, scheduling is possible again.
        let handle: Arc<dyn LinkGraphBackend> = backend as _;
        assert!(schedule_link_graph_stats_refresh(
            &runtime,
            handle,
            StatsCacheOptions::default()
        ));
    }
}
