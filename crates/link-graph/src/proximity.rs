use crate::backend::LinkGraphBackend;
use crate::config::ProximitySettings;
use crate::models::LinkGraphDirection;
use crate::policy::ChunkRow;
use crate::runtime::LinkGraphRuntime;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap_or_else(|_| unreachable!())
});
static HEX32_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{32}$").unwrap_or_else(|_| unreachable!()));

/// Per-call knobs for the proximity boost. `fusion_scale` multiplies both
/// boost constants when an external fusion module supplies a scale.
#[derive(Debug, Clone)]
pub struct ProximityOptions {
    pub settings: ProximitySettings,
    pub fusion_scale: Option<f64>,
    /// Identifies the notebook root in the stem cache key.
    pub root_id: String,
}

impl Default for ProximityOptions {
    fn default() -> Self {
        Self {
            settings: ProximitySettings::default(),
            fusion_scale: None,
            root_id: "<default>".to_string(),
        }
    }
}

/// True when the value looks like a note stem rather than an opaque chunk id.
fn is_note_stem(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }
    !UUID_RE.is_match(value) && !HEX32_RE.is_match(value)
}

fn stem_of(source: &str) -> Option<String> {
    let stem = Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    (is_note_stem(&stem)).then_some(stem)
}

fn resolve_neighbor_limit(settings: &ProximitySettings, stems: usize) -> usize {
    if settings.neighbor_limit > 0 {
        return settings.neighbor_limit;
    }
    settings
        .neighbor_limit_floor
        .max(stems * 3)
        .min(settings.neighbor_limit_cap)
}

/// Pure pairwise boost; the normative reference for any accelerated helper.
///
/// For each unordered result pair with known stems: a link in either
/// direction adds `link_boost` to both rows, a shared tag adds `tag_boost`
/// to both rows. Rows re-sort descending afterwards; ties keep input order.
fn apply_pairwise_boost(
    results: &mut [ChunkRow],
    stem_links: &HashMap<String, HashSet<String>>,
    stem_tags: &HashMap<String, HashSet<String>>,
    link_boost: f64,
    tag_boost: f64,
) {
    let stems: Vec<Option<String>> = results
        .iter()
        .map(|row| {
            let stem = stem_of(&row.source)?;
            stem_links.contains_key(&stem).then_some(stem)
        })
        .collect();

    for i in 0..results.len() {
        let Some(stem_a) = stems[i].clone() else {
            continue;
        };
        for j in (i + 1)..results.len() {
            let Some(stem_b) = stems[j].as_ref() else {
                continue;
            };
            let linked = stem_links
                .get(&stem_a)
                .is_some_and(|links| links.contains(stem_b))
                || stem_links
                    .get(stem_b)
                    .is_some_and(|links| links.contains(&stem_a));
            if linked {
                results[i].score += link_boost;
                results[j].score += link_boost;
            }
            let shares_tag = match (stem_tags.get(&stem_a), stem_tags.get(stem_b)) {
                (Some(tags_a), Some(tags_b)) => !tags_a.is_disjoint(tags_b),
                _ => false,
            };
            if shares_tag {
                results[i].score += tag_boost;
                results[j].score += tag_boost;
            }
        }
    }

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
}

/// Boost recall scores based on link proximity and shared tags.
///
/// Returns the same rows re-scored and re-sorted; on any degradation
/// (no backend, fresh timeout marker, deadline) the input comes back
/// unchanged or partially boosted, never an error.
pub async fn apply_link_graph_proximity_boost(
    mut results: Vec<ChunkRow>,
    query: &str,
    backend: Option<Arc<dyn LinkGraphBackend>>,
    runtime: &Arc<LinkGraphRuntime>,
    options: &ProximityOptions,
) -> Vec<ChunkRow> {
    if results.len() < 2 {
        return results;
    }

    // A graph search for this query just timed out; probing neighbors now
    // would hit the same stalled backend.
    if runtime.take_graph_search_timeout(query) {
        log::debug!("proximity boost skipped: recent graph search timeout for this query");
        return results;
    }

    let Some(backend) = backend else {
        return results;
    };

    let settings = &options.settings;
    let (link_boost, tag_boost) = match options.fusion_scale {
        Some(scale) => (settings.link_boost * scale, settings.tag_boost * scale),
        None => (settings.link_boost, settings.tag_boost),
    };

    let mut stems: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    for row in &results {
        if let Some(stem) = stem_of(&row.source) {
            if seen.insert(stem.clone()) {
                stems.push(stem);
            }
        }
    }
    stems.truncate(settings.max_stems.max(1));
    if stems.is_empty() {
        return results;
    }

    let backend_name = backend.backend_name().to_string();
    let stem_cache_ttl = Duration::from_secs_f64(settings.stem_cache_ttl_s.max(0.0));
    let neighbor_limit = resolve_neighbor_limit(settings, stems.len());
    let max_parallel = settings.max_parallel_stems.max(1).min(stems.len());
    let fetch_tags = tag_boost.abs() > 1e-9;

    let mut stem_links: HashMap<String, HashSet<String>> = HashMap::new();
    let mut stem_tags: HashMap<String, HashSet<String>> = HashMap::new();

    // Cached stems resolve synchronously; only misses hit the backend.
    let mut to_fetch: Vec<String> = Vec::new();
    for stem in &stems {
        match runtime.stem_cache_get(&backend_name, &options.root_id, stem) {
            Some((links, tags)) => {
                stem_links.insert(stem.clone(), links);
                stem_tags.insert(stem.clone(), tags);
            }
            None => to_fetch.push(stem.clone()),
        }
    }

    if !to_fetch.is_empty() {
        let semaphore = Arc::new(Semaphore::new(max_parallel));
        let mut tasks: JoinSet<(String, HashSet<String>, HashSet<String>)> = JoinSet::new();
        for stem in to_fetch {
            let backend = Arc::clone(&backend);
            let semaphore = Arc::clone(&semaphore);
            let max_hops = settings.max_hops.max(1);
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return (stem, HashSet::new(), HashSet::new());
                };
                let mut links: HashSet<String> = HashSet::new();
                let mut tags: HashSet<String> = HashSet::new();

                let neighbors_fut = backend.neighbors(
                    &stem,
                    LinkGraphDirection::Both,
                    max_hops,
                    neighbor_limit,
                );
                if fetch_tags {
                    let (neighbors, meta) =
                        tokio::join!(neighbors_fut, backend.metadata(&stem));
                    if let Ok(neighbors) = neighbors {
                        links.extend(
                            neighbors
                                .into_iter()
                                .filter(|n| is_note_stem(&n.stem))
                                .map(|n| n.stem),
                        );
                    }
                    if let Ok(Some(meta)) = meta {
                        tags.extend(meta.tags.into_iter().filter(|t| !t.trim().is_empty()));
                    }
                } else if let Ok(neighbors) = neighbors_fut.await {
                    links.extend(
                        neighbors
                            .into_iter()
                            .filter(|n| is_note_stem(&n.stem))
                            .map(|n| n.stem),
                    );
                }
                (stem, links, tags)
            });
        }

        let deadline = Duration::from_secs_f64(settings.timeout_s.max(0.0));
        let fetch_all = async {
            while let Some(joined) = tasks.join_next().await {
                let Ok((stem, links, tags)) = joined else {
                    continue;
                };
                // Cache writes happen on successful completion only, so a
                // deadline abort never leaves a half-written entry.
                runtime.stem_cache_put(
                    &backend_name,
                    &options.root_id,
                    &stem,
                    links.clone(),
                    tags.clone(),
                    stem_cache_ttl,
                );
                stem_links.insert(stem.clone(), links);
                stem_tags.insert(stem, tags);
            }
        };
        if tokio::time::timeout(deadline, fetch_all).await.is_err() {
            log::debug!(
                "proximity fetch deadline hit after {:.3}s ({} of {} stems resolved)",
                settings.timeout_s,
                stem_links.len(),
                stems.len()
            );
        }
        // Drain whatever is still in flight so no task outlives the call.
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
    }

    apply_pairwise_boost(&mut results, &stem_links, &stem_tags, link_boost, tag_boost);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LinkGraphBackend, PlannedSearch};
    use crate::error::Result;
    use crate::models::{
        LinkGraphHit, LinkGraphMetadata, LinkGraphNeighbor, LinkGraphSearchOptions,
    };
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn row(source: &str, score: f64) -> ChunkRow {
        ChunkRow {
            content: String::new(),
            source: source.to_string(),
            score,
            title: String::new(),
            section: String::new(),
        }
    }

    /// Backend that answers `neighbors` from a fixed adjacency map and
    /// tracks the maximum number of concurrently running fetches.
    struct MapBackend {
        links: HashMap<String, Vec<String>>,
        tags: HashMap<String, Vec<String>>,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MapBackend {
        fn new(links: &[(&str, &[&str])], tags: &[(&str, &[&str])]) -> Self {
            Self {
                links: links
                    .iter()
                    .map(|(k, v)| {
                        (k.to_string(), v.iter().map(|s| s.to_string()).collect())
                    })
                    .collect(),
                tags: tags
                    .iter()
                    .map(|(k, v)| {
                        (k.to_string(), v.iter().map(|s| s.to_string()).collect())
                    })
                    .collect(),
                delay: Duration::ZERO,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl LinkGraphBackend for MapBackend {
        fn backend_name(&self) -> &str {
            "map"
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
                hits: Vec::new(),
            })
        }

        async fn neighbors(
            &self,
            stem: &str,
            _direction: LinkGraphDirection,
            _hops: u32,
            _limit: usize,
        ) -> Result<Vec<LinkGraphNeighbor>> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(self
                .links
                .get(stem)
                .map(|neighbors| {
                    neighbors
                        .iter()
                        .map(|n| LinkGraphNeighbor {
                            stem: n.clone(),
                            direction: LinkGraphDirection::Both,
                            distance: 1,
                            title: String::new(),
                            path: String::new(),
                        })
                        .collect()
                })
                .unwrap_or_default())
        }

        async fn related(
            &self,
            _stem: &str,
            _max_distance: u32,
            _limit: usize,
        ) -> Result<Vec<LinkGraphNeighbor>> {
            Ok(Vec::new())
        }

        async fn metadata(&self, stem: &str) -> Result<Option<LinkGraphMetadata>> {
            Ok(self.tags.get(stem).map(|tags| LinkGraphMetadata {
                stem: stem.to_string(),
                tags: tags.clone(),
                title: String::new(),
                path: String::new(),
            }))
        }

        async fn toc(&self, _limit: usize) -> Result<Vec<Value>> {
            Ok(Vec::new())
        }

        async fn stats(&self) -> Result<Value> {
            Ok(Value::Null)
        }

        async fn refresh_with_delta(&self, _paths: &[String], _full: bool) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    fn options() -> ProximityOptions {
        ProximityOptions::default()
    }

    #[tokio::test]
    async fn linked_results_are_boosted_above_strangers() {
        let backend = Arc::new(MapBackend::new(
            &[("ownership", &["borrowing"]), ("borrowing", &["ownership"]), ("garbage", &[])],
            &[],
        ));
        let runtime = LinkGraphRuntime::new();
        let results = vec![
            row("ownership.md", 0.5),
            row("borrowing.md", 0.5),
            row("garbage.md", 0.5),
        ];

        let boosted = apply_link_graph_proximity_boost(
            results,
            "rust memory",
            Some(backend),
            &runtime,
            &options(),
        )
        .await;

        let by_source: HashMap<&str, f64> = boosted
            .iter()
            .map(|r| (r.source.as_str(), r.score))
            .collect();
        assert!((by_source["ownership.md"] - 0.62).abs() < 1e-9);
        assert!((by_source["borrowing.md"] - 0.62).abs() < 1e-9);
        assert!((by_source["garbage.md"] - 0.5).abs() < 1e-9);
        // Linked pair ranks above the stranger; ties broken by input order.
        assert_eq!(boosted[0].source, "ownership.md");
        assert_eq!(boosted[1].source, "borrowing.md");
        assert_eq!(boosted[2].source, "garbage.md");
    }

    #[tokio::test]
    async fn shared_tags_add_tag_boost() {
        let backend = Arc::new(MapBackend::new(
            &[("a", &[]), ("b", &[])],
            &[("a", &["rust"]), ("b", &["rust"])],
        ));
        let runtime = LinkGraphRuntime::new();
        let boosted = apply_link_graph_proximity_boost(
            vec![row("a.md", 0.4), row("b.md", 0.3)],
            "q",
            Some(backend),
            &runtime,
            &options(),
        )
        .await;
        assert!((boosted[0].score - 0.48).abs() < 1e-9);
        assert!((boosted[1].score - 0.38).abs() < 1e-9);
    }

    #[tokio::test]
    async fn single_result_is_untouched() {
        let backend = Arc::new(MapBackend::new(&[], &[]));
        let runtime = LinkGraphRuntime::new();
        let boosted = apply_link_graph_proximity_boost(
            vec![row("a.md", 0.4)],
            "q",
            Some(backend),
            &runtime,
            &options(),
        )
        .await;
        assert_eq!(boosted, vec![row("a.md", 0.4)]);
    }

    #[tokio::test]
    async fn recent_timeout_marker_short_circuits() {
        let backend = Arc::new(MapBackend::new(&[("a", &["b"]), ("b", &["a"])], &[]));
        let runtime = LinkGraphRuntime::new();
        runtime.note_graph_search_timeout("slow query", Duration::from_secs(10));

        let input = vec![row("a.md", 0.4), row("b.md", 0.3)];
        let boosted = apply_link_graph_proximity_boost(
            input.clone(),
            "slow query",
            Some(backend),
            &runtime,
            &options(),
        )
        .await;
        assert_eq!(boosted, input);
        // The marker was consumed: a second call does probe the graph.
        assert!(!runtime.take_graph_search_timeout("slow query"));
    }

    #[tokio::test]
    async fn uuid_and_hash_sources_are_not_stems() {
        assert!(!is_note_stem("123e4567-e89b-12d3-a456-426614174000"));
        assert!(!is_note_stem("0123456789abcdef0123456789abcdef"));
        assert!(is_note_stem("ownership"));
    }

    #[tokio::test]
    async fn fetch_concurrency_is_bounded() {
        let backend = Arc::new(
            MapBackend::new(
                &[("a", &[]), ("b", &[]), ("c", &[]), ("d", &[]), ("e", &[]), ("f", &[])],
                &[],
            )
            .with_delay(Duration::from_millis(20)),
        );
        let runtime = LinkGraphRuntime::new();
        let mut opts = options();
        opts.settings.max_parallel_stems = 2;
        opts.settings.tag_boost = 0.0;

        let results = vec![
            row("a.md", 0.6),
            row("b.md", 0.5),
            row("c.md", 0.4),
            row("d.md", 0.3),
            row("e.md", 0.2),
            row("f.md", 0.1),
        ];
        let _ = apply_link_graph_proximity_boost(
            results,
            "q",
            Some(Arc::clone(&backend) as Arc<dyn LinkGraphBackend>),
            &runtime,
            &opts,
        )
        .await;

        assert!(backend.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_keeps_partial_results_and_preserves_rows() {
        let backend = Arc::new(
            MapBackend::new(&[("a", &["b"]), ("b", &["a"]), ("c", &[])], &[])
                .with_delay(Duration::from_secs(60)),
        );
        let runtime = LinkGraphRuntime::new();
        let mut opts = options();
        opts.settings.timeout_s = 0.5;
        opts.settings.tag_boost = 0.0;

        let input = vec![row("a.md", 0.3), row("b.md", 0.2), row("c.md", 0.1)];
        let boosted = apply_link_graph_proximity_boost(
            input.clone(),
            "q",
            Some(backend),
            &runtime,
            &opts,
        )
        .await;

        // No fetch finished before the deadline: scores unchanged, but the
        // full source set is preserved.
        let mut sources: Vec<&str> = boosted.iter().map(|r| r.source.as_str()).collect();
        sources.sort_unstable();
        assert_eq!(sources, vec!["a.md", "b.md", "c.md"]);
        for row in &boosted {
            assert!(row.score <= 0.3 + 1e-9);
        }
    }

    #[tokio::test]
    async fn stem_cache_skips_backend_on_second_call() {
        let backend = Arc::new(MapBackend::new(&[("a", &["b"]), ("b", &["a"])], &[]));
        let runtime = LinkGraphRuntime::new();
        let mut opts = options();
        opts.settings.tag_boost = 0.0;

        let input = vec![row("a.md", 0.4), row("b.md", 0.3)];
        let _ = apply_link_graph_proximity_boost(
            input.clone(),
            "q",
            Some(Arc::clone(&backend) as Arc<dyn LinkGraphBackend>),
            &runtime,
            &opts,
        )
        .await;
        let first_calls = backend.max_in_flight.load(Ordering::SeqCst);
        assert!(first_calls >= 1);

        backend.max_in_flight.store(0, Ordering::SeqCst);
        let _ = apply_link_graph_proximity_boost(
            input,
            "q",
            Some(Arc::clone(&backend) as Arc<dyn LinkGraphBackend>),
            &runtime,
            &opts,
        )
        .await;
        assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fusion_scale_multiplies_boosts() {
        let mut results = vec![row("a.md", 0.0), row("b.md", 0.0)];
        let links: HashMap<String, HashSet<String>> = [
            ("a".to_string(), HashSet::from(["b".to_string()])),
            ("b".to_string(), HashSet::new()),
        ]
        .into();
        apply_pairwise_boost(&mut results, &links, &HashMap::new(), 0.12 * 0.5, 0.0);
        assert!((results[0].score - 0.06).abs() < 1e-9);
    }
}
