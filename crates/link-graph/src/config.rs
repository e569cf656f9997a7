use serde::{Deserialize, Serialize};

/// Per-bucket multipliers over the base policy search timeout.
///
/// The `empty` bucket is pinned to 0.2 inside the planner and is not
/// configurable; these scales cover the remaining buckets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutScales {
    pub machine_like: f64,
    pub short: f64,
    pub long_natural: f64,
    pub symbol_heavy: f64,
    pub normal: f64,
}

impl Default for TimeoutScales {
    fn default() -> Self {
        Self {
            machine_like: 0.5,
            short: 0.6,
            long_natural: 1.5,
            symbol_heavy: 0.5,
            normal: 1.0,
        }
    }
}

/// Tunables for the proximity booster.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximitySettings {
    pub link_boost: f64,
    pub tag_boost: f64,
    pub max_hops: u32,
    pub max_stems: usize,
    pub stem_cache_ttl_s: f64,
    pub timeout_s: f64,
    pub max_parallel_stems: usize,
    /// 0 means auto-scale: `clamp(stems * 3, floor, cap)`.
    pub neighbor_limit: usize,
    pub neighbor_limit_floor: usize,
    pub neighbor_limit_cap: usize,
}

impl Default for ProximitySettings {
    fn default() -> Self {
        Self {
            link_boost: 0.12,
            tag_boost: 0.08,
            max_hops: 2,
            max_stems: 8,
            stem_cache_ttl_s: 60.0,
            timeout_s: 5.0,
            max_parallel_stems: 3,
            neighbor_limit: 0,
            neighbor_limit_floor: 12,
            neighbor_limit_cap: 24,
        }
    }
}

/// Every tunable the link-graph runtime exposes, with reference defaults.
/// Hosts construct these (usually deserialized from their settings file)
/// and pass them in; the core never reads files or env on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkGraphSettings {
    pub policy_search_timeout_s: f64,
    pub policy_timeout_scales: TimeoutScales,
    pub policy_cache_ttl_s: f64,
    pub timeout_marker_ttl_s: f64,
    pub stats_cache_ttl_s: f64,
    pub stats_timeout_s: f64,
    pub stats_probe_timeout_s: f64,
    pub stats_refresh_timeout_s: f64,
    pub proximity: ProximitySettings,
}

impl Default for LinkGraphSettings {
    fn default() -> Self {
        Self {
            policy_search_timeout_s: 0.8,
            policy_timeout_scales: TimeoutScales::default(),
            policy_cache_ttl_s: 45.0,
            timeout_marker_ttl_s: 20.0,
            stats_cache_ttl_s: 60.0,
            stats_timeout_s: 2.0,
            stats_probe_timeout_s: 0.35,
            stats_refresh_timeout_s: 4.0,
            proximity: ProximitySettings::default(),
        }
    }
}
