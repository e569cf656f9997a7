use crate::result::{sort_by_score_desc, SearchConfidence, SearchResult};
use serde::{Deserialize, Serialize};

// Relative tiers against the top score: within 65% of the best is eligible
// for high, within 40% for medium.
const HIGH_RATIO: f64 = 0.65;
const MEDIUM_RATIO: f64 = 0.40;
// Minimum #1-vs-#2 gap for the clear-winner promotion.
const CLEAR_WINNER_GAP: f64 = 0.15;

/// Numeric parameters controlling absolute thresholds and per-tier display
/// transforms. The same profile feeds the native engine and the
/// recalibration here so both calibrate against one source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceProfile {
    pub high_threshold: f64,
    pub medium_threshold: f64,
    pub high_base: f64,
    pub high_scale: f64,
    pub high_cap: f64,
    pub medium_base: f64,
    pub medium_scale: f64,
    pub medium_cap: f64,
    pub low_floor: f64,
}

impl Default for ConfidenceProfile {
    fn default() -> Self {
        Self {
            high_threshold: 0.75,
            medium_threshold: 0.50,
            high_base: 0.90,
            high_scale: 0.05,
            high_cap: 0.99,
            medium_base: 0.60,
            medium_scale: 0.30,
            medium_cap: 0.89,
            low_floor: 0.10,
        }
    }
}

impl ConfidenceProfile {
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn absolute_tier(score: f64, profile: &ConfidenceProfile) -> SearchConfidence {
    if score >= profile.high_threshold {
        SearchConfidence::High
    } else if score >= profile.medium_threshold {
        SearchConfidence::Medium
    } else {
        SearchConfidence::Low
    }
}

fn relative_tier(score: f64, top_score: f64) -> SearchConfidence {
    if score >= top_score * HIGH_RATIO {
        SearchConfidence::High
    } else if score >= top_score * MEDIUM_RATIO {
        SearchConfidence::Medium
    } else {
        SearchConfidence::Low
    }
}

fn final_score_for(tier: SearchConfidence, score: f64, profile: &ConfidenceProfile) -> f64 {
    match tier {
        SearchConfidence::High => {
            (profile.high_base + score * profile.high_scale).min(profile.high_cap)
        }
        SearchConfidence::Medium => {
            (profile.medium_base + score * profile.medium_scale).min(profile.medium_cap)
        }
        SearchConfidence::Low => score.max(profile.low_floor),
    }
}

/// Pure calibration over `(scores, top_score, profile)`.
///
/// `scores` must be sorted descending (the pipeline guarantees this). Each
/// result must pass BOTH the absolute profile thresholds and the relative
/// top-score ratios; the weaker tier wins. The top result is promoted to
/// high when it clears the medium threshold and leads #2 by the
/// clear-winner gap.
#[must_use]
pub fn calibrate_tiers(
    scores: &[f64],
    profile: &ConfidenceProfile,
) -> Vec<(SearchConfidence, f64)> {
    let top_score = scores.first().copied().unwrap_or(0.0);
    let second_score = scores.get(1).copied();

    scores
        .iter()
        .enumerate()
        .map(|(idx, &score)| {
            let mut tier = absolute_tier(score, profile).min(relative_tier(score, top_score));

            if idx == 0 && tier != SearchConfidence::High {
                if let Some(second) = second_score {
                    if score >= profile.medium_threshold && (score - second) >= CLEAR_WINNER_GAP {
                        tier = SearchConfidence::High;
                    }
                }
            }

            (tier, final_score_for(tier, score, profile))
        })
        .collect()
}

/// Re-calibrate confidence after the score-mutating rerank stages.
///
/// The native engine assigned confidence on pre-boost scores; a result
/// boosted from 0.3 to 1.0 must not keep a "low" label. Results re-sort
/// descending before tiers are computed.
pub fn recalibrate_confidence(results: &mut Vec<SearchResult>, profile: &ConfidenceProfile) {
    if results.is_empty() {
        return;
    }
    sort_by_score_desc(results);
    let scores: Vec<f64> = results.iter().map(|r| r.score).collect();
    for (result, (tier, final_score)) in results.iter_mut().zip(calibrate_tiers(&scores, profile))
    {
        result.confidence = tier;
        result.final_score = final_score;
    }
}
