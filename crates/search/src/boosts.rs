use crate::query::{query_terms_for_attribute_match, ParamType};
use crate::result::{sort_by_score_desc, SearchConfidence, SearchResult};
use serde_json::Value;
use std::collections::HashSet;

// Minimum attribute-overlap strength to promote medium -> high.
const ATTR_MIN_OVERLAP_STRENGTH: u32 = 2;
// Per-hit weight for the intent-overlap boost, capped at 0.5 total.
const INTENT_OVERLAP_BOOST_PER_HIT: f64 = 0.15;
const INTENT_OVERLAP_BOOST_CAP: f64 = 0.5;
// Boost per matching parameter type in a tool's input schema (applied once).
const PARAM_SCHEMA_BOOST: f64 = 0.10;
// Research/analyze intent over a URL favors repo-analyzing tools over
// page-fetching tools.
const RESEARCH_URL_BOOST: f64 = 0.35;

const RESEARCH_TERMS: &[&str] = &["research", "analyze", "analyzing"];
const REPO_TERMS: &[&str] = &["repo", "repository", "analyze_repo", "git"];

/// Count how many query terms appear in routing keywords (x2), intents
/// (x1), or category (x1). Substring containment, as keywords are often
/// compounds like `analyze_repo`.
#[must_use]
pub fn attribute_overlap_strength(
    query_terms: &HashSet<String>,
    routing_keywords: &[String],
    intents: &[String],
    category: &str,
) -> u32 {
    let keywords: Vec<String> = routing_keywords.iter().map(|k| k.to_lowercase()).collect();
    let intents: Vec<String> = intents.iter().map(|i| i.to_lowercase()).collect();
    let category = category.to_lowercase();

    let mut hits = 0;
    for term in query_terms {
        if keywords.iter().any(|k| k.contains(term.as_str())) {
            hits += 2;
        } else if intents.iter().any(|i| i.contains(term.as_str())) {
            hits += 1;
        } else if !category.is_empty() && category.contains(term.as_str()) {
            hits += 1;
        }
    }
    hits
}

/// Promote medium -> high when query terms strongly overlap the tool's
/// routing keywords, intents, or category.
pub fn apply_attribute_confidence(results: &mut [SearchResult], effective_query: &str) {
    if results.is_empty() || effective_query.is_empty() {
        return;
    }
    let terms = query_terms_for_attribute_match(effective_query);
    if terms.is_empty() {
        return;
    }
    for result in results.iter_mut() {
        if result.confidence != SearchConfidence::Medium {
            continue;
        }
        let strength = attribute_overlap_strength(
            &terms,
            &result.routing_keywords,
            &result.intents,
            &result.category,
        );
        if strength >= ATTR_MIN_OVERLAP_STRENGTH {
            result.confidence = SearchConfidence::High;
            log::debug!(
                "attribute confidence: promoted {} to high (strength {strength})",
                result.id
            );
        }
    }
}

/// Boost results whose keywords/intents overlap query intent terms.
pub fn apply_intent_overlap_boost(results: &mut Vec<SearchResult>, intent_terms: &HashSet<String>) {
    if results.is_empty() || intent_terms.is_empty() {
        return;
    }
    for result in results.iter_mut() {
        let strength = attribute_overlap_strength(
            intent_terms,
            &result.routing_keywords,
            &result.intents,
            &result.category,
        );
        if strength > 0 {
            let boost =
                (f64::from(strength) * INTENT_OVERLAP_BOOST_PER_HIT).min(INTENT_OVERLAP_BOOST_CAP);
            result.bump(boost);
            result.boosts.intent_overlap += boost;
        }
    }
    sort_by_score_desc(results);
}

fn schema_accepts(param_type: ParamType, schema: &Value) -> bool {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return false;
    };
    properties.keys().any(|name| {
        let name = name.to_lowercase();
        param_type
            .schema_tokens()
            .iter()
            .any(|token| name.contains(token))
    })
}

/// Boost tools whose input schema accepts a detected parameter type.
/// Purely data-driven (indexed schemas, no tool names); one boost per
/// result regardless of how many types match.
pub fn apply_param_schema_boost(results: &mut Vec<SearchResult>, param_types: &[ParamType]) {
    if results.is_empty() || param_types.is_empty() {
        return;
    }
    for result in results.iter_mut() {
        if param_types
            .iter()
            .any(|pt| schema_accepts(*pt, &result.input_schema))
        {
            result.bump(PARAM_SCHEMA_BOOST);
            result.boosts.param_schema += PARAM_SCHEMA_BOOST;
        }
    }
    sort_by_score_desc(results);
}

fn is_researcher_like(result: &SearchResult) -> bool {
    let joined = result
        .routing_keywords
        .iter()
        .map(|k| k.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    let has_research = RESEARCH_TERMS.iter().any(|t| joined.contains(t));
    let has_repo = REPO_TERMS.iter().any(|t| joined.contains(t));
    has_research && has_repo
}

/// For "research [URL]" queries, rank repo-analyzing tools above plain
/// page fetchers. Data-driven via routing keywords.
pub fn apply_research_url_boost(
    results: &mut Vec<SearchResult>,
    intent_terms: &HashSet<String>,
    param_types: &[ParamType],
) {
    if results.is_empty() || !param_types.contains(&ParamType::Url) {
        return;
    }
    if !RESEARCH_TERMS.iter().any(|t| intent_terms.contains(*t)) {
        return;
    }
    for result in results.iter_mut() {
        if is_researcher_like(result) {
            result.bump(RESEARCH_URL_BOOST);
            result.boosts.research_url += RESEARCH_URL_BOOST;
        }
    }
    sort_by_score_desc(results);
}
