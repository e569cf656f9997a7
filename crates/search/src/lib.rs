//! # Hive Search
//!
//! The hybrid query pipeline that turns a natural-language request into
//! ranked tool candidates:
//!
//! ```text
//! query ──> normalize ──> dual-signal decomposition (intent text / params)
//!        ──> embed ──> intent classification + fusion weights
//!        ──> native vector+keyword search
//!        ──> attribute / intent / schema / research-url / relationship / KG reranks
//!        ──> confidence recalibration ──> top-N
//! ```
//!
//! The native store does the heavy fusion; this crate owns query shaping,
//! the rerank stages (each recorded in the result's [`BoostVector`] so they
//! compose deterministically), and the final calibration, which is a pure
//! function over `(scores, top_score, profile)`.

mod boosts;
mod calibrate;
mod error;
mod hybrid;
mod intent;
mod query;
mod relationships;
mod result;

pub use boosts::{
    apply_attribute_confidence, apply_intent_overlap_boost, apply_param_schema_boost,
    apply_research_url_boost, attribute_overlap_strength,
};
pub use calibrate::{calibrate_tiers, recalibrate_confidence, ConfidenceProfile};
pub use error::{Result, SearchError};
pub use hybrid::{
    HybridSearch, KnowledgeGraphReranker, PhaseTimings, SearchOptions, SearchSettings, Translator,
};
pub use intent::{
    classify_tool_search_intent, FusionWeights, IntentClassifier, IntentResolution,
    ToolSearchIntent,
};
pub use query::{
    detect_param_types, extract_intent_text, intent_terms_from_query, is_routable_tool_name,
    normalize_for_routing, query_has_concrete_url, query_terms_for_attribute_match, ParamType,
    DEFAULT_INTENT_VOCAB,
};
pub use relationships::{apply_relationship_rerank, RelationshipGraph};
pub use result::{BoostVector, SearchConfidence, SearchResult};
