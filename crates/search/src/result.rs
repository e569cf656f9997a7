use hive_vector_store::ToolSearchPayload;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Routing confidence tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchConfidence {
    Low,
    Medium,
    High,
}

impl SearchConfidence {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Every rerank-stage boost applied to a result, tracked separately so the
/// stages compose deterministically and stay inspectable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoostVector {
    pub intent_overlap: f64,
    pub param_schema: f64,
    pub research_url: f64,
    pub relationship: f64,
    pub kg: f64,
}

impl BoostVector {
    #[must_use]
    pub fn total(&self) -> f64 {
        self.intent_overlap + self.param_schema + self.research_url + self.relationship + self.kg
    }
}

/// One ranked tool candidate flowing through the hybrid pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Canonical `skill.command` id.
    pub id: String,
    pub content: String,
    /// Raw fusion score plus applied boosts; may exceed 1.
    pub score: f64,
    pub confidence: SearchConfidence,
    /// Display-calibrated score in `[0, 1]`.
    pub final_score: f64,
    pub vector_score: Option<f64>,
    pub keyword_score: Option<f64>,
    pub skill_name: String,
    pub command: String,
    pub file_path: String,
    pub category: String,
    pub routing_keywords: Vec<String>,
    pub intents: Vec<String>,
    /// JSON Schema object for the tool's parameters.
    pub input_schema: Value,
    pub boosts: BoostVector,
    /// The canonical payload the native row parsed into.
    pub payload: ToolSearchPayload,
}

impl SearchResult {
    /// Add to both the working score and the display score; boosts are
    /// recorded by the caller into the matching [`BoostVector`] slot.
    pub(crate) fn bump(&mut self, amount: f64) {
        self.score += amount;
        self.final_score += amount;
    }
}

/// Stable descending sort by score; equal scores keep their current order.
pub(crate) fn sort_by_score_desc(results: &mut [SearchResult]) {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
}

#[cfg(test)]
impl SearchResult {
    /// Minimal medium-confidence result for rerank tests.
    pub(crate) fn test_stub(id: &str, score: f64) -> Self {
        let payload = hive_vector_store::parse_tool_search_payload(&serde_json::json!({
            "name": id,
            "score": score,
        }))
        .unwrap();
        let (skill_name, command) = id.split_once('.').unwrap_or((id, ""));
        Self {
            id: id.to_string(),
            content: String::new(),
            score,
            confidence: SearchConfidence::Medium,
            final_score: score,
            vector_score: None,
            keyword_score: None,
            skill_name: skill_name.to_string(),
            command: command.to_string(),
            file_path: String::new(),
            category: String::new(),
            routing_keywords: Vec::new(),
            intents: Vec::new(),
            input_schema: serde_json::json!({}),
            boosts: BoostVector::default(),
            payload,
        }
    }
}
