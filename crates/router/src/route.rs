use serde::{Deserialize, Serialize};

/// Confidence level of a routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteConfidence {
    Low,
    Medium,
    High,
}

impl RouteConfidence {
    // Shared thresholds for mapping fused scores to tiers.
    pub const HIGH_THRESHOLD: f64 = 0.75;
    pub const MEDIUM_THRESHOLD: f64 = 0.50;

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= Self::HIGH_THRESHOLD {
            Self::High
        } else if score >= Self::MEDIUM_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// A routing decision: which command to run and how sure we are.
///
/// Immutable once built; `score` is clamped into `[0, 1]` and
/// `command_name` is non-empty by construction (skill-level hits never
/// become routes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    skill_name: String,
    command_name: String,
    score: f64,
    confidence: RouteConfidence,
}

impl RouteResult {
    /// Build a route. Returns `None` when either name is empty.
    #[must_use]
    pub fn new(
        skill_name: impl Into<String>,
        command_name: impl Into<String>,
        score: f64,
        confidence: RouteConfidence,
    ) -> Option<Self> {
        let skill_name = skill_name.into();
        let command_name = command_name.into();
        if skill_name.trim().is_empty() || command_name.trim().is_empty() {
            return None;
        }
        Some(Self {
            skill_name,
            command_name,
            score: score.clamp(0.0, 1.0),
            confidence,
        })
    }

    #[must_use]
    pub fn skill_name(&self) -> &str {
        &self.skill_name
    }

    #[must_use]
    pub fn command_name(&self) -> &str {
        &self.command_name
    }

    #[must_use]
    pub fn score(&self) -> f64 {
        self.score
    }

    #[must_use]
    pub fn confidence(&self) -> RouteConfidence {
        self.confidence
    }

    /// The full `skill.command` id this route resolves to.
    #[must_use]
    pub fn tool_id(&self) -> String {
        format!("{}.{}", self.skill_name, self.command_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn score_is_clamped_into_unit_range() {
        let route = RouteResult::new("git", "commit", 1.4, RouteConfidence::High).unwrap();
        assert_eq!(route.score(), 1.0);
        let route = RouteResult::new("git", "commit", -0.2, RouteConfidence::Low).unwrap();
        assert_eq!(route.score(), 0.0);
    }

    #[test]
    fn empty_names_are_rejected() {
        assert!(RouteResult::new("", "commit", 0.5, RouteConfidence::Low).is_none());
        assert!(RouteResult::new("git", "  ", 0.5, RouteConfidence::Low).is_none());
    }

    #[test]
    fn confidence_maps_from_score() {
        assert_eq!(RouteConfidence::from_score(0.8), RouteConfidence::High);
        assert_eq!(RouteConfidence::from_score(0.6), RouteConfidence::Medium);
        assert_eq!(RouteConfidence::from_score(0.2), RouteConfidence::Low);
    }
}
