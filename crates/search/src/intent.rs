use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static EXPLICIT_TOOL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_]\w*\.[A-Za-z_]\w*$").unwrap_or_else(|_| unreachable!())
});

/// How the native engine should weigh its signals for this query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSearchIntent {
    Exact,
    Semantic,
    Hybrid,
    Category,
}

impl ToolSearchIntent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Semantic => "semantic",
            Self::Hybrid => "hybrid",
            Self::Category => "category",
        }
    }
}

/// Classifier output: the intent plus an optional category filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentResolution {
    pub intent: ToolSearchIntent,
    pub category_filter: Option<String>,
}

impl IntentResolution {
    #[must_use]
    pub fn of(intent: ToolSearchIntent) -> Self {
        Self {
            intent,
            category_filter: None,
        }
    }
}

/// Optional LLM-backed classifier. A `None` (or erroring) answer always
/// falls back to the rule-based classification; installing a classifier can
/// refine routing but never break it.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, query: &str) -> Option<IntentResolution>;
}

// Query-keyword groups mapped to store categories. First hit wins; the
// category filter is advisory (the pipeline retries unfiltered on zero rows).
const CATEGORY_GROUPS: &[(&[&str], &str)] = &[
    (&["refactor", "function", "class", "variable", "import"], "engineering"),
    (&["file", "read", "write", "edit", "delete"], "filesystem"),
    (&["grep", "query", "lookup"], "search"),
    (&["git", "branch", "merge", "push", "rebase"], "version_control"),
    (&["test", "pytest", "coverage"], "testing"),
    (&["api", "http", "request", "endpoint"], "api"),
    (&["database", "sql", "table"], "database"),
    (&["shell", "run", "execute", "bash"], "shell"),
];

fn is_identifier_like(token: &str) -> bool {
    if token.contains(' ') {
        return false;
    }
    let has_snake = token.contains('_');
    let has_digits = token.chars().any(|c| c.is_ascii_digit());
    let has_mixed_case = token.chars().any(|c| c.is_ascii_lowercase())
        && token.chars().any(|c| c.is_ascii_uppercase());
    has_snake || has_digits || has_mixed_case
}

/// Rule-based tool-search intent classification.
#[must_use]
pub fn classify_tool_search_intent(query: &str) -> IntentResolution {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return IntentResolution::of(ToolSearchIntent::Semantic);
    }

    if EXPLICIT_TOOL_RE.is_match(trimmed) {
        return IntentResolution::of(ToolSearchIntent::Exact);
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    if tokens.len() == 1 && is_identifier_like(tokens[0]) {
        return IntentResolution::of(ToolSearchIntent::Hybrid);
    }

    let lowered: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
    for (keywords, category) in CATEGORY_GROUPS {
        if lowered.iter().any(|t| keywords.contains(&t.as_str())) {
            return IntentResolution {
                intent: ToolSearchIntent::Category,
                category_filter: Some((*category).to_string()),
            };
        }
    }

    if tokens.len() >= 4 {
        return IntentResolution::of(ToolSearchIntent::Semantic);
    }

    IntentResolution::of(ToolSearchIntent::Hybrid)
}

/// Fusion weights derived from the resolved intent, applied to the native
/// engine and reused by the graph-side reranks so a single intent analysis
/// drives the whole pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub vector_weight: f64,
    pub keyword_weight: f64,
    pub kg_rerank_scale: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            vector_weight: 1.0,
            keyword_weight: 1.5,
            kg_rerank_scale: 1.0,
        }
    }
}

impl FusionWeights {
    #[must_use]
    pub fn for_intent(intent: ToolSearchIntent) -> Self {
        match intent {
            ToolSearchIntent::Exact => Self {
                vector_weight: 0.6,
                keyword_weight: 2.0,
                kg_rerank_scale: 1.0,
            },
            ToolSearchIntent::Semantic => Self {
                vector_weight: 1.4,
                keyword_weight: 0.8,
                kg_rerank_scale: 1.2,
            },
            ToolSearchIntent::Category => Self {
                vector_weight: 1.0,
                keyword_weight: 1.2,
                kg_rerank_scale: 1.0,
            },
            ToolSearchIntent::Hybrid => Self::default(),
        }
    }
}
