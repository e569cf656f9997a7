use crate::error::{LinkGraphError, Result};
use hive_protocol::LINK_GRAPH_SEARCH_OPTIONS_SCHEMA_ID;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// String-backed enums shared with external consumers: lowercase on the
/// wire, case-insensitive on input.
macro_rules! wire_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }

            #[must_use]
            pub fn parse(raw: &str) -> Option<Self> {
                match raw.trim().to_ascii_lowercase().as_str() {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::parse(&raw).ok_or_else(|| {
                    D::Error::custom(format!(
                        concat!("unknown ", stringify!($name), " value '{}'"),
                        raw
                    ))
                })
            }
        }
    };
}

wire_enum!(LinkGraphDirection {
    Incoming => "incoming",
    Outgoing => "outgoing",
    Both => "both",
});

wire_enum!(LinkGraphMatchStrategy {
    Fts => "fts",
    PathFuzzy => "path_fuzzy",
    Exact => "exact",
    Re => "re",
});

wire_enum!(LinkGraphSortField {
    Score => "score",
    Path => "path",
    Title => "title",
    Stem => "stem",
    Created => "created",
    Modified => "modified",
    Random => "random",
    WordCount => "word_count",
});

wire_enum!(LinkGraphSortOrder {
    Asc => "asc",
    Desc => "desc",
});

wire_enum!(LinkGraphScope {
    DocOnly => "doc_only",
    SectionOnly => "section_only",
    Mixed => "mixed",
});

wire_enum!(LinkGraphEdgeType {
    Structural => "structural",
    Semantic => "semantic",
    Provisional => "provisional",
    Verified => "verified",
});

/// Search hit from a link-graph backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkGraphHit {
    pub stem: String,
    pub score: f64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub best_section: String,
    #[serde(default)]
    pub match_reason: String,
}

/// Neighbor stem connected to a query stem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkGraphNeighbor {
    pub stem: String,
    pub direction: LinkGraphDirection,
    pub distance: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub path: String,
}

/// Per-stem metadata used for reranking and graph fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkGraphMetadata {
    pub stem: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub path: String,
}

/// Single sort term used by schema-first search options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LinkGraphSortTerm {
    pub field: LinkGraphSortField,
    pub order: LinkGraphSortOrder,
}

impl Default for LinkGraphSortTerm {
    fn default() -> Self {
        Self {
            field: LinkGraphSortField::Score,
            order: LinkGraphSortOrder::Desc,
        }
    }
}

fn clean_string_list(items: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .iter()
        .filter_map(|item| {
            let text = item.trim();
            if text.is_empty() {
                return None;
            }
            seen.insert(text.to_lowercase()).then(|| text.to_string())
        })
        .collect()
}

/// Boolean tag filter with all/any/not sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LinkGraphTagFilter {
    pub all: Vec<String>,
    pub any: Vec<String>,
    #[serde(rename = "not")]
    pub not_tags: Vec<String>,
}

impl LinkGraphTagFilter {
    fn normalized(&self) -> Self {
        Self {
            all: clean_string_list(&self.all),
            any: clean_string_list(&self.any),
            not_tags: clean_string_list(&self.not_tags),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.all.is_empty() && self.any.is_empty() && self.not_tags.is_empty()
    }
}

/// Directional link filter for link_to/linked_by.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LinkGraphLinkFilter {
    pub seeds: Vec<String>,
    pub negate: bool,
    pub recursive: bool,
    pub max_distance: Option<u32>,
}

impl LinkGraphLinkFilter {
    fn normalized(&self) -> Self {
        Self {
            seeds: clean_string_list(&self.seeds),
            ..self.clone()
        }
    }
}

/// Related-notes filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LinkGraphRelatedFilter {
    pub seeds: Vec<String>,
    pub max_distance: Option<u32>,
}

impl LinkGraphRelatedFilter {
    fn normalized(&self) -> Self {
        Self {
            seeds: clean_string_list(&self.seeds),
            max_distance: self.max_distance,
        }
    }
}

/// Structured filters used by schema-first search options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LinkGraphSearchFilters {
    pub include_paths: Vec<String>,
    pub exclude_paths: Vec<String>,
    pub tags: LinkGraphTagFilter,
    pub link_to: LinkGraphLinkFilter,
    pub linked_by: LinkGraphLinkFilter,
    pub related: LinkGraphRelatedFilter,
    pub mentions_of: Vec<String>,
    pub mentioned_by_notes: Vec<String>,
    pub orphan: bool,
    pub tagless: bool,
    pub missing_backlink: bool,
    pub scope: Option<LinkGraphScope>,
    pub max_heading_level: Option<u32>,
    pub edge_types: Vec<LinkGraphEdgeType>,
    pub per_doc_section_cap: Option<u32>,
    pub min_section_words: Option<u32>,
}

impl LinkGraphSearchFilters {
    fn normalized(&self) -> Self {
        Self {
            include_paths: clean_string_list(&self.include_paths),
            exclude_paths: clean_string_list(&self.exclude_paths),
            tags: self.tags.normalized(),
            link_to: self.link_to.normalized(),
            linked_by: self.linked_by.normalized(),
            related: self.related.normalized(),
            mentions_of: clean_string_list(&self.mentions_of),
            mentioned_by_notes: clean_string_list(&self.mentioned_by_notes),
            ..self.clone()
        }
    }
}

/// Canonical search options shared by link-graph backend adapters.
///
/// The serialized form is the frozen `link-graph-search-options/v1` payload.
/// Unknown fields anywhere in the tree are schema violations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LinkGraphSearchOptions {
    pub match_strategy: LinkGraphMatchStrategy,
    pub case_sensitive: bool,
    pub sort_terms: Vec<LinkGraphSortTerm>,
    pub filters: LinkGraphSearchFilters,
    pub created_after: Option<i64>,
    pub created_before: Option<i64>,
    pub modified_after: Option<i64>,
    pub modified_before: Option<i64>,
}

impl Default for LinkGraphSearchOptions {
    fn default() -> Self {
        Self {
            match_strategy: LinkGraphMatchStrategy::Fts,
            case_sensitive: false,
            sort_terms: vec![LinkGraphSortTerm::default()],
            filters: LinkGraphSearchFilters::default(),
            created_after: None,
            created_before: None,
            modified_after: None,
            modified_before: None,
        }
    }
}

impl LinkGraphSearchOptions {
    #[must_use]
    pub fn with_strategy(match_strategy: LinkGraphMatchStrategy) -> Self {
        Self {
            match_strategy,
            ..Self::default()
        }
    }

    /// Trim/dedup string lists and guarantee at least one sort term.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut sort_terms = self.sort_terms.clone();
        if sort_terms.is_empty() {
            sort_terms.push(LinkGraphSortTerm::default());
        }
        Self {
            sort_terms,
            filters: self.filters.normalized(),
            ..self.clone()
        }
    }

    /// Build validated options from a JSON payload.
    ///
    /// A `schema` field, when present, must match the frozen id; unknown
    /// fields at any level are rejected.
    pub fn from_value(payload: &Value) -> Result<Self> {
        let mut row = payload
            .as_object()
            .cloned()
            .ok_or_else(|| LinkGraphError::schema("<root>", "expected object payload"))?;

        if let Some(schema) = row.remove("schema") {
            let schema = schema.as_str().unwrap_or_default().trim().to_string();
            if !schema.is_empty() && schema != LINK_GRAPH_SEARCH_OPTIONS_SCHEMA_ID {
                return Err(LinkGraphError::schema(
                    "schema",
                    format!(
                        "expected '{LINK_GRAPH_SEARCH_OPTIONS_SCHEMA_ID}', got '{schema}'"
                    ),
                ));
            }
        }

        let options: Self = serde_json::from_value(Value::Object(row))
            .map_err(|err| LinkGraphError::schema("<root>", err.to_string()))?;
        Ok(options.normalized())
    }

    /// Emit the canonical shared-schema payload, schema id included.
    #[must_use]
    pub fn to_record(&self) -> Value {
        let normalized = self.normalized();
        let mut record = match serde_json::to_value(&normalized) {
            Ok(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        record.insert(
            "schema".to_string(),
            Value::String(LINK_GRAPH_SEARCH_OPTIONS_SCHEMA_ID.to_string()),
        );
        Value::Object(record)
    }
}
