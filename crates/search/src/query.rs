use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap_or_else(|_| unreachable!())
});
static TOOL_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]{1,160}$").unwrap_or_else(|_| unreachable!()));

// Parameter-type tokens the normalizer inserts as URL placeholders. These
// are entity indicators (what the user provides), not intent indicators
// (what the user wants to do), so they are stripped from both the keyword
// text and the embedding input.
static PARAM_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(github\s+url|url|link|https?|http)\b").unwrap_or_else(|_| unreachable!())
});
static CONCRETE_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)https?://\S+").unwrap_or_else(|_| unreachable!()));
static SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[/\-_]+").unwrap_or_else(|_| unreachable!()));
static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").unwrap_or_else(|_| unreachable!()));
static PATH_LIKE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(/\w[\w/.-]+|\w:\\)").unwrap_or_else(|_| unreachable!()));
static ALNUM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9]+").unwrap_or_else(|_| unreachable!()));

// Standard English function words only; no skill-specific terms.
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "the", "is", "are", "was", "were", "be", "been", "am", "do", "does", "did",
        "will", "would", "shall", "should", "can", "could", "may", "might", "must", "i", "me",
        "my", "we", "our", "you", "your", "he", "she", "it", "they", "them", "his", "her", "its",
        "their", "to", "of", "in", "on", "at", "for", "with", "from", "by", "about", "into",
        "through", "during", "before", "after", "and", "or", "but", "not", "no", "nor", "that",
        "this", "these", "those", "help", "please", "want", "need", "like",
    ]
    .into()
});

/// Default intent vocabulary for attribute-overlap boosts; hosts may
/// override it in settings.
pub const DEFAULT_INTENT_VOCAB: &[&str] = &[
    "research", "analyze", "analyzing", "crawl", "commit", "search", "find", "recall", "save",
];

/// Parameter types detectable in a routing query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    Url,
    Path,
}

impl ParamType {
    /// Property-name tokens that mark a tool schema as accepting this type.
    #[must_use]
    pub fn schema_tokens(self) -> &'static [&'static str] {
        match self {
            Self::Url => &["url", "uri", "link"],
            Self::Path => &["path", "file", "directory"],
        }
    }
}

/// Canonical routing normalization: lowercase, collapsed whitespace, and
/// concrete URLs replaced by their parameter-type placeholder (`github url`
/// for GitHub, `url` otherwise) so ranking keys on intent, not the URL.
#[must_use]
pub fn normalize_for_routing(query: &str) -> String {
    let mut text = String::with_capacity(query.len());
    let mut last_end = 0;
    for m in CONCRETE_URL_RE.find_iter(query) {
        text.push_str(&query[last_end..m.start()]);
        if m.as_str().to_lowercase().contains("github.com") {
            text.push_str("github url");
        } else {
            text.push_str("url");
        }
        last_end = m.end();
    }
    text.push_str(&query[last_end..]);

    let lowered = text.to_lowercase();
    WHITESPACE_RE.replace_all(lowered.trim(), " ").to_string()
}

/// Produce intent-focused text for both BM25 and embedding.
///
/// Strips parameter tokens, normalizes `/`, `-`, `_` separators to spaces
/// (so `analyze/research` tokenizes as two terms), then drops stop words.
/// Falls back to the input when everything would be removed.
#[must_use]
pub fn extract_intent_text(query: &str) -> String {
    let text = PARAM_TOKEN_RE.replace_all(query, "");
    let text = SEPARATOR_RE.replace_all(&text, " ");
    let kept: Vec<&str> = text
        .split_whitespace()
        .filter(|token| {
            let normalized = token
                .trim_matches(|c: char| matches!(c, '.' | ',' | '!' | '?'))
                .to_lowercase();
            !STOP_WORDS.contains(normalized.as_str())
        })
        .collect();
    let cleaned = kept.join(" ");
    if cleaned.is_empty() {
        query.to_string()
    } else {
        cleaned
    }
}

/// Detect parameter types present in the (normalized) query.
#[must_use]
pub fn detect_param_types(query: &str) -> Vec<ParamType> {
    let mut types = Vec::new();
    let lowered = query.to_lowercase();
    if lowered.contains("url") || lowered.contains("link") || lowered.contains("http") {
        types.push(ParamType::Url);
    }
    if PATH_LIKE_RE.is_match(query) {
        types.push(ParamType::Path);
    }
    types
}

/// True when the query contains a concrete URL. Check the original query:
/// the normalized query has already replaced URLs with placeholders.
#[must_use]
pub fn query_has_concrete_url(query: &str) -> bool {
    CONCRETE_URL_RE.is_match(query)
}

/// Salient intent terms from the query, per the configured vocabulary.
#[must_use]
pub fn intent_terms_from_query(query: &str, vocab: &HashSet<String>) -> HashSet<String> {
    if query.trim().is_empty() {
        return HashSet::new();
    }
    let lowered = query.to_lowercase();
    ALNUM_RE
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .filter(|token| vocab.contains(token))
        .collect()
}

/// Normalize the query for attribute overlap: strip URLs, tokenize to
/// alphanumeric runs, keep terms of length >= 2.
#[must_use]
pub fn query_terms_for_attribute_match(query: &str) -> HashSet<String> {
    let cleaned = CONCRETE_URL_RE.replace_all(query, " ");
    let lowered = cleaned.to_lowercase();
    ALNUM_RE
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .filter(|t| t.len() >= 2)
        .collect()
}

/// True for ids the router may emit: bounded charset, at least one letter,
/// and no UUID (whole or per dot segment).
#[must_use]
pub fn is_routable_tool_name(value: &str) -> bool {
    let name = value.trim();
    if name.is_empty() || UUID_RE.is_match(name) || !TOOL_ID_RE.is_match(name) {
        return false;
    }
    if name.split('.').any(|segment| UUID_RE.is_match(segment)) {
        return false;
    }
    name.chars().any(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vocab() -> HashSet<String> {
        DEFAULT_INTENT_VOCAB.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalization_replaces_urls_with_placeholders() {
        assert_eq!(
            normalize_for_routing("help me research https://github.com/foo/bar"),
            "help me research github url"
        );
        assert_eq!(
            normalize_for_routing("Crawl https://docs.rs/tokio  now"),
            "crawl url now"
        );
    }

    #[test]
    fn intent_text_strips_params_and_stop_words() {
        assert_eq!(extract_intent_text("help me to research github url"), "research");
        assert_eq!(extract_intent_text("help me analyze github url"), "analyze");
        assert_eq!(extract_intent_text("crawl url"), "crawl");
        assert_eq!(
            extract_intent_text("git commit with message"),
            "git commit message"
        );
    }

    #[test]
    fn separators_split_into_tokens() {
        assert_eq!(extract_intent_text("analyze/research repos"), "analyze research repos");
    }

    #[test]
    fn fully_stripped_query_falls_back_to_input() {
        assert_eq!(extract_intent_text("the a an"), "the a an");
    }

    #[test]
    fn param_types_detect_urls_and_paths() {
        assert_eq!(detect_param_types("research github url"), vec![ParamType::Url]);
        assert_eq!(detect_param_types("read /etc/hosts"), vec![ParamType::Path]);
        assert_eq!(
            detect_param_types("fetch url from /tmp/list.txt"),
            vec![ParamType::Url, ParamType::Path]
        );
        assert!(detect_param_types("commit changes").is_empty());
    }

    #[test]
    fn concrete_url_checks_original_query() {
        assert!(query_has_concrete_url("see https://github.com/foo/bar"));
        assert!(!query_has_concrete_url("research github url"));
    }

    #[test]
    fn intent_terms_intersect_vocabulary() {
        let terms = intent_terms_from_query("research and analyze the repo", &vocab());
        assert_eq!(
            terms,
            HashSet::from(["research".to_string(), "analyze".to_string()])
        );
    }

    #[test]
    fn attribute_terms_skip_urls_and_short_tokens() {
        let terms = query_terms_for_attribute_match("research https://github.com/a a commit");
        assert!(terms.contains("research"));
        assert!(terms.contains("commit"));
        assert!(!terms.contains("a"));
        assert!(!terms.contains("github"));
    }

    #[test]
    fn routable_names_reject_uuids_and_junk() {
        assert!(is_routable_tool_name("git.commit"));
        assert!(is_routable_tool_name("fs.read_file"));
        assert!(!is_routable_tool_name(""));
        assert!(!is_routable_tool_name("123e4567-e89b-12d3-a456-426614174000"));
        assert!(!is_routable_tool_name("skill.123e4567-e89b-12d3-a456-426614174000"));
        assert!(!is_routable_tool_name("has space"));
        assert!(!is_routable_tool_name("1234"));
    }
}
