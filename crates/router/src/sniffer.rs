use globset::{Glob, GlobMatcher};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Threshold for activating a skill from a dynamic sniffer score.
pub const SNIFFER_SCORE_THRESHOLD: f64 = 0.5;

/// Dynamic detection predicate: inspects a directory and returns an
/// activation score in `[0, 1]`.
pub type SnifferFn = Arc<dyn Fn(&Path) -> f64 + Send + Sync>;

/// Static activation rule: skill activates when any of its trigger files
/// exists in the directory.
#[derive(Debug, Clone)]
pub struct ActivationRule {
    pub skill_name: String,
    pub files: HashSet<String>,
}

impl ActivationRule {
    pub fn new(skill_name: impl Into<String>, files: &[&str]) -> Self {
        Self {
            skill_name: skill_name.into(),
            files: files.iter().map(|f| f.to_string()).collect(),
        }
    }

    fn matches(&self, root_files: &HashSet<String>) -> bool {
        self.files.iter().any(|f| root_files.contains(f))
    }
}

/// Declarative rule kinds loadable from skill manifests.
#[derive(Debug, Clone)]
enum DeclarativeMatcher {
    /// O(1) exact file-name match.
    FileExists(String),
    /// O(N) glob match over the directory listing.
    FilePattern(GlobMatcher),
}

#[derive(Debug, Clone)]
pub struct DeclarativeRule {
    pub skill_name: String,
    matcher: DeclarativeMatcher,
}

impl DeclarativeRule {
    fn matches(&self, root_files: &HashSet<String>) -> bool {
        match &self.matcher {
            DeclarativeMatcher::FileExists(name) => root_files.contains(name),
            DeclarativeMatcher::FilePattern(glob) => {
                root_files.iter().any(|f| glob.is_match(f))
            }
        }
    }
}

/// Declarative rule as it appears in skill manifests.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RuleSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub pattern: String,
}

struct DynamicSniffer {
    func: SnifferFn,
    skill_name: String,
    name: String,
    priority: i32,
}

/// Asset-driven context detector with three rule modes: static trigger
/// files, declarative exists/glob rules, and dynamic scoring functions.
/// The kernel provides the evaluation mechanism; skills provide the
/// knowledge, so no file-to-skill mapping is hardcoded here.
#[derive(Default)]
pub struct IntentSniffer {
    rules: Vec<ActivationRule>,
    declarative_rules: Vec<DeclarativeRule>,
    dynamic_sniffers: Vec<DynamicSniffer>,
    cached_suggestions: HashMap<PathBuf, Vec<String>>,
    score_threshold: f64,
}

impl IntentSniffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            score_threshold: SNIFFER_SCORE_THRESHOLD,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn score_threshold(&self) -> f64 {
        self.score_threshold
    }

    pub fn set_score_threshold(&mut self, value: f64) {
        self.score_threshold = value.clamp(0.0, 1.0);
    }

    pub fn register_rule(&mut self, rule: ActivationRule) {
        log::debug!("registered static rule for skill: {}", rule.skill_name);
        self.rules.push(rule);
    }

    /// Register declarative rules for a skill; invalid entries are skipped
    /// with a warning. Returns how many were registered.
    pub fn register_rules(&mut self, skill_name: &str, rules: &[RuleSpec]) -> usize {
        let mut count = 0;
        for rule in rules {
            let pattern = rule.pattern.trim();
            if pattern.is_empty() {
                log::warn!("empty pattern in rule for skill '{skill_name}'");
                continue;
            }
            let matcher = match rule.kind.trim() {
                "file_exists" => DeclarativeMatcher::FileExists(pattern.to_string()),
                "file_pattern" => match Glob::new(pattern) {
                    Ok(glob) => DeclarativeMatcher::FilePattern(glob.compile_matcher()),
                    Err(err) => {
                        log::warn!("bad glob '{pattern}' for skill '{skill_name}': {err}");
                        continue;
                    }
                },
                other => {
                    log::warn!("unknown rule type '{other}' for skill '{skill_name}'");
                    continue;
                }
            };
            self.declarative_rules.push(DeclarativeRule {
                skill_name: skill_name.to_string(),
                matcher,
            });
            count += 1;
        }
        if count > 0 {
            log::debug!("registered {count} declarative rules for skill '{skill_name}'");
        }
        count
    }

    pub fn clear_declarative_rules(&mut self) {
        let count = self.declarative_rules.len();
        self.declarative_rules.clear();
        if count > 0 {
            log::debug!("cleared {count} declarative rules");
        }
    }

    /// Register a dynamic sniffer. Higher priority runs first.
    pub fn register_dynamic(
        &mut self,
        func: SnifferFn,
        skill_name: impl Into<String>,
        name: impl Into<String>,
        priority: i32,
    ) {
        let sniffer = DynamicSniffer {
            func,
            skill_name: skill_name.into(),
            name: name.into(),
            priority,
        };
        log::debug!(
            "registered dynamic sniffer '{}' for skill: {}",
            sniffer.name,
            sniffer.skill_name
        );
        self.dynamic_sniffers.push(sniffer);
        self.dynamic_sniffers
            .sort_by_key(|sniffer| std::cmp::Reverse(sniffer.priority));
    }

    pub fn clear_cache(&mut self) {
        self.cached_suggestions.clear();
    }

    fn list_dir(cwd: &Path) -> Option<HashSet<String>> {
        match std::fs::read_dir(cwd) {
            Ok(entries) => Some(
                entries
                    .flatten()
                    .filter_map(|entry| entry.file_name().into_string().ok())
                    .collect(),
            ),
            Err(err) => {
                log::warn!("sniffer cannot read directory {}: {err}", cwd.display());
                None
            }
        }
    }

    /// Scan a directory and return the skills that should activate.
    /// One directory listing per call; results cache per cwd.
    pub fn sniff(&mut self, cwd: &Path) -> Vec<String> {
        if let Some(cached) = self.cached_suggestions.get(cwd) {
            return cached.clone();
        }

        let Some(root_files) = Self::list_dir(cwd) else {
            return Vec::new();
        };

        let mut active: HashSet<String> = HashSet::new();
        for rule in &self.rules {
            if rule.matches(&root_files) {
                log::debug!("static match: {} in {}", rule.skill_name, cwd.display());
                active.insert(rule.skill_name.clone());
            }
        }
        for rule in &self.declarative_rules {
            if rule.matches(&root_files) {
                log::debug!("declarative match: {}", rule.skill_name);
                active.insert(rule.skill_name.clone());
            }
        }
        for sniffer in &self.dynamic_sniffers {
            let score = (sniffer.func)(cwd);
            if score >= self.score_threshold {
                log::info!(
                    "dynamic sniffer triggered: {} (score: {score:.2}, sniffer: {})",
                    sniffer.skill_name,
                    sniffer.name
                );
                active.insert(sniffer.skill_name.clone());
            }
        }

        let mut result: Vec<String> = active.into_iter().collect();
        result.sort_unstable();
        self.cached_suggestions.insert(cwd.to_path_buf(), result.clone());
        result
    }

    /// Scan and return `(skill, score)` pairs, highest score first.
    /// Rule matches score 1.0; dynamic sniffers contribute their own score.
    pub fn sniff_with_scores(&self, cwd: &Path) -> Vec<(String, f64)> {
        let root_files = Self::list_dir(cwd).unwrap_or_default();

        let mut scores: HashMap<String, f64> = HashMap::new();
        for rule in &self.rules {
            if rule.matches(&root_files) {
                scores.insert(rule.skill_name.clone(), 1.0);
            }
        }
        for rule in &self.declarative_rules {
            if rule.matches(&root_files) {
                scores.insert(rule.skill_name.clone(), 1.0);
            }
        }
        for sniffer in &self.dynamic_sniffers {
            let score = (sniffer.func)(cwd);
            let entry = scores.entry(sniffer.skill_name.clone()).or_insert(0.0);
            if score > *entry {
                *entry = score;
            }
        }

        let mut out: Vec<(String, f64)> = scores.into_iter().collect();
        out.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        out
    }

    /// Static-rule check for a single file path.
    #[must_use]
    pub fn sniff_file(&self, file_path: &Path) -> Vec<String> {
        let Some(file_name) = file_path.file_name().and_then(|n| n.to_str()) else {
            return Vec::new();
        };
        let mut out: Vec<String> = self
            .rules
            .iter()
            .filter(|rule| rule.files.contains(file_name))
            .map(|rule| rule.skill_name.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        out.sort_unstable();
        out
    }
}
