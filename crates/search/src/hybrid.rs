use crate::boosts::{
    apply_attribute_confidence, apply_intent_overlap_boost, apply_param_schema_boost,
    apply_research_url_boost,
};
use crate::calibrate::{recalibrate_confidence, ConfidenceProfile};
use crate::intent::{
    classify_tool_search_intent, FusionWeights, IntentClassifier, IntentResolution,
    ToolSearchIntent,
};
use crate::query::{
    detect_param_types, extract_intent_text, intent_terms_from_query, is_routable_tool_name,
    normalize_for_routing, query_has_concrete_url, ParamType, DEFAULT_INTENT_VOCAB,
};
use crate::relationships::{apply_relationship_rerank, RelationshipGraph};
use crate::result::{sort_by_score_desc, BoostVector, SearchConfidence, SearchResult};
use async_trait::async_trait;
use hive_vector_store::{
    parse_tool_search_payload, AgenticSearchRequest, EmbeddingService, ToolSearchRequest,
    VectorStore,
};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

// With a concrete URL plus rerank signals, fetch a deep candidate pool so
// URL-accepting tools can enter the top-N before the reranks run.
const URL_CANDIDATE_MULTIPLIER: usize = 20;
const URL_CANDIDATE_CAP: usize = 200;

/// Optional query translation hook. `None` means "already English" (or the
/// translator declined); the pipeline proceeds with the original text.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate_to_english(&self, query: &str) -> Option<String>;
}

/// Optional knowledge-graph rerank hook, scaled by the fusion weights'
/// `kg_rerank_scale`. Implementations mutate scores in place and record
/// what they add in each result's `boosts.kg`.
#[async_trait]
pub trait KnowledgeGraphReranker: Send + Sync {
    async fn rerank(&self, results: &mut Vec<SearchResult>, query: &str, scale: f64);
}

/// Host-tunable pipeline settings, deserializable from the host's
/// settings file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub table_name: String,
    pub intent_vocab: Vec<String>,
    pub profile: ConfidenceProfile,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            table_name: "skills".to_string(),
            intent_vocab: DEFAULT_INTENT_VOCAB.iter().map(|s| s.to_string()).collect(),
            profile: ConfidenceProfile::default(),
        }
    }
}

impl SearchSettings {
    /// Parse from a TOML fragment; absent fields keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}

/// Per-call search parameters.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub min_score: f64,
    pub confidence_profile: Option<ConfidenceProfile>,
    pub intent_override: Option<ToolSearchIntent>,
    pub skip_translation: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 5,
            min_score: 0.0,
            confidence_profile: None,
            intent_override: None,
            skip_translation: false,
        }
    }
}

impl SearchOptions {
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }
}

/// Wall-clock seconds spent in each pipeline phase.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseTimings {
    pub pre_embed_s: f64,
    pub embed_s: f64,
    pub intent_fusion_s: f64,
    pub native_s: f64,
    pub post_native_s: f64,
}

/// The end-to-end hybrid query pipeline.
///
/// The native store fuses dense-vector and keyword signals; this type owns
/// everything around that call: query shaping, intent classification, the
/// rerank stages, and confidence recalibration.
pub struct HybridSearch {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingService>,
    custom_embedder: Option<Arc<dyn EmbeddingService>>,
    translator: Option<Arc<dyn Translator>>,
    intent_classifier: Option<Arc<dyn IntentClassifier>>,
    relationship_graph: Option<RelationshipGraph>,
    kg_reranker: Option<Arc<dyn KnowledgeGraphReranker>>,
    settings: SearchSettings,
}

impl HybridSearch {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingService>) -> Self {
        Self {
            store,
            embedder,
            custom_embedder: None,
            translator: None,
            intent_classifier: None,
            relationship_graph: None,
            kg_reranker: None,
            settings: SearchSettings::default(),
        }
    }

    /// Install a caller-supplied embedding hook tried before the local
    /// service (e.g. the host process's shared embedding pool).
    #[must_use]
    pub fn with_custom_embedder(mut self, embedder: Arc<dyn EmbeddingService>) -> Self {
        self.custom_embedder = Some(embedder);
        self
    }

    #[must_use]
    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    #[must_use]
    pub fn with_intent_classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.intent_classifier = Some(classifier);
        self
    }

    #[must_use]
    pub fn with_relationship_graph(mut self, graph: RelationshipGraph) -> Self {
        self.relationship_graph = Some(graph);
        self
    }

    #[must_use]
    pub fn with_kg_reranker(mut self, reranker: Arc<dyn KnowledgeGraphReranker>) -> Self {
        self.kg_reranker = Some(reranker);
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: SearchSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn search_profile(&self) -> hive_vector_store::SearchProfile {
        self.store.get_search_profile()
    }

    /// Run the pipeline, discarding phase timings.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Vec<SearchResult> {
        self.search_with_timings(query, options).await.0
    }

    /// Run the pipeline and report per-phase durations.
    pub async fn search_with_timings(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> (Vec<SearchResult>, PhaseTimings) {
        let started = Instant::now();
        let mut timings = PhaseTimings::default();

        // 1. Normalize: optional translation, then canonical routing form.
        let mut effective_query = query.to_string();
        if !options.skip_translation {
            if let Some(translator) = &self.translator {
                if let Some(translated) = translator.translate_to_english(query).await {
                    if translated != query {
                        log::info!(
                            "routing with translated query: {:.80}",
                            translated
                        );
                    }
                    effective_query = translated;
                }
            }
        }
        let effective_query = normalize_for_routing(&effective_query);

        // 2. Dual-signal decomposition: what the user wants to DO drives
        // both the embedding and the keyword text; what they provide as
        // input (URLs, paths) becomes rerank signals instead.
        let intent_text = extract_intent_text(&effective_query);
        let param_types = detect_param_types(&effective_query);
        let vocab: HashSet<String> = self.settings.intent_vocab.iter().cloned().collect();
        let intent_terms = intent_terms_from_query(&effective_query, &vocab);
        if intent_text != effective_query {
            log::debug!(
                "dual-signal decomposition: intent_text='{intent_text}', param_types={param_types:?}"
            );
        }
        timings.pre_embed_s = started.elapsed().as_secs_f64();

        // 3. Embedding. An empty vector downgrades to keyword-only search.
        let embed_started = Instant::now();
        let query_vector = self.embed_query(&intent_text).await;
        timings.embed_s = embed_started.elapsed().as_secs_f64();

        // 4. Intent classification; override short-circuits, an installed
        // classifier refines, rules are the floor.
        let fusion_started = Instant::now();
        let resolution = match options.intent_override {
            Some(intent) => IntentResolution::of(intent),
            None => match &self.intent_classifier {
                Some(classifier) => classifier
                    .classify(&effective_query)
                    .await
                    .unwrap_or_else(|| classify_tool_search_intent(&effective_query)),
                None => classify_tool_search_intent(&effective_query),
            },
        };

        // 5. Fusion weights: one intent analysis drives the native engine
        // and the KG rerank scale.
        let fusion = FusionWeights::for_intent(resolution.intent);

        // 6. Candidate sizing.
        let has_concrete_url =
            param_types.contains(&ParamType::Url) && query_has_concrete_url(query);
        let has_rerank_signals = !param_types.is_empty() || !intent_terms.is_empty();
        let native_limit = if has_concrete_url && has_rerank_signals {
            (options.limit * URL_CANDIDATE_MULTIPLIER).min(URL_CANDIDATE_CAP)
        } else {
            options.limit
        };

        // 7. Keyword text shaping for concrete-URL queries.
        let keyword_text = if has_concrete_url {
            if ["research", "analyze", "analyzing"]
                .iter()
                .any(|t| intent_terms.contains(*t))
            {
                format!("{intent_text} analyze repo research repository crawl url fetch")
            } else {
                format!("{intent_text} crawl url fetch web page")
            }
        } else {
            intent_text.clone()
        };
        timings.intent_fusion_s = fusion_started.elapsed().as_secs_f64();

        // 8. Native search.
        let native_started = Instant::now();
        let profile = options.confidence_profile.unwrap_or(self.settings.profile);
        let rows = self
            .native_search(
                query_vector,
                &keyword_text,
                native_limit,
                options.min_score,
                &resolution,
                &profile,
                fusion,
            )
            .await;
        timings.native_s = native_started.elapsed().as_secs_f64();

        let post_started = Instant::now();
        if rows.is_empty() {
            if let Ok(info) = self.store.get_table_info(&self.settings.table_name).await {
                if info.row_count > 0 {
                    log::info!(
                        "hybrid search returned 0 results though '{}' has {} tools; \
                         check that the query embedding dimension matches the index",
                        self.settings.table_name,
                        info.row_count
                    );
                }
            }
        }

        // 9. Normalize rows into tagged results.
        let mut results: Vec<SearchResult> = rows
            .iter()
            .filter_map(|row| self.result_from_row(row))
            .collect();
        sort_by_score_desc(&mut results);

        // 10-15. Rerank stages; each re-sorts, so IP3 holds after every one.
        apply_attribute_confidence(&mut results, &effective_query);
        apply_intent_overlap_boost(&mut results, &intent_terms);
        if !param_types.is_empty() {
            apply_param_schema_boost(&mut results, &param_types);
        }
        apply_research_url_boost(&mut results, &intent_terms, &param_types);
        if let Some(graph) = &self.relationship_graph {
            apply_relationship_rerank(&mut results, graph);
        }
        if let Some(kg) = &self.kg_reranker {
            kg.rerank(&mut results, &effective_query, fusion.kg_rerank_scale)
                .await;
            sort_by_score_desc(&mut results);
        }

        // 16. Confidence recalibration over post-boost scores.
        recalibrate_confidence(&mut results, &profile);

        // 17. Trim.
        results.truncate(options.limit);
        timings.post_native_s = post_started.elapsed().as_secs_f64();

        log::debug!("hybrid search for '{query}': {} results", results.len());
        (results, timings)
    }

    async fn embed_query(&self, intent_text: &str) -> Vec<f32> {
        let texts = [intent_text.to_string()];
        if let Some(custom) = &self.custom_embedder {
            match custom.embed_batch(&texts).await {
                Ok(mut vectors) if !vectors.is_empty() => return vectors.swap_remove(0),
                Ok(_) => {}
                Err(err) => log::debug!("custom embedder failed, using local service: {err}"),
            }
        }
        match self.embedder.embed_batch(&texts).await {
            Ok(mut vectors) if !vectors.is_empty() => vectors.swap_remove(0),
            Ok(_) => Vec::new(),
            Err(err) => {
                log::warn!("embedding failed, downgrading to keyword-only search: {err}");
                Vec::new()
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn native_search(
        &self,
        query_vector: Vec<f32>,
        keyword_text: &str,
        limit: usize,
        threshold: f64,
        resolution: &IntentResolution,
        profile: &ConfidenceProfile,
        fusion: FusionWeights,
    ) -> Vec<Value> {
        if !self.store.supports_agentic_search() {
            return self
                .store
                .search_tools(ToolSearchRequest {
                    table_name: self.settings.table_name.clone(),
                    query_vector,
                    query_text: keyword_text.to_string(),
                    limit,
                    threshold,
                    confidence_profile: Some(profile.to_value()),
                    rerank: true,
                })
                .await
                .unwrap_or_else(|err| {
                    log::error!("tool search failed: {err}");
                    Vec::new()
                });
        }

        let request = AgenticSearchRequest {
            table_name: self.settings.table_name.clone(),
            query_vector,
            query_text: keyword_text.to_string(),
            limit,
            threshold,
            intent: Some(resolution.intent.as_str().to_string()),
            confidence_profile: Some(profile.to_value()),
            rerank: true,
            category_filter: resolution.category_filter.clone(),
            semantic_weight: Some(fusion.vector_weight),
            keyword_weight: Some(fusion.keyword_weight),
        };

        match self.store.agentic_search(request.clone()).await {
            Ok(rows) if rows.is_empty() && request.category_filter.is_some() => {
                // The category filter can over-narrow; retry open so we
                // still return matches.
                log::debug!(
                    "0 results with category_filter={:?}, retrying without filter",
                    request.category_filter
                );
                self.store
                    .agentic_search(AgenticSearchRequest {
                        category_filter: None,
                        ..request
                    })
                    .await
                    .unwrap_or_else(|err| {
                        log::error!("agentic search retry failed: {err}");
                        Vec::new()
                    })
            }
            Ok(rows) => rows,
            Err(err) => {
                log::error!("agentic search failed: {err}");
                Vec::new()
            }
        }
    }

    /// Parse one native row into a tagged result with a canonical
    /// `skill.command` id. Rows that fail the strict payload parse or the
    /// routable-id rules are dropped with a logged reason.
    fn result_from_row(&self, row: &Value) -> Option<SearchResult> {
        let payload = match parse_tool_search_payload(row) {
            Ok(payload) => payload,
            Err(err) => {
                log::debug!("skipping invalid tool search payload: {err}");
                return None;
            }
        };

        let canonical = payload.name.trim();
        let raw_tool_name = payload.tool_name.trim();
        let full_name = if is_routable_tool_name(canonical) && canonical.contains('.') {
            canonical.to_string()
        } else if !raw_tool_name.contains('.') && !payload.skill_name.is_empty() {
            format!("{}.{raw_tool_name}", payload.skill_name)
        } else {
            raw_tool_name.to_string()
        };
        if !is_routable_tool_name(&full_name) {
            log::debug!("skipping non-routable tool name: {full_name}");
            return None;
        }

        let (skill_from_name, command) = match full_name.split_once('.') {
            Some((skill, command)) => (skill.to_string(), command.to_string()),
            None => (full_name.clone(), full_name.clone()),
        };
        if command.is_empty() {
            return None;
        }
        let skill_name = if payload.skill_name.is_empty() {
            skill_from_name
        } else {
            payload.skill_name.clone()
        };

        let confidence =
            SearchConfidence::parse(&payload.confidence).unwrap_or(SearchConfidence::Medium);

        Some(SearchResult {
            id: full_name,
            content: payload.content.clone(),
            score: payload.score,
            confidence,
            final_score: payload.final_score,
            vector_score: payload.vector_score,
            keyword_score: payload.keyword_score,
            skill_name,
            command,
            file_path: payload.file_path.clone(),
            category: payload.category.clone(),
            routing_keywords: payload.routing_keywords.clone(),
            intents: payload.intents.clone(),
            input_schema: payload.input_schema.clone(),
            boosts: BoostVector::default(),
            payload,
        })
    }
}
