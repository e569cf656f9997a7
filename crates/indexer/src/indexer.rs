use crate::error::Result;
use crate::memory_index::MemoryIndex;
use crate::meta::IndexMeta;
use crate::skill::SkillSpec;
use hive_vector_store::{DocumentBatch, EmbeddingService, ToolSearchRequest, VectorStore};
use md5::{Digest, Md5};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

const SKILLS_TABLE: &str = "skills";
// Bounded parallel embedding: chunks of this size, at most
// MAX_EMBED_WORKERS batches in flight.
const EMBED_BATCH_SIZE: usize = 64;
const MAX_EMBED_WORKERS: usize = 4;

#[derive(Debug, Clone)]
struct SkillDocument {
    id: String,
    content: String,
    metadata: Map<String, Value>,
}

/// Index statistics for observability.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    pub entries_indexed: usize,
    pub is_ready: bool,
    pub storage_path: Option<PathBuf>,
}

/// Builds the semantic index over skills and commands.
///
/// Backed by the native store when available; otherwise falls back to an
/// in-memory keyword index so routing keeps working in degraded setups.
pub struct SkillIndexer {
    store: Option<Arc<dyn VectorStore>>,
    embedder: Option<Arc<dyn EmbeddingService>>,
    memory_index: Option<MemoryIndex>,
    storage_path: Option<PathBuf>,
    indexed_count: usize,
}

impl SkillIndexer {
    /// Indexer over a native store. `storage_path` locates the persisted
    /// metadata file used for hash-based rebuild skipping.
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingService>,
        storage_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store: Some(store),
            embedder: Some(embedder),
            memory_index: None,
            storage_path: Some(storage_path.into()),
            indexed_count: 0,
        }
    }

    /// In-memory fallback indexer with keyword-overlap search.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            store: None,
            embedder: None,
            memory_index: Some(MemoryIndex::new()),
            storage_path: None,
            indexed_count: 0,
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.store.is_some() || self.memory_index.is_some()
    }

    #[must_use]
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            entries_indexed: self.indexed_count,
            is_ready: self.is_ready(),
            storage_path: self.storage_path.clone(),
        }
    }

    /// MD5 fingerprint of the skill set: names, sorted command names, and
    /// content hashes of description/keywords/intents per skill.
    fn skills_fingerprint(skills: &[SkillSpec]) -> String {
        let md5_hex = |bytes: &[u8]| -> String { format!("{:x}", Md5::digest(bytes)) };

        let mut rows: Vec<Value> = skills
            .iter()
            .map(|skill| {
                let mut command_names: Vec<&str> =
                    skill.commands.iter().map(|c| c.name.as_str()).collect();
                command_names.sort_unstable();
                json!({
                    "name": skill.name,
                    "commands": command_names,
                    "description_hash": md5_hex(skill.description.as_bytes()),
                    "keywords_hash": md5_hex(
                        serde_json::to_string(&skill.routing_keywords)
                            .unwrap_or_default()
                            .as_bytes()
                    ),
                    "intents_hash": md5_hex(
                        serde_json::to_string(&skill.intents).unwrap_or_default().as_bytes()
                    ),
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            a["name"]
                .as_str()
                .unwrap_or_default()
                .cmp(b["name"].as_str().unwrap_or_default())
        });

        let state = json!({ "skills": rows });
        md5_hex(state.to_string().as_bytes())
    }

    fn build_documents(skills: &[SkillSpec]) -> Vec<SkillDocument> {
        let mut docs = Vec::new();

        for skill in skills {
            if !skill.description.is_empty() {
                let mut metadata = Map::new();
                metadata.insert("type".to_string(), json!("skill"));
                metadata.insert("skill_name".to_string(), json!(skill.name));
                metadata.insert("weight".to_string(), json!(1.0));
                metadata.insert("id".to_string(), json!(skill.name));
                docs.push(SkillDocument {
                    id: skill.name.clone(),
                    content: format!("Skill {}: {}", skill.name, skill.description),
                    metadata,
                });
            }

            for command in &skill.commands {
                if command.name.is_empty() {
                    continue;
                }
                let command_id = format!("{}.{}", skill.name, command.name);
                let description = if command.description.is_empty() {
                    command.name.clone()
                } else {
                    command.description.clone()
                };

                // One descriptive block feeds both the vector and the
                // keyword engine.
                let mut content = format!("COMMAND: {command_id}\nDESCRIPTION: {description}\n");
                if !skill.intents.is_empty() {
                    content.push_str(&format!("INTENTS: {}\n", skill.intents.join(", ")));
                }
                if !command.keywords.is_empty() {
                    content.push_str(&format!("KEYWORDS: {}", command.keywords.join(", ")));
                }
                let content = content.trim_end().to_string();

                let mut metadata = Map::new();
                metadata.insert("type".to_string(), json!("command"));
                metadata.insert("skill_name".to_string(), json!(skill.name));
                metadata.insert("tool_name".to_string(), json!(command_id));
                metadata.insert("command".to_string(), json!(command.name));
                metadata.insert("keywords".to_string(), json!(command.keywords));
                metadata.insert("intents".to_string(), json!(skill.intents));
                metadata.insert("weight".to_string(), json!(2.0));
                metadata.insert("id".to_string(), json!(command_id));

                docs.push(SkillDocument {
                    id: command_id,
                    content,
                    metadata,
                });
            }
        }

        docs
    }

    async fn embed_contents(
        embedder: &Arc<dyn EmbeddingService>,
        contents: &[String],
    ) -> Result<Vec<Vec<f32>>> {
        let semaphore = Arc::new(Semaphore::new(MAX_EMBED_WORKERS));
        let mut tasks: JoinSet<(usize, Result<Vec<Vec<f32>>>)> = JoinSet::new();

        for (chunk_idx, chunk) in contents.chunks(EMBED_BATCH_SIZE).enumerate() {
            let embedder = Arc::clone(embedder);
            let semaphore = Arc::clone(&semaphore);
            let texts: Vec<String> = chunk.to_vec();
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return (
                        chunk_idx,
                        Err(crate::IndexerError::Embedding(
                            "embedding pool closed".to_string(),
                        )),
                    );
                };
                let vectors = embedder
                    .embed_batch(&texts)
                    .await
                    .map_err(|err| crate::IndexerError::Embedding(err.to_string()));
                (chunk_idx, vectors)
            });
        }

        let mut chunks: Vec<Option<Vec<Vec<f32>>>> =
            vec![None; contents.len().div_ceil(EMBED_BATCH_SIZE)];
        while let Some(joined) = tasks.join_next().await {
            let (chunk_idx, vectors) = joined
                .map_err(|err| crate::IndexerError::Embedding(err.to_string()))?;
            chunks[chunk_idx] = Some(vectors?);
        }

        Ok(chunks.into_iter().flatten().flatten().collect())
    }

    /// Index skills with a single batch commit.
    ///
    /// An unchanged fingerprint skips the rebuild entirely and returns the
    /// previously stored count. Embedding or store failures leave the
    /// committed count at 0 and write no metadata.
    pub async fn index_skills(&mut self, skills: &[SkillSpec]) -> Result<usize> {
        if !self.is_ready() {
            log::warn!("cannot index: no vector store or in-memory index available");
            return Ok(0);
        }

        let fingerprint = Self::skills_fingerprint(skills);
        let meta_path = self
            .storage_path
            .as_deref()
            .map(IndexMeta::path_for_store);
        if let (Some(meta_path), Some(_)) = (meta_path.as_deref(), self.store.as_ref()) {
            if let Some(saved) = IndexMeta::load(meta_path).await {
                if saved.hash == fingerprint {
                    self.indexed_count = saved.count;
                    log::info!(
                        "skill index up-to-date ({} entries), skipping build",
                        saved.count
                    );
                    return Ok(saved.count);
                }
            }
        }

        let docs = Self::build_documents(skills);
        if docs.is_empty() {
            return Ok(0);
        }

        if let Some(memory_index) = self.memory_index.as_mut() {
            memory_index.clear();
            for doc in &docs {
                memory_index.add(doc.content.clone(), doc.metadata.clone());
            }
            self.indexed_count = docs.len();
            log::info!("in-memory skill index: {} entries", docs.len());
            return Ok(self.indexed_count);
        }

        let (Some(store), Some(embedder)) = (self.store.as_ref(), self.embedder.as_ref()) else {
            return Ok(0);
        };

        log::info!("batch indexing {} skill entries", docs.len());
        let contents: Vec<String> = docs.iter().map(|d| d.content.clone()).collect();
        let vectors = match Self::embed_contents(embedder, &contents).await {
            Ok(vectors) => vectors,
            Err(err) => {
                log::error!("failed to embed skill batch: {err}");
                self.indexed_count = 0;
                return Ok(0);
            }
        };

        let batch = DocumentBatch {
            ids: docs.iter().map(|d| d.id.clone()).collect(),
            vectors,
            contents,
            metadatas: docs
                .iter()
                .map(|d| Value::Object(d.metadata.clone()).to_string())
                .collect(),
        };
        if let Err(err) = store.add_documents(SKILLS_TABLE, batch).await {
            log::error!("failed to commit skill batch: {err}");
            self.indexed_count = 0;
            return Ok(0);
        }

        self.indexed_count = docs.len();
        log::info!("indexed {} entries (single commit)", docs.len());

        if let Some(meta_path) = meta_path {
            let meta = IndexMeta::new(fingerprint, self.indexed_count);
            if let Err(err) = meta.save(&meta_path).await {
                log::warn!("failed to save index metadata: {err}");
            }
        }

        Ok(self.indexed_count)
    }

    /// Search the index, filtering by `score >= threshold`.
    pub async fn search(&self, query: &str, limit: usize, threshold: f64) -> Vec<Value> {
        if let Some(memory_index) = self.memory_index.as_ref() {
            let mut rows = memory_index.search(query, limit);
            if threshold > 0.0 {
                rows.retain(|row| {
                    row.get("score").and_then(Value::as_f64).unwrap_or(0.0) >= threshold
                });
            }
            return rows;
        }

        let Some(store) = self.store.as_ref() else {
            return Vec::new();
        };

        let query_vector = match self.embedder.as_ref() {
            Some(embedder) => match embedder.embed_batch(&[query.to_string()]).await {
                Ok(mut vectors) if !vectors.is_empty() => vectors.swap_remove(0),
                Ok(_) => Vec::new(),
                Err(err) => {
                    log::warn!("query embedding failed, keyword-only search: {err}");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        match store
            .search_tools(ToolSearchRequest {
                table_name: SKILLS_TABLE.to_string(),
                query_vector,
                query_text: query.to_string(),
                limit,
                threshold,
                confidence_profile: None,
                rerank: true,
            })
            .await
        {
            Ok(mut rows) => {
                if threshold > 0.0 {
                    rows.retain(|row| {
                        row.get("score").and_then(Value::as_f64).unwrap_or(0.0) >= threshold
                    });
                }
                rows
            }
            Err(err) => {
                log::error!("skill index search failed: {err}");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skill::CommandSpec;
    use async_trait::async_trait;
    use hive_vector_store::{MemoryVectorStore, StoreError};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakeEmbedder {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    impl FakeEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl EmbeddingService for FakeEmbedder {
        async fn embed_batch(
            &self,
            texts: &[String],
        ) -> hive_vector_store::Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Embedding("model offline".to_string()));
            }
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        fn dimension(&self) -> usize {
            2
        }

        fn backend(&self) -> &str {
            "fake"
        }
    }

    fn sample_skills() -> Vec<SkillSpec> {
        vec![
            SkillSpec::new("git", "Version control operations")
                .with_intents(&["commit", "push"])
                .with_command(
                    CommandSpec::new("commit", "Commit staged changes")
                        .with_keywords(&["commit", "save"]),
                )
                .with_command(CommandSpec::new("status", "Show working tree status")),
            SkillSpec::new("memory", "Knowledge persistence")
                .with_command(CommandSpec::new("save", "Save a note")),
        ]
    }

    fn indexer_with(
        store: &Arc<MemoryVectorStore>,
        embedder: &Arc<FakeEmbedder>,
        dir: &tempfile::TempDir,
    ) -> SkillIndexer {
        SkillIndexer::new(
            Arc::clone(store) as Arc<dyn VectorStore>,
            Arc::clone(embedder) as Arc<dyn EmbeddingService>,
            dir.path().join("router.lance"),
        )
    }

    #[test]
    fn command_document_uses_canonical_block() {
        let docs = SkillIndexer::build_documents(&sample_skills());
        let commit = docs.iter().find(|d| d.id == "git.commit").unwrap();
        assert_eq!(
            commit.content,
            "COMMAND: git.commit\nDESCRIPTION: Commit staged changes\nINTENTS: commit, push\nKEYWORDS: commit, save"
        );
        assert_eq!(commit.metadata["type"], json!("command"));
        assert_eq!(commit.metadata["weight"], json!(2.0));

        let skill = docs.iter().find(|d| d.id == "git").unwrap();
        assert_eq!(skill.metadata["type"], json!("skill"));
        assert_eq!(skill.metadata["weight"], json!(1.0));
    }

    #[test]
    fn fingerprint_ignores_skill_order_but_not_content() {
        let skills = sample_skills();
        let mut reversed = skills.clone();
        reversed.reverse();
        assert_eq!(
            SkillIndexer::skills_fingerprint(&skills),
            SkillIndexer::skills_fingerprint(&reversed)
        );

        let mut changed = skills;
        changed[0].description.push_str(" v2");
        assert_ne!(
            SkillIndexer::skills_fingerprint(&changed),
            SkillIndexer::skills_fingerprint(&sample_skills())
        );
    }

    #[tokio::test]
    async fn reindexing_unchanged_skills_skips_embed_and_commit() {
        let store = Arc::new(MemoryVectorStore::new());
        let embedder = Arc::new(FakeEmbedder::new());
        let dir = tempfile::tempdir().unwrap();
        let mut indexer = indexer_with(&store, &embedder, &dir);

        let skills = sample_skills();
        let first = indexer.index_skills(&skills).await.unwrap();
        assert_eq!(first, 5);
        assert_eq!(store.commit_count(), 1);
        let embed_calls = embedder.calls.load(Ordering::SeqCst);

        let second = indexer.index_skills(&skills).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(store.commit_count(), 1);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), embed_calls);

        // Same metadata hash on disk after both runs.
        let meta_path = IndexMeta::path_for_store(&dir.path().join("router.lance"));
        let meta = IndexMeta::load(&meta_path).await.unwrap();
        assert_eq!(meta.count, first);
        assert_eq!(meta.hash, SkillIndexer::skills_fingerprint(&skills));
    }

    #[tokio::test]
    async fn changed_keywords_invalidate_the_index() {
        let store = Arc::new(MemoryVectorStore::new());
        let embedder = Arc::new(FakeEmbedder::new());
        let dir = tempfile::tempdir().unwrap();
        let mut indexer = indexer_with(&store, &embedder, &dir);

        let mut skills = sample_skills();
        indexer.index_skills(&skills).await.unwrap();
        skills[0].routing_keywords = vec!["vcs".to_string()];
        indexer.index_skills(&skills).await.unwrap();
        assert_eq!(store.commit_count(), 2);
    }

    #[tokio::test]
    async fn embedding_failure_leaves_zero_count_and_no_metadata() {
        let store = Arc::new(MemoryVectorStore::new());
        let embedder = Arc::new(FakeEmbedder::new());
        embedder.fail.store(true, Ordering::SeqCst);
        let dir = tempfile::tempdir().unwrap();
        let mut indexer = indexer_with(&store, &embedder, &dir);

        let count = indexer.index_skills(&sample_skills()).await.unwrap();
        assert_eq!(count, 0);
        assert_eq!(store.commit_count(), 0);
        let meta_path = IndexMeta::path_for_store(&dir.path().join("router.lance"));
        assert!(IndexMeta::load(&meta_path).await.is_none());
    }

    #[tokio::test]
    async fn in_memory_fallback_ranks_by_keyword_overlap() {
        let mut indexer = SkillIndexer::in_memory();
        let count = indexer.index_skills(&sample_skills()).await.unwrap();
        assert_eq!(count, 5);

        let rows = indexer.search("commit staged", 3, 0.0).await;
        assert!(!rows.is_empty());
        assert_eq!(rows[0]["id"], json!("git.commit"));
        assert!(rows[0]["score"].as_f64().unwrap() <= 0.9);
    }

    #[tokio::test]
    async fn threshold_filters_search_rows() {
        let mut indexer = SkillIndexer::in_memory();
        indexer.index_skills(&sample_skills()).await.unwrap();
        let rows = indexer.search("commit unrelated words here", 5, 0.5).await;
        assert!(rows.iter().all(|row| row["score"].as_f64().unwrap() >= 0.5));
    }
}
