use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Persisted index metadata, written next to the store after a successful
/// build. A matching `hash` on the next run means "no rebuild needed".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub hash: String,
    pub count: usize,
    pub timestamp: u64,
}

impl IndexMeta {
    #[must_use]
    pub fn new(hash: String, count: usize) -> Self {
        Self {
            hash,
            count,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs()),
        }
    }

    /// Sibling metadata path for a store path: `<store>.meta.json`.
    #[must_use]
    pub fn path_for_store(store_path: &Path) -> PathBuf {
        let mut file_name = store_path
            .file_stem()
            .map_or_else(|| "index".to_string(), |s| s.to_string_lossy().to_string());
        file_name.push_str(".meta.json");
        store_path.with_file_name(file_name)
    }

    pub async fn load(path: &Path) -> Option<Self> {
        let bytes = tokio::fs::read(path).await.ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(meta) => Some(meta),
            Err(err) => {
                log::warn!("index metadata corrupted at {}: {err}", path.display());
                None
            }
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec(self)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn meta_path_replaces_store_suffix() {
        assert_eq!(
            IndexMeta::path_for_store(Path::new("/data/router.lance")),
            PathBuf::from("/data/router.meta.json")
        );
        assert_eq!(
            IndexMeta::path_for_store(Path::new("router")),
            PathBuf::from("router.meta.json")
        );
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("router.meta.json");
        let meta = IndexMeta::new("abc123".to_string(), 7);
        meta.save(&path).await.unwrap();
        let loaded = IndexMeta::load(&path).await.unwrap();
        assert_eq!(loaded, meta);
    }

    #[tokio::test]
    async fn corrupted_meta_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("router.meta.json");
        tokio::fs::write(&path, b"{broken").await.unwrap();
        assert!(IndexMeta::load(&path).await.is_none());
    }
}
