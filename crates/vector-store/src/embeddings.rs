use crate::error::Result;
use async_trait::async_trait;

/// Batch text embedding contract.
///
/// One return shape only: a batch in, one vector per input out. Callers that
/// need a single vector embed a one-element batch and take the first row.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;

    fn backend(&self) -> &str;
}
