use crate::{BackendError, RetrievedChunk, RuleChunk};
use async_trait::async_trait;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Creates the collection with the given vector size if it is absent.
    async fn ensure_collection(&self, vector_size: usize) -> Result<(), BackendError>;

    async fn upsert_chunks(
        &self,
        chunks: &[RuleChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), BackendError>;

    /// Top-`limit` chunks by similarity, most similar first. Fewer are
    /// returned when the collection holds fewer.
    async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, BackendError>;
}
