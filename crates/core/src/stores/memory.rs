use crate::traits::VectorIndex;
use crate::{BackendError, RetrievedChunk, RuleChunk};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Brute-force cosine-similarity index kept in process memory.
///
/// Entries are keyed by chunk index, so re-ingesting the same chunks
/// overwrites them instead of duplicating.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<BTreeMap<u64, (RuleChunk, Vec<f32>)>>,
    vector_size: RwLock<Option<usize>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector size fixed by the first `ensure_collection`, if any.
    pub fn vector_size(&self) -> Option<usize> {
        self.vector_size.read().ok().and_then(|size| *size)
    }
}

fn poisoned() -> BackendError {
    BackendError::Request("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl VectorIndex for InMemoryStore {
    async fn ensure_collection(&self, vector_size: usize) -> Result<(), BackendError> {
        let mut current = self.vector_size.write().map_err(|_| poisoned())?;
        match *current {
            Some(size) if size != vector_size => Err(BackendError::Request(format!(
                "collection stores vectors of size {size}, embeddings have {vector_size}"
            ))),
            _ => {
                *current = Some(vector_size);
                Ok(())
            }
        }
    }

    async fn upsert_chunks(
        &self,
        chunks: &[RuleChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), BackendError> {
        if chunks.len() != embeddings.len() {
            return Err(BackendError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            entries.insert(chunk.chunk_index, (chunk.clone(), embedding.clone()));
        }
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, BackendError> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        let mut scored = entries
            .values()
            .map(|(chunk, embedding)| (chunk, cosine_similarity(query_vector, embedding)))
            .collect::<Vec<_>>();

        scored.sort_by(|left, right| right.1.total_cmp(&left.1));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(chunk, score)| RetrievedChunk {
                text: chunk.text.clone(),
                source_name: chunk.source_name.clone(),
                page: chunk.page,
                score: f64::from(score),
            })
            .collect())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
