use crate::context::{page_from_metadata, source_label};
use crate::traits::VectorIndex;
use crate::{BackendError, RetrievedChunk, RuleChunk};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info};

const UPSERT_BATCH: usize = 256;

pub struct QdrantStore {
    endpoint: String,
    collection: String,
    api_key: Option<String>,
    client: Client,
}

impl QdrantStore {
    pub fn new(
        endpoint: impl Into<String>,
        collection: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            collection: collection.into(),
            api_key,
            client: Client::new(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.endpoint, self.collection)
    }

    pub async fn list_collections(&self) -> Result<Vec<String>, BackendError> {
        let response = self
            .authorized(self.client.get(format!("{}/collections", self.endpoint)))
            .send()
            .await?;
        let parsed: Value = check(response).await?.json().await?;
        Ok(collection_names(&parsed))
    }
}

#[async_trait]
impl VectorIndex for QdrantStore {
    async fn ensure_collection(&self, vector_size: usize) -> Result<(), BackendError> {
        let existing = self
            .authorized(self.client.get(self.collection_url()))
            .send()
            .await?;

        if existing.status().is_success() {
            let parsed: Value = existing.json().await?;
            let configured = parsed
                .pointer("/result/config/params/vectors/size")
                .and_then(Value::as_u64);
            if let Some(size) = configured {
                if size as usize != vector_size {
                    return Err(BackendError::Request(format!(
                        "collection {} stores vectors of size {size}, embeddings have {vector_size}",
                        self.collection
                    )));
                }
            }
            debug!(collection = %self.collection, "collection exists");
            return Ok(());
        }

        if existing.status() != StatusCode::NOT_FOUND {
            check(existing).await?;
        }

        info!(collection = %self.collection, vector_size, "creating collection");
        let response = self
            .authorized(self.client.put(self.collection_url()))
            .json(&json!({
                "vectors": { "size": vector_size, "distance": "Cosine" }
            }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
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

        let points = chunks
            .iter()
            .zip(embeddings.iter())
            .map(|(chunk, embedding)| point(chunk, embedding))
            .collect::<Vec<_>>();

        for batch in points.chunks(UPSERT_BATCH) {
            let response = self
                .authorized(
                    self.client
                        .put(format!("{}/points?wait=true", self.collection_url())),
                )
                .json(&json!({ "points": batch }))
                .send()
                .await?;
            check(response).await?;
            debug!(collection = %self.collection, points = batch.len(), "upserted batch");
        }

        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, BackendError> {
        let response = self
            .authorized(
                self.client
                    .post(format!("{}/points/search", self.collection_url())),
            )
            .json(&json!({
                "vector": query_vector,
                "limit": limit,
                "with_payload": true,
            }))
            .send()
            .await?;

        let parsed: Value = check(response).await?.json().await?;
        Ok(parse_hits(&parsed))
    }
}

async fn check(response: Response) -> Result<Response, BackendError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::BackendResponse {
        backend: "qdrant".to_string(),
        details: format!("{status}: {body}"),
    })
}

/// Payload keeps the `page_content` + `metadata` layout so collections built
/// by earlier tooling stay readable.
fn point(chunk: &RuleChunk, embedding: &[f32]) -> Value {
    json!({
        "id": chunk.chunk_index,
        "vector": embedding,
        "payload": {
            "page_content": chunk.text,
            "metadata": {
                "source_name": chunk.source_name,
                "source": chunk.source_path,
                "page": chunk.page,
                "chunk_id": chunk.chunk_id,
            },
        },
    })
}

fn parse_hits(parsed: &Value) -> Vec<RetrievedChunk> {
    parsed
        .pointer("/result")
        .and_then(Value::as_array)
        .map(|hits| {
            hits.iter()
                .map(|hit| {
                    let metadata = hit
                        .pointer("/payload/metadata")
                        .cloned()
                        .unwrap_or_default();
                    RetrievedChunk {
                        text: hit
                            .pointer("/payload/page_content")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        source_name: source_label(&metadata),
                        page: page_from_metadata(&metadata),
                        score: hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0),
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

fn collection_names(parsed: &Value) -> Vec<String> {
    let mut names = parsed
        .pointer("/result/collections")
        .and_then(Value::as_array)
        .map(|collections| {
            collections
                .iter()
                .filter_map(|collection| collection.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    names.sort();
    names
}
