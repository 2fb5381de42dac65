//! Default collaborator implementations for the ingestion pipeline.
//!
//! Extraction, embedding and vector storage are external concerns; these
//! implementations speak to them over HTTP (OpenAI-compatible embeddings,
//! Qdrant-compatible vector upserts) and exist so the binary has something
//! to wire in. Tests substitute in-memory doubles instead.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::ingestion::{Embedder, TextExtractor, VectorStore};
use crate::models::ChunkMetadata;

/// Treats stored bytes as UTF-8 text. Good enough for plain text and
/// markdown; richer formats go through a real extraction service.
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, data: &[u8], _mime_type: &str) -> Result<String> {
        Ok(String::from_utf8_lossy(data).into_owned())
    }
}

/// OpenAI-compatible embeddings endpoint.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(endpoint: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("requesting embeddings for {} texts", texts.len());

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "input": texts,
            }))
            .send()
            .await
            .map_err(|e| anyhow!("embeddings request failed: {}", e))?
            .error_for_status()
            .map_err(|e| anyhow!("embeddings request rejected: {}", e))?;

        let body: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("invalid embeddings response: {}", e))?;

        Ok(body.data.into_iter().map(|row| row.embedding).collect())
    }
}

/// Qdrant-compatible REST upsert. The metadata envelope rides along as the
/// point payload; its `tenantId` field is what downstream search filters on.
pub struct HttpVectorStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
}

impl HttpVectorStore {
    pub fn new(base_url: String, collection: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            collection,
            api_key,
        }
    }
}

#[async_trait]
impl VectorStore for HttpVectorStore {
    async fn store(&self, id: &str, vector: &[f32], metadata: &ChunkMetadata) -> Result<()> {
        let url = format!(
            "{}/collections/{}/points",
            self.base_url.trim_end_matches('/'),
            self.collection
        );

        let mut request = self.client.put(&url).json(&serde_json::json!({
            "points": [{
                "id": id,
                "vector": vector,
                "payload": metadata,
            }]
        }));
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }

        request
            .send()
            .await
            .map_err(|e| anyhow!("vector upsert failed: {}", e))?
            .error_for_status()
            .map_err(|e| anyhow!("vector upsert rejected: {}", e))?;

        Ok(())
    }
}
