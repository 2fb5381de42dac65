//! The tenant-safe ingestion pipeline.
//!
//! Cross-tenant invariant: no storage list/get/put this module issues has a
//! key or prefix that is not already scoped to the tenant being processed.
//! Guard checks sit both at the batch boundary (stored keys re-validated
//! before dispatch) and at the head of per-document processing, so a
//! corrupted document record cannot reach the fetch step even if a caller
//! skips the batch path.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::MetadataStore;
use crate::errors::ApiError;
use crate::guard;
use crate::ingestion::{chunk_text, Embedder, TextExtractor, VectorStore, CHUNK_SIZE_CHARS};
use crate::keys::{self, Stage};
use crate::models::{ChunkMetadata, DocumentStatus};
use crate::storage::{self, ObjectStore};

pub struct IngestionPipeline {
    db: Arc<dyn MetadataStore>,
    storage: Arc<dyn ObjectStore>,
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<dyn Embedder>,
    vectors: Arc<dyn VectorStore>,
    batch_size: i64,
}

impl IngestionPipeline {
    pub fn new(
        db: Arc<dyn MetadataStore>,
        storage: Arc<dyn ObjectStore>,
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn Embedder>,
        vectors: Arc<dyn VectorStore>,
        batch_size: i64,
    ) -> Self {
        Self {
            db,
            storage,
            extractor,
            embedder,
            vectors,
            batch_size,
        }
    }

    /// Run one document through fetch → extract → chunk → embed → store.
    ///
    /// Returns `Ok(false)` when the key fails guard validation: the caller
    /// treats that as a skip, not a fatal error. Any failure during the
    /// pipeline itself marks the document `ERROR` and propagates; earlier
    /// successful side effects are not rolled back, because reprocessing
    /// overwrites chunk records by id.
    pub async fn process_document(
        &self,
        key: &str,
        tenant_id: &str,
        document_id: Uuid,
    ) -> Result<bool, ApiError> {
        if !guard::validate(key, tenant_id) {
            warn!(
                tenant_id = tenant_id,
                document_id = %document_id,
                key = key,
                "skipping document with invalid storage key"
            );
            return Ok(false);
        }

        match self.run_pipeline(key, tenant_id, document_id).await {
            Ok(()) => Ok(true),
            Err(e) => {
                let detail = format!("{:#}", e);
                if let Err(update_err) = self
                    .db
                    .update_document_status(document_id, DocumentStatus::Error, Some(&detail))
                    .await
                {
                    error!(
                        document_id = %document_id,
                        "failed to record ERROR status: {}", update_err
                    );
                }
                Err(ApiError::Storage(e))
            }
        }
    }

    async fn run_pipeline(&self, key: &str, tenant_id: &str, document_id: Uuid) -> Result<()> {
        let document_id_str = document_id.to_string();

        let bytes = self.storage.get(key).await?;

        let mime_type = mime_guess::from_path(key)
            .first_raw()
            .unwrap_or("application/octet-stream");
        let text = self.extractor.extract(&bytes, mime_type).await?;

        // Persist the extracted text as its own tenant-scoped artifact
        let extracted_key = keys::extracted_text_key(tenant_id, &document_id_str)
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        self.storage
            .put(&extracted_key, text.as_bytes(), "text/plain")
            .await?;
        self.db
            .update_document_status(document_id, DocumentStatus::Extracted, None)
            .await?;

        let chunks = chunk_text(&text, CHUNK_SIZE_CHARS);
        if chunks.is_empty() {
            info!(
                tenant_id = tenant_id,
                document_id = %document_id,
                "document produced no text, marking ready"
            );
            self.db
                .update_document_status(document_id, DocumentStatus::Ready, None)
                .await?;
            return Ok(());
        }

        // Chunk manifest alongside the embeddings, for reprocessing and audit
        let chunks_key = keys::chunk_artifact_key(tenant_id, &document_id_str)
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        let manifest = serde_json::to_vec(&chunks)?;
        self.storage
            .put(&chunks_key, &manifest, "application/json")
            .await?;

        let vectors = self.embedder.embed(&chunks).await?;
        if vectors.len() != chunks.len() {
            anyhow::bail!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            );
        }

        for (index, (chunk, vector)) in chunks.iter().zip(vectors.iter()).enumerate() {
            let metadata = ChunkMetadata {
                tenant_id: tenant_id.to_string(),
                document_id: document_id_str.clone(),
                chunk_index: index,
                text: chunk.clone(),
                source: key.to_string(),
            };
            let record_id = ChunkMetadata::record_id(&document_id, index);
            self.vectors.store(&record_id, vector, &metadata).await?;
        }

        self.db
            .update_document_status(document_id, DocumentStatus::Ready, None)
            .await?;

        info!(
            tenant_id = tenant_id,
            document_id = %document_id,
            chunks = chunks.len(),
            "document ingested"
        );
        Ok(())
    }

    /// Process every ingestible document of one tenant. Returns the number
    /// of documents that completed.
    ///
    /// The DB query is already tenant-filtered; each record's stored key is
    /// still re-validated through the guard before processing. Both checks
    /// must hold. A record failing validation is logged and skipped without
    /// aborting the batch, as is any per-document processing error.
    pub async fn process_all_for_tenant(&self, tenant_id: &str) -> Result<usize, ApiError> {
        let documents = self
            .db
            .find_ingestible_documents(tenant_id, self.batch_size)
            .await
            .map_err(ApiError::Database)?;

        let mut processed = 0usize;
        for document in documents {
            if guard::guard(&document.storage_key, tenant_id, "ingest_document").is_err() {
                // guard already logged the denial
                continue;
            }

            match self
                .process_document(&document.storage_key, tenant_id, document.id)
                .await
            {
                Ok(true) => processed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        tenant_id = tenant_id,
                        document_id = %document.id,
                        "document ingestion failed, continuing batch: {}", e
                    );
                }
            }
        }

        Ok(processed)
    }

    /// One background pass over all tenants, sequentially. A failure in one
    /// tenant's batch is logged and must not affect any other tenant.
    pub async fn process_all_tenants(&self) -> Result<usize, ApiError> {
        let tenant_ids = self.db.list_tenant_ids().await.map_err(ApiError::Database)?;

        let mut total = 0usize;
        for tenant_id in tenant_ids {
            match self.process_all_for_tenant(&tenant_id).await {
                Ok(count) => {
                    if count > 0 {
                        info!(tenant_id = tenant_id.as_str(), processed = count, "ingestion pass");
                    }
                    total += count;
                }
                Err(e) => {
                    error!(
                        tenant_id = tenant_id.as_str(),
                        "tenant ingestion pass failed, continuing with next tenant: {}", e
                    );
                }
            }
        }

        Ok(total)
    }

    /// List one stage of one tenant's artifacts. The listing prefix is
    /// tenant-scoped by construction and the paginated result is still
    /// re-filtered client-side before being returned.
    pub async fn list_for_tenant(
        &self,
        tenant_id: &str,
        stage: Stage,
    ) -> Result<Vec<String>, ApiError> {
        let prefix = keys::stage_prefix(tenant_id, stage)?;
        let listed = storage::list_all(self.storage.as_ref(), &prefix)
            .await
            .map_err(ApiError::Storage)?;
        Ok(guard::filter_valid(&listed, tenant_id))
    }
}
