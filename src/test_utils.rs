//! In-memory doubles for the storage, metadata and AI collaborators.
//!
//! Everything here keeps its state behind plain mutexes and records enough
//! call history for tests to assert on ordering properties (for example
//! that no delete batch was issued before validation aborted a workflow).

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::db::MetadataStore;
use crate::ingestion::{Embedder, TextExtractor, VectorStore};
use crate::models::{ChunkMetadata, CreateAuditEntry, Document, DocumentStatus};
use crate::storage::{
    BatchDeleteOutcome, ObjectListing, ObjectStore, PresignOperation, DELETE_BATCH_LIMIT,
};

/// In-memory [`ObjectStore`] with paginated listings and call recording.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    /// Page size for `list`, to exercise continuation handling.
    pub page_size: usize,
    /// Sizes of every delete_batch call, in order.
    pub delete_batch_sizes: Mutex<Vec<usize>>,
    /// Keys passed to `get`, in order.
    pub get_keys: Mutex<Vec<String>>,
    /// Keys passed to `put`, in order.
    pub put_keys: Mutex<Vec<String>>,
    /// When set, delete_batch fails wholesale for batches containing this key.
    pub fail_delete_containing: Option<String>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self {
            page_size: 1000,
            ..Default::default()
        }
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size,
            ..Default::default()
        }
    }

    pub fn insert(&self, key: &str, data: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, key: &str, data: &[u8], _content_type: &str) -> Result<()> {
        self.put_keys.lock().unwrap().push(key.to_string());
        self.insert(key, data);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.get_keys.lock().unwrap().push(key.to_string());
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow!("object not found: {}", key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn delete_batch(&self, keys: &[String]) -> Result<BatchDeleteOutcome> {
        if keys.len() > DELETE_BATCH_LIMIT {
            return Err(anyhow!(
                "batch of {} exceeds limit {}",
                keys.len(),
                DELETE_BATCH_LIMIT
            ));
        }
        self.delete_batch_sizes.lock().unwrap().push(keys.len());

        if let Some(poison) = &self.fail_delete_containing {
            if keys.iter().any(|k| k.contains(poison.as_str())) {
                return Err(anyhow!("simulated batch failure"));
            }
        }

        let mut objects = self.objects.lock().unwrap();
        let mut deleted_keys = Vec::new();
        for key in keys {
            if objects.remove(key).is_some() {
                deleted_keys.push(key.clone());
            } else {
                // S3 reports deletes of missing keys as deleted
                deleted_keys.push(key.clone());
            }
        }
        Ok(BatchDeleteOutcome {
            deleted_keys,
            errors: Vec::new(),
        })
    }

    async fn list(&self, prefix: &str, continuation: Option<String>) -> Result<ObjectListing> {
        let objects = self.objects.lock().unwrap();
        let all: Vec<String> = objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();

        let start = match continuation {
            Some(token) => all.iter().position(|k| k.as_str() > token.as_str()).unwrap_or(all.len()),
            None => 0,
        };

        let page: Vec<String> = all.iter().skip(start).take(self.page_size).cloned().collect();
        let next_token = if start + page.len() < all.len() {
            page.last().cloned()
        } else {
            None
        };

        Ok(ObjectListing {
            keys: page,
            next_token,
        })
    }

    async fn presign(
        &self,
        operation: PresignOperation,
        key: &str,
        expires_in: std::time::Duration,
    ) -> Result<String> {
        let op = match operation {
            PresignOperation::Get => "get",
            PresignOperation::Put => "put",
        };
        Ok(format!(
            "memory://{}/{}?expires={}",
            op,
            key,
            expires_in.as_secs()
        ))
    }

    fn storage_type(&self) -> &'static str {
        "memory"
    }

    async fn initialize(&self) -> Result<()> {
        Ok(())
    }
}

/// In-memory [`MetadataStore`].
#[derive(Default)]
pub struct InMemoryMetadataStore {
    pub documents: Mutex<HashMap<Uuid, Document>>,
    pub tenants: Mutex<Vec<String>>,
    pub active_users: Mutex<HashMap<String, i64>>,
    pub folder_roles: Mutex<HashMap<Uuid, Option<Vec<String>>>>,
    pub audit_entries: Mutex<Vec<CreateAuditEntry>>,
    pub records_deleted_for: Mutex<Vec<String>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tenant(&self, tenant_id: &str, active_users: i64) {
        self.tenants.lock().unwrap().push(tenant_id.to_string());
        self.active_users
            .lock()
            .unwrap()
            .insert(tenant_id.to_string(), active_users);
    }

    pub fn add_document(&self, document: Document) {
        self.documents
            .lock()
            .unwrap()
            .insert(document.id, document);
    }

    pub fn document_status(&self, id: Uuid) -> Option<DocumentStatus> {
        self.documents.lock().unwrap().get(&id).map(|d| d.status)
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn find_document(&self, id: Uuid, tenant_id: &str) -> Result<Option<Document>> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .get(&id)
            .filter(|d| d.tenant_id == tenant_id && !d.is_deleted())
            .cloned())
    }

    async fn update_document_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        detail: Option<&str>,
    ) -> Result<()> {
        let mut documents = self.documents.lock().unwrap();
        let document = documents
            .get_mut(&id)
            .ok_or_else(|| anyhow!("document not found: {}", id))?;
        document.status = status;
        document.status_detail = detail.map(|s| s.to_string());
        document.updated_at = Utc::now();
        Ok(())
    }

    async fn find_ingestible_documents(&self, tenant_id: &str, limit: i64) -> Result<Vec<Document>> {
        let documents = self.documents.lock().unwrap();
        let mut eligible: Vec<Document> = documents
            .values()
            .filter(|d| {
                d.tenant_id == tenant_id
                    && !d.is_deleted()
                    && matches!(d.status, DocumentStatus::Pending | DocumentStatus::Extracted)
            })
            .cloned()
            .collect();
        eligible.sort_by_key(|d| d.created_at);
        eligible.truncate(limit as usize);
        Ok(eligible)
    }

    async fn list_tenant_ids(&self) -> Result<Vec<String>> {
        Ok(self.tenants.lock().unwrap().clone())
    }

    async fn tenant_exists(&self, tenant_id: &str) -> Result<bool> {
        Ok(self.tenants.lock().unwrap().iter().any(|t| t == tenant_id))
    }

    async fn active_user_count(&self, tenant_id: &str) -> Result<i64> {
        Ok(*self
            .active_users
            .lock()
            .unwrap()
            .get(tenant_id)
            .unwrap_or(&0))
    }

    async fn folder_allowed_roles(&self, folder_id: Uuid) -> Result<Option<Vec<String>>> {
        Ok(self
            .folder_roles
            .lock()
            .unwrap()
            .get(&folder_id)
            .cloned()
            .flatten())
    }

    async fn delete_tenant_records(&self, tenant_id: &str) -> Result<()> {
        self.documents
            .lock()
            .unwrap()
            .retain(|_, d| d.tenant_id != tenant_id);
        self.tenants.lock().unwrap().retain(|t| t != tenant_id);
        self.records_deleted_for
            .lock()
            .unwrap()
            .push(tenant_id.to_string());
        Ok(())
    }

    async fn create_audit_entry(&self, entry: CreateAuditEntry) -> Result<()> {
        self.audit_entries.lock().unwrap().push(entry);
        Ok(())
    }
}

/// UTF-8 pass-through extractor.
pub struct StubExtractor;

#[async_trait]
impl TextExtractor for StubExtractor {
    async fn extract(&self, data: &[u8], _mime_type: &str) -> Result<String> {
        Ok(String::from_utf8_lossy(data).into_owned())
    }
}

/// Returns a constant small vector per input and records batch sizes.
#[derive(Default)]
pub struct StubEmbedder {
    pub batch_sizes: Mutex<Vec<usize>>,
    pub fail: bool,
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.fail {
            return Err(anyhow!("simulated embedder outage"));
        }
        self.batch_sizes.lock().unwrap().push(texts.len());
        Ok(texts.iter().map(|_| vec![0.1_f32; 8]).collect())
    }
}

/// Records every stored embedding record.
#[derive(Default)]
pub struct RecordingVectorStore {
    pub records: Mutex<Vec<(String, ChunkMetadata)>>,
}

#[async_trait]
impl VectorStore for RecordingVectorStore {
    async fn store(&self, id: &str, _vector: &[f32], metadata: &ChunkMetadata) -> Result<()> {
        self.records
            .lock()
            .unwrap()
            .push((id.to_string(), metadata.clone()));
        Ok(())
    }
}

/// A pending document with a guard-valid raw-stage key.
pub fn make_document(tenant_id: &str, filename: &str) -> Document {
    let id = Uuid::new_v4();
    let storage_key = crate::keys::build_key(
        tenant_id,
        &id.to_string(),
        filename,
        crate::keys::Stage::Raw,
    )
    .expect("valid test key");

    Document {
        id,
        tenant_id: tenant_id.to_string(),
        filename: filename.to_string(),
        original_filename: filename.to_string(),
        storage_key,
        mime_type: "text/plain".to_string(),
        file_size: 42,
        status: DocumentStatus::Pending,
        status_detail: None,
        folder_id: None,
        allowed_roles: None,
        deleted_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
