//! Postgres access layer.
//!
//! `Database` wraps a connection pool; per-domain queries live in the
//! sibling files as `impl Database` blocks. Services depend on the
//! [`MetadataStore`] trait rather than the concrete struct so tests can
//! substitute an in-memory double.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::models::{CreateAuditEntry, Document, DocumentStatus};

pub mod audit;
pub mod documents;
pub mod tenants;

/// Contract of the document metadata store as consumed by the upload,
/// download, ingestion and deletion services.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Look up a document by id AND tenant AND not-soft-deleted in a single
    /// query. The tenant filter is structural: there is no code path that
    /// fetches by id alone and post-filters.
    async fn find_document(&self, id: Uuid, tenant_id: &str) -> Result<Option<Document>>;

    async fn update_document_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        detail: Option<&str>,
    ) -> Result<()>;

    /// Documents eligible for ingestion: `PENDING` or `EXTRACTED`, not
    /// soft-deleted, owned by the tenant.
    async fn find_ingestible_documents(&self, tenant_id: &str, limit: i64) -> Result<Vec<Document>>;

    /// Ids of all tenants, for the background ingestion pass.
    async fn list_tenant_ids(&self) -> Result<Vec<String>>;

    async fn tenant_exists(&self, tenant_id: &str) -> Result<bool>;

    async fn active_user_count(&self, tenant_id: &str) -> Result<i64>;

    /// Role allow-list of a folder, if the folder declares one.
    async fn folder_allowed_roles(&self, folder_id: Uuid) -> Result<Option<Vec<String>>>;

    /// Physically remove all relational records of a tenant in one
    /// transaction, children before parents. Only the offboarding workflow
    /// calls this, and only after storage deletion has verified clean.
    async fn delete_tenant_records(&self, tenant_id: &str) -> Result<()>;

    async fn create_audit_entry(&self, entry: CreateAuditEntry) -> Result<()>;
}

#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Retry transient failures with linear backoff. Pool exhaustion and
    /// connection drops are the usual suspects.
    pub async fn with_retry<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        const MAX_RETRIES: u32 = 3;

        let mut last_error = None;
        for attempt in 0..=MAX_RETRIES {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < MAX_RETRIES {
                        warn!(
                            "database operation failed (attempt {}/{}): {}",
                            attempt + 1,
                            MAX_RETRIES + 1,
                            last_error.as_ref().unwrap()
                        );
                        tokio::time::sleep(Duration::from_millis(200 * (attempt as u64 + 1)))
                            .await;
                    }
                }
            }
        }
        Err(last_error.unwrap())
    }
}

#[async_trait]
impl MetadataStore for Database {
    async fn find_document(&self, id: Uuid, tenant_id: &str) -> Result<Option<Document>> {
        Database::find_document(self, id, tenant_id).await
    }

    async fn update_document_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        detail: Option<&str>,
    ) -> Result<()> {
        Database::update_document_status(self, id, status, detail).await
    }

    async fn find_ingestible_documents(&self, tenant_id: &str, limit: i64) -> Result<Vec<Document>> {
        Database::find_ingestible_documents(self, tenant_id, limit).await
    }

    async fn list_tenant_ids(&self) -> Result<Vec<String>> {
        Database::list_tenant_ids(self).await
    }

    async fn tenant_exists(&self, tenant_id: &str) -> Result<bool> {
        Database::tenant_exists(self, tenant_id).await
    }

    async fn active_user_count(&self, tenant_id: &str) -> Result<i64> {
        Database::active_user_count(self, tenant_id).await
    }

    async fn folder_allowed_roles(&self, folder_id: Uuid) -> Result<Option<Vec<String>>> {
        Database::folder_allowed_roles(self, folder_id).await
    }

    async fn delete_tenant_records(&self, tenant_id: &str) -> Result<()> {
        Database::delete_tenant_records(self, tenant_id).await
    }

    async fn create_audit_entry(&self, entry: CreateAuditEntry) -> Result<()> {
        Database::create_audit_entry(self, entry).await
    }
}
