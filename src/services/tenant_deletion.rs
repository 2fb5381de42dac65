//! Tenant offboarding: recursive deletion of everything under a tenant's
//! storage prefix, followed (optionally) by relational teardown.
//!
//! The storage half is deliberately conservative: the full listing is
//! validated before the first delete call, a single foreign key aborts the
//! whole run, and relational records are only removed once a re-listing
//! confirms the prefix is empty. Metadata must never outlive its bytes, and
//! bytes must never outlive their metadata.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::db::MetadataStore;
use crate::errors::ApiError;
use crate::guard;
use crate::keys;
use crate::models::{CreateAuditEntry, TenantStorageDeletion};
use crate::storage::{self, ObjectStore, DELETE_BATCH_LIMIT};

/// Full offboarding outcome: the storage report plus whether relational
/// records were removed.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TenantDeletionReport {
    pub storage: TenantStorageDeletion,
    /// False when storage verification failed and the relational store was
    /// left untouched. The caller decides whether to retry.
    pub records_deleted: bool,
}

pub struct TenantDeletionService {
    db: Arc<dyn MetadataStore>,
    storage: Arc<dyn ObjectStore>,
}

impl TenantDeletionService {
    pub fn new(db: Arc<dyn MetadataStore>, storage: Arc<dyn ObjectStore>) -> Self {
        Self { db, storage }
    }

    /// Pre-conditions shared by both entry points. Any failure aborts with
    /// no side effects.
    async fn check_preconditions(
        &self,
        tenant_id: &str,
        force: bool,
    ) -> Result<String, ApiError> {
        let tenant = guard::sanitize_tenant_id(tenant_id).ok_or_else(|| {
            ApiError::InvalidParameter("tenant id is empty after sanitization".into())
        })?;

        if !self
            .db
            .tenant_exists(&tenant)
            .await
            .map_err(ApiError::Database)?
        {
            return Err(ApiError::TenantNotFound);
        }

        let active_users = self
            .db
            .active_user_count(&tenant)
            .await
            .map_err(ApiError::Database)?;
        if active_users > 0 && !force {
            return Err(ApiError::TenantHasActiveUsers(active_users));
        }

        Ok(tenant)
    }

    /// Delete every object under `tenants/{tenant_id}/`.
    pub async fn delete_tenant_storage(
        &self,
        tenant_id: &str,
        force: bool,
        actor: &str,
    ) -> Result<TenantStorageDeletion, ApiError> {
        let tenant = self.check_preconditions(tenant_id, force).await?;
        let prefix = keys::tenant_prefix(&tenant)?;

        let listed = storage::list_all(self.storage.as_ref(), &prefix)
            .await
            .map_err(ApiError::Storage)?;

        // Every listed key must validate for this tenant. A mismatch means
        // a bug or a cross-tenant key collision; hard stop, never a partial
        // delete.
        let valid = guard::filter_valid(&listed, &tenant);
        if valid.len() != listed.len() {
            let foreign = listed.len() - valid.len();
            error!(
                tenant_id = tenant.as_str(),
                listed = listed.len(),
                foreign = foreign,
                "foreign objects under tenant prefix, aborting deletion"
            );
            self.write_audit(&tenant, actor, listed.len(), 0, false).await;
            return Err(ApiError::ForeignObjectsDetected {
                listed: listed.len(),
                found: foreign,
            });
        }

        let requested_count = valid.len();
        let mut deleted_count = 0usize;
        let mut errors = Vec::new();

        for batch in valid.chunks(DELETE_BATCH_LIMIT) {
            match self.storage.delete_batch(batch).await {
                Ok(outcome) => {
                    deleted_count += outcome.deleted_keys.len();
                    if !outcome.errors.is_empty() {
                        warn!(
                            tenant_id = tenant.as_str(),
                            errors = outcome.errors.len(),
                            "batch delete reported partial errors"
                        );
                        errors.extend(outcome.errors);
                    }
                }
                Err(e) => {
                    // Keep going: later batches may still succeed, and
                    // maximizing cleanup progress matters more than a clean
                    // single pass.
                    warn!(
                        tenant_id = tenant.as_str(),
                        "batch delete failed, continuing: {}", e
                    );
                    errors.push(e.to_string());
                }
            }
        }

        let remaining = storage::list_all(self.storage.as_ref(), &prefix)
            .await
            .map_err(ApiError::Storage)?;
        let verified = remaining.is_empty();
        if !verified {
            warn!(
                tenant_id = tenant.as_str(),
                remaining = remaining.len(),
                "objects remain after tenant deletion pass"
            );
        }

        self.write_audit(&tenant, actor, requested_count, deleted_count, verified)
            .await;

        info!(
            tenant_id = tenant.as_str(),
            requested = requested_count,
            deleted = deleted_count,
            verified = verified,
            "tenant storage deletion finished"
        );

        Ok(TenantStorageDeletion {
            tenant_id: tenant,
            requested_count,
            deleted_count,
            verified,
            errors,
        })
    }

    /// Full offboarding: storage first, relational records only once the
    /// prefix has verified empty. When verification fails the relational
    /// store is left untouched so no metadata points at bytes that may
    /// still exist.
    pub async fn delete_complete(
        &self,
        tenant_id: &str,
        force: bool,
        actor: &str,
    ) -> Result<TenantDeletionReport, ApiError> {
        let storage_result = self.delete_tenant_storage(tenant_id, force, actor).await?;

        if !storage_result.verified {
            warn!(
                tenant_id = storage_result.tenant_id.as_str(),
                "storage verification failed, relational records retained"
            );
            return Ok(TenantDeletionReport {
                storage: storage_result,
                records_deleted: false,
            });
        }

        self.db
            .delete_tenant_records(&storage_result.tenant_id)
            .await
            .map_err(ApiError::Database)?;

        info!(
            tenant_id = storage_result.tenant_id.as_str(),
            "tenant relational records removed"
        );

        Ok(TenantDeletionReport {
            storage: storage_result,
            records_deleted: true,
        })
    }

    /// Audit writes are best-effort: a failed audit insert is logged but
    /// never fails the deletion that triggered it.
    async fn write_audit(
        &self,
        tenant_id: &str,
        actor: &str,
        requested: usize,
        deleted: usize,
        verified: bool,
    ) {
        let entry = CreateAuditEntry::tenant_storage_deletion(
            tenant_id, actor, requested, deleted, verified,
        );
        if let Err(e) = self.db.create_audit_entry(entry).await {
            error!(
                tenant_id = tenant_id,
                "failed to write deletion audit entry: {}", e
            );
        }
    }
}
