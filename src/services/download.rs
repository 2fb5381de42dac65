//! Download credential issuance.
//!
//! Resolution order is fixed: tenant-scoped document lookup, role access,
//! guard validation of the stored key, then a presigned GET scoped to that
//! key. Missing and foreign documents produce the same error so callers
//! cannot probe which ids exist in other tenants.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use uuid::Uuid;

use crate::db::MetadataStore;
use crate::errors::ApiError;
use crate::guard;
use crate::models::{Document, DownloadCredential};
use crate::storage::{ObjectStore, PresignOperation};

/// One link of the permission chain. Resolvers run in declaration order;
/// the first that yields a definite decision wins.
#[derive(Debug, Clone, Copy)]
enum AccessResolver {
    /// The document's own allow-list, when it declares one.
    DocumentRoles,
    /// The owning folder's allow-list, when the document has a folder and
    /// the folder declares one.
    FolderRoles,
    /// Any tenant member may access. Always decides.
    DefaultAllow,
}

const ACCESS_CHAIN: [AccessResolver; 3] = [
    AccessResolver::DocumentRoles,
    AccessResolver::FolderRoles,
    AccessResolver::DefaultAllow,
];

pub struct DownloadService {
    db: Arc<dyn MetadataStore>,
    storage: Arc<dyn ObjectStore>,
    presign_expiry: Duration,
}

impl DownloadService {
    pub fn new(
        db: Arc<dyn MetadataStore>,
        storage: Arc<dyn ObjectStore>,
        presign_expiry: Duration,
    ) -> Self {
        Self {
            db,
            storage,
            presign_expiry,
        }
    }

    /// Tenant-scoped lookup. The tenant filter is part of the query itself,
    /// not a check applied afterwards.
    pub async fn resolve_document(
        &self,
        document_id: Uuid,
        tenant_id: &str,
    ) -> Result<Option<Document>, ApiError> {
        self.db
            .find_document(document_id, tenant_id)
            .await
            .map_err(ApiError::Database)
    }

    /// Walk the permission chain until a resolver decides.
    pub async fn check_role_access(
        &self,
        document: &Document,
        user_roles: &[String],
    ) -> Result<bool, ApiError> {
        for resolver in ACCESS_CHAIN {
            let decision = match resolver {
                AccessResolver::DocumentRoles => document
                    .allowed_roles
                    .as_ref()
                    .map(|roles| Self::roles_intersect(roles, user_roles)),
                AccessResolver::FolderRoles => match document.folder_id {
                    Some(folder_id) => self
                        .db
                        .folder_allowed_roles(folder_id)
                        .await
                        .map_err(ApiError::Database)?
                        .map(|roles| Self::roles_intersect(&roles, user_roles)),
                    None => None,
                },
                AccessResolver::DefaultAllow => Some(true),
            };

            if let Some(allowed) = decision {
                return Ok(allowed);
            }
        }
        // DefaultAllow always decides
        Ok(true)
    }

    fn roles_intersect(allowed: &[String], user_roles: &[String]) -> bool {
        allowed.iter().any(|role| user_roles.contains(role))
    }

    /// Issue a time-bounded read credential for one document.
    pub async fn issue_download_credential(
        &self,
        document_id: Uuid,
        tenant_id: &str,
        user_roles: &[String],
    ) -> Result<DownloadCredential, ApiError> {
        let document = self
            .resolve_document(document_id, tenant_id)
            .await?
            .ok_or(ApiError::NotFoundOrForbidden)?;

        if !self.check_role_access(&document, user_roles).await? {
            // Same error as not-found: no existence leakage
            return Err(ApiError::NotFoundOrForbidden);
        }

        if document.storage_key.is_empty() {
            error!(
                document_id = %document.id,
                tenant_id = tenant_id,
                "document record has no storage key"
            );
            return Err(ApiError::InvalidStorageLocation);
        }

        // A record whose key does not validate for its own tenant is either
        // corrupted or hostile; deny and leave the audit trail.
        if guard::guard(&document.storage_key, tenant_id, "issue_download_credential").is_err() {
            return Err(ApiError::InvalidStorageLocation);
        }

        let credential = self
            .storage
            .presign(PresignOperation::Get, &document.storage_key, self.presign_expiry)
            .await
            .map_err(ApiError::Storage)?;

        info!(
            tenant_id = tenant_id,
            document_id = %document.id,
            "issued download credential"
        );

        Ok(DownloadCredential {
            credential,
            document_id: document.id,
            filename: document.original_filename,
            mime_type: document.mime_type,
        })
    }
}
