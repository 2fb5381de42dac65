use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A customer organization. The `id` doubles as the ownership segment of
/// every storage key the tenant writes, so it is restricted to the same
/// character set the key codec accepts.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Folder reference, consumed only for its role allow-list during download
/// permission resolution. Folder CRUD itself lives outside this service.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FolderRef {
    pub id: Uuid,
    pub tenant_id: String,
    pub allowed_roles: Option<Vec<String>>,
}

/// Outcome of the object-storage half of a tenant deletion.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TenantStorageDeletion {
    pub tenant_id: String,
    pub requested_count: usize,
    pub deleted_count: usize,
    /// True when the post-delete listing found the tenant prefix empty.
    pub verified: bool,
    pub errors: Vec<String>,
}
