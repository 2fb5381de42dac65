use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Append-only record of deletion and administrative actions. Never mutated
/// or deleted by this service.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub tenant_id: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub actor: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateAuditEntry {
    pub tenant_id: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub actor: String,
    pub metadata: serde_json::Value,
}

impl CreateAuditEntry {
    pub fn tenant_storage_deletion(
        tenant_id: &str,
        actor: &str,
        requested: usize,
        deleted: usize,
        verified: bool,
    ) -> Self {
        CreateAuditEntry {
            tenant_id: tenant_id.to_string(),
            action: "tenant_storage_deletion".to_string(),
            entity_type: "tenant".to_string(),
            entity_id: tenant_id.to_string(),
            actor: actor.to_string(),
            metadata: serde_json::json!({
                "requested_count": requested,
                "deleted_count": deleted,
                "verified": verified,
                "timestamp": Utc::now().to_rfc3339(),
            }),
        }
    }
}
