use anyhow::Result;
use uuid::Uuid;

use super::Database;
use crate::models::CreateAuditEntry;

impl Database {
    pub async fn create_audit_entry(&self, entry: CreateAuditEntry) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO audit_log (id, tenant_id, action, entity_type, entity_id, actor, metadata, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())"#,
        )
        .bind(Uuid::new_v4())
        .bind(&entry.tenant_id)
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.actor)
        .bind(&entry.metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to write audit entry: {}", e))?;

        Ok(())
    }
}
