use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use super::Database;

impl Database {
    pub async fn tenant_exists(&self, tenant_id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 AS one FROM tenants WHERE id = $1")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!("Database query failed: {}", e))?;
        Ok(row.is_some())
    }

    pub async fn list_tenant_ids(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT id FROM tenants ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!("Database query failed: {}", e))?;
        Ok(rows.into_iter().map(|row| row.get("id")).collect())
    }

    pub async fn active_user_count(&self, tenant_id: &str) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM users WHERE tenant_id = $1 AND is_active = TRUE",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Database query failed: {}", e))?;
        Ok(row.get("count"))
    }

    pub async fn folder_allowed_roles(&self, folder_id: Uuid) -> Result<Option<Vec<String>>> {
        let row = sqlx::query("SELECT allowed_roles FROM folders WHERE id = $1")
            .bind(folder_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!("Database query failed: {}", e))?;
        Ok(row.and_then(|r| r.get("allowed_roles")))
    }

    /// Remove every relational trace of a tenant in one transaction, strictly
    /// children before parents so foreign keys never dangle mid-teardown.
    pub async fn delete_tenant_records(&self, tenant_id: &str) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to begin transaction: {}", e))?;

        sqlx::query("DELETE FROM documents WHERE tenant_id = $1")
            .bind(tenant_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to delete documents: {}", e))?;

        sqlx::query("DELETE FROM folders WHERE tenant_id = $1")
            .bind(tenant_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to delete folders: {}", e))?;

        sqlx::query("DELETE FROM users WHERE tenant_id = $1")
            .bind(tenant_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to delete users: {}", e))?;

        sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(tenant_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to delete tenant: {}", e))?;

        tx.commit()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to commit tenant teardown: {}", e))?;

        Ok(())
    }
}
