use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use super::Database;
use crate::models::{Document, DocumentStatus};

fn row_to_document(row: sqlx::postgres::PgRow) -> Result<Document> {
    let status: String = row.get("status");
    Ok(Document {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        filename: row.get("filename"),
        original_filename: row.get("original_filename"),
        storage_key: row.get("storage_key"),
        mime_type: row.get("mime_type"),
        file_size: row.get("file_size"),
        status: DocumentStatus::try_from(status).map_err(|e| anyhow::anyhow!(e))?,
        status_detail: row.get("status_detail"),
        folder_id: row.get("folder_id"),
        allowed_roles: row.get("allowed_roles"),
        deleted_at: row.get("deleted_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

const DOCUMENT_COLUMNS: &str = "id, tenant_id, filename, original_filename, storage_key, \
     mime_type, file_size, status, status_detail, folder_id, allowed_roles, \
     deleted_at, created_at, updated_at";

impl Database {
    pub async fn find_document(&self, id: Uuid, tenant_id: &str) -> Result<Option<Document>> {
        self.with_retry(move || async move {
            let row = sqlx::query(&format!(
                r#"SELECT {} FROM documents
                   WHERE id = $1 AND tenant_id = $2 AND deleted_at IS NULL"#,
                DOCUMENT_COLUMNS
            ))
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!("Database query failed: {}", e))?;

            row.map(row_to_document).transpose()
        })
        .await
    }

    pub async fn update_document_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        detail: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"UPDATE documents
               SET status = $2, status_detail = $3, updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(detail)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Database update failed: {}", e))?;

        Ok(())
    }

    pub async fn find_ingestible_documents(
        &self,
        tenant_id: &str,
        limit: i64,
    ) -> Result<Vec<Document>> {
        self.with_retry(move || async move {
            let rows = sqlx::query(&format!(
                r#"SELECT {} FROM documents
                   WHERE tenant_id = $1
                     AND status IN ('PENDING', 'EXTRACTED')
                     AND deleted_at IS NULL
                   ORDER BY created_at
                   LIMIT $2"#,
                DOCUMENT_COLUMNS
            ))
            .bind(tenant_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!("Database query failed: {}", e))?;

            rows.into_iter().map(row_to_document).collect()
        })
        .await
    }
}
