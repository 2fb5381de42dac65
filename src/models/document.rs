use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle of a document moving through the ingestion pipeline.
///
/// `Pending → Extracted → Ready`, with `Error` reachable from any state.
/// `Error` is terminal until an admin reprocessing pass picks the document
/// up again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentStatus {
    Pending,
    Extracted,
    Ready,
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "PENDING",
            DocumentStatus::Extracted => "EXTRACTED",
            DocumentStatus::Ready => "READY",
            DocumentStatus::Error => "ERROR",
        }
    }
}

impl TryFrom<String> for DocumentStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        match value.as_str() {
            "PENDING" => Ok(DocumentStatus::Pending),
            "EXTRACTED" => Ok(DocumentStatus::Extracted),
            "READY" => Ok(DocumentStatus::Ready),
            "ERROR" => Ok(DocumentStatus::Error),
            other => Err(format!("unknown document status: {}", other)),
        }
    }
}

/// One uploaded document and its place in the pipeline.
///
/// `storage_key` must always satisfy the canonical key invariant relative to
/// `tenant_id`; the download and ingestion paths re-check this on every use
/// rather than trusting the stored value.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Document {
    pub id: Uuid,
    pub tenant_id: String,
    pub filename: String,
    pub original_filename: String,
    pub storage_key: String,
    pub mime_type: String,
    pub file_size: i64,
    #[sqlx(try_from = "String")]
    pub status: DocumentStatus,
    pub status_detail: Option<String>,
    pub folder_id: Option<Uuid>,
    /// Explicit role allow-list; `None` defers to the folder, then to
    /// default-allow for any tenant member.
    pub allowed_roles: Option<Vec<String>>,
    /// Soft-delete marker. Deleted documents stay in the table until the
    /// tenant offboarding workflow physically removes them.
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Request body for an upload-credential request.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UploadUrlRequest {
    pub filename: String,
    pub mime_type: String,
    pub file_size: i64,
    /// Client-supplied document id for re-uploads; a fresh id is generated
    /// when absent.
    pub document_id: Option<String>,
}

/// Time-bounded write credential scoped to exactly one storage key.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UploadCredential {
    pub credential: String,
    pub key: String,
    pub filename: String,
}

/// Time-bounded read credential for one document.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DownloadCredential {
    pub credential: String,
    pub document_id: Uuid,
    pub filename: String,
    pub mime_type: String,
}

/// Metadata envelope attached to every vector-store record.
///
/// The vector index has no native tenant concept; this envelope's
/// `tenantId` field is the only isolation mechanism once chunk data leaves
/// object storage. Field names are part of the wire contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub tenant_id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
    /// Storage key of the raw object the chunk came from.
    pub source: String,
}

impl ChunkMetadata {
    /// Vector-store record id for one chunk of one document.
    pub fn record_id(document_id: &Uuid, chunk_index: usize) -> String {
        format!("{}_chunk_{}", document_id, chunk_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            DocumentStatus::Pending,
            DocumentStatus::Extracted,
            DocumentStatus::Ready,
            DocumentStatus::Error,
        ] {
            let parsed = DocumentStatus::try_from(status.as_str().to_string()).unwrap();
            assert_eq!(parsed, status);
        }
        assert!(DocumentStatus::try_from("QUEUED".to_string()).is_err());
    }

    #[test]
    fn test_chunk_metadata_wire_field_names() {
        let meta = ChunkMetadata {
            tenant_id: "t_1".into(),
            document_id: "d_1".into(),
            chunk_index: 0,
            text: "hello".into(),
            source: "tenants/t_1/documents/raw/d_1/a.pdf".into(),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["tenantId"], "t_1");
        assert_eq!(json["documentId"], "d_1");
        assert_eq!(json["chunkIndex"], 0);
        assert_eq!(json["source"], "tenants/t_1/documents/raw/d_1/a.pdf");
    }
}
