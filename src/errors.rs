//! API error taxonomy and HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// A caller-supplied identifier or filename failed sanitization. Rejected
    /// before any storage call is made.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A storage key failed tenant-ownership or structure validation.
    #[error("access to storage object denied")]
    UnauthorizedAccess,

    /// A document record carries a storage key that does not validate for its
    /// own tenant. Treated like a permission failure externally.
    #[error("document storage location is invalid")]
    InvalidStorageLocation,

    /// Existence and authorization deliberately collapse to one message so a
    /// caller cannot probe which documents exist in other tenants.
    #[error("document not found")]
    NotFoundOrForbidden,

    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("file size {size} exceeds the maximum of {max} bytes")]
    FileTooLarge { size: i64, max: i64 },

    /// The key codec produced a key the guard refuses. Indicates contract
    /// drift between the two; always fail closed.
    #[error("generated storage key failed validation")]
    InvalidKeyGenerated,

    /// A tenant-prefix listing returned keys that do not belong to the
    /// tenant. Data-integrity alarm; the deletion workflow aborts on it.
    #[error("foreign objects detected under tenant prefix ({found} of {listed} keys invalid)")]
    ForeignObjectsDetected { listed: usize, found: usize },

    #[error("tenant still has {0} active users")]
    TenantHasActiveUsers(i64),

    #[error("tenant not found")]
    TenantNotFound,

    #[error("storage backend error: {0}")]
    Storage(#[source] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[source] anyhow::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            ApiError::UnauthorizedAccess | ApiError::InvalidStorageLocation => {
                StatusCode::FORBIDDEN
            }
            ApiError::NotFoundOrForbidden => StatusCode::NOT_FOUND,
            ApiError::UnsupportedFileType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::TenantHasActiveUsers(_) => StatusCode::CONFLICT,
            ApiError::TenantNotFound => StatusCode::NOT_FOUND,
            ApiError::ForeignObjectsDetected { .. }
            | ApiError::InvalidKeyGenerated
            | ApiError::Storage(_)
            | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        (
            status,
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_failures_map_to_forbidden() {
        assert_eq!(ApiError::UnauthorizedAccess.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::InvalidStorageLocation.status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_not_found_and_forbidden_share_one_message() {
        // The message must not distinguish "does not exist" from "not yours".
        assert_eq!(ApiError::NotFoundOrForbidden.to_string(), "document not found");
        assert_eq!(
            ApiError::NotFoundOrForbidden.status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_foreign_objects_is_server_error() {
        let err = ApiError::ForeignObjectsDetected { listed: 10, found: 1 };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
