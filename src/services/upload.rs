//! Upload credential issuance.
//!
//! Nothing here ever writes bytes itself; the service validates the request,
//! derives a guard-checked key, and hands the caller a presigned PUT scoped
//! to exactly that key.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use crate::errors::ApiError;
use crate::guard;
use crate::keys::{self, Stage};
use crate::models::UploadCredential;
use crate::storage::{ObjectStore, PresignOperation};

pub struct UploadService {
    storage: Arc<dyn ObjectStore>,
    allowed_extensions: Vec<String>,
    max_upload_bytes: i64,
    presign_expiry: Duration,
}

impl UploadService {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        allowed_extensions: Vec<String>,
        max_upload_bytes: i64,
        presign_expiry: Duration,
    ) -> Self {
        Self {
            storage,
            allowed_extensions,
            max_upload_bytes,
            presign_expiry,
        }
    }

    /// Build the raw-stage key for an upload, then re-check it through the
    /// guard. The codec and the guard share a contract; if they ever drift,
    /// this fails closed instead of issuing a credential for a bad key.
    pub fn generate_key(
        &self,
        tenant_id: &str,
        filename: &str,
        document_id: Option<&str>,
    ) -> Result<String, ApiError> {
        let generated;
        let document_id = match document_id {
            Some(id) => id,
            None => {
                generated = Uuid::new_v4().to_string();
                &generated
            }
        };

        let key = keys::build_key(tenant_id, document_id, filename, Stage::Raw)?;
        if !guard::validate(&key, tenant_id) {
            return Err(ApiError::InvalidKeyGenerated);
        }
        Ok(key)
    }

    /// Extension allow-list check with a MIME cross-check on top. Boolean on
    /// purpose: a mismatch is an expected client mistake, not an exception.
    pub fn validate_file_type(mime_type: &str, filename: &str, allowed: &[String]) -> bool {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_lowercase();

        if extension.is_empty() || !allowed.iter().any(|a| a == &extension) {
            return false;
        }

        // Secondary check: the declared MIME must be plausible for the
        // extension. Extensions unknown to the lookup table pass on the
        // primary check alone.
        let guesses = mime_guess::from_ext(&extension);
        if guesses.is_empty() {
            return true;
        }
        guesses
            .iter()
            .any(|g| g.essence_str().eq_ignore_ascii_case(mime_type))
    }

    pub fn validate_file_size(size: i64, max_bytes: i64) -> bool {
        size > 0 && size <= max_bytes
    }

    /// Issue a time-bounded write credential for one file.
    ///
    /// Checks run in order and no credential is produced if any fails: file
    /// type, file size, key generation (which includes sanitization and the
    /// guard double-check).
    pub async fn request_upload_credential(
        &self,
        tenant_id: &str,
        filename: &str,
        mime_type: &str,
        file_size: i64,
        document_id: Option<&str>,
    ) -> Result<UploadCredential, ApiError> {
        if !Self::validate_file_type(mime_type, filename, &self.allowed_extensions) {
            return Err(ApiError::UnsupportedFileType(format!(
                "{} ({})",
                filename, mime_type
            )));
        }

        if !Self::validate_file_size(file_size, self.max_upload_bytes) {
            return Err(ApiError::FileTooLarge {
                size: file_size,
                max: self.max_upload_bytes,
            });
        }

        let key = self.generate_key(tenant_id, filename, document_id)?;

        let credential = self
            .storage
            .presign(PresignOperation::Put, &key, self.presign_expiry)
            .await
            .map_err(ApiError::Storage)?;

        // The sanitized name is the key's final segment
        let sanitized_filename = key
            .rsplit('/')
            .next()
            .unwrap_or(filename)
            .to_string();

        info!(
            tenant_id = tenant_id,
            key = key.as_str(),
            "issued upload credential"
        );

        Ok(UploadCredential {
            credential,
            key,
            filename: sanitized_filename,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        vec!["pdf".to_string(), "txt".to_string(), "docx".to_string()]
    }

    #[test]
    fn test_validate_file_type_extension_allow_list() {
        assert!(UploadService::validate_file_type(
            "application/pdf",
            "report.pdf",
            &allowed()
        ));
        assert!(!UploadService::validate_file_type(
            "application/x-msdownload",
            "setup.exe",
            &allowed()
        ));
        assert!(!UploadService::validate_file_type(
            "application/pdf",
            "no_extension",
            &allowed()
        ));
    }

    #[test]
    fn test_validate_file_type_mime_cross_check() {
        // Declared MIME contradicts the extension
        assert!(!UploadService::validate_file_type(
            "image/png",
            "report.pdf",
            &allowed()
        ));
        assert!(UploadService::validate_file_type(
            "text/plain",
            "notes.txt",
            &allowed()
        ));
    }

    #[test]
    fn test_validate_file_size_bounds() {
        assert!(UploadService::validate_file_size(1, 100));
        assert!(UploadService::validate_file_size(100, 100));
        assert!(!UploadService::validate_file_size(101, 100));
        assert!(!UploadService::validate_file_size(0, 100));
        assert!(!UploadService::validate_file_size(-5, 100));
    }
}
